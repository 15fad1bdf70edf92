//! Quaternion and Euler helpers.
//!
//! Placement poses use MuJoCo order (w, x, y, z). Camera configs keep
//! the (x, y, z, w) order of the asset tables they come from.

use serde::{Deserialize, Serialize};

/// Quaternion in (w, x, y, z) order.
pub type QuatWxyz = [f64; 4];
/// Quaternion in (x, y, z, w) order.
pub type QuatXyzw = [f64; 4];
pub type Mat3 = [[f64; 3]; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

pub fn quat_about_axis(axis: Axis, angle: f64) -> QuatWxyz {
    let (s, c) = (angle / 2.0).sin_cos();
    match axis {
        Axis::X => [c, s, 0.0, 0.0],
        Axis::Y => [c, 0.0, s, 0.0],
        Axis::Z => [c, 0.0, 0.0, s],
    }
}

/// Hamilton product `a * b`.
pub fn quat_mul(a: QuatWxyz, b: QuatWxyz) -> QuatWxyz {
    let [aw, ax, ay, az] = a;
    let [bw, bx, by, bz] = b;
    [
        aw * bw - ax * bx - ay * by - az * bz,
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
    ]
}

pub fn to_xyzw(q: QuatWxyz) -> QuatXyzw {
    [q[1], q[2], q[3], q[0]]
}

pub fn to_wxyz(q: QuatXyzw) -> QuatWxyz {
    [q[3], q[0], q[1], q[2]]
}

/// Extrinsic x-y-z Euler angles (radians) to an (x, y, z, w) quaternion.
pub fn euler_xyz_to_quat(euler: [f64; 3]) -> QuatXyzw {
    let qx = quat_about_axis(Axis::X, euler[0]);
    let qy = quat_about_axis(Axis::Y, euler[1]);
    let qz = quat_about_axis(Axis::Z, euler[2]);
    to_xyzw(quat_mul(qz, quat_mul(qy, qx)))
}

pub fn quat_to_matrix(q: QuatXyzw) -> Mat3 {
    let [x, y, z, w] = normalize(q);
    [
        [
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - z * w),
            2.0 * (x * z + y * w),
        ],
        [
            2.0 * (x * y + z * w),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - x * w),
        ],
        [
            2.0 * (x * z - y * w),
            2.0 * (y * z + x * w),
            1.0 - 2.0 * (x * x + y * y),
        ],
    ]
}

/// Inverse of [`euler_xyz_to_quat`].
pub fn quat_to_euler_xyz(q: QuatXyzw) -> [f64; 3] {
    let m = quat_to_matrix(q);
    let pitch = (-m[2][0]).clamp(-1.0, 1.0).asin();
    let roll = m[2][1].atan2(m[2][2]);
    let yaw = m[1][0].atan2(m[0][0]);
    [roll, pitch, yaw]
}

/// Rotation matrix to an (x, y, z, w) quaternion (Shepperd's method).
pub fn matrix_to_quat(m: Mat3) -> QuatXyzw {
    let trace = m[0][0] + m[1][1] + m[2][2];
    let q = if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        [
            (m[2][1] - m[1][2]) / s,
            (m[0][2] - m[2][0]) / s,
            (m[1][0] - m[0][1]) / s,
            0.25 * s,
        ]
    } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
        let s = (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt() * 2.0;
        [
            0.25 * s,
            (m[0][1] + m[1][0]) / s,
            (m[0][2] + m[2][0]) / s,
            (m[2][1] - m[1][2]) / s,
        ]
    } else if m[1][1] > m[2][2] {
        let s = (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt() * 2.0;
        [
            (m[0][1] + m[1][0]) / s,
            0.25 * s,
            (m[1][2] + m[2][1]) / s,
            (m[0][2] - m[2][0]) / s,
        ]
    } else {
        let s = (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt() * 2.0;
        [
            (m[0][2] + m[2][0]) / s,
            (m[1][2] + m[2][1]) / s,
            0.25 * s,
            (m[1][0] - m[0][1]) / s,
        ]
    };
    normalize(q)
}

fn normalize(q: [f64; 4]) -> [f64; 4] {
    let n = q.iter().map(|v| v * v).sum::<f64>().sqrt();
    if n <= f64::EPSILON {
        return [0.0, 0.0, 0.0, 1.0];
    }
    [q[0] / n, q[1] / n, q[2] / n, q[3] / n]
}
