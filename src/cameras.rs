//! Camera configuration for an episode.
//!
//! Robot-mounted and agent-view cameras are described by a pose in
//! their parent body frame. The free viewer camera is described per
//! layout by a look-at point and spherical angles.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;
use crate::prng::Pcg32;
use crate::rotation::{
    euler_xyz_to_quat, matrix_to_quat, quat_about_axis, quat_mul, quat_to_euler_xyz, to_wxyz,
    to_xyzw, Axis, Mat3, QuatXyzw,
};

const POS_NOISE_STD: f64 = 0.05;
const EULER_NOISE_STD_DEG: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub pos: Vec3,
    /// (x, y, z, w)
    pub quat: QuatXyzw,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fovy: Option<f64>,
}

pub type CameraConfigs = IndexMap<String, CameraConfig>;

/// Free viewer placement used by interactive renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerCamera {
    pub lookat: Vec3,
    pub distance: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn unit(v: Vec3) -> Vec3 {
    let n = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    [v[0] / n, v[1] / n, v[2] / n]
}

/// Orientation of a camera looking along `look_at` with `up` roughly
/// upwards. The camera looks down its own -z axis.
pub fn look_direction_quat(look_at: Vec3, up: Vec3) -> QuatXyzw {
    let look = unit(look_at);
    let right = cross(look, unit(up));
    let up = cross(right, look);
    let m: Mat3 = [
        [right[0], up[0], -look[0]],
        [right[1], up[1], -look[1]],
        [right[2], up[2], -look[2]],
    ];
    matrix_to_quat(m)
}

/// Agent-view orientation: facing the main wall (-x) then turned a
/// quarter turn about y.
fn agentview_quat() -> QuatXyzw {
    let facing_wall = to_wxyz(look_direction_quat([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]));
    let turn = quat_about_axis(Axis::Y, std::f64::consts::FRAC_PI_2);
    to_xyzw(quat_mul(turn, facing_wall))
}

/// Default camera set.
pub fn default_cameras() -> CameraConfigs {
    let agentview = agentview_quat();
    let cam = |pos: Vec3, quat: QuatXyzw, parent: Option<&str>, fovy: Option<f64>| CameraConfig {
        pos,
        quat,
        parent_body: parent.map(str::to_string),
        fovy,
    };
    let mut cams = CameraConfigs::new();
    cams.insert(
        "robot0_agentview_center".to_string(),
        cam([2.0, 0.0, 1.4], agentview, None, None),
    );
    cams.insert(
        "robot0_agentview_left".to_string(),
        cam([2.0, -0.5, 1.4], agentview, None, Some(60.0)),
    );
    cams.insert(
        "robot0_agentview_right".to_string(),
        cam([2.0, 0.5, 1.4], agentview, None, Some(60.0)),
    );
    cams.insert(
        "robot0_frontview".to_string(),
        cam(
            [-0.5, 0.0, 0.95],
            [0.608_893_692, 0.381_467_789, -0.367_390_752, -0.590_554_535],
            Some("base0_support"),
            Some(60.0),
        ),
    );
    cams.insert(
        "robot0_eye_in_hand".to_string(),
        cam([0.05, 0.0, 0.0], [0.0, 0.707_107, 0.707_107, 0.0], Some("robot0_right_hand"), None),
    );
    cams
}

/// Viewer camera for a layout, with a fallback for unlisted layouts.
pub fn viewer_camera(layout_id: u32) -> ViewerCamera {
    let (lookat, distance, azimuth, elevation) = match layout_id {
        0 => ([2.265_934_63, -1.000_371_31, 1.387_692_95], 3.050_508_984, 90.715_638_124, -12.639_488_372),
        1 => ([2.661_479_99, -1.001_624_29, 1.242_515_5], 3.795_876_629, 89.757_840_137, -15.177_406_643),
        2 => ([3.023_443_59, -1.488_746_18, 1.241_291_4], 3.668_484_437, 51.678_808_519, -13.302_619_132),
        4 => ([1.6, -1.0, 1.0], 5.0, 89.703_018_061, -18.021_779_943),
        _ => ([2.25, -1.0, 1.053_126_67], 5.0, 89.703_018_061, -18.021_779_943),
    };
    ViewerCamera {
        lookat,
        distance,
        azimuth,
        elevation,
    }
}

/// Add Gaussian pose noise to agent-view cameras. Each agent-view
/// camera draws three position offsets then three Euler offsets.
/// Wrist cameras stay fixed and every other camera is skipped.
pub fn randomize_cameras(cams: &mut CameraConfigs, rng: &mut Pcg32) {
    for (name, cam) in cams.iter_mut() {
        if !name.contains("agentview") {
            continue;
        }
        for p in cam.pos.iter_mut() {
            *p += rng.next_gaussian(0.0, POS_NOISE_STD);
        }
        let mut euler = quat_to_euler_xyz(cam.quat);
        for e in euler.iter_mut() {
            *e += rng.next_gaussian(0.0, EULER_NOISE_STD_DEG).to_radians();
        }
        cam.quat = euler_xyz_to_quat(euler);
    }
}
