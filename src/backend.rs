//! Seam to the physics engine that hosts the assembled scene.

use crate::error::SceneError;
use crate::geometry::Vec3;
use crate::rotation::QuatWxyz;

/// Minimal view of a running simulation.
pub trait SimBackend {
    /// World pose of a body, if it exists.
    fn body_pose(&self, body: &str) -> Option<(Vec3, QuatWxyz)>;

    /// Bounding box extents of a body, if it exists.
    fn body_size(&self, body: &str) -> Option<Vec3>;

    /// True if any geom of `a` touches any geom of `b`.
    fn in_contact(&self, a: &str, b: &str) -> bool;

    /// Write a free-joint pose (position then (w, x, y, z) quaternion).
    fn set_free_joint_pose(&mut self, joint: &str, pos: Vec3, quat: QuatWxyz) -> Result<(), SceneError>;
}

/// Free joint of a spawned object.
pub fn object_joint(name: &str) -> String {
    format!("{name}_joint0")
}
