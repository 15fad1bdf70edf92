//! Robot base pose derivation.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SceneError;
use crate::fixtures::{Fixture, FixtureRegistry};
use crate::geometry::{relative_transform, Vec3};
use crate::prng::Pcg32;

/// Standoff from the base fixture's front face.
const EDGE_STANDOFF: f64 = 0.20;
/// Extra standoff in front of tall fixtures and wall stacks.
const TALL_STANDOFF: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotBasePose {
    pub pos: Vec3,
    pub yaw: f64,
    /// Fixture whose front face the robot stands at.
    pub base_fixture: String,
    /// Fixture the robot is meant to face.
    pub anchor: String,
}

/// Random anchor when neither the task nor the caller names one.
pub fn pick_anchor<'r>(
    registry: &'r FixtureRegistry,
    rng: &mut Pcg32,
) -> Result<&'r Fixture, SceneError> {
    let candidates: Vec<&Fixture> = registry.iter().filter(|f| f.kind.is_robot_anchor()).collect();
    rng.choose(&candidates)
        .copied()
        .ok_or_else(|| SceneError::NoValidFixture {
            id: "robot anchor".to_string(),
        })
}

/// Stand the robot in front of the fixture that supports `anchor`.
///
/// The base fixture is the first counter-like fixture (in registry
/// order) whose footprint contains the anchor, or the anchor itself.
/// The robot keeps the anchor's lateral offset along the base front,
/// sits on the floor, and faces into the base fixture.
pub fn robot_base_pose(
    registry: &FixtureRegistry,
    anchor: &Fixture,
    offset: [f64; 2],
) -> RobotBasePose {
    let base = registry
        .iter()
        .find(|f| f.kind.supports_robot_base() && f.contains_point_2d(anchor.pos))
        .unwrap_or(anchor);

    let (base_to_ref, _) = relative_transform(&base.frame(), &anchor.frame());
    let mut edge = [
        base_to_ref[0] + offset[0],
        -base.size[1] / 2.0 - EDGE_STANDOFF + offset[1],
        0.0,
    ];
    if base.kind.is_tall_standing() || base.name.contains("stack") {
        edge[1] -= TALL_STANDOFF;
    }

    let mut pos = base.frame().to_world(edge);
    pos[2] = 0.0;
    let pose = RobotBasePose {
        pos,
        yaw: base.rot + FRAC_PI_2,
        base_fixture: base.name.clone(),
        anchor: anchor.name.clone(),
    };
    debug!(anchor = %pose.anchor, base = %pose.base_fixture, pos = ?pose.pos, "robot base pose");
    pose
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FixtureKind;
    use crate::test_support::demo_layout;

    fn registry() -> FixtureRegistry {
        FixtureRegistry::from_layout(&demo_layout()).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn faces_counter_front() {
        let reg = registry();
        let counter = reg.get("counter_main_main_group").unwrap();
        let pose = robot_base_pose(&reg, counter, [0.0, 0.0]);
        assert!(close(pose.pos[0], 2.0) && close(pose.pos[1], -0.825));
        assert_eq!(pose.pos[2], 0.0);
        assert!(close(pose.yaw, FRAC_PI_2));
    }

    #[test]
    fn sink_uses_host_counter() {
        let reg = registry();
        let sink = reg.get("sink_main_group").unwrap();
        let pose = robot_base_pose(&reg, sink, [0.0, 0.0]);
        assert_eq!(pose.base_fixture, "counter_main_main_group");
        assert_eq!(pose.anchor, "sink_main_group");
        assert!(close(pose.pos[1], -0.825));
    }

    #[test]
    fn fridge_gets_extra_standoff() {
        let reg = registry();
        let fridge = reg.get("fridge_main_group").unwrap();
        let pose = robot_base_pose(&reg, fridge, [0.0, 0.0]);
        assert_eq!(pose.base_fixture, "fridge_main_group");
        // -0.35 - 0.375 - 0.20 - 0.10
        assert!(close(pose.pos[1], -1.025));
    }

    #[test]
    fn anchor_base_follows_footprint() {
        // The wall cabinet hangs above the counter, so the counter is the
        // base. The microwave stands clear of every counter.
        let reg = registry();
        let cab = reg.get("cab_main_main_group").unwrap();
        let pose = robot_base_pose(&reg, cab, [0.1, 0.0]);
        assert_eq!(pose.base_fixture, "counter_main_main_group");
        assert!(close(pose.pos[0], 2.1));

        let microwave = reg.get("microwave_main_group").unwrap();
        let pose = robot_base_pose(&reg, microwave, [0.0, 0.0]);
        assert_eq!(pose.base_fixture, "microwave_main_group");
    }

    #[test]
    fn rotated_base_frame() {
        let mut reg = registry();
        reg.set_pose("stove_main_group", [1.0, 1.0, 0.46], FRAC_PI_2).unwrap();
        let stove = reg.get("stove_main_group").unwrap();
        assert_eq!(stove.kind, FixtureKind::Stove);
        let pose = robot_base_pose(&reg, stove, [0.0, 0.0]);
        // Front now faces +x.
        assert!(close(pose.pos[0], 1.0 + 0.325 + 0.20));
        assert!(close(pose.pos[1], 1.0));
        assert!(close(pose.yaw, std::f64::consts::PI));
    }

    #[test]
    fn random_anchor_is_valid_class() {
        let reg = registry();
        let mut rng = Pcg32::new(1, 0);
        for _ in 0..20 {
            assert!(pick_anchor(&reg, &mut rng).unwrap().kind.is_robot_anchor());
        }
    }
}
