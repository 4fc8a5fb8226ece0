//! Per-wheel ground probing

use crate::physics::PhysicsWorld;

use super::config::VehicleConfig;
use super::frame::ChassisFrame;
use super::state::DrivingState;

/// Probe reach as a multiple of the wheel diameter
pub const PROBE_SLACK: f32 = 1.05;

/// Cast one ray per wheel and record how many touch ground
pub fn probe<W: PhysicsWorld>(
    world: &W,
    frame: &ChassisFrame,
    config: &VehicleConfig,
    driving: &mut DrivingState,
) -> u8 {
    let radius = config.wheel_radius;
    let reach = radius * 2.0 * PROBE_SLACK;

    let count = config
        .wheel_offsets()
        .iter()
        .filter(|offset| {
            let origin = frame.pose.transform_point(**offset) + frame.up * radius;
            world.raycast(origin, -frame.up, reach).is_some()
        })
        .count() as u8;

    driving.set_wheels_on_ground(count);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{GroundPatch, Pose, RigidBody, Sandbox, SandboxBody};
    use glam::{Quat, Vec2, Vec3};

    fn world_with(patch: GroundPatch, config: &VehicleConfig) -> Sandbox {
        let pose = Pose::new(Vec3::new(0.0, config.ride_height(), 0.0), Quat::IDENTITY);
        Sandbox::new(SandboxBody::solid_box(config.mass, config.chassis_half_extents, pose))
            .with_ground(patch)
    }

    fn probe_count(world: &Sandbox, config: &VehicleConfig) -> DrivingState {
        let mut driving = DrivingState::new(config.starting_anti_roll);
        let frame = ChassisFrame::sample(world.body());
        probe(world, &frame, config, &mut driving);
        driving
    }

    #[test]
    fn test_all_wheels_on_flat_ground() {
        let config = VehicleConfig::default();
        let world = world_with(GroundPatch::infinite(0.0), &config);
        let driving = probe_count(&world, &config);
        assert_eq!(driving.wheels_on_ground, 4);
        assert!(driving.on_ground);
    }

    #[test]
    fn test_two_wheels_is_on_ground() {
        let config = VehicleConfig::default();
        // Right half only: front-right and rear-right
        let patch = GroundPatch::new(Vec2::new(0.0, -10.0), Vec2::new(10.0, 10.0), 0.0);
        let world = world_with(patch, &config);
        let driving = probe_count(&world, &config);
        assert_eq!(driving.wheels_on_ground, 2);
        assert!(driving.on_ground);
    }

    #[test]
    fn test_one_wheel_is_airborne() {
        let config = VehicleConfig::default();
        // Front-right quadrant only
        let patch = GroundPatch::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0), 0.0);
        let world = world_with(patch, &config);
        let driving = probe_count(&world, &config);
        assert_eq!(driving.wheels_on_ground, 1);
        assert!(!driving.on_ground);
    }

    #[test]
    fn test_out_of_reach_ground_is_ignored() {
        let config = VehicleConfig::default();
        let mut world = world_with(GroundPatch::infinite(0.0), &config);
        let mut pose = world.body().pose();
        pose.position.y += config.wheel_radius * 0.25;
        world.body_mut().set_pose(pose);

        let driving = probe_count(&world, &config);
        assert_eq!(driving.wheels_on_ground, 0);
        assert!(!driving.on_ground);
    }
}
