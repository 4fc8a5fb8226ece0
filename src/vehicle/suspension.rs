//! Spring-damper support at each wheel

use crate::physics::{PhysicsWorld, RigidBody};

use super::config::VehicleConfig;
use super::forces::ForceAccumulator;
use super::frame::ChassisFrame;
use super::state::DrivingState;

/// Queue an upward velocity change at every compressed wheel
pub fn apply<W: PhysicsWorld>(
    world: &W,
    frame: &ChassisFrame,
    config: &VehicleConfig,
    driving: &DrivingState,
    forces: &mut ForceAccumulator,
    dt: f32,
) {
    if !driving.on_ground {
        return;
    }

    for offset in config.wheel_offsets() {
        let position = frame.pose.transform_point(offset);
        apply_wheel(world, frame, config, position, forces, dt);
    }
}

fn apply_wheel<W: PhysicsWorld>(
    world: &W,
    frame: &ChassisFrame,
    config: &VehicleConfig,
    position: glam::Vec3,
    forces: &mut ForceAccumulator,
    dt: f32,
) {
    let radius = config.wheel_radius;
    let up = frame.up;

    let Some(hit) = world.raycast(position + up * radius, -up, radius * 2.0) else {
        return;
    };

    let contact_rest = position - up * radius;
    let compression = up.dot(hit.point - contact_rest).abs();
    let point_velocity = up.dot(world.body().point_velocity(position));

    // Springs only push
    let dv = (compression * config.suspension_spring - point_velocity * config.suspension_damping)
        .max(0.0);

    forces.push(up * dv * dt, position);
}
