//! Sideways grip and steering

use glam::Vec3;

use crate::physics::{PhysicsWorld, RigidBody};
use crate::util::math::{lerp_clamped, project, ratio_or_zero};

use super::config::VehicleConfig;
use super::forces::ForceAccumulator;
use super::frame::ChassisFrame;
use super::state::DrivingState;

/// Tick rate the friction fractions are tuned at
pub const FRICTION_REFERENCE_HZ: f32 = 60.0;

/// Share of the chassis each contact point corrects
const CONTACT_SHARE: f32 = 0.25;

/// Steer angle in degrees for the current speed, drift signal and steering input
pub fn steer_angle(config: &VehicleConfig, forward_speed: f32, driving: &DrivingState) -> f32 {
    let speed_ratio = ratio_or_zero(forward_speed.abs(), config.max_speed());
    let angle = lerp_clamped(
        config.stationary_turn_angle,
        config.max_speed_turn_angle,
        speed_ratio,
    );
    let angle = lerp_clamped(angle, config.stationary_turn_angle, driving.drift_signal());
    angle * driving.steering.clamp(-1.0, 1.0)
}

/// Per-tick fraction of tangent velocity removed, normalised to the tick duration
pub fn friction_fraction(config: &VehicleConfig, driving: &DrivingState, dt: f32) -> f32 {
    let fraction = lerp_clamped(
        config.normal_tangent_friction,
        config.drift_tangent_friction,
        driving.drift_signal(),
    )
    .clamp(0.0, 1.0);

    1.0 - (1.0 - fraction).powf(dt * FRICTION_REFERENCE_HZ)
}

/// Queue the lateral slip correction at the four contact points
pub fn apply<W: PhysicsWorld>(
    world: &W,
    frame: &ChassisFrame,
    config: &VehicleConfig,
    driving: &mut DrivingState,
    forces: &mut ForceAccumulator,
    dt: f32,
) {
    if !driving.on_ground {
        return;
    }

    driving.steer_angle = steer_angle(config, frame.forward_speed(), driving);
    let fraction = friction_fraction(config, driving, dt);

    let w = config.wheel_position;
    let contacts = [
        (w.x, -w.z, 0.0),
        (-w.x, -w.z, 0.0),
        (w.x, w.z, driving.steer_angle),
        (-w.x, w.z, driving.steer_angle),
    ];

    for (x, z, angle) in contacts {
        apply_contact(world.body(), frame, x, z, angle, fraction, forces);
    }
}

fn apply_contact<B: RigidBody>(
    body: &B,
    frame: &ChassisFrame,
    x_offset: f32,
    z_offset: f32,
    angle_deg: f32,
    fraction: f32,
    forces: &mut ForceAccumulator,
) {
    let angle = angle_deg.to_radians();
    let position = frame.center_of_mass + frame.forward * z_offset + frame.right * x_offset;

    let velocity = body.point_velocity(position);
    let tangent: Vec3 = frame.right * angle.cos() - frame.forward * angle.sin();

    let dv = -project(velocity, tangent) * fraction;
    forces.push(dv * CONTACT_SHARE, position);
}
