//! Airborne roll stabilisation
//!
//! While grounded the vehicle remembers which way is up. Once airborne it
//! rolls back toward that normal with a correction that strengthens the
//! longer it stays in the air.

use crate::physics::RigidBody;
use crate::util::math::signed_angle_deg;

use super::config::VehicleConfig;
use super::forces::ForceAccumulator;
use super::frame::ChassisFrame;
use super::state::DrivingState;

pub fn apply(
    frame: &ChassisFrame,
    config: &VehicleConfig,
    driving: &mut DrivingState,
    forces: &mut ForceAccumulator,
    dt: f32,
) {
    if driving.on_ground {
        driving.anti_roll_torque = config.starting_anti_roll;
        driving.last_ground_normal = frame.up;
        return;
    }

    let angle = -signed_angle_deg(driving.last_ground_normal, frame.up, frame.forward) / 180.0;
    forces.push_angular(frame.forward * angle * driving.anti_roll_torque * dt);
    driving.anti_roll_torque += config.anti_roll_increase_speed * dt;
}

/// Remember the chassis contact left by the host step while the wheels are off the ground
pub fn record_contact<B: RigidBody>(body: &B, driving: &mut DrivingState) {
    if driving.on_ground {
        return;
    }

    if let Some(normal) = body.contact_normal() {
        let normal = normal.normalize_or_zero();
        if normal != glam::Vec3::ZERO {
            driving.last_ground_normal = normal;
        }
    }
}
