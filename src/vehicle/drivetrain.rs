//! Throttle, brake, boost and drift-exit correction

use crate::util::math::{lerp_clamped, ratio_or_zero, step_fraction};

use super::config::VehicleConfig;
use super::forces::ForceAccumulator;
use super::frame::ChassisFrame;
use super::state::{DrivingState, BOOST_EPSILON};

/// Drift signal above which the vehicle counts as sliding
pub const DRIFT_THRESHOLD: f32 = 0.1;

/// Acceleration that closes `target - current` over the acceleration time
pub fn approach_force(target: f32, current: f32, acceleration_time: f32) -> f32 {
    ratio_or_zero((target - current) * 2.0, acceleration_time)
}

pub fn throttle_force(config: &VehicleConfig, throttle: f32, forward_speed: f32) -> f32 {
    approach_force(throttle * config.max_speed(), forward_speed, config.acceleration_time)
}

/// The gentler of stopping within this tick and the max deceleration, scaled by brake input
pub fn brake_force(config: &VehicleConfig, brake: f32, forward_speed: f32, dt: f32) -> f32 {
    let stop_now = ratio_or_zero(-forward_speed, dt);
    let max_decel = ratio_or_zero(config.max_speed() * 2.0, config.acceleration_time)
        * -forward_speed.signum();

    let force = if stop_now.abs() < max_decel.abs() {
        stop_now
    } else {
        max_decel
    };
    force * brake
}

/// Run the boost meter and longitudinal drive for one tick
pub fn apply(
    frame: &ChassisFrame,
    config: &VehicleConfig,
    driving: &mut DrivingState,
    forces: &mut ForceAccumulator,
    dt: f32,
) {
    let forward = frame.forward;
    let com = frame.center_of_mass;

    if driving.boost && driving.boost_meter.can_boost() {
        let target = config.max_speed() * config.boost_multiplier;
        let force = approach_force(target, frame.forward_speed(), config.acceleration_time);
        forces.push(forward * force * dt, com);

        let meter = &mut driving.boost_meter;
        meter.set_percent(meter.percent() - step_fraction(dt, config.boost_use_duration));
        meter.recharge_timer = config.boost_recharge_delay;
        if meter.percent() <= BOOST_EPSILON {
            meter.set_percent(0.0);
            meter.fully_used = true;
        }
        return;
    }

    recharge(config, driving, dt);

    let mut velocity = frame.linear_velocity;
    let is_drifting = driving.drift_signal() > DRIFT_THRESHOLD;
    if !is_drifting && driving.was_drifting && driving.on_ground {
        // Drop any residual slide: keep the speed, point it straight ahead
        let snapped = forward * velocity.length();
        forces.push(snapped - velocity, com);
        velocity = snapped;
    }
    driving.was_drifting = is_drifting;

    if driving.on_ground {
        let forward_speed = forward.dot(velocity);
        let throttle = throttle_force(config, driving.throttle, forward_speed);
        let brake = brake_force(config, driving.brake, forward_speed, dt);
        let force = lerp_clamped(brake, throttle, driving.throttle.abs());
        forces.push(forward * force * dt, com);
    }
}

/// Count down the recharge delay, then refill; leftover delay time in a tick counts as recharge time
fn recharge(config: &VehicleConfig, driving: &mut DrivingState, dt: f32) {
    let meter = &mut driving.boost_meter;

    let mut recharge_time = dt;
    if meter.recharge_timer > 0.0 {
        let spent = meter.recharge_timer.min(dt);
        meter.recharge_timer -= dt;
        recharge_time = dt - spent;
    }

    if recharge_time > 0.0 && meter.percent() < 1.0 {
        let gained = step_fraction(recharge_time, config.boost_recharge_duration);
        meter.set_percent(meter.percent() + gained);
        if meter.percent() >= 1.0 - BOOST_EPSILON {
            meter.set_percent(1.0);
            meter.fully_used = false;
        }
    }
}
