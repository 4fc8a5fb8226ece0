//! Rigid-body state and the per-tick driving state

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::physics::{Pose, RigidBody, Velocity};

/// Snap distance for the boost meter reaching its bounds
pub const BOOST_EPSILON: f32 = 1.0e-4;

/// Kinematic state of the chassis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl VehicleState {
    pub fn at_rest(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }

    pub fn capture<B: RigidBody>(body: &B) -> Self {
        let pose = body.pose();
        let velocity = body.velocity();
        Self {
            position: pose.position,
            rotation: pose.rotation,
            linear_velocity: velocity.linear,
            angular_velocity: velocity.angular,
        }
    }

    pub fn apply_to<B: RigidBody>(&self, body: &mut B) {
        body.set_pose(Pose::new(self.position, self.rotation));
        body.set_velocity(Velocity {
            linear: self.linear_velocity,
            angular: self.angular_velocity,
        });
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.rotation.is_finite()
            && self.linear_velocity.is_finite()
            && self.angular_velocity.is_finite()
    }

    /// Speed along the chassis forward axis
    pub fn forward_speed(&self) -> f32 {
        (self.rotation * Vec3::Z).dot(self.linear_velocity)
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::at_rest(Vec3::ZERO, Quat::IDENTITY)
    }
}

/// Where the boost meter currently sits in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostPhase {
    /// Full meter, not boosting
    Idle,
    Boosting,
    /// Waiting out the delay after the last boost tick
    RechargeDelay,
    Recharging,
}

/// Depletable boost resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostMeter {
    percent: f32,
    /// Set when the meter empties; blocks boosting until fully recharged
    pub fully_used: bool,
    /// Seconds left before recharging resumes
    pub recharge_timer: f32,
}

impl BoostMeter {
    pub fn new(percent: f32, fully_used: bool, recharge_timer: f32) -> Self {
        let mut meter = Self {
            percent: 0.0,
            fully_used,
            recharge_timer: if recharge_timer.is_finite() { recharge_timer } else { 0.0 },
        };
        meter.set_percent(percent);
        meter
    }

    pub fn full() -> Self {
        Self::new(1.0, false, 0.0)
    }

    pub fn percent(&self) -> f32 {
        self.percent
    }

    /// Every write goes through here so the meter stays within [0, 1]
    pub fn set_percent(&mut self, percent: f32) {
        self.percent = if percent.is_finite() {
            percent.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn can_boost(&self) -> bool {
        self.percent > 0.0 && !self.fully_used
    }

    pub fn phase(&self, boost_held: bool) -> BoostPhase {
        if boost_held && self.can_boost() {
            BoostPhase::Boosting
        } else if self.recharge_timer > 0.0 {
            BoostPhase::RechargeDelay
        } else if self.percent < 1.0 {
            BoostPhase::Recharging
        } else {
            BoostPhase::Idle
        }
    }
}

impl Default for BoostMeter {
    fn default() -> Self {
        Self::full()
    }
}

/// Per-tick scalars the force models read and write
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrivingState {
    pub throttle: f32,
    pub steering: f32,
    pub brake: f32,
    pub boost: bool,

    /// Degrees, signed by steering input
    pub steer_angle: f32,
    pub wheels_on_ground: u8,
    pub on_ground: bool,
    pub last_ground_normal: Vec3,

    pub boost_meter: BoostMeter,
    pub was_drifting: bool,

    pub anti_roll_torque: f32,
}

impl DrivingState {
    pub fn new(starting_anti_roll: f32) -> Self {
        Self {
            throttle: 0.0,
            steering: 0.0,
            brake: 0.0,
            boost: false,
            steer_angle: 0.0,
            wheels_on_ground: 0,
            on_ground: false,
            last_ground_normal: Vec3::Y,
            boost_meter: BoostMeter::full(),
            was_drifting: false,
            anti_roll_torque: starting_anti_roll,
        }
    }

    /// The drift signal: a player holding throttle and brake together
    pub fn drift_signal(&self) -> f32 {
        self.throttle * self.brake
    }

    pub fn set_wheels_on_ground(&mut self, count: u8) {
        self.wheels_on_ground = count.min(4);
        self.on_ground = self.wheels_on_ground > 1;
    }
}
