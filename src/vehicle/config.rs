//! Designer-authored vehicle constants and archetype presets

use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// How queued point forces are turned into angular velocity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorqueModel {
    /// `I⁻¹ · (r × m·Δv)`, physically correct
    #[default]
    InertiaTensor,
    /// `normalize(r) × Δv`, kept for tuning parity with older vehicles
    LeverCross,
}

/// Vehicle presets available to sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleArchetype {
    /// Nimble car, strong boost
    #[default]
    Taxi,
    /// Long wheelbase, slow to turn
    Bus,
}

impl VehicleArchetype {
    pub const ALL: [VehicleArchetype; 2] = [VehicleArchetype::Taxi, VehicleArchetype::Bus];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleArchetype::Taxi => "taxi",
            VehicleArchetype::Bus => "bus",
        }
    }
}

impl FromStr for VehicleArchetype {
    type Err = VehicleConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "taxi" => Ok(VehicleArchetype::Taxi),
            "bus" => Ok(VehicleArchetype::Bus),
            _ => Err(VehicleConfigError::UnknownArchetype(s.to_string())),
        }
    }
}

/// Static per-archetype vehicle constants; never mutated at runtime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    /// Front-right wheel mount in body space; the other three mirror x and z
    pub wheel_position: Vec3,
    pub wheel_radius: f32,

    pub max_speed_kmph: f32,
    /// Seconds to close the gap to the target speed (critically damped)
    pub acceleration_time: f32,

    /// Steer angle at rest, degrees
    pub stationary_turn_angle: f32,
    /// Steer angle at max speed, degrees
    pub max_speed_turn_angle: f32,

    pub normal_tangent_friction: f32,
    pub drift_tangent_friction: f32,

    pub boost_multiplier: f32,
    pub boost_use_duration: f32,
    pub boost_recharge_duration: f32,
    pub boost_recharge_delay: f32,

    pub suspension_spring: f32,
    pub suspension_damping: f32,

    /// Airborne roll correction at takeoff
    pub starting_anti_roll: f32,
    /// Growth of the roll correction per airborne second
    pub anti_roll_increase_speed: f32,

    pub mass: f32,
    /// Chassis box half extents used for the inertia tensor
    pub chassis_half_extents: Vec3,

    pub torque_model: TorqueModel,
}

impl VehicleConfig {
    pub fn for_archetype(archetype: VehicleArchetype) -> Self {
        match archetype {
            VehicleArchetype::Taxi => Self {
                wheel_position: Vec3::new(0.8, -0.25, 1.3),
                wheel_radius: 0.35,
                max_speed_kmph: 120.0,
                acceleration_time: 2.0,
                stationary_turn_angle: 30.0,
                max_speed_turn_angle: 6.0,
                normal_tangent_friction: 0.9,
                drift_tangent_friction: 0.3,
                boost_multiplier: 1.5,
                boost_use_duration: 3.0,
                boost_recharge_duration: 5.0,
                boost_recharge_delay: 1.0,
                suspension_spring: 50.0,
                suspension_damping: 6.0,
                starting_anti_roll: 2.0,
                anti_roll_increase_speed: 4.0,
                mass: 1200.0,
                chassis_half_extents: Vec3::new(0.9, 0.4, 2.1),
                torque_model: TorqueModel::InertiaTensor,
            },
            VehicleArchetype::Bus => Self {
                wheel_position: Vec3::new(1.1, -0.4, 3.2),
                wheel_radius: 0.5,
                max_speed_kmph: 80.0,
                acceleration_time: 4.0,
                stationary_turn_angle: 25.0,
                max_speed_turn_angle: 4.0,
                normal_tangent_friction: 0.95,
                drift_tangent_friction: 0.5,
                boost_multiplier: 1.25,
                boost_use_duration: 2.0,
                boost_recharge_duration: 8.0,
                boost_recharge_delay: 2.0,
                suspension_spring: 40.0,
                suspension_damping: 6.0,
                starting_anti_roll: 1.0,
                anti_roll_increase_speed: 2.0,
                mass: 9000.0,
                chassis_half_extents: Vec3::new(1.25, 1.4, 5.5),
                torque_model: TorqueModel::InertiaTensor,
            },
        }
    }

    /// Max speed in m/s
    pub fn max_speed(&self) -> f32 {
        self.max_speed_kmph / 3.6
    }

    /// Body-space offsets of the four wheels: FR, FL, RL, RR
    pub fn wheel_offsets(&self) -> [Vec3; 4] {
        let w = self.wheel_position;
        [
            Vec3::new(w.x, w.y, w.z),
            Vec3::new(-w.x, w.y, w.z),
            Vec3::new(-w.x, w.y, -w.z),
            Vec3::new(w.x, w.y, -w.z),
        ]
    }

    /// Height of the body origin above flat ground with uncompressed springs
    pub fn ride_height(&self) -> f32 {
        self.wheel_radius - self.wheel_position.y
    }

    /// Reject constants that would make the force model meaningless
    pub fn validate(&self) -> Result<(), VehicleConfigError> {
        let scalars = [
            ("wheel_radius", self.wheel_radius),
            ("max_speed_kmph", self.max_speed_kmph),
            ("acceleration_time", self.acceleration_time),
            ("stationary_turn_angle", self.stationary_turn_angle),
            ("max_speed_turn_angle", self.max_speed_turn_angle),
            ("normal_tangent_friction", self.normal_tangent_friction),
            ("drift_tangent_friction", self.drift_tangent_friction),
            ("boost_multiplier", self.boost_multiplier),
            ("boost_use_duration", self.boost_use_duration),
            ("boost_recharge_duration", self.boost_recharge_duration),
            ("boost_recharge_delay", self.boost_recharge_delay),
            ("suspension_spring", self.suspension_spring),
            ("suspension_damping", self.suspension_damping),
            ("starting_anti_roll", self.starting_anti_roll),
            ("anti_roll_increase_speed", self.anti_roll_increase_speed),
            ("mass", self.mass),
        ];

        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(VehicleConfigError::NonFinite(name));
            }
            if value < 0.0 {
                return Err(VehicleConfigError::Negative(name));
            }
        }

        if !self.wheel_position.is_finite() {
            return Err(VehicleConfigError::NonFinite("wheel_position"));
        }
        if !self.chassis_half_extents.is_finite() {
            return Err(VehicleConfigError::NonFinite("chassis_half_extents"));
        }
        if self.mass <= 0.0 {
            return Err(VehicleConfigError::NotPositive("mass"));
        }
        if self.wheel_radius <= 0.0 {
            return Err(VehicleConfigError::NotPositive("wheel_radius"));
        }
        if self.normal_tangent_friction > 1.0 {
            return Err(VehicleConfigError::FrictionAboveOne("normal_tangent_friction"));
        }
        if self.drift_tangent_friction > 1.0 {
            return Err(VehicleConfigError::FrictionAboveOne("drift_tangent_friction"));
        }

        Ok(())
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self::for_archetype(VehicleArchetype::default())
    }
}

/// Vehicle configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VehicleConfigError {
    #[error("Vehicle constant {0} is not finite")]
    NonFinite(&'static str),

    #[error("Vehicle constant {0} is negative")]
    Negative(&'static str),

    #[error("Vehicle constant {0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("Friction fraction {0} must be within [0, 1]")]
    FrictionAboveOne(&'static str),

    #[error("Unknown vehicle archetype: {0}")]
    UnknownArchetype(String),
}
