//! Smoothed input axes
//!
//! Raw device values jump between -1, 0 and 1. Each axis eases toward the raw
//! value at a rate of one full unit per `smooth_time` seconds, and the
//! smoothed values are sampled into an `InputCommand` once per tick.

use serde::{Deserialize, Serialize};

use crate::netcode::InputCommand;
use crate::util::math::step_fraction;

/// Seconds for an axis to travel one unit
pub const DEFAULT_SMOOTH_TIME: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisId {
    Throttle,
    Steering,
    Brake,
}

/// Static description of one input axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisDescriptor {
    pub id: AxisId,
    pub min: f32,
    pub max: f32,
    pub smooth_time: f32,
}

/// Every axis a vehicle reads, in command order
pub const AXES: [AxisDescriptor; 3] = [
    AxisDescriptor {
        id: AxisId::Throttle,
        min: -1.0,
        max: 1.0,
        smooth_time: DEFAULT_SMOOTH_TIME,
    },
    AxisDescriptor {
        id: AxisId::Steering,
        min: -1.0,
        max: 1.0,
        smooth_time: DEFAULT_SMOOTH_TIME,
    },
    AxisDescriptor {
        id: AxisId::Brake,
        min: 0.0,
        max: 1.0,
        smooth_time: DEFAULT_SMOOTH_TIME,
    },
];

/// Where raw input comes from
pub trait InputSource {
    /// Unsmoothed value of an axis
    fn axis(&self, id: AxisId) -> f32;
    fn boost_held(&self) -> bool;
}

/// Fixed raw values, e.g. decoded from a network message
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    pub throttle: f32,
    pub steering: f32,
    pub brake: f32,
    pub boost: bool,
}

impl InputSource for RawInput {
    fn axis(&self, id: AxisId) -> f32 {
        match id {
            AxisId::Throttle => self.throttle,
            AxisId::Steering => self.steering,
            AxisId::Brake => self.brake,
        }
    }

    fn boost_held(&self) -> bool {
        self.boost
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputAxis {
    descriptor: AxisDescriptor,
    value: f32,
}

impl InputAxis {
    pub fn new(descriptor: AxisDescriptor) -> Self {
        Self { descriptor, value: 0.0 }
    }

    pub fn id(&self) -> AxisId {
        self.descriptor.id
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Move toward `raw` by at most `dt / smooth_time`
    pub fn update(&mut self, raw: f32, dt: f32) -> f32 {
        let target = if raw.is_finite() {
            raw.clamp(self.descriptor.min, self.descriptor.max)
        } else {
            0.0
        };
        let max_step = step_fraction(dt, self.descriptor.smooth_time);
        let delta = target - self.value;
        self.value = if delta.abs() <= max_step {
            target
        } else {
            self.value + delta.signum() * max_step
        };
        self.value
    }
}

/// The owning player's smoothed controls
#[derive(Debug, Clone)]
pub struct InputCapture {
    axes: [InputAxis; 3],
    boost: bool,
}

impl InputCapture {
    pub fn new() -> Self {
        Self::with_axes(AXES)
    }

    pub fn with_axes(descriptors: [AxisDescriptor; 3]) -> Self {
        Self {
            axes: descriptors.map(InputAxis::new),
            boost: false,
        }
    }

    pub fn axis(&self, id: AxisId) -> Option<&InputAxis> {
        self.axes.iter().find(|axis| axis.id() == id)
    }

    /// Advance every axis toward its raw value
    pub fn update<S: InputSource + ?Sized>(&mut self, source: &S, dt: f32) {
        for axis in &mut self.axes {
            axis.update(source.axis(axis.id()), dt);
        }
        self.boost = source.boost_held();
    }

    fn value(&self, id: AxisId) -> f32 {
        self.axis(id).map_or(0.0, InputAxis::value)
    }

    /// Current smoothed values as an unstamped command
    pub fn command(&self) -> InputCommand {
        InputCommand::new(
            self.value(AxisId::Throttle),
            self.value(AxisId::Steering),
            self.value(AxisId::Brake),
            self.boost,
        )
    }

    pub fn sample<S: InputSource + ?Sized>(&mut self, source: &S, dt: f32) -> InputCommand {
        self.update(source, dt);
        self.command()
    }
}

impl Default for InputCapture {
    fn default() -> Self {
        Self::new()
    }
}
