use serde::{Deserialize, Serialize};

/// Simulation tick id; strictly increasing per vehicle
pub type Tick = u32;

/// One tick of player input
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputCommand {
    pub tick: Tick,
    /// -1.0 = full reverse, 1.0 = full forward
    pub throttle: f32,
    /// -1.0 = full left, 1.0 = full right
    pub steering: f32,
    /// 0.0 = released, 1.0 = full brake
    pub brake: f32,
    pub boost: bool,
}

impl InputCommand {
    /// Build an unstamped command; out-of-range or NaN axes are sanitised
    pub fn new(throttle: f32, steering: f32, brake: f32, boost: bool) -> Self {
        Self {
            tick: 0,
            throttle: sanitize(throttle, -1.0, 1.0),
            steering: sanitize(steering, -1.0, 1.0),
            brake: sanitize(brake, 0.0, 1.0),
            boost,
        }
    }

    pub fn with_tick(mut self, tick: Tick) -> Self {
        self.tick = tick;
        self
    }

    /// Re-apply range limits, e.g. after deserializing untrusted input
    pub fn sanitized(self) -> Self {
        Self::new(self.throttle, self.steering, self.brake, self.boost).with_tick(self.tick)
    }
}

fn sanitize(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_axes() {
        let command = InputCommand::new(2.0, -3.0, -1.0, true);
        assert_eq!(command.throttle, 1.0);
        assert_eq!(command.steering, -1.0);
        assert_eq!(command.brake, 0.0);
        assert!(command.boost);
        assert_eq!(command.tick, 0);
    }

    #[test]
    fn test_nan_axes_become_zero() {
        let command = InputCommand {
            tick: 9,
            throttle: f32::NAN,
            steering: f32::INFINITY,
            brake: 0.5,
            boost: false,
        }
        .sanitized();
        assert_eq!(command.throttle, 0.0);
        assert_eq!(command.steering, 0.0);
        assert_eq!(command.brake, 0.5);
        assert_eq!(command.tick, 9);
    }
}
