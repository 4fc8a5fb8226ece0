//! Authoritative state records

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::physics::PhysicsWorld;
use crate::vehicle::{BoostMeter, VehicleController, VehicleState};

use super::command::Tick;

/// Everything a peer needs to resume simulation from an authoritative tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSnapshot {
    pub tick: Tick,
    pub state: VehicleState,
    pub boost: BoostMeter,
    pub was_drifting: bool,
    pub anti_roll_torque: f32,
    pub last_ground_normal: Vec3,
}

impl ReconciliationSnapshot {
    /// Record the vehicle as it stands after executing `tick`
    pub fn capture<W: PhysicsWorld>(tick: Tick, controller: &VehicleController, world: &W) -> Self {
        let driving = controller.driving();
        Self {
            tick,
            state: VehicleState::capture(world.body()),
            boost: driving.boost_meter,
            was_drifting: driving.was_drifting,
            anti_roll_torque: driving.anti_roll_torque,
            last_ground_normal: driving.last_ground_normal,
        }
    }

    /// Overwrite body and carried driving state
    pub fn restore<W: PhysicsWorld>(&self, controller: &mut VehicleController, world: &mut W) {
        self.state.apply_to(world.body_mut());

        let driving = controller.driving_mut();
        // Re-clamped on the way in
        driving.boost_meter = BoostMeter::new(
            self.boost.percent(),
            self.boost.fully_used,
            self.boost.recharge_timer,
        );
        driving.was_drifting = self.was_drifting;
        driving.anti_roll_torque = self.anti_roll_torque;
        driving.last_ground_normal = self.last_ground_normal;
    }

    pub fn is_finite(&self) -> bool {
        self.state.is_finite()
            && self.anti_roll_torque.is_finite()
            && self.last_ground_normal.is_finite()
            && self.boost.recharge_timer.is_finite()
    }
}
