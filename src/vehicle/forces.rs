//! Deferred point-force accumulation
//!
//! Every model enqueues velocity changes against the pre-tick state; the
//! accumulator applies them together once all models have run.

use glam::Vec3;

use crate::physics::RigidBody;

use super::config::TorqueModel;

/// A velocity change applied at a world-space point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingForce {
    /// Velocity delta (already scaled by the tick duration where applicable)
    pub delta: Vec3,
    pub point: Vec3,
}

/// Queue of point forces and angular deltas for one tick
#[derive(Debug, Default, Clone)]
pub struct ForceAccumulator {
    forces: Vec<PendingForce>,
    angular: Vec3,
}

impl ForceAccumulator {
    pub fn new() -> Self {
        Self {
            forces: Vec::with_capacity(12),
            angular: Vec3::ZERO,
        }
    }

    pub fn clear(&mut self) {
        self.forces.clear();
        self.angular = Vec3::ZERO;
    }

    pub fn push(&mut self, delta: Vec3, point: Vec3) {
        self.forces.push(PendingForce { delta, point });
    }

    /// Angular velocity change with no linear component
    pub fn push_angular(&mut self, delta: Vec3) {
        self.angular += delta;
    }

    pub fn pending(&self) -> &[PendingForce] {
        &self.forces
    }

    /// Sum the queue into linear and angular deltas without touching the body
    pub fn resolve<B: RigidBody>(&self, body: &B, model: TorqueModel) -> (Vec3, Vec3) {
        let com = body.center_of_mass();
        let mut linear = Vec3::ZERO;
        let mut angular = self.angular;

        match model {
            TorqueModel::InertiaTensor => {
                let inv_inertia = body.inverse_inertia_world();
                let mass = body.mass();
                for force in &self.forces {
                    linear += force.delta;
                    let lever = force.point - com;
                    angular += inv_inertia * lever.cross(force.delta * mass);
                }
            }
            TorqueModel::LeverCross => {
                for force in &self.forces {
                    linear += force.delta;
                    let lever = (force.point - com).normalize_or_zero();
                    angular += lever.cross(force.delta);
                }
            }
        }

        (linear, angular)
    }

    /// Apply everything queued this tick in a single write and empty the queue
    pub fn flush<B: RigidBody>(&mut self, body: &mut B, model: TorqueModel) {
        let (linear, angular) = self.resolve(body, model);
        body.apply_velocity_delta(linear, angular);
        self.clear();
    }
}
