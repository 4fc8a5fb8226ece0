use glam::Vec3;

use crate::physics::{Pose, RigidBody};

/// Chassis basis sampled once at the start of a tick
#[derive(Debug, Clone, Copy)]
pub struct ChassisFrame {
    pub pose: Pose,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub center_of_mass: Vec3,
    pub linear_velocity: Vec3,
}

impl ChassisFrame {
    pub fn sample<B: RigidBody>(body: &B) -> Self {
        let pose = body.pose();
        Self {
            pose,
            forward: pose.forward(),
            right: pose.right(),
            up: pose.up(),
            center_of_mass: body.center_of_mass(),
            linear_velocity: body.velocity().linear,
        }
    }

    pub fn forward_speed(&self) -> f32 {
        self.forward.dot(self.linear_velocity)
    }
}
