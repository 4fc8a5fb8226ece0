//! Physics host capabilities consumed by the vehicle core
//!
//! The simulation never touches a concrete engine type. Everything it needs
//! from the host (pose, velocity, mass properties, ray queries and the
//! integration step) goes through [`RigidBody`] and [`PhysicsWorld`].

pub mod sandbox;

pub use sandbox::{GroundPatch, Sandbox, SandboxBody};

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// World-space position and orientation of a body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Transform a body-local point into world space
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Linear and angular velocity of a body
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

/// Result of a successful ray query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// A dynamic rigid body owned by the host engine
pub trait RigidBody {
    fn pose(&self) -> Pose;
    fn set_pose(&mut self, pose: Pose);

    fn velocity(&self) -> Velocity;
    fn set_velocity(&mut self, velocity: Velocity);

    /// World-space centre of mass
    fn center_of_mass(&self) -> Vec3;

    fn mass(&self) -> f32;

    /// Inverse inertia tensor rotated into world space
    fn inverse_inertia_world(&self) -> Mat3;

    /// Velocity of a world-space point rigidly attached to the body
    fn point_velocity(&self, point: Vec3) -> Vec3 {
        let v = self.velocity();
        v.linear + v.angular.cross(point - self.center_of_mass())
    }

    /// Add velocity deltas in one write
    fn apply_velocity_delta(&mut self, linear: Vec3, angular: Vec3) {
        let v = self.velocity();
        self.set_velocity(Velocity {
            linear: v.linear + linear,
            angular: v.angular + angular,
        });
    }

    /// Averaged normal of the body's current collision contacts, if any
    fn contact_normal(&self) -> Option<Vec3> {
        None
    }
}

/// The host world a single vehicle lives in
pub trait PhysicsWorld {
    type Body: RigidBody;

    fn body(&self) -> &Self::Body;
    fn body_mut(&mut self) -> &mut Self::Body;

    /// Cast a ray against static geometry; `direction` must be normalized
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit>;

    /// Integrate the body forward by `dt` seconds
    fn step(&mut self, dt: f32);
}
