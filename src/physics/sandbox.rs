//! Reference physics host: one box body over flat ground patches

use glam::{Mat3, Quat, Vec2, Vec3};

use super::{PhysicsWorld, Pose, RayHit, RigidBody, Velocity};

/// Standard gravity (m/s²)
pub const GRAVITY: f32 = -9.81;

/// Horizontal ground rectangle at a fixed height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundPatch {
    /// Minimum (x, z) corner
    pub min: Vec2,
    /// Maximum (x, z) corner
    pub max: Vec2,
    pub height: f32,
}

impl GroundPatch {
    pub fn new(min: Vec2, max: Vec2, height: f32) -> Self {
        Self { min, max, height }
    }

    /// Effectively unbounded ground plane
    pub fn infinite(height: f32) -> Self {
        Self {
            min: Vec2::splat(-1.0e6),
            max: Vec2::splat(1.0e6),
            height,
        }
    }

    fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.y && z <= self.max.y
    }
}

/// Box-shaped rigid body with its centre of mass at its origin
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxBody {
    pub pose: Pose,
    pub velocity: Velocity,
    pub mass: f32,
    pub half_extents: Vec3,
    inv_inertia_local: Mat3,
    contact_normal: Option<Vec3>,
}

impl SandboxBody {
    /// Build a solid box body; inertia follows the box formula `m/3 (b² + c²)`
    pub fn solid_box(mass: f32, half_extents: Vec3, pose: Pose) -> Self {
        let mass = mass.max(f32::EPSILON);
        let h2 = half_extents * half_extents;
        let inertia = Vec3::new(h2.y + h2.z, h2.x + h2.z, h2.x + h2.y) * (mass / 3.0);
        let inv = Vec3::new(
            inv_or_zero(inertia.x),
            inv_or_zero(inertia.y),
            inv_or_zero(inertia.z),
        );

        Self {
            pose,
            velocity: Velocity::default(),
            mass,
            half_extents,
            inv_inertia_local: Mat3::from_diagonal(inv),
            contact_normal: None,
        }
    }
}

fn inv_or_zero(v: f32) -> f32 {
    if v > f32::EPSILON {
        1.0 / v
    } else {
        0.0
    }
}

impl RigidBody for SandboxBody {
    fn pose(&self) -> Pose {
        self.pose
    }

    /// Teleport; contacts from the previous step no longer apply
    fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        self.contact_normal = None;
    }

    fn velocity(&self) -> Velocity {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Velocity) {
        self.velocity = velocity;
    }

    fn center_of_mass(&self) -> Vec3 {
        self.pose.position
    }

    fn mass(&self) -> f32 {
        self.mass
    }

    fn inverse_inertia_world(&self) -> Mat3 {
        let r = Mat3::from_quat(self.pose.rotation);
        r * self.inv_inertia_local * r.transpose()
    }

    fn contact_normal(&self) -> Option<Vec3> {
        self.contact_normal
    }
}

/// Minimal deterministic world: gravity, ground patches and one body
#[derive(Debug, Clone)]
pub struct Sandbox {
    body: SandboxBody,
    ground: Vec<GroundPatch>,
    gravity: Vec3,
}

impl Sandbox {
    pub fn new(body: SandboxBody) -> Self {
        Self {
            body,
            ground: Vec::new(),
            gravity: Vec3::new(0.0, GRAVITY, 0.0),
        }
    }

    pub fn with_ground(mut self, patch: GroundPatch) -> Self {
        self.ground.push(patch);
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn ground(&self) -> &[GroundPatch] {
        &self.ground
    }

    /// Highest patch surface under (x, z) that is not above `ceiling`
    fn support_height(&self, x: f32, z: f32, ceiling: f32) -> Option<f32> {
        self.ground
            .iter()
            .filter(|p| p.contains(x, z) && p.height <= ceiling)
            .map(|p| p.height)
            .fold(None, |best, h| match best {
                Some(b) if b >= h => Some(b),
                _ => Some(h),
            })
    }
}

impl PhysicsWorld for Sandbox {
    type Body = SandboxBody;

    fn body(&self) -> &SandboxBody {
        &self.body
    }

    fn body_mut(&mut self) -> &mut SandboxBody {
        &mut self.body
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        if direction.y.abs() < 1.0e-6 {
            return None;
        }

        let mut best: Option<RayHit> = None;
        for patch in &self.ground {
            let t = (patch.height - origin.y) / direction.y;
            if t < 0.0 || t > max_distance {
                continue;
            }

            let point = origin + direction * t;
            if !patch.contains(point.x, point.z) {
                continue;
            }

            if best.map_or(true, |b| t < b.distance) {
                best = Some(RayHit {
                    point,
                    normal: Vec3::Y,
                    distance: t,
                });
            }
        }
        best
    }

    fn step(&mut self, dt: f32) {
        let body = &mut self.body;
        body.velocity.linear += self.gravity * dt;
        body.pose.position += body.velocity.linear * dt;

        let spin = body.velocity.angular * dt;
        if spin.length_squared() > 0.0 {
            body.pose.rotation = (Quat::from_scaled_axis(spin) * body.pose.rotation).normalize();
        }

        // Chassis floor: keep the box bottom on top of whatever patch it stands over.
        let half_height = self.body.half_extents.y;
        let position = self.body.pose.position;
        let support = self.support_height(position.x, position.z, position.y + half_height);

        let body = &mut self.body;
        body.contact_normal = None;
        if let Some(height) = support {
            if position.y - half_height < height {
                body.pose.position.y = height + half_height;
                if body.velocity.linear.y < 0.0 {
                    body.velocity.linear.y = 0.0;
                }
                body.contact_normal = Some(Vec3::Y);
            }
        }
    }
}
