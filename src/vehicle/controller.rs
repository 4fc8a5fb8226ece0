//! The per-tick vehicle pipeline

use tracing::warn;

use crate::netcode::InputCommand;
use crate::physics::{PhysicsWorld, RigidBody};

use super::config::VehicleConfig;
use super::forces::ForceAccumulator;
use super::frame::ChassisFrame;
use super::state::{DrivingState, VehicleState};
use super::{anti_roll, drivetrain, friction, ground, suspension};

/// Result of a single executed tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub wheels_on_ground: u8,
    pub forward_speed: f32,
    /// True when the tick produced non-finite state and was rolled back
    pub rejected: bool,
}

/// Drives one vehicle's force model against a physics host
#[derive(Debug, Clone)]
pub struct VehicleController {
    config: VehicleConfig,
    driving: DrivingState,
    forces: ForceAccumulator,
}

impl VehicleController {
    pub fn new(config: VehicleConfig) -> Self {
        Self {
            driving: DrivingState::new(config.starting_anti_roll),
            forces: ForceAccumulator::new(),
            config,
        }
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn driving(&self) -> &DrivingState {
        &self.driving
    }

    pub fn driving_mut(&mut self) -> &mut DrivingState {
        &mut self.driving
    }

    /// Run the force models and queue their output; the queue is applied at the end
    fn simulate<W: PhysicsWorld>(&mut self, world: &mut W, command: &InputCommand, dt: f32) {
        self.driving.throttle = command.throttle;
        self.driving.steering = command.steering;
        self.driving.brake = command.brake;
        self.driving.boost = command.boost;
        self.forces.clear();

        let frame = ChassisFrame::sample(world.body());
        let config = &self.config;

        ground::probe(world, &frame, config, &mut self.driving);
        suspension::apply(world, &frame, config, &self.driving, &mut self.forces, dt);
        friction::apply(world, &frame, config, &mut self.driving, &mut self.forces, dt);
        drivetrain::apply(&frame, config, &mut self.driving, &mut self.forces, dt);
        anti_roll::apply(&frame, config, &mut self.driving, &mut self.forces, dt);

        self.forces.flush(world.body_mut(), config.torque_model);
    }

    /// Simulate, let the host integrate, and roll back if anything went non-finite
    pub fn tick<W: PhysicsWorld>(&mut self, world: &mut W, command: &InputCommand, dt: f32) -> TickReport {
        let before = VehicleState::capture(world.body());
        let driving_before = self.driving;

        self.simulate(world, command, dt);
        world.step(dt);
        anti_roll::record_contact(world.body(), &mut self.driving);

        let after = VehicleState::capture(world.body());
        let rejected = !after.is_finite();
        if rejected {
            warn!(tick = command.tick, "Non-finite vehicle state, restoring pre-tick state");
            before.apply_to(world.body_mut());
            self.driving = driving_before;
        }

        TickReport {
            wheels_on_ground: self.driving.wheels_on_ground,
            forward_speed: VehicleState::capture(world.body()).forward_speed(),
            rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{GroundPatch, Pose, Sandbox, SandboxBody};
    use glam::{Quat, Vec3};

    const DT: f32 = 1.0 / 60.0;

    /// Vehicle settled slightly into its springs on an endless floor
    fn flat_world(config: &VehicleConfig) -> Sandbox {
        let rest = config.ride_height() - 0.04;
        let pose = Pose::new(Vec3::new(0.0, rest, 0.0), Quat::IDENTITY);
        Sandbox::new(SandboxBody::solid_box(config.mass, config.chassis_half_extents, pose))
            .with_ground(GroundPatch::infinite(0.0))
    }

    fn drive(controller: &mut VehicleController, world: &mut Sandbox, command: InputCommand, dt: f32, ticks: u32) {
        for i in 0..ticks {
            controller.tick(world, &command.with_tick(i + 1), dt);
        }
    }

    #[test]
    fn test_full_throttle_approaches_max_speed() {
        let config = VehicleConfig::default();
        let mut controller = VehicleController::new(config);
        let mut world = flat_world(&config);

        drive(&mut controller, &mut world, InputCommand::new(1.0, 0.0, 0.0, false), DT, 120);

        let speed = VehicleState::capture(world.body()).forward_speed();
        let expected = config.max_speed() * (1.0 - (1.0 - 2.0 * DT / config.acceleration_time).powi(120));
        assert!(controller.driving().on_ground);
        assert!(speed < config.max_speed());
        assert!((speed - expected).abs() < 0.05, "speed {speed} expected {expected}");
    }

    #[test]
    fn test_frame_rate_independence() {
        let config = VehicleConfig::default();
        let command = InputCommand::new(1.0, 0.0, 0.0, false);

        let mut coarse = VehicleController::new(config);
        let mut coarse_world = flat_world(&config);
        drive(&mut coarse, &mut coarse_world, command, DT, 60);

        let mut fine = VehicleController::new(config);
        let mut fine_world = flat_world(&config);
        drive(&mut fine, &mut fine_world, command, DT / 2.0, 120);

        let a = VehicleState::capture(coarse_world.body());
        let b = VehicleState::capture(fine_world.body());

        let speed_gap = (a.forward_speed() - b.forward_speed()).abs();
        assert!(speed_gap < 0.01 * a.forward_speed(), "speed gap {speed_gap}");

        let travel_gap = (a.position.z - b.position.z).abs();
        assert!(travel_gap < 0.02 * a.position.z, "travel gap {travel_gap}");
    }

    #[test]
    fn test_identical_inputs_are_bit_identical() {
        let config = VehicleConfig::default();
        let mut predicted = VehicleController::new(config);
        let mut predicted_world = flat_world(&config);
        let mut authority = VehicleController::new(config);
        let mut authority_world = flat_world(&config);

        for tick in 1..=120 {
            let steering = ((tick as f32) * 0.05).sin();
            let command = InputCommand::new(1.0, steering, 0.0, tick % 40 < 10).with_tick(tick);
            predicted.tick(&mut predicted_world, &command, DT);
            authority.tick(&mut authority_world, &command, DT);

            assert_eq!(
                VehicleState::capture(predicted_world.body()),
                VehicleState::capture(authority_world.body())
            );
            assert_eq!(predicted.driving(), authority.driving());
        }
    }

    #[test]
    fn test_drift_exit_realigns_velocity() {
        let mut config = VehicleConfig::default();
        config.normal_tangent_friction = 0.0;
        config.drift_tangent_friction = 0.0;
        let mut controller = VehicleController::new(config);
        let mut world = flat_world(&config).with_gravity(Vec3::ZERO);
        let mut pose = world.body().pose();
        pose.position.y = config.ride_height();
        world.body_mut().set_pose(pose);

        // Drifting: throttle and brake together
        controller.tick(&mut world, &InputCommand::new(1.0, 0.0, 1.0, false).with_tick(1), DT);
        assert!(controller.driving().was_drifting);

        // Residual slide to the side
        let mut velocity = world.body().velocity();
        velocity.linear.x = 3.0;
        world.body_mut().set_velocity(velocity);
        let speed_before = velocity.linear.length();

        // Release both pedals: straight ahead, same speed
        controller.tick(&mut world, &InputCommand::new(0.0, 0.0, 0.0, false).with_tick(2), DT);

        let after = world.body().velocity().linear;
        let forward = world.body().pose().forward();
        assert!(!controller.driving().was_drifting);
        assert!((after.length() - speed_before).abs() < 1.0e-4);
        assert!(after.normalize().dot(forward) > 0.999_99);
    }

    #[test]
    fn test_airborne_vehicle_skips_ground_models() {
        let config = VehicleConfig::default();
        let mut controller = VehicleController::new(config);
        let pose = Pose::new(Vec3::new(0.0, 20.0, 0.0), Quat::IDENTITY);
        let mut world = Sandbox::new(SandboxBody::solid_box(config.mass, config.chassis_half_extents, pose))
            .with_ground(GroundPatch::infinite(0.0));

        let report = controller.tick(&mut world, &InputCommand::new(1.0, 1.0, 0.0, false).with_tick(1), DT);

        assert_eq!(report.wheels_on_ground, 0);
        assert!(!controller.driving().on_ground);
        assert_eq!(world.body().velocity().linear.z, 0.0);
    }

    #[test]
    fn test_non_finite_tick_is_rolled_back() {
        // Skips validation on purpose: an infinite spring blows up the first compressed tick
        let mut config = VehicleConfig::default();
        config.suspension_spring = f32::INFINITY;
        let mut controller = VehicleController::new(config);
        let mut world = flat_world(&config);
        let before = VehicleState::capture(world.body());
        let driving_before = *controller.driving();

        let report = controller.tick(&mut world, &InputCommand::new(1.0, 0.0, 0.0, false).with_tick(1), DT);

        assert!(report.rejected);
        assert_eq!(VehicleState::capture(world.body()), before);
        assert_eq!(*controller.driving(), driving_before);
    }
}
