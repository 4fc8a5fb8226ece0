//! Networked vehicle roles
//!
//! One `NetworkedVehicle` wraps a controller and its world. The role decides
//! what happens each tick: the authority executes commands it receives, the
//! owning client predicts with its own input and rewinds on snapshots, and
//! observers only adopt snapshots.

use std::collections::BTreeMap;
use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::physics::{PhysicsWorld, RigidBody};
use crate::vehicle::{TickReport, VehicleController, VehicleState};

use super::buffer::CommandBuffer;
use super::command::{InputCommand, Tick};
use super::snapshot::ReconciliationSnapshot;

/// Which side of the prediction loop a vehicle instance plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetRole {
    Authoritative,
    Predicting,
    Observing,
}

impl NetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetRole::Authoritative => "authoritative",
            NetRole::Predicting => "predicting",
            NetRole::Observing => "observing",
        }
    }
}

impl fmt::Display for NetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("operation needs a {expected} vehicle, this one is {actual}")]
    WrongRole { expected: NetRole, actual: NetRole },
}

/// What the authority did with an incoming command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandReceipt {
    Buffered,
    /// Already holding a command for this tick
    Duplicate,
    /// Tick already executed
    Late,
}

/// What a non-authoritative peer did with an incoming snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileOutcome {
    Applied {
        /// Buffered commands replayed after the overwrite
        replayed: usize,
        /// Distance between the local and authoritative position at the snapshot tick
        correction: f32,
    },
    /// At or before the last reconciled tick
    Stale,
    /// For a tick not yet predicted locally
    Ahead,
    /// Carried non-finite values
    Rejected,
    /// Local history no longer holds every command after the snapshot tick
    MissingHistory {
        /// Oldest command still held after the snapshot tick
        resume: Option<Tick>,
    },
}

/// Where the authority took the command for an executed tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// The client's command for exactly this tick
    Buffered,
    /// First command; the clock jumped forward to its tick
    Aligned,
    /// Nothing arrived in time, the last input was repeated
    Held,
}

/// Outcome of one authoritative tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvanceReport {
    pub vehicle: TickReport,
    pub source: CommandSource,
}

#[derive(Debug, Clone)]
enum RoleState {
    Authoritative {
        pending: CommandBuffer,
        last_command: Option<InputCommand>,
    },
    Predicting {
        history: CommandBuffer,
        /// Predicted position after each buffered tick
        predicted: BTreeMap<Tick, Vec3>,
        last_reconciled: Tick,
    },
    Observing {
        last_reconciled: Tick,
    },
}

impl RoleState {
    fn role(&self) -> NetRole {
        match self {
            RoleState::Authoritative { .. } => NetRole::Authoritative,
            RoleState::Predicting { .. } => NetRole::Predicting,
            RoleState::Observing { .. } => NetRole::Observing,
        }
    }
}

/// A vehicle taking part in the prediction/reconciliation loop
#[derive(Debug, Clone)]
pub struct NetworkedVehicle<W: PhysicsWorld> {
    controller: VehicleController,
    world: W,
    /// Last executed (authority), predicted (owner) or adopted (observer) tick
    tick: Tick,
    dt: f32,
    role: RoleState,
}

impl<W: PhysicsWorld> NetworkedVehicle<W> {
    pub fn authoritative(controller: VehicleController, world: W, dt: f32, capacity: usize) -> Self {
        Self::with_role(
            controller,
            world,
            dt,
            RoleState::Authoritative {
                pending: CommandBuffer::new(capacity),
                last_command: None,
            },
        )
    }

    pub fn predicting(controller: VehicleController, world: W, dt: f32, capacity: usize) -> Self {
        Self::with_role(
            controller,
            world,
            dt,
            RoleState::Predicting {
                history: CommandBuffer::new(capacity),
                predicted: BTreeMap::new(),
                last_reconciled: 0,
            },
        )
    }

    pub fn observing(controller: VehicleController, world: W, dt: f32) -> Self {
        Self::with_role(controller, world, dt, RoleState::Observing { last_reconciled: 0 })
    }

    fn with_role(controller: VehicleController, world: W, dt: f32, role: RoleState) -> Self {
        Self {
            controller,
            world,
            tick: 0,
            dt,
            role,
        }
    }

    pub fn role(&self) -> NetRole {
        self.role.role()
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn controller(&self) -> &VehicleController {
        &self.controller
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn state(&self) -> VehicleState {
        VehicleState::capture(self.world.body())
    }

    /// Snapshot of the vehicle at its current tick
    pub fn snapshot(&self) -> ReconciliationSnapshot {
        ReconciliationSnapshot::capture(self.tick, &self.controller, &self.world)
    }

    pub fn last_reconciled(&self) -> Option<Tick> {
        match &self.role {
            RoleState::Authoritative { .. } => None,
            RoleState::Predicting { last_reconciled, .. } | RoleState::Observing { last_reconciled } => {
                Some(*last_reconciled)
            }
        }
    }

    fn wrong_role(&self, expected: NetRole) -> SessionError {
        SessionError::WrongRole {
            expected,
            actual: self.role(),
        }
    }

    // ---- Predicting ----

    /// Stamp `command` with the next tick, run it locally and keep it for replay.
    /// Returns the stamped command to send to the authority.
    pub fn predict(&mut self, command: InputCommand) -> Result<InputCommand, SessionError> {
        if !matches!(self.role, RoleState::Predicting { .. }) {
            return Err(self.wrong_role(NetRole::Predicting));
        }

        let command = command.sanitized().with_tick(self.tick.wrapping_add(1));
        self.controller.tick(&mut self.world, &command, self.dt);
        self.tick = command.tick;
        let position = self.world.body().pose().position;

        if let RoleState::Predicting { history, predicted, .. } = &mut self.role {
            history.insert(command);
            predicted.insert(command.tick, position);
            // Keep the position record no longer than the command history
            if let Some(oldest) = history.first_tick() {
                *predicted = predicted.split_off(&oldest);
            }
        }
        Ok(command)
    }

    /// Adopt an authoritative snapshot. The owner replays its buffered commands on top.
    pub fn receive_snapshot(&mut self, snapshot: &ReconciliationSnapshot) -> Result<ReconcileOutcome, SessionError> {
        match self.role {
            RoleState::Authoritative { .. } => Err(self.wrong_role(NetRole::Predicting)),
            RoleState::Predicting { .. } => Ok(self.reconcile(snapshot)),
            RoleState::Observing { .. } => Ok(self.observe(snapshot)),
        }
    }

    fn reconcile(&mut self, snapshot: &ReconciliationSnapshot) -> ReconcileOutcome {
        let RoleState::Predicting {
            history,
            predicted,
            last_reconciled,
        } = &mut self.role
        else {
            return ReconcileOutcome::Rejected;
        };

        if snapshot.tick <= *last_reconciled {
            trace!(tick = snapshot.tick, last_reconciled = *last_reconciled, "Stale snapshot");
            return ReconcileOutcome::Stale;
        }
        if snapshot.tick > self.tick {
            trace!(tick = snapshot.tick, predicted = self.tick, "Snapshot ahead of prediction");
            return ReconcileOutcome::Ahead;
        }
        if !snapshot.is_finite() {
            debug!(tick = snapshot.tick, "Rejected non-finite snapshot");
            return ReconcileOutcome::Rejected;
        }

        // Replay must cover every tick between the snapshot and the prediction
        let resume = history.after(snapshot.tick).next().map(|command| command.tick);
        if self.tick > snapshot.tick && resume != Some(snapshot.tick.wrapping_add(1)) {
            debug!(
                tick = snapshot.tick,
                predicted = self.tick,
                ?resume,
                "Snapshot older than command history, not reconciling"
            );
            return ReconcileOutcome::MissingHistory { resume };
        }

        let correction = predicted
            .get(&snapshot.tick)
            .map_or(0.0, |local| local.distance(snapshot.state.position));

        *last_reconciled = snapshot.tick;
        history.discard_through(snapshot.tick);
        *predicted = predicted.split_off(&snapshot.tick.saturating_add(1));

        snapshot.restore(&mut self.controller, &mut self.world);

        let mut replayed = 0;
        for command in history.after(snapshot.tick) {
            self.controller.tick(&mut self.world, command, self.dt);
            predicted.insert(command.tick, self.world.body().pose().position);
            replayed += 1;
        }

        debug!(
            tick = snapshot.tick,
            replayed,
            correction,
            "Reconciled with authoritative snapshot"
        );
        ReconcileOutcome::Applied { replayed, correction }
    }

    fn observe(&mut self, snapshot: &ReconciliationSnapshot) -> ReconcileOutcome {
        let RoleState::Observing { last_reconciled } = &mut self.role else {
            return ReconcileOutcome::Rejected;
        };

        if snapshot.tick <= *last_reconciled {
            trace!(tick = snapshot.tick, last_reconciled = *last_reconciled, "Stale snapshot");
            return ReconcileOutcome::Stale;
        }
        if !snapshot.is_finite() {
            debug!(tick = snapshot.tick, "Rejected non-finite snapshot");
            return ReconcileOutcome::Rejected;
        }

        *last_reconciled = snapshot.tick;
        let correction = self.world.body().pose().position.distance(snapshot.state.position);
        snapshot.restore(&mut self.controller, &mut self.world);
        self.tick = snapshot.tick;

        ReconcileOutcome::Applied { replayed: 0, correction }
    }

    // ---- Authoritative ----

    /// Buffer a command from the owning client
    pub fn receive_command(&mut self, command: InputCommand) -> Result<CommandReceipt, SessionError> {
        let current = self.tick;
        let wrong_role = self.wrong_role(NetRole::Authoritative);
        let RoleState::Authoritative { pending, .. } = &mut self.role else {
            return Err(wrong_role);
        };

        if command.tick <= current {
            trace!(tick = command.tick, executed = current, "Late command");
            return Ok(CommandReceipt::Late);
        }
        if !pending.insert(command.sanitized()) {
            trace!(tick = command.tick, "Duplicate command");
            return Ok(CommandReceipt::Duplicate);
        }
        Ok(CommandReceipt::Buffered)
    }

    /// True when the command for the next tick is already buffered
    pub fn next_ready(&self) -> bool {
        match &self.role {
            RoleState::Authoritative { pending, .. } => pending.get(self.tick.wrapping_add(1)).is_some(),
            _ => false,
        }
    }

    /// Number of commands waiting at the authority
    pub fn backlog(&self) -> usize {
        match &self.role {
            RoleState::Authoritative { pending, .. } => pending.len(),
            _ => 0,
        }
    }

    /// Execute the next tick and return its snapshot.
    ///
    /// Uses the buffered command for the next tick when there is one. Before
    /// the first command has run, the clock jumps to the earliest buffered
    /// tick. Otherwise the last executed input is held for the missing tick.
    pub fn advance(&mut self) -> Result<(ReconciliationSnapshot, AdvanceReport), SessionError> {
        let next = self.tick.wrapping_add(1);
        let wrong_role = self.wrong_role(NetRole::Authoritative);
        let RoleState::Authoritative { pending, last_command } = &mut self.role else {
            return Err(wrong_role);
        };

        let (command, source) = match pending.remove(next) {
            Some(command) => (command, CommandSource::Buffered),
            None => match (*last_command, pending.first_tick()) {
                (None, Some(first)) => {
                    debug!(from = next, to = first, "Aligning to first client tick");
                    (pending.remove(first).unwrap_or_default(), CommandSource::Aligned)
                }
                (held, _) => {
                    trace!(tick = next, "No command for tick, holding last input");
                    (held.unwrap_or_default().with_tick(next), CommandSource::Held)
                }
            },
        };

        *last_command = Some(command);
        let vehicle = self.controller.tick(&mut self.world, &command, self.dt);
        self.tick = command.tick;
        Ok((self.snapshot(), AdvanceReport { vehicle, source }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{GroundPatch, Pose, Sandbox, SandboxBody};
    use crate::vehicle::VehicleConfig;
    use glam::Quat;

    const DT: f32 = 1.0 / 60.0;

    fn world(config: &VehicleConfig) -> Sandbox {
        let pose = Pose::new(Vec3::new(0.0, config.ride_height() - 0.04, 0.0), Quat::IDENTITY);
        Sandbox::new(SandboxBody::solid_box(config.mass, config.chassis_half_extents, pose))
            .with_ground(GroundPatch::infinite(0.0))
    }

    fn client() -> NetworkedVehicle<Sandbox> {
        let config = VehicleConfig::default();
        NetworkedVehicle::predicting(VehicleController::new(config), world(&config), DT, 64)
    }

    fn server() -> NetworkedVehicle<Sandbox> {
        let config = VehicleConfig::default();
        NetworkedVehicle::authoritative(VehicleController::new(config), world(&config), DT, 64)
    }

    fn input(i: u32) -> InputCommand {
        InputCommand::new(1.0, ((i as f32) * 0.2).sin(), 0.0, i % 7 == 0)
    }

    #[test]
    fn test_predict_stamps_ascending_ticks() {
        let mut client = client();
        let first = client.predict(input(1)).unwrap();
        let second = client.predict(input(2)).unwrap();
        assert_eq!(first.tick, 1);
        assert_eq!(second.tick, 2);
        assert_eq!(client.tick(), 2);
    }

    #[test]
    fn test_role_mismatch_is_an_error() {
        let mut server = server();
        assert_eq!(
            server.predict(input(1)),
            Err(SessionError::WrongRole {
                expected: NetRole::Predicting,
                actual: NetRole::Authoritative
            })
        );

        let mut client = client();
        assert!(client.advance().is_err());
        assert!(client.receive_command(input(1).with_tick(1)).is_err());
    }

    #[test]
    fn test_matching_prediction_needs_no_correction() {
        let mut client = client();
        let mut server = server();

        for i in 1..=10 {
            let sent = client.predict(input(i)).unwrap();
            server.receive_command(sent).unwrap();
        }
        for _ in 0..4 {
            server.advance().unwrap();
        }

        let (snapshot, _) = server.advance().unwrap();
        assert_eq!(snapshot.tick, 5);
        let outcome = client.receive_snapshot(&snapshot).unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied { replayed: 5, correction: 0.0 });
    }

    #[test]
    fn test_replay_after_correction_matches_authority() {
        let config = VehicleConfig::default();
        let mut client = client();
        let commands: Vec<InputCommand> = (1..=10).map(|i| client.predict(input(i)).unwrap()).collect();

        // The authority saw a bump the client never predicted
        let mut server = server();
        for command in &commands[..5] {
            server.receive_command(*command).unwrap();
        }
        let mut velocity = server.world().body().velocity();
        velocity.linear.x = 2.5;
        server.world_mut().body_mut().set_velocity(velocity);
        let mut snapshot = None;
        for _ in 0..5 {
            snapshot = Some(server.advance().unwrap().0);
        }
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.tick, 5);

        let outcome = client.receive_snapshot(&snapshot).unwrap();
        match outcome {
            ReconcileOutcome::Applied { replayed, correction } => {
                assert_eq!(replayed, 5);
                assert!(correction > 0.0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        // Authority run of T+1..T+5 straight from the snapshot
        let mut reference = VehicleController::new(config);
        let mut reference_world = world(&config);
        snapshot.restore(&mut reference, &mut reference_world);
        for command in &commands[5..] {
            reference.tick(&mut reference_world, command, DT);
        }

        assert_eq!(client.tick(), 10);
        assert_eq!(client.state(), VehicleState::capture(reference_world.body()));
        assert_eq!(client.controller().driving().boost_meter, reference.driving().boost_meter);
    }

    #[test]
    fn test_replay_on_side_matches_authority() {
        // Rolled onto its side: wheels off the ground, chassis resting on it
        let config = VehicleConfig::default();
        let pose = Pose::new(Vec3::new(0.0, 0.39, 0.0), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let rolled = Sandbox::new(SandboxBody::solid_box(config.mass, config.chassis_half_extents, pose))
            .with_ground(GroundPatch::infinite(0.0));

        let mut client = NetworkedVehicle::predicting(VehicleController::new(config), rolled.clone(), DT, 64);
        let mut server = NetworkedVehicle::authoritative(VehicleController::new(config), rolled, DT, 64);
        let tilted = Vec3::new(0.0, 0.8, 0.6);
        client.controller.driving_mut().last_ground_normal = tilted;
        server.controller.driving_mut().last_ground_normal = tilted;

        for i in 1..=3 {
            server.receive_command(client.predict(input(i)).unwrap()).unwrap();
        }
        let (first, _) = server.advance().unwrap();
        server.advance().unwrap();
        server.advance().unwrap();

        assert!(!server.controller().driving().on_ground);
        assert_eq!(first.last_ground_normal, Vec3::Y);
        assert_eq!(client.state(), server.state());

        let outcome = client.receive_snapshot(&first).unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied { replayed: 2, correction: 0.0 });
        assert_eq!(client.state(), server.state());
        assert_eq!(client.controller().driving(), server.controller().driving());
    }

    #[test]
    fn test_snapshot_behind_history_is_not_applied() {
        let config = VehicleConfig::default();
        let mut client = NetworkedVehicle::predicting(VehicleController::new(config), world(&config), DT, 4);
        let mut server = server();
        for i in 1..=10 {
            server.receive_command(client.predict(input(i)).unwrap()).unwrap();
        }
        let snapshots: Vec<ReconciliationSnapshot> = (0..10).map(|_| server.advance().unwrap().0).collect();

        let state = client.state();
        assert_eq!(
            client.receive_snapshot(&snapshots[1]),
            Ok(ReconcileOutcome::MissingHistory { resume: Some(7) })
        );
        assert_eq!(client.state(), state);
        assert_eq!(client.last_reconciled(), Some(0));

        // A snapshot inside the history window still reconciles
        let outcome = client.receive_snapshot(&snapshots[7]).unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied { replayed: 2, correction: 0.0 });
        assert_eq!(client.state(), server.state());
    }

    #[test]
    fn test_stale_and_future_snapshots_are_ignored() {
        let mut client = client();
        let mut server = server();
        for i in 1..=3 {
            server.receive_command(client.predict(input(i)).unwrap()).unwrap();
        }
        let (first, _) = server.advance().unwrap();
        let (second, _) = server.advance().unwrap();

        assert!(matches!(client.receive_snapshot(&second), Ok(ReconcileOutcome::Applied { .. })));
        let state = client.state();
        assert_eq!(client.receive_snapshot(&first), Ok(ReconcileOutcome::Stale));
        assert_eq!(client.receive_snapshot(&second), Ok(ReconcileOutcome::Stale));
        assert_eq!(client.state(), state);

        let mut future = second;
        future.tick = 99;
        assert_eq!(client.receive_snapshot(&future), Ok(ReconcileOutcome::Ahead));
        assert_eq!(client.last_reconciled(), Some(2));
    }

    #[test]
    fn test_non_finite_snapshot_is_rejected() {
        let mut client = client();
        client.predict(input(1)).unwrap();
        let mut snapshot = client.snapshot();
        snapshot.state.position.x = f32::NAN;
        assert_eq!(client.receive_snapshot(&snapshot), Ok(ReconcileOutcome::Rejected));
        assert!(client.state().is_finite());
    }

    #[test]
    fn test_authority_discards_late_and_duplicate_commands() {
        let mut server = server();
        let command = input(1).with_tick(1);
        assert_eq!(server.receive_command(command), Ok(CommandReceipt::Buffered));
        assert_eq!(server.receive_command(command), Ok(CommandReceipt::Duplicate));
        server.advance().unwrap();
        assert_eq!(server.receive_command(command), Ok(CommandReceipt::Late));
        assert_eq!(server.backlog(), 0);
    }

    #[test]
    fn test_authority_holds_last_input_over_a_gap() {
        let mut server = server();
        let first = InputCommand::new(0.5, -0.3, 0.0, false).with_tick(1);
        server.receive_command(first).unwrap();
        server.receive_command(input(3).with_tick(3)).unwrap();

        server.advance().unwrap();
        assert!(!server.next_ready());
        let (snapshot, report) = server.advance().unwrap();
        assert_eq!(snapshot.tick, 2);
        assert_eq!(report.source, CommandSource::Held);
        assert_eq!(server.controller().driving().throttle, 0.5);
        assert_eq!(server.controller().driving().steering, -0.3);

        assert!(server.next_ready());
        let (snapshot, report) = server.advance().unwrap();
        assert_eq!(snapshot.tick, 3);
        assert_eq!(report.source, CommandSource::Buffered);
    }

    #[test]
    fn test_authority_aligns_to_first_command() {
        let mut server = server();
        server.receive_command(input(40).with_tick(40)).unwrap();
        let (snapshot, report) = server.advance().unwrap();
        assert_eq!(snapshot.tick, 40);
        assert_eq!(report.source, CommandSource::Aligned);
        assert_eq!(server.tick(), 40);

        // With nothing ever received the neutral input is held
        let mut idle = self::server();
        let (snapshot, report) = idle.advance().unwrap();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(report.source, CommandSource::Held);
    }

    #[test]
    fn test_observer_overwrites_without_replay() {
        let config = VehicleConfig::default();
        let mut observer = NetworkedVehicle::observing(VehicleController::new(config), world(&config), DT);
        let mut server = server();
        server.receive_command(input(1).with_tick(1)).unwrap();
        let (snapshot, _) = server.advance().unwrap();

        let outcome = observer.receive_snapshot(&snapshot).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Applied { replayed: 0, .. }));
        assert_eq!(observer.state(), server.state());
        assert_eq!(observer.tick(), 1);
        assert_eq!(observer.receive_snapshot(&snapshot), Ok(ReconcileOutcome::Stale));
        assert!(observer.predict(input(2)).is_err());
    }
}
