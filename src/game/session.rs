//! Vehicle sessions and the authoritative tick loop

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use glam::{Quat, Vec3};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::netcode::codec::SNAPSHOT_LEN;
use crate::netcode::{
    CommandReceipt, CommandSource, InputCommand, NetworkedVehicle, ReconciliationSnapshot, Tick,
};
use crate::physics::{GroundPatch, Pose, Sandbox, SandboxBody};
use crate::util::time::{tick_delta, tick_duration, Timer};
use crate::vehicle::{VehicleArchetype, VehicleConfig, VehicleConfigError, VehicleController};

use super::snapshot::{SnapshotStats, SnapshotThrottle};

/// Starved ticks to wait for a missing command before holding the last input
pub const GAP_PATIENCE: u32 = 2;

/// Backlog above which the session runs extra ticks to catch up
pub const CATCH_UP_BACKLOG: usize = 4;

/// Extra ticks allowed per interval while catching up
pub const MAX_CATCH_UP: usize = 2;

/// Message from a connection to its session
#[derive(Debug, Clone)]
pub enum SessionInput {
    Command { connection_id: Uuid, command: InputCommand },
    Observe { connection_id: Uuid },
    Leave { connection_id: Uuid },
}

/// Broadcast from a session to every subscribed connection
#[derive(Debug, Clone)]
pub enum SessionOutput {
    Snapshot(ReconciliationSnapshot),
    Closed { reason: String },
}

/// Counters for one session
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SessionStats {
    pub tick: Tick,
    pub commands_received: u64,
    pub late_commands: u64,
    pub duplicate_commands: u64,
    /// Ticks executed with the held input because the command never came
    pub held_ticks: u64,
    /// Ticks rolled back for producing non-finite state
    pub rejected_ticks: u64,
    pub observers: usize,
    pub slowest_tick_micros: u64,
    pub snapshots: SnapshotStats,
}

/// State the session task shares with connections
#[derive(Debug, Clone, Copy)]
pub struct SessionShared {
    pub stats: SessionStats,
    pub latest: ReconciliationSnapshot,
}

/// Decides when the authority runs a tick
#[derive(Debug, Default, Clone)]
pub struct TickPacer {
    starved: u32,
}

impl TickPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether to run another tick this interval, `executed` ticks in
    pub fn should_advance(&mut self, next_ready: bool, backlog: usize, executed: usize) -> bool {
        if executed > 0 {
            return next_ready && backlog > CATCH_UP_BACKLOG && executed <= MAX_CATCH_UP;
        }

        if next_ready {
            self.starved = 0;
            return true;
        }
        if backlog == 0 {
            // Owner idle: nothing to hold the input over
            self.starved = 0;
            return false;
        }

        self.starved += 1;
        if self.starved > GAP_PATIENCE {
            self.starved = 0;
            return true;
        }
        false
    }
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub owner: Uuid,
    pub archetype: VehicleArchetype,
    pub config: VehicleConfig,
    pub input_tx: mpsc::Sender<SessionInput>,
    pub output_tx: broadcast::Sender<SessionOutput>,
    shared: Arc<Mutex<SessionShared>>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SessionOutput> {
        self.output_tx.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.lock().stats
    }

    pub fn latest(&self) -> ReconciliationSnapshot {
        self.shared.lock().latest
    }
}

/// Registry of all active sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, h)| h)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Authoritative ticks executed across live sessions
    pub fn total_ticks(&self) -> u64 {
        self.sessions
            .iter()
            .map(|s| s.value().stats().tick as u64)
            .sum()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat, endless test ground with the vehicle resting at ride height
pub fn spawn_world(config: &VehicleConfig) -> Sandbox {
    let pose = Pose::new(Vec3::new(0.0, config.ride_height(), 0.0), Quat::IDENTITY);
    Sandbox::new(SandboxBody::solid_box(config.mass, config.chassis_half_extents, pose))
        .with_ground(GroundPatch::infinite(0.0))
}

/// Create a session, register it and run it until its owner leaves
pub fn spawn_session(
    registry: Arc<SessionRegistry>,
    settings: &Config,
    owner: Uuid,
    archetype: VehicleArchetype,
) -> Result<SessionHandle, VehicleConfigError> {
    let (session, handle) = GameSession::new(Uuid::new_v4(), owner, archetype, settings)?;
    registry.insert(handle.clone());

    let id = handle.id;
    tokio::spawn(async move {
        session.run().await;
        registry.remove(&id);
    });
    Ok(handle)
}

/// The authoritative simulation of one vehicle
pub struct GameSession {
    id: Uuid,
    owner: Uuid,
    archetype: VehicleArchetype,
    tick_rate: u32,
    vehicle: NetworkedVehicle<Sandbox>,
    input_rx: mpsc::Receiver<SessionInput>,
    output_tx: broadcast::Sender<SessionOutput>,
    throttle: SnapshotThrottle,
    pacer: TickPacer,
    observers: HashSet<Uuid>,
    shared: Arc<Mutex<SessionShared>>,
}

impl GameSession {
    /// Create a new session
    pub fn new(
        id: Uuid,
        owner: Uuid,
        archetype: VehicleArchetype,
        settings: &Config,
    ) -> Result<(Self, SessionHandle), VehicleConfigError> {
        let config = VehicleConfig::for_archetype(archetype);
        config.validate()?;

        let (input_tx, input_rx) = mpsc::channel(256);
        let (output_tx, _) = broadcast::channel(64);

        let vehicle = NetworkedVehicle::authoritative(
            VehicleController::new(config),
            spawn_world(&config),
            tick_delta(settings.tick_rate),
            settings.max_buffered_commands,
        );
        let shared = Arc::new(Mutex::new(SessionShared {
            stats: SessionStats::default(),
            latest: vehicle.snapshot(),
        }));

        let handle = SessionHandle {
            id,
            owner,
            archetype,
            config,
            input_tx,
            output_tx: output_tx.clone(),
            shared: shared.clone(),
        };

        let session = Self {
            id,
            owner,
            archetype,
            tick_rate: settings.tick_rate,
            vehicle,
            input_rx,
            output_tx,
            throttle: SnapshotThrottle::new(settings.snapshot_interval_ticks),
            pacer: TickPacer::new(),
            observers: HashSet::new(),
            shared,
        };

        Ok((session, handle))
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        info!(
            session_id = %self.id,
            owner = %self.owner,
            archetype = self.archetype.as_str(),
            "Session started"
        );

        let mut tick_interval = interval(tick_duration(self.tick_rate));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let reason = loop {
            tick_interval.tick().await;

            // Drain input queue
            if let Some(reason) = self.process_inputs() {
                break reason;
            }

            self.run_ticks();
        };

        let _ = self.output_tx.send(SessionOutput::Closed { reason: reason.clone() });
        let stats = self.shared.lock().stats;
        info!(
            session_id = %self.id,
            ticks = stats.tick,
            held_ticks = stats.held_ticks,
            snapshots = stats.snapshots.total_snapshots,
            avg_snapshot_bytes = stats.snapshots.avg_bytes(),
            reason = %reason,
            "Session ended"
        );
    }

    /// Apply pending connection messages. Returns a reason when the session should end.
    fn process_inputs(&mut self) -> Option<String> {
        loop {
            match self.input_rx.try_recv() {
                Ok(SessionInput::Command { connection_id, command }) => {
                    self.handle_command(connection_id, command);
                }
                Ok(SessionInput::Observe { connection_id }) => {
                    if self.observers.insert(connection_id) {
                        debug!(session_id = %self.id, connection_id = %connection_id, "Observer joined");
                        self.throttle.force_next();
                    }
                }
                Ok(SessionInput::Leave { connection_id }) => {
                    if connection_id == self.owner {
                        return Some("owner left".to_string());
                    }
                    self.observers.remove(&connection_id);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Some("input channel closed".to_string()),
            }
        }

        self.shared.lock().stats.observers = self.observers.len();
        None
    }

    fn handle_command(&mut self, connection_id: Uuid, command: InputCommand) {
        if connection_id != self.owner {
            warn!(session_id = %self.id, connection_id = %connection_id, "Command from non-owner ignored");
            return;
        }

        let receipt = match self.vehicle.receive_command(command) {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(session_id = %self.id, error = %e, "Session vehicle cannot take commands");
                return;
            }
        };

        let mut shared = self.shared.lock();
        shared.stats.commands_received += 1;
        match receipt {
            CommandReceipt::Buffered => {}
            CommandReceipt::Late => shared.stats.late_commands += 1,
            CommandReceipt::Duplicate => shared.stats.duplicate_commands += 1,
        }
    }

    /// Execute as many ticks as the pacer allows and publish their snapshots
    fn run_ticks(&mut self) {
        let mut executed = 0;
        while self
            .pacer
            .should_advance(self.vehicle.next_ready(), self.vehicle.backlog(), executed)
        {
            let timer = Timer::new();

            let (snapshot, report) = match self.vehicle.advance() {
                Ok(result) => result,
                Err(e) => {
                    error!(session_id = %self.id, error = %e, "Session vehicle cannot advance");
                    return;
                }
            };
            executed += 1;

            let held = report.source == CommandSource::Held;
            let report = report.vehicle;
            if report.rejected {
                warn!(session_id = %self.id, tick = snapshot.tick, "Tick rolled back");
                self.throttle.force_next();
            }
            trace!(
                session_id = %self.id,
                tick = snapshot.tick,
                wheels = report.wheels_on_ground,
                speed = report.forward_speed,
                "Tick executed"
            );

            let send = self.throttle.should_send();
            {
                let mut shared = self.shared.lock();
                let stats = &mut shared.stats;
                stats.tick = snapshot.tick;
                stats.held_ticks += held as u64;
                stats.rejected_ticks += report.rejected as u64;
                stats.slowest_tick_micros = stats.slowest_tick_micros.max(timer.elapsed_micros());
                if send {
                    stats.snapshots.record(SNAPSHOT_LEN);
                }
                shared.latest = snapshot;
            }

            if send {
                // Broadcast to all connected clients
                let _ = self.output_tx.send(SessionOutput::Snapshot(snapshot));
            }
        }
    }
}
