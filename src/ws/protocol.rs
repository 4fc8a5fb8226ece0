//! WebSocket protocol message definitions
//!
//! Text frames carry the JSON messages below. Binary frames carry the
//! fixed-size records from `netcode::codec`: input commands from the client,
//! reconciliation snapshots from the server.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::netcode::{InputCommand, NetRole, Tick};
use crate::vehicle::{VehicleArchetype, VehicleConfig, VehicleState};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Start driving a new vehicle, or watch an existing session
    Join {
        /// Vehicle preset; the server default when omitted
        #[serde(default)]
        archetype: Option<VehicleArchetype>,
        /// Session to observe instead of creating one
        #[serde(default)]
        session_id: Option<Uuid>,
    },

    /// Input for one tick (JSON alternative to a binary command frame)
    Input {
        tick: Tick,
        /// -1.0 = full reverse, 1.0 = full forward
        throttle: f32,
        /// -1.0 = full left, 1.0 = full right
        steering: f32,
        brake: f32,
        #[serde(default)]
        boost: bool,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave current session
    Leave,
}

impl ClientMsg {
    /// The command carried by an `Input` message, sanitised
    pub fn command(&self) -> Option<InputCommand> {
        match *self {
            ClientMsg::Input {
                tick,
                throttle,
                steering,
                brake,
                boost,
            } => Some(InputCommand::new(throttle, steering, brake, boost).with_tick(tick)),
            _ => None,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        connection_id: Uuid,
        server_time: u64,
        /// Simulation ticks per second; clients predict at the same rate
        tick_rate: u32,
    },

    /// Confirmation of session join
    Joined {
        session_id: Uuid,
        role: NetRole,
        archetype: VehicleArchetype,
        /// Constants the client must simulate with to predict exactly
        config: VehicleConfig,
        /// Last executed tick; the owner stamps its first command with tick + 1
        tick: Tick,
        state: VehicleState,
    },

    /// The session ended or the client left it
    Left {
        session_id: Uuid,
        reason: String,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMsg::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
