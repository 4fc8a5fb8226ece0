//! Authoritative vehicle sessions

pub mod session;
pub mod snapshot;

pub use session::{
    spawn_session, GameSession, SessionHandle, SessionInput, SessionOutput, SessionRegistry, SessionStats,
};
pub use snapshot::{SnapshotStats, SnapshotThrottle};
