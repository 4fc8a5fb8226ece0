//! Four-wheel vehicle force model
//!
//! Per tick: ground probe, suspension, tangent friction, drivetrain and
//! anti-roll each queue velocity changes against the pre-tick state, then
//! the accumulator applies them in one pass.

pub mod anti_roll;
pub mod config;
pub mod controller;
pub mod drivetrain;
pub mod forces;
pub mod frame;
pub mod friction;
pub mod ground;
pub mod state;
pub mod suspension;

pub use config::{TorqueModel, VehicleArchetype, VehicleConfig, VehicleConfigError};
pub use controller::{TickReport, VehicleController};
pub use forces::{ForceAccumulator, PendingForce};
pub use state::{BoostMeter, BoostPhase, DrivingState, VehicleState};
