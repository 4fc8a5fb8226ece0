//! Vehicle dynamics with client prediction and authoritative reconciliation
//!
//! - `vehicle`: the fixed-step four-wheel force model
//! - `physics`: the rigid-body capabilities it needs, plus a small reference world
//! - `netcode`: tick-stamped commands, snapshots, replay and the binary codec
//! - `input`: smoothed player axes
//! - `game`, `ws`, `http`: the authoritative server

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod input;
pub mod netcode;
pub mod physics;
pub mod util;
pub mod vehicle;
pub mod ws;
