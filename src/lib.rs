//! # duocall
//!
//! Two-party call signaling:
//! - a blind relay that fans each frame out to every other connected client
//! - a client-side call session state machine (offer/answer/candidate,
//!   screen-share renegotiation, teardown) over pluggable platform traits
//! - text chat over the same channel

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod session;
pub mod telemetry;

pub use error::{CallError, CallResult};
pub use protocol::{SignalEvent, SignalingMessage};
pub use relay::Relay;
pub use session::Session;
