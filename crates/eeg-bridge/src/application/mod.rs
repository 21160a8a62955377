//! Application layer for eeg-bridge.
//!
//! Knows *what* to do with a request or an event, but never opens a socket.
//!
//! - [`frontend_session`]: per-channel request handling for client apps.
//! - [`backend_relay`]: bounded event buffer feeding backend consumers.

pub mod backend_relay;
pub mod frontend_session;

pub use backend_relay::{pump, BackendRelay, RelaySink, SinkError};
pub use frontend_session::FrontendSession;
