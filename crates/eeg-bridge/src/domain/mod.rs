//! Domain layer for eeg-bridge.
//!
//! Pure types with no I/O: the JSON message envelopes exchanged with clients
//! and backend consumers, and the resolved [`BridgeConfig`].
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading
//! - Calls into device drivers

pub mod config;
pub mod messages;

pub use config::BridgeConfig;
pub use messages::{RelayEvent, RequestEnvelope, RequestError, RequestKind, Response};
