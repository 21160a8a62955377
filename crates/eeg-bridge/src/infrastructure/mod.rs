//! Infrastructure layer for eeg-bridge.
//!
//! Everything that touches the outside world:
//!
//! - Binding the frontend and backend WebSocket listeners
//! - Performing the WebSocket upgrade handshake
//! - Spawning per-channel Tokio tasks
//! - Writing relay events to backend channels
//! - Reading the optional TOML configuration file
//!
//! Request handling and event buffering live in the application layer.

pub mod backend_conn;
pub mod storage;
pub mod ws_server;

pub use ws_server::{run_server, BridgeServer};
