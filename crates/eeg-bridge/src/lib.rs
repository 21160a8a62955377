//! eeg-bridge library crate.
//!
//! Exposes EEG acquisition drivers to client applications over WebSocket.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Client app (JSON requests)        Backend consumer (JSON events)
//!         ↕                                   ↑
//! [eeg-bridge]                                │
//!   ├── domain/           Request/response envelopes, relay events, BridgeConfig
//!   ├── application/
//!   │     ├── frontend_session   one per client channel ──publish──┐
//!   │     └── backend_relay      bounded drop-oldest buffer ◄──────┘
//!   └── infrastructure/
//!         ├── ws_server/      Frontend + backend accept loops (tokio-tungstenite)
//!         ├── backend_conn/   Relay events → WebSocket text frames
//!         └── storage/        Optional TOML config file
//!         ↕
//! [eeg-core]  Connector → Device drivers
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `eeg-core`; it spawns blocking
//!   driver calls but opens no sockets.
//! - `infrastructure` depends on all other layers plus `tokio-tungstenite`.

/// Domain layer: pure message and configuration types.
pub mod domain;

/// Application layer: request handling and event relaying.
pub mod application;

/// Infrastructure layer: WebSocket server and configuration file.
pub mod infrastructure;
