//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the resolved runtime configuration.  `main.rs` builds
//! it from CLI arguments, environment variables, and the optional TOML file;
//! tests build it directly.  Nothing in the domain layer reads the
//! environment or the file system.

use std::net::SocketAddr;

/// Default capacity of the backend relay buffer, in events.
pub const DEFAULT_RELAY_CAPACITY: usize = 256;

/// All runtime configuration for the bridge.
///
/// # Example
///
/// ```rust
/// use eeg_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.frontend_addr.port(), 8765);
/// assert_eq!(cfg.backend_addr.port(), 8766);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Where client applications connect to issue requests.
    pub frontend_addr: SocketAddr,

    /// Where backend consumers connect to receive relay events.
    pub backend_addr: SocketAddr,

    /// Maximum number of relay events buffered before the oldest is dropped.
    pub relay_capacity: usize,

    /// Driver module names in fallback priority order.
    ///
    /// Empty means every driver compiled into this build.
    pub drivers: Vec<String>,
}

impl Default for BridgeConfig {
    /// | Field           | Default            |
    /// |-----------------|--------------------|
    /// | frontend_addr   | `127.0.0.1:8765`   |
    /// | backend_addr    | `127.0.0.1:8766`   |
    /// | relay_capacity  | `256`              |
    /// | drivers         | all built-in       |
    fn default() -> Self {
        Self {
            frontend_addr: SocketAddr::from(([127, 0, 0, 1], 8765)),
            backend_addr: SocketAddr::from(([127, 0, 0, 1], 8766)),
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            drivers: Vec::new(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
