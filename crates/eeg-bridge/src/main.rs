//! EEG Bridge: entry point.
//!
//! Loads the configured EEG driver modules, initialises their SDKs, and
//! serves two WebSocket endpoints until Ctrl+C:
//!
//! - the **frontend** endpoint, where client applications send JSON request
//!   envelopes (`connect_device`, `get_output`, ...) and read one response per
//!   request;
//! - the **backend** endpoint, where consumers receive acquisition events.
//!
//! # Usage
//!
//! ```text
//! eeg-bridge [OPTIONS]
//!
//! Options:
//!   --frontend-host  <IP>    Frontend bind address [default: 127.0.0.1]
//!   --frontend-port  <PORT>  Frontend port [default: 8765]
//!   --backend-host   <IP>    Backend bind address [default: 127.0.0.1]
//!   --backend-port   <PORT>  Backend port [default: 8766]
//!   --relay-capacity <N>     Buffered backend events [default: 256]
//!   --driver         <NAME>  Driver module, repeatable, in priority order
//!   --config         <PATH>  TOML config file
//! ```
//!
//! # Precedence
//!
//! Command-line flags, then `EEG_BRIDGE_*` environment variables, then the
//! config file, then built-in defaults.
//!
//! | Variable                     | Flag               |
//! |------------------------------|--------------------|
//! | `EEG_BRIDGE_FRONTEND_HOST`   | `--frontend-host`  |
//! | `EEG_BRIDGE_FRONTEND_PORT`   | `--frontend-port`  |
//! | `EEG_BRIDGE_BACKEND_HOST`    | `--backend-host`   |
//! | `EEG_BRIDGE_BACKEND_PORT`    | `--backend-port`   |
//! | `EEG_BRIDGE_RELAY_CAPACITY`  | `--relay-capacity` |
//! | `EEG_BRIDGE_DRIVERS`         | `--driver` (comma separated) |
//! | `EEG_BRIDGE_CONFIG`          | `--config`         |
//!
//! The log filter comes from `RUST_LOG`, falling back to `server.log_level`
//! in the config file.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use eeg_bridge::domain::BridgeConfig;
use eeg_bridge::infrastructure::run_server;
use eeg_bridge::infrastructure::storage::config::{load_config, FileConfig};
use eeg_core::{drivers, DriverRegistry};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// EEG device bridge.
///
/// Every option is optional; anything left unset falls back to the config
/// file and then to the built-in default.
#[derive(Debug, Parser)]
#[command(
    name = "eeg-bridge",
    about = "WebSocket bridge between EEG acquisition drivers and client applications",
    version
)]
struct Cli {
    /// IP address the frontend endpoint binds to.
    #[arg(long, env = "EEG_BRIDGE_FRONTEND_HOST")]
    frontend_host: Option<String>,

    /// TCP port of the frontend endpoint.
    #[arg(long, env = "EEG_BRIDGE_FRONTEND_PORT")]
    frontend_port: Option<u16>,

    /// IP address the backend endpoint binds to.
    #[arg(long, env = "EEG_BRIDGE_BACKEND_HOST")]
    backend_host: Option<String>,

    /// TCP port of the backend endpoint.
    #[arg(long, env = "EEG_BRIDGE_BACKEND_PORT")]
    backend_port: Option<u16>,

    /// Events buffered for backend consumers before the oldest is dropped.
    #[arg(long, env = "EEG_BRIDGE_RELAY_CAPACITY")]
    relay_capacity: Option<usize>,

    /// Driver module to load.  Repeat to list several; earlier ones are
    /// tried first when connecting.
    #[arg(long = "driver", env = "EEG_BRIDGE_DRIVERS", value_delimiter = ',')]
    drivers: Vec<String>,

    /// Path to a TOML config file.  Must exist when given.
    #[arg(long, env = "EEG_BRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Merges the parsed arguments over `file` into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if a host is not a valid IP address or the relay
    /// capacity is zero.
    fn into_bridge_config(self, file: &FileConfig) -> anyhow::Result<BridgeConfig> {
        let frontend_addr = socket_addr(
            "frontend",
            self.frontend_host.as_deref().unwrap_or(&file.server.frontend_host),
            self.frontend_port.unwrap_or(file.server.frontend_port),
        )?;
        let backend_addr = socket_addr(
            "backend",
            self.backend_host.as_deref().unwrap_or(&file.server.backend_host),
            self.backend_port.unwrap_or(file.server.backend_port),
        )?;

        let relay_capacity = self.relay_capacity.unwrap_or(file.relay.capacity);
        anyhow::ensure!(relay_capacity > 0, "relay capacity must be at least 1");

        let drivers = if self.drivers.is_empty() {
            file.drivers.enabled.clone()
        } else {
            self.drivers
        };

        Ok(BridgeConfig {
            frontend_addr,
            backend_addr,
            relay_capacity,
            drivers,
        })
    }
}

fn socket_addr(role: &str, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("invalid {role} host: '{host}'"))?;
    Ok(SocketAddr::new(ip, port))
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and the config file (if any) is loaded.
/// 2. `tracing_subscriber` is initialised.
/// 3. Driver modules are loaded into a [`DriverRegistry`] and their SDK
///    init hooks run.
/// 4. A Ctrl+C handler clears the shared shutdown flag.
/// 5. [`run_server`] serves both endpoints until the flag is cleared.
/// 6. SDK close hooks run.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&file.server.log_level)),
        )
        .init();

    let config = cli.into_bridge_config(&file)?;

    info!(
        "EEG bridge starting: frontend={}, backend={}, relay_capacity={}",
        config.frontend_addr, config.backend_addr, config.relay_capacity
    );

    // ── Drivers ───────────────────────────────────────────────────────────────
    let modules = drivers::resolve(&config.drivers);
    let registry = DriverRegistry::load(&modules);
    for (module, e) in &registry.report().failed {
        warn!("driver module '{module}' not loaded: {e}");
    }
    let init_failures = registry.init();
    if !init_failures.is_empty() {
        warn!("{} SDK init hook(s) failed", init_failures.len());
    }
    let connector = Arc::new(registry.connector());

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ───────────────────────────────────────────────────────
    let result = run_server(config, connector, running).await;

    registry.close();
    info!("EEG bridge stopped");
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_without_arguments_leaves_everything_unset() {
        // Arrange / Act
        let cli = Cli::parse_from(["eeg-bridge"]);

        // Assert
        assert!(cli.frontend_host.is_none());
        assert!(cli.frontend_port.is_none());
        assert!(cli.backend_port.is_none());
        assert!(cli.relay_capacity.is_none());
        assert!(cli.drivers.is_empty());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_frontend_port_override() {
        let cli = Cli::parse_from(["eeg-bridge", "--frontend-port", "9100"]);
        assert_eq!(cli.frontend_port, Some(9100));
    }

    #[test]
    fn test_cli_backend_host_override() {
        let cli = Cli::parse_from(["eeg-bridge", "--backend-host", "0.0.0.0"]);
        assert_eq!(cli.backend_host.as_deref(), Some("0.0.0.0"));
    }

    #[test]
    fn test_cli_driver_is_repeatable_and_ordered() {
        let cli = Cli::parse_from(["eeg-bridge", "--driver", "vendor", "--driver", "synthetic"]);
        assert_eq!(cli.drivers, ["vendor", "synthetic"]);
    }

    #[test]
    fn test_cli_driver_accepts_comma_list() {
        let cli = Cli::parse_from(["eeg-bridge", "--driver", "vendor,synthetic"]);
        assert_eq!(cli.drivers, ["vendor", "synthetic"]);
    }

    #[test]
    fn test_cli_config_path() {
        let cli = Cli::parse_from(["eeg-bridge", "--config", "/tmp/bridge.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/bridge.toml")));
    }

    #[test]
    fn test_cli_rejects_non_numeric_port() {
        let result = Cli::try_parse_from(["eeg-bridge", "--frontend-port", "eighty"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_into_bridge_config_defaults_match_bridge_defaults() {
        // Arrange
        let cli = Cli::parse_from(["eeg-bridge"]);

        // Act
        let config = cli.into_bridge_config(&FileConfig::default()).unwrap();

        // Assert
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_into_bridge_config_file_values_apply_when_flags_absent() {
        // Arrange
        let mut file = FileConfig::default();
        file.server.frontend_port = 9000;
        file.server.backend_host = "0.0.0.0".to_string();
        file.relay.capacity = 16;
        file.drivers.enabled = vec!["synthetic".to_string()];
        let cli = Cli::parse_from(["eeg-bridge"]);

        // Act
        let config = cli.into_bridge_config(&file).unwrap();

        // Assert
        assert_eq!(config.frontend_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.backend_addr.to_string(), "0.0.0.0:8766");
        assert_eq!(config.relay_capacity, 16);
        assert_eq!(config.drivers, ["synthetic"]);
    }

    #[test]
    fn test_into_bridge_config_flags_override_file() {
        // Arrange
        let mut file = FileConfig::default();
        file.server.frontend_port = 9000;
        file.relay.capacity = 16;
        file.drivers.enabled = vec!["synthetic".to_string()];
        let cli = Cli::parse_from([
            "eeg-bridge",
            "--frontend-port",
            "9100",
            "--relay-capacity",
            "4",
            "--driver",
            "vendor",
        ]);

        // Act
        let config = cli.into_bridge_config(&file).unwrap();

        // Assert
        assert_eq!(config.frontend_addr.port(), 9100);
        assert_eq!(config.relay_capacity, 4);
        assert_eq!(config.drivers, ["vendor"]);
    }

    #[test]
    fn test_into_bridge_config_accepts_ipv6_host() {
        let cli = Cli::parse_from(["eeg-bridge", "--frontend-host", "::1"]);
        let config = cli.into_bridge_config(&FileConfig::default()).unwrap();
        assert_eq!(config.frontend_addr.to_string(), "[::1]:8765");
    }

    #[test]
    fn test_into_bridge_config_invalid_host_returns_error() {
        // Arrange
        let cli = Cli::parse_from(["eeg-bridge", "--backend-host", "not.an.ip"]);

        // Act
        let result = cli.into_bridge_config(&FileConfig::default());

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_into_bridge_config_zero_capacity_returns_error() {
        let cli = Cli::parse_from(["eeg-bridge", "--relay-capacity", "0"]);
        assert!(cli.into_bridge_config(&FileConfig::default()).is_err());
    }
}
