//! Optional TOML configuration file.
//!
//! Looked up at the platform config location unless `--config` names a file:
//! - Windows:  `%APPDATA%\EEGBridge\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/eeg-bridge/config.toml` or `~/.config/eeg-bridge/config.toml`
//! - macOS:    `~/Library/Application Support/EEGBridge/config.toml`
//!
//! ```toml
//! [server]
//! frontend_host = "127.0.0.1"
//! frontend_port = 8765
//! backend_host = "127.0.0.1"
//! backend_port = 8766
//! log_level = "info"
//!
//! [relay]
//! capacity = 256
//!
//! [drivers]
//! enabled = ["synthetic"]
//! ```
//!
//! Every field is optional.  Missing fields take the defaults below, so an
//! empty file is valid.  Command-line flags and `EEG_BRIDGE_*` environment
//! variables override whatever the file says.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::config::DEFAULT_RELAY_CAPACITY;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub drivers: DriversConfig,
}

/// Listener addresses and logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub frontend_host: String,
    #[serde(default = "default_frontend_port")]
    pub frontend_port: u16,
    #[serde(default = "default_host")]
    pub backend_host: String,
    #[serde(default = "default_backend_port")]
    pub backend_port: u16,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayConfig {
    #[serde(default = "default_relay_capacity")]
    pub capacity: usize,
}

/// Driver modules to load, in fallback priority order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriversConfig {
    /// Empty means every built-in driver.
    #[serde(default)]
    pub enabled: Vec<String>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_frontend_port() -> u16 {
    8765
}
fn default_backend_port() -> u16 {
    8766
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_relay_capacity() -> usize {
    DEFAULT_RELAY_CAPACITY
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            frontend_host: default_host(),
            frontend_port: default_frontend_port(),
            backend_host: default_host(),
            backend_port: default_backend_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            capacity: default_relay_capacity(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// The platform-default config file path, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    platform_config_dir().map(|dir| dir.join("config.toml"))
}

/// Loads the configuration file.
///
/// With `explicit = Some(path)` the file must exist.  Without it, the
/// platform-default path is tried and a missing file yields defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for unreadable files (including a missing
/// explicit file) and [`ConfigError::Parse`] for malformed TOML.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    match explicit {
        Some(path) => read_config(path),
        None => match default_config_path() {
            Some(path) => match read_config(&path) {
                Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                    debug!("no config file at {}; using defaults", path.display());
                    Ok(FileConfig::default())
                }
                other => other,
            },
            None => Ok(FileConfig::default()),
        },
    }
}

fn read_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Resolves the platform config base directory for this application.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("EEGBridge"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("eeg-bridge"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("EEGBridge")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
