//! Ordered-fallback connector over interchangeable device drivers.
//!
//! The [`Connector`] is created once at startup with an ordered list of
//! [`DeviceDescriptor`]s and lives for the whole process.  `connect` tries the
//! descriptors in order and keeps the first driver that connects; every other
//! call is delegated to that driver.
//!
//! # Locking
//!
//! Hardware SDK calls are not reentrant.  The active device sits behind one
//! [`RwLock`]:
//!
//! - `connect` / `disconnect` take the write lock, so only one transition runs
//!   at a time across all callers.
//! - `get_output` / `get_device_data` take the read lock.  They may overlap
//!   with each other but never with a transition.
//!
//! The lock is a blocking `std` lock on purpose: every method here is a
//! blocking call and is expected to run on a blocking worker thread.

use std::fmt;
use std::ops::Deref;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::device::{
    Acquisition, AcquisitionRequest, Device, DeviceData, DeviceDescriptor, DeviceError,
};

// ── Error type ────────────────────────────────────────────────────────────────

/// One failed connection attempt, kept for the aggregate error.
#[derive(Debug)]
pub struct ConnectionAttempt {
    /// Name of the descriptor that was tried.
    pub driver: String,
    /// Why it failed.
    pub error: DeviceError,
}

impl fmt::Display for ConnectionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.driver, self.error)
    }
}

/// Errors returned by the [`Connector`].
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The connector was built with an empty descriptor list.  Nothing was
    /// attempted against hardware.
    #[error("No device classes provided")]
    NoDeviceClasses,

    /// Every descriptor was tried and every one failed.
    #[error("Failed to connect to any available device.")]
    AllAttemptsFailed {
        /// One entry per descriptor, in the order they were tried.
        failures: Vec<ConnectionAttempt>,
    },

    /// A data call was made while no device is connected.
    #[error("No device is currently connected")]
    NotConnected,

    /// The active driver failed while serving a data call.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

// ── Transitions ───────────────────────────────────────────────────────────────

/// What a successful [`DeviceAccess::connect`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A driver was instantiated and connected by this call.
    Opened,
    /// A device was already connected; this call reused it.
    Reused,
}

// ── Capability seam ───────────────────────────────────────────────────────────

/// The uniform device surface the session layer talks to.
///
/// [`Connector`] is the production implementation.  Session tests substitute a
/// scripted double.
pub trait DeviceAccess: Send + Sync {
    /// Connects to the first available device, or reuses the one already
    /// connected.
    ///
    /// # Errors
    ///
    /// See [`ConnectorError::NoDeviceClasses`] and
    /// [`ConnectorError::AllAttemptsFailed`].
    fn connect(&self) -> Result<ConnectOutcome, ConnectorError>;

    /// Releases the active device.  A no-op when nothing is connected.
    ///
    /// Returns `true` when a device was actually released by this call.
    fn disconnect(&self) -> bool;

    /// Runs one acquisition on the active device.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::NotConnected`] without an active device, otherwise
    /// the driver's own failure.
    fn get_output(&self, request: &AcquisitionRequest) -> Result<Acquisition, ConnectorError>;

    /// Returns the active device's metadata.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::NotConnected`] without an active device, otherwise
    /// the driver's own failure.
    fn get_device_data(&self) -> Result<DeviceData, ConnectorError>;
}

// ── Connector ─────────────────────────────────────────────────────────────────

struct ActiveDevice {
    driver: String,
    device: Box<dyn Device>,
}

/// Owns at most one connected driver and falls back across descriptors.
pub struct Connector {
    descriptors: Vec<DeviceDescriptor>,
    active: RwLock<Option<ActiveDevice>>,
}

impl Connector {
    /// Creates a disconnected connector.  `descriptors` order is the fallback
    /// priority.
    pub fn new(descriptors: Vec<DeviceDescriptor>) -> Self {
        Self {
            descriptors,
            active: RwLock::new(None),
        }
    }

    /// `true` while a device is connected.
    pub fn is_connected(&self) -> bool {
        self.read_active().is_some()
    }

    /// Name of the descriptor whose driver is currently connected.
    pub fn active_driver(&self) -> Option<String> {
        self.read_active().as_ref().map(|a| a.driver.clone())
    }

    /// Connects and returns a guard that disconnects when dropped.
    ///
    /// The guard releases the device exactly once, whether the caller's scope
    /// ends normally, through `?`, or by unwinding from a panic.
    ///
    /// # Errors
    ///
    /// Same as [`DeviceAccess::connect`].  No guard is created, and therefore
    /// no disconnect happens, when connecting fails.
    pub fn scoped(&self) -> Result<ConnectedScope<'_>, ConnectorError> {
        self.connect()?;
        Ok(ConnectedScope { connector: self })
    }

    // A driver that panics while holding the lock poisons it.  The slot itself
    // is still consistent (it is only assigned after a successful connect), so
    // the poison flag is ignored.
    fn read_active(&self) -> RwLockReadGuard<'_, Option<ActiveDevice>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_active(&self) -> RwLockWriteGuard<'_, Option<ActiveDevice>> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceAccess for Connector {
    fn connect(&self) -> Result<ConnectOutcome, ConnectorError> {
        if self.descriptors.is_empty() {
            error!("connect requested but no device drivers are registered");
            return Err(ConnectorError::NoDeviceClasses);
        }

        let mut active = self.write_active();
        if let Some(current) = active.as_ref() {
            debug!("device already connected via {}; reusing it", current.driver);
            return Ok(ConnectOutcome::Reused);
        }

        let mut failures = Vec::with_capacity(self.descriptors.len());
        for descriptor in &self.descriptors {
            debug!("attempting connection with driver {}", descriptor.name());

            let attempt = descriptor.instantiate().and_then(|mut device| {
                device.connect()?;
                Ok(device)
            });

            match attempt {
                Ok(device) => {
                    info!("connected to device via driver {}", descriptor.name());
                    *active = Some(ActiveDevice {
                        driver: descriptor.name().to_string(),
                        device,
                    });
                    return Ok(ConnectOutcome::Opened);
                }
                Err(e) => {
                    warn!("driver {} failed to connect: {e}", descriptor.name());
                    failures.push(ConnectionAttempt {
                        driver: descriptor.name().to_string(),
                        error: e,
                    });
                }
            }
        }

        error!(
            "failed to connect to any of {} device driver(s)",
            failures.len()
        );
        Err(ConnectorError::AllAttemptsFailed { failures })
    }

    fn disconnect(&self) -> bool {
        let mut active = self.write_active();
        let Some(mut current) = active.take() else {
            debug!("disconnect requested with no active device");
            return false;
        };

        match current.device.disconnect() {
            Ok(()) => info!("device disconnected ({})", current.driver),
            Err(e) => warn!(
                "driver {} reported an error while disconnecting: {e}",
                current.driver
            ),
        }
        true
    }

    fn get_output(&self, request: &AcquisitionRequest) -> Result<Acquisition, ConnectorError> {
        let active = self.read_active();
        let current = active.as_ref().ok_or(ConnectorError::NotConnected)?;
        debug!(
            "acquiring {:?} from {} (output_file={:?})",
            request.duration, current.driver, request.output_file
        );
        Ok(current.device.get_output(request)?)
    }

    fn get_device_data(&self) -> Result<DeviceData, ConnectorError> {
        let active = self.read_active();
        let current = active.as_ref().ok_or(ConnectorError::NotConnected)?;
        Ok(current.device.get_device_data()?)
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("descriptors", &self.descriptors)
            .field("active_driver", &self.active_driver())
            .finish()
    }
}

// ── Scoped connection ─────────────────────────────────────────────────────────

/// Guard returned by [`Connector::scoped`].
///
/// Derefs to the [`Connector`], so data calls go straight through it.
#[must_use = "dropping the scope immediately disconnects the device"]
pub struct ConnectedScope<'a> {
    connector: &'a Connector,
}

impl Deref for ConnectedScope<'_> {
    type Target = Connector;

    fn deref(&self) -> &Connector {
        self.connector
    }
}

impl Drop for ConnectedScope<'_> {
    fn drop(&mut self) {
        self.connector.disconnect();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
