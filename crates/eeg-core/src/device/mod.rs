//! Device capability contract.
//!
//! Every acquisition driver (a hardware SDK wrapper, or the built-in synthetic
//! generator) implements [`Device`].  The bridge never talks to an SDK
//! directly: it only sees this trait, so drivers are interchangeable and the
//! [`crate::connector::Connector`] can try them one after another.
//!
//! # Lifecycle
//!
//! ```text
//! DeviceDescriptor::instantiate()  ──►  Device::connect()  ──►  get_output / get_device_data
//!                                                                       │
//!                                                             Device::disconnect()
//! ```
//!
//! A fresh instance is created for every connection attempt and dropped after
//! `disconnect`.  Drivers therefore keep per-connection state in `self` and
//! process-wide SDK state in the init/close hooks of
//! [`crate::registry::DriverRegistry`].
//!
//! # Blocking calls
//!
//! All methods are synchronous.  Hardware SDK calls block (an acquisition
//! blocks for its whole duration), so async callers must run them on a
//! blocking worker such as `tokio::task::spawn_blocking`.

pub mod data;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

pub use data::{Acquisition, AcquisitionRequest, DeviceData, InvalidDuration};

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors raised by a single driver.
///
/// The [`Display`](fmt::Display) text of each variant is what a client finally
/// sees inside an error envelope, so messages are short and human readable.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The driver scanned for hardware and found nothing to connect to.
    #[error("Can't connect. No device found.")]
    NotFound,

    /// An operation that needs an open connection was called on a driver that
    /// is not connected.
    #[error("device is not connected")]
    NotConnected,

    /// The vendor SDK reported a failure.  The string is the SDK's own message.
    #[error("{0}")]
    Sdk(String),

    /// The acquired payload could not be written to the requested file.
    #[error("failed to write acquisition to {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeviceError {
    /// Shorthand for [`DeviceError::Sdk`].
    pub fn sdk(message: impl Into<String>) -> Self {
        Self::Sdk(message.into())
    }
}

// ── Capability trait ──────────────────────────────────────────────────────────

/// The capability surface every acquisition driver provides.
///
/// `connect` and `disconnect` take `&mut self` because they change the
/// driver's connection state.  The data calls take `&self` so several readers
/// may share one connected device.
#[cfg_attr(test, mockall::automock)]
pub trait Device: Send + Sync {
    /// Opens the connection to the hardware.
    ///
    /// # Errors
    ///
    /// Returns a [`DeviceError`] if no hardware is reachable or the SDK fails.
    fn connect(&mut self) -> Result<(), DeviceError>;

    /// Closes the connection and releases the hardware.
    ///
    /// # Errors
    ///
    /// Returns a [`DeviceError`] if the SDK fails while closing.
    fn disconnect(&mut self) -> Result<(), DeviceError>;

    /// Records for `request.duration` and returns the raw samples.
    ///
    /// When `request.output_file` is set, the driver also persists the payload
    /// there in its native format and echoes the path in the result.
    ///
    /// # Errors
    ///
    /// Returns a [`DeviceError`] if acquisition or persistence fails.
    fn get_output(&self, request: &AcquisitionRequest) -> Result<Acquisition, DeviceError>;

    /// Returns a metadata snapshot of the connected device.
    ///
    /// # Errors
    ///
    /// Returns a [`DeviceError`] if the SDK cannot report the metadata.
    fn get_device_data(&self) -> Result<DeviceData, DeviceError>;
}

// ── Descriptor ────────────────────────────────────────────────────────────────

/// Constructor for a driver instance.
///
/// Construction is fallible because SDK-backed drivers may allocate native
/// handles up front; a construction failure counts as a failed connection
/// attempt.
pub type DeviceFactory = dyn Fn() -> Result<Box<dyn Device>, DeviceError> + Send + Sync;

/// A named recipe for creating one kind of driver.
///
/// The [`Connector`](crate::connector::Connector) receives an ordered list of
/// descriptors; the order is the fallback priority.
#[derive(Clone)]
pub struct DeviceDescriptor {
    name: String,
    factory: Arc<DeviceFactory>,
}

impl DeviceDescriptor {
    /// Creates a descriptor from an arbitrary factory closure.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Device>, DeviceError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// Creates a descriptor for a driver type that can be default-constructed.
    pub fn of<D>(name: impl Into<String>) -> Self
    where
        D: Device + Default + 'static,
    {
        Self::new(name, || Ok(Box::new(D::default()) as Box<dyn Device>))
    }

    /// The driver name used in logs and failure reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds a fresh, not yet connected, driver instance.
    ///
    /// # Errors
    ///
    /// Propagates whatever the factory returns.
    pub fn instantiate(&self) -> Result<Box<dyn Device>, DeviceError> {
        (self.factory)()
    }
}

impl fmt::Debug for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct IdleDevice;

    impl Device for IdleDevice {
        fn connect(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
        fn disconnect(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }
        fn get_output(&self, _request: &AcquisitionRequest) -> Result<Acquisition, DeviceError> {
            Ok(Acquisition::new(vec![vec![1.0, 2.0, 3.0]]))
        }
        fn get_device_data(&self) -> Result<DeviceData, DeviceError> {
            Ok(DeviceData::new("Idle", 100))
        }
    }

    #[test]
    fn test_descriptor_name_is_preserved() {
        let descriptor = DeviceDescriptor::of::<IdleDevice>("idle");
        assert_eq!(descriptor.name(), "idle");
    }

    #[test]
    fn test_descriptor_instantiates_a_new_device_each_call() {
        // Arrange
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let descriptor = DeviceDescriptor::new("counting", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(IdleDevice) as Box<dyn Device>)
        });

        // Act
        let _a = descriptor.instantiate().unwrap();
        let _b = descriptor.instantiate().unwrap();

        // Assert
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_descriptor_propagates_factory_failure() {
        let descriptor = DeviceDescriptor::new("broken", || Err(DeviceError::sdk("no SDK")));
        let err = descriptor.instantiate().err().expect("factory must fail");
        assert_eq!(err.to_string(), "no SDK");
    }

    #[test]
    fn test_descriptor_debug_shows_name_only() {
        let descriptor = DeviceDescriptor::of::<IdleDevice>("idle");
        let text = format!("{descriptor:?}");
        assert!(text.contains("idle"));
    }

    #[test]
    fn test_sdk_error_displays_raw_message() {
        // The SDK's message is shown to clients unchanged.
        assert_eq!(
            DeviceError::sdk("Connection Failed").to_string(),
            "Connection Failed"
        );
    }

    #[test]
    fn test_not_found_error_message() {
        assert_eq!(
            DeviceError::NotFound.to_string(),
            "Can't connect. No device found."
        );
    }
}
