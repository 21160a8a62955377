//! # eeg-core
//!
//! Hardware-independent core of the EEG bridge.
//!
//! This crate contains no sockets and no async code.  It defines:
//!
//! - [`device`]: the [`Device`] capability trait every driver implements,
//!   plus the value types drivers exchange ([`DeviceData`], [`Acquisition`]).
//! - [`connector`]: the [`Connector`], which tries an ordered list of driver
//!   descriptors until one connects and then holds that device for everyone.
//! - [`registry`]: the explicit [`DriverRegistry`] filled once at startup.
//! - [`drivers`]: driver modules compiled into this build.
//!
//! The WebSocket server lives in the `eeg-bridge` crate.

pub mod connector;
pub mod device;
pub mod drivers;
pub mod registry;

pub use connector::{
    ConnectOutcome, ConnectedScope, ConnectionAttempt, Connector, ConnectorError, DeviceAccess,
};
pub use device::{
    Acquisition, AcquisitionRequest, Device, DeviceData, DeviceDescriptor, DeviceError,
    InvalidDuration,
};
pub use registry::{DriverLoadError, DriverModule, DriverRegistry, LoadReport, SdkHook};
