//! Integration tests for driver fallback through the public API.
//!
//! These tests build descriptors the way a driver crate would, hand them to a
//! [`Connector`], and verify the ordering, attempt counting, and scoped
//! disconnect behaviour end to end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use eeg_core::{
    Acquisition, AcquisitionRequest, Connector, ConnectorError, Device, DeviceAccess, DeviceData,
    DeviceDescriptor, DeviceError,
};

/// Per-descriptor call counters shared with the test body.
#[derive(Default)]
struct Calls {
    built: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

struct FakeDevice {
    name: &'static str,
    fail_connect: bool,
    calls: Arc<Calls>,
}

impl Device for FakeDevice {
    fn connect(&mut self) -> Result<(), DeviceError> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            Err(DeviceError::sdk(format!("{} unreachable", self.name)))
        } else {
            Ok(())
        }
    }

    fn disconnect(&mut self) -> Result<(), DeviceError> {
        self.calls.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_output(&self, request: &AcquisitionRequest) -> Result<Acquisition, DeviceError> {
        let samples = request.duration.as_millis() as usize;
        Ok(Acquisition::new(vec![vec![0.5; samples]]))
    }

    fn get_device_data(&self) -> Result<DeviceData, DeviceError> {
        Ok(DeviceData::new(self.name, 250))
    }
}

fn descriptor(name: &'static str, fail_connect: bool) -> (DeviceDescriptor, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let shared = Arc::clone(&calls);
    let descriptor = DeviceDescriptor::new(name, move || {
        shared.built.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDevice {
            name,
            fail_connect,
            calls: Arc::clone(&shared),
        }) as Box<dyn Device>)
    });
    (descriptor, calls)
}

#[test]
fn test_fallback_stops_at_first_success() {
    // Arrange: fail, succeed, never reached
    let (a, a_calls) = descriptor("a", true);
    let (b, b_calls) = descriptor("b", false);
    let (c, c_calls) = descriptor("c", false);
    let connector = Connector::new(vec![a, b, c]);

    // Act
    connector.connect().expect("second descriptor must connect");

    // Assert
    assert_eq!(connector.active_driver().as_deref(), Some("b"));
    assert_eq!(a_calls.connects.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.connects.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.built.load(Ordering::SeqCst), 0);
    assert_eq!(
        connector.get_device_data().unwrap(),
        DeviceData::new("b", 250)
    );
}

#[test]
fn test_every_descriptor_failing_reports_each_attempt() {
    // Arrange
    let descriptors: Vec<_> = ["x", "y", "z"]
        .into_iter()
        .map(|name| descriptor(name, true))
        .collect();
    let counters: Vec<_> = descriptors.iter().map(|(_, c)| Arc::clone(c)).collect();
    let connector = Connector::new(descriptors.into_iter().map(|(d, _)| d).collect());

    // Act
    let err = connector.connect().unwrap_err();

    // Assert
    match err {
        ConnectorError::AllAttemptsFailed { failures } => {
            let drivers: Vec<_> = failures.iter().map(|f| f.driver.as_str()).collect();
            assert_eq!(drivers, ["x", "y", "z"]);
            assert_eq!(failures[1].error.to_string(), "y unreachable");
        }
        other => panic!("expected AllAttemptsFailed, got {other:?}"),
    }
    for calls in counters {
        assert_eq!(calls.connects.load(Ordering::SeqCst), 1);
    }
    assert!(!connector.is_connected());
}

#[test]
fn test_empty_connector_attempts_nothing() {
    let connector = Connector::new(Vec::new());

    let err = connector.connect().unwrap_err();

    assert!(matches!(err, ConnectorError::NoDeviceClasses));
    assert_eq!(err.to_string(), "No device classes provided");
}

#[test]
fn test_data_calls_before_connect_are_rejected() {
    let (only, only_calls) = descriptor("only", false);
    let connector = Connector::new(vec![only]);
    let request = AcquisitionRequest::from_secs(1.0, None).unwrap();

    assert!(matches!(
        connector.get_output(&request),
        Err(ConnectorError::NotConnected)
    ));
    assert!(matches!(
        connector.get_device_data(),
        Err(ConnectorError::NotConnected)
    ));
    assert_eq!(only_calls.built.load(Ordering::SeqCst), 0);
}

#[test]
fn test_scope_releases_device_once_even_when_body_panics() {
    // Arrange
    let (only, calls) = descriptor("only", false);
    let connector = Connector::new(vec![only]);

    // Act
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let scope = connector.scoped().unwrap();
        let request = AcquisitionRequest::from_secs(0.01, None).unwrap();
        let _ = scope.get_output(&request);
        panic!("acquisition processing blew up");
    }));

    // Assert
    assert!(outcome.is_err());
    assert_eq!(calls.disconnects.load(Ordering::SeqCst), 1);
    assert!(!connector.is_connected());
}

#[test]
fn test_scope_forwards_acquisition_payload_unchanged() {
    let (only, _) = descriptor("only", false);
    let connector = Connector::new(vec![only]);

    let acquisition = {
        let scope = connector.scoped().unwrap();
        let request = AcquisitionRequest::from_secs(0.004, None).unwrap();
        scope.get_output(&request).unwrap()
    };

    assert_eq!(acquisition, Acquisition::new(vec![vec![0.5; 4]]));
    assert!(!connector.is_connected());
}

#[cfg(feature = "synthetic")]
#[test]
fn test_registry_with_builtin_drivers_connects_synthetic_device() {
    // Arrange
    let modules = eeg_core::drivers::resolve(&["synthetic"]);
    let registry = eeg_core::DriverRegistry::load(&modules);
    let connector = registry.connector();

    // Act
    connector.connect().unwrap();
    let data = connector.get_device_data().unwrap();

    // Assert
    assert_eq!(data.name, "Synthetic EEG");
    assert_eq!(data.sample_rate, 250);
    connector.disconnect();
    assert!(!connector.is_connected());
}
