//! Per-channel request handling for client applications.
//!
//! One [`FrontendSession`] exists per open frontend channel.  It turns each
//! inbound text frame into exactly one [`Response`], calling the shared
//! device through [`DeviceAccess`] and publishing what happened to the
//! [`BackendRelay`].
//!
//! # Session state
//!
//! ```text
//!             connect_device (ok)
//!   ┌──────────────┐ ───────────────► ┌───────────┐
//!   │ disconnected │                  │ connected │
//!   └──────────────┘ ◄─────────────── └───────────┘
//!             disconnect_device
//! ```
//!
//! The flag is per session.  The device itself is shared: a session that has
//! connected reuses whatever device another session already opened, and a
//! `disconnect_device` from any session releases it for everyone.  A session
//! whose flag is still set after that gets the driver's not-connected error
//! wrapped in the usual failure message.
//!
//! # Blocking drivers
//!
//! Driver calls block (an acquisition lasts as long as it records), so every
//! call runs on tokio's blocking pool.  A driver that panics only fails the
//! request that triggered it.
//!
//! # Relay events
//!
//! `device_connected` and `device_disconnected` are published only when this
//! session's request actually opened or released the device.

use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use eeg_core::{ConnectOutcome, ConnectorError, DeviceAccess, DeviceData};

use crate::application::backend_relay::BackendRelay;
use crate::domain::{RelayEvent, RequestEnvelope, RequestKind, Response};

// ── Protocol text ─────────────────────────────────────────────────────────────

pub const CONNECTED: &str = "Device connected successfully.";
pub const DISCONNECTED: &str = "Device disconnected successfully.";
pub const NOT_CONNECTED: &str =
    "Device not connected. Please send 'connect_device' request first.";
pub const UNKNOWN_REQUEST: &str = "Unknown request";

// ── Session ───────────────────────────────────────────────────────────────────

/// Request handler bound to one frontend channel.
pub struct FrontendSession<A: DeviceAccess + ?Sized + 'static> {
    id: Uuid,
    device: Arc<A>,
    relay: Arc<BackendRelay>,
    is_connected: bool,
}

impl<A: DeviceAccess + ?Sized + 'static> FrontendSession<A> {
    pub fn new(device: Arc<A>, relay: Arc<BackendRelay>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device,
            relay,
            is_connected: false,
        }
    }

    /// Identifier used to correlate this session's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether this session has successfully sent `connect_device`.
    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    /// Handles one inbound text frame and returns the response envelope.
    ///
    /// Never fails: every problem becomes an `{"error": ...}` envelope and
    /// the channel stays usable.
    pub async fn handle_text(&mut self, text: &str) -> Response {
        let envelope = match RequestEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("session {}: invalid request: {e}", self.id);
                return Response::error(format!("Invalid request: {e}"));
            }
        };

        debug!("session {}: request '{}'", self.id, envelope.request);

        match envelope.kind() {
            RequestKind::ConnectDevice => self.connect_device().await,
            RequestKind::DisconnectDevice => self.disconnect_device().await,
            RequestKind::GetDeviceInfo => self.get_device_info().await,
            RequestKind::GetOutput => self.get_output(&envelope).await,
            RequestKind::Unknown(name) => {
                warn!("session {}: unknown request '{name}'", self.id);
                Response::error(UNKNOWN_REQUEST)
            }
        }
    }

    async fn connect_device(&mut self) -> Response {
        let outcome = self
            .on_device(|device| -> Result<Option<Option<DeviceData>>, ConnectorError> {
                match device.connect()? {
                    // Missing metadata does not fail the connect.
                    ConnectOutcome::Opened => Ok(Some(device.get_device_data().ok())),
                    ConnectOutcome::Reused => Ok(None),
                }
            })
            .await;

        match outcome {
            Ok(Ok(opened)) => {
                self.is_connected = true;
                match opened {
                    Some(device) => {
                        info!("session {}: device connected", self.id);
                        self.relay.publish(RelayEvent::DeviceConnected { device });
                    }
                    None => info!("session {}: joined the already connected device", self.id),
                }
                Response::result(CONNECTED)
            }
            Ok(Err(e)) => {
                warn!("session {}: connection failed: {e}", self.id);
                if let ConnectorError::AllAttemptsFailed { failures } = &e {
                    for attempt in failures {
                        debug!("session {}:   {attempt}", self.id);
                    }
                }
                Response::error(format!("Connection failed: {e}"))
            }
            Err(e) => Response::error(format!("Connection failed: {}", join_failure(&e))),
        }
    }

    async fn disconnect_device(&mut self) -> Response {
        let released = match self.on_device(|device| device.disconnect()).await {
            Ok(released) => released,
            Err(e) => {
                // The slot is cleared before the driver is called, so a panic
                // on the way out still released the device.
                warn!("session {}: disconnect did not finish: {}", self.id, join_failure(&e));
                true
            }
        };
        self.is_connected = false;
        if released {
            info!("session {}: device disconnected", self.id);
            self.relay.publish(RelayEvent::DeviceDisconnected);
        } else {
            debug!("session {}: no device was connected", self.id);
        }
        Response::result(DISCONNECTED)
    }

    async fn get_device_info(&mut self) -> Response {
        if !self.is_connected {
            return Response::error(NOT_CONNECTED);
        }

        match self.on_device(|device| device.get_device_data()).await {
            Ok(Ok(data)) => Response::result(data),
            Ok(Err(e)) => {
                warn!("session {}: device info failed: {e}", self.id);
                Response::error(format!("Failed to get device info: {e}"))
            }
            Err(e) => Response::error(format!("Failed to get device info: {}", join_failure(&e))),
        }
    }

    async fn get_output(&mut self, envelope: &RequestEnvelope) -> Response {
        if !self.is_connected {
            return Response::error(NOT_CONNECTED);
        }

        let request = match envelope.acquisition_request() {
            Ok(request) => request,
            Err(e) => return Response::error(format!("Invalid request: {e}")),
        };
        let duration = request.duration.as_secs_f64();

        debug!(
            "session {}: acquiring {duration}s (output_file: {:?})",
            self.id, request.output_file
        );

        match self.on_device(move |device| device.get_output(&request)).await {
            Ok(Ok(acquisition)) => {
                let response = Response::result(&acquisition);
                self.relay.publish(RelayEvent::Acquisition {
                    duration,
                    data: acquisition.data,
                    output_file: acquisition.output_file,
                });
                response
            }
            Ok(Err(e)) => {
                warn!("session {}: acquisition failed: {e}", self.id);
                Response::error(format!("Failed to get output: {e}"))
            }
            Err(e) => Response::error(format!("Failed to get output: {}", join_failure(&e))),
        }
    }

    /// Runs a driver call on the blocking pool.
    async fn on_device<T, F>(&self, call: F) -> Result<T, JoinError>
    where
        F: FnOnce(&A) -> T + Send + 'static,
        T: Send + 'static,
    {
        let device = Arc::clone(&self.device);
        tokio::task::spawn_blocking(move || call(&*device)).await
    }
}

fn join_failure(e: &JoinError) -> &'static str {
    if e.is_panic() {
        "the device driver panicked"
    } else {
        "the device call was cancelled"
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
