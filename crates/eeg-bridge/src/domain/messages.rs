//! JSON message types for the bridge protocol.
//!
//! # Frontend channel
//!
//! Every inbound text frame is one request envelope: a JSON object whose
//! `"request"` field names the operation and whose other fields are its
//! parameters.
//!
//! ```json
//! {"request": "connect_device"}
//! {"request": "get_output", "duration": 2.0, "output_file": "/tmp/run.json"}
//! ```
//!
//! Every request gets exactly one response envelope, carrying either a
//! `"result"` or an `"error"`:
//!
//! ```json
//! {"result": "Device connected successfully."}
//! {"error": "Unknown request"}
//! ```
//!
//! # Backend channel
//!
//! Backend consumers receive [`RelayEvent`]s, tagged by an `"event"` field.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use eeg_core::{AcquisitionRequest, DeviceData, InvalidDuration};

// ── Errors ────────────────────────────────────────────────────────────────────

/// A frontend message that could not be turned into a request.
///
/// The display text follows `"Invalid request: "` in the error envelope.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The frame is not valid JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame is valid JSON but not an object.
    #[error("expected a JSON object")]
    NotAnObject,

    /// The object has no string `"request"` field.
    #[error("missing string field 'request'")]
    MissingRequest,

    /// A parameter is missing or has the wrong type.
    #[error("parameter '{name}' {reason}")]
    InvalidParam { name: &'static str, reason: String },

    /// The duration parameter is not a positive number.
    #[error(transparent)]
    Duration(#[from] InvalidDuration),
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// The operations a frontend session understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    ConnectDevice,
    DisconnectDevice,
    GetDeviceInfo,
    GetOutput,
    /// Anything else; answered with `"Unknown request"`.
    Unknown(String),
}

impl From<&str> for RequestKind {
    fn from(name: &str) -> Self {
        match name {
            "connect_device" => Self::ConnectDevice,
            "disconnect_device" => Self::DisconnectDevice,
            "get_device_info" => Self::GetDeviceInfo,
            "get_output" => Self::GetOutput,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// One parsed frontend request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    /// Operation name.
    pub request: String,
    /// Every other field of the object.
    pub params: Map<String, Value>,
}

impl RequestEnvelope {
    /// Parses one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when the frame is not a JSON object with a
    /// string `"request"` field.
    pub fn parse(text: &str) -> Result<Self, RequestError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut params) = value else {
            return Err(RequestError::NotAnObject);
        };
        let request = match params.remove("request") {
            Some(Value::String(name)) => name,
            _ => return Err(RequestError::MissingRequest),
        };
        Ok(Self { request, params })
    }

    pub fn kind(&self) -> RequestKind {
        RequestKind::from(self.request.as_str())
    }

    /// Reads the `get_output` parameters.
    ///
    /// `duration` is required and must be a positive number of seconds.
    /// `output_file` is optional; `null` counts as absent.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidParam`] for missing or mistyped fields
    /// and [`RequestError::Duration`] for a non-positive duration.
    pub fn acquisition_request(&self) -> Result<AcquisitionRequest, RequestError> {
        let duration = match self.params.get("duration") {
            Some(Value::Number(n)) => n.as_f64().ok_or(RequestError::InvalidParam {
                name: "duration",
                reason: "is not representable as a number of seconds".to_string(),
            })?,
            Some(_) => {
                return Err(RequestError::InvalidParam {
                    name: "duration",
                    reason: "must be a number".to_string(),
                })
            }
            None => {
                return Err(RequestError::InvalidParam {
                    name: "duration",
                    reason: "is required".to_string(),
                })
            }
        };

        let output_file = match self.params.get("output_file") {
            None | Some(Value::Null) => None,
            Some(Value::String(path)) if !path.is_empty() => Some(PathBuf::from(path)),
            Some(_) => {
                return Err(RequestError::InvalidParam {
                    name: "output_file",
                    reason: "must be a non-empty string".to_string(),
                })
            }
        };

        Ok(AcquisitionRequest::from_secs(duration, output_file)?)
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// The envelope sent back for every request.
///
/// ```json
/// {"result": ...}
/// {"error": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    Result(Value),
    Error(String),
}

impl Response {
    /// Wraps a serialisable payload as a result.
    pub fn result<T: Serialize>(payload: T) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => Self::Result(value),
            Err(e) => Self::Error(format!("failed to encode result: {e}")),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

// ── Relay events ──────────────────────────────────────────────────────────────

/// Events forwarded to backend consumers.
///
/// ```json
/// {"event":"device_connected","device":{"name":"Synthetic EEG","sample_rate":250}}
/// {"event":"device_disconnected"}
/// {"event":"acquisition","duration":2.0,"data":[[...]],"output_file":"/tmp/run.json"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RelayEvent {
    DeviceConnected {
        /// Metadata of the device, when the driver could report it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device: Option<DeviceData>,
    },
    DeviceDisconnected,
    Acquisition {
        /// Requested duration in seconds.
        duration: f64,
        data: Vec<Vec<f64>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_file: Option<PathBuf>,
    },
}

impl RelayEvent {
    /// The `"event"` tag, for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeviceConnected { .. } => "device_connected",
            Self::DeviceDisconnected => "device_disconnected",
            Self::Acquisition { .. } => "acquisition",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
