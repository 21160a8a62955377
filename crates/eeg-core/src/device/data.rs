//! Value types exchanged with drivers.
//!
//! None of these types interpret biosignal content.  [`Acquisition`] is an
//! opaque numeric payload that travels from the driver to the client unchanged.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata snapshot of a connected device.
///
/// Serialises to `{"name": ..., "sample_rate": ...}`, plus `"channels"` only
/// when the driver reports a channel layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceData {
    /// Human-readable device name as reported by the SDK.
    pub name: String,
    /// Samples per second per channel.  Always positive.
    pub sample_rate: u32,
    /// Electrode label per channel index, when the driver knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,
}

impl DeviceData {
    pub fn new(name: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            channels: None,
        }
    }

    /// Attaches a channel layout.
    #[must_use]
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }
}

/// A duration that is not a strictly positive, finite number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("duration must be a positive number of seconds, got {0}")]
pub struct InvalidDuration(pub f64);

/// Parameters of one acquisition call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    /// How long to record.
    pub duration: Duration,
    /// Where the driver should persist the payload, if anywhere.
    pub output_file: Option<PathBuf>,
}

impl AcquisitionRequest {
    /// Builds a request from a duration in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDuration`] for zero, negative, NaN, infinite, or
    /// unrepresentably large values.
    pub fn from_secs(secs: f64, output_file: Option<PathBuf>) -> Result<Self, InvalidDuration> {
        if !(secs.is_finite() && secs > 0.0) {
            return Err(InvalidDuration(secs));
        }
        let duration = Duration::try_from_secs_f64(secs).map_err(|_| InvalidDuration(secs))?;
        Ok(Self {
            duration,
            output_file,
        })
    }
}

/// Raw result of an acquisition: one row of samples per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    /// `data[channel][sample]`.
    pub data: Vec<Vec<f64>>,
    /// The file the driver wrote the payload to, if one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

impl Acquisition {
    pub fn new(data: Vec<Vec<f64>>) -> Self {
        Self {
            data,
            output_file: None,
        }
    }

    /// Number of channels in the payload.
    pub fn channel_count(&self) -> usize {
        self.data.len()
    }

    /// Number of samples in the longest channel.
    pub fn sample_count(&self) -> usize {
        self.data.iter().map(Vec::len).max().unwrap_or(0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
