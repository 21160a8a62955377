//! Software-only EEG device.
//!
//! Produces deterministic multi-channel sine data so the bridge can run end to
//! end on machines without acquisition hardware.  Each channel oscillates in
//! the alpha band at a slightly different frequency and phase:
//!
//! ```text
//! sample[ch][n] = amplitude * sin(2π * (base_hz + ch) * n / sample_rate + ch * 0.3)
//! ```
//!
//! When `realtime` is on, `get_output` sleeps for the requested duration the
//! way a hardware recording would block.

use std::f64::consts::TAU;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread;

use tracing::{debug, info};

use crate::device::{
    Acquisition, AcquisitionRequest, Device, DeviceData, DeviceDescriptor, DeviceError,
};
use crate::registry::{DriverLoadError, DriverModule, DriverRegistry};

/// Configuration name of this module.
pub const MODULE_NAME: &str = "synthetic";

/// Largest recording served in one call: one hour at 250 Hz.
pub const MAX_SAMPLES_PER_CHANNEL: usize = 900_000;

/// 10-20 electrode labels used for the default layout.
const DEFAULT_CHANNELS: [&str; 8] = ["Fp1", "Fp2", "C3", "C4", "P3", "P4", "O1", "O2"];

/// Shape of the generated signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub name: String,
    pub sample_rate: u32,
    pub channels: Vec<String>,
    /// Peak amplitude in microvolts.
    pub amplitude: f64,
    /// Frequency of channel 0 in Hz; channel `i` runs at `base_hz + i`.
    pub base_hz: f64,
    /// Block for the requested duration like real hardware does.
    pub realtime: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "Synthetic EEG".to_string(),
            sample_rate: 250,
            channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
            amplitude: 50.0,
            base_hz: 10.0,
            realtime: true,
        }
    }
}

/// A synthetic driver instance.
#[derive(Debug, Default)]
pub struct SyntheticDevice {
    config: SyntheticConfig,
    connected: bool,
}

impl SyntheticDevice {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn generate(&self, samples: usize) -> Vec<Vec<f64>> {
        let rate = f64::from(self.config.sample_rate);
        (0..self.config.channels.len())
            .map(|ch| {
                let freq = self.config.base_hz + ch as f64;
                let phase = ch as f64 * 0.3;
                (0..samples)
                    .map(|n| self.config.amplitude * (TAU * freq * n as f64 / rate + phase).sin())
                    .collect()
            })
            .collect()
    }
}

impl Device for SyntheticDevice {
    fn connect(&mut self) -> Result<(), DeviceError> {
        if self.config.sample_rate == 0 || self.config.channels.is_empty() {
            return Err(DeviceError::NotFound);
        }
        self.connected = true;
        info!(
            "synthetic device '{}' connected ({} channels @ {} Hz)",
            self.config.name,
            self.config.channels.len(),
            self.config.sample_rate
        );
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DeviceError> {
        self.connected = false;
        debug!("synthetic device '{}' disconnected", self.config.name);
        Ok(())
    }

    fn get_output(&self, request: &AcquisitionRequest) -> Result<Acquisition, DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }

        // Checked before sleeping so an oversized request fails fast.
        let samples = (request.duration.as_secs_f64() * f64::from(self.config.sample_rate)).round();
        if samples > MAX_SAMPLES_PER_CHANNEL as f64 {
            return Err(DeviceError::sdk(format!(
                "requested {samples} samples per channel; \
                 the synthetic device records at most {MAX_SAMPLES_PER_CHANNEL}"
            )));
        }
        let samples = samples as usize;

        if self.config.realtime {
            thread::sleep(request.duration);
        }

        let mut acquisition = Acquisition::new(self.generate(samples));

        if let Some(path) = &request.output_file {
            write_json(path, &acquisition.data)?;
            acquisition.output_file = Some(path.clone());
        }

        debug!(
            "synthetic acquisition: {} channels x {} samples",
            acquisition.channel_count(),
            samples
        );
        Ok(acquisition)
    }

    fn get_device_data(&self) -> Result<DeviceData, DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        Ok(DeviceData::new(&self.config.name, self.config.sample_rate)
            .with_channels(self.config.channels.iter().cloned()))
    }
}

fn write_json(path: &Path, data: &[Vec<f64>]) -> Result<(), DeviceError> {
    let to_output_error = |source: std::io::Error| DeviceError::Output {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(to_output_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, data).map_err(|e| to_output_error(e.into()))?;
    writer.flush().map_err(to_output_error)
}

// ── Module ────────────────────────────────────────────────────────────────────

/// Registers one [`SyntheticDevice`] descriptor with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct SyntheticModule {
    config: SyntheticConfig,
}

impl SyntheticModule {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }
}

impl DriverModule for SyntheticModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn register(&self, registry: &mut DriverRegistry) -> Result<(), DriverLoadError> {
        let config = self.config.clone();
        registry.register_device(DeviceDescriptor::new(MODULE_NAME, move || {
            Ok(Box::new(SyntheticDevice::new(config.clone())) as Box<dyn Device>)
        }));
        registry.on_init(
            MODULE_NAME,
            Box::new(|| {
                info!("synthetic signal source ready");
                Ok(())
            }),
        );
        registry.on_close(
            MODULE_NAME,
            Box::new(|| {
                info!("synthetic signal source released");
                Ok(())
            }),
        );
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
