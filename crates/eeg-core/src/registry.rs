//! Explicit driver registry.
//!
//! Drivers are grouped into [`DriverModule`]s.  At startup the binary resolves
//! the configured module names, hands them to [`DriverRegistry::load`], and
//! the registry asks each module to register itself.  A module can register:
//!
//! - one or more [`DeviceDescriptor`]s (in priority order), and
//! - process-wide SDK hooks run once by [`DriverRegistry::init`] at startup
//!   and [`DriverRegistry::close`] at shutdown.
//!
//! Modules that fail to register (missing SDK, unknown name) are recorded in
//! the [`LoadReport`] and skipped.  The server still starts with zero drivers;
//! every connect request then fails with the configuration error.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::connector::Connector;
use crate::device::{DeviceDescriptor, DeviceError};

/// A process-wide SDK setup or teardown function.
pub type SdkHook = Box<dyn Fn() -> Result<(), DeviceError> + Send + Sync>;

/// Why a driver module could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverLoadError {
    /// No module with this name exists in this build.
    #[error("driver '{0}' is not available in this build")]
    Unknown(String),

    /// The module exists but its SDK could not be loaded.
    #[error("driver '{name}' could not be loaded: {reason}")]
    Unavailable { name: String, reason: String },
}

/// A pluggable group of drivers.
pub trait DriverModule: Send + Sync {
    /// Short name used in configuration (`"synthetic"`, ...).
    fn name(&self) -> &str;

    /// Registers this module's descriptors and hooks.
    ///
    /// # Errors
    ///
    /// Returns [`DriverLoadError`] if the module cannot be used on this host.
    fn register(&self, registry: &mut DriverRegistry) -> Result<(), DriverLoadError>;
}

impl<T: DriverModule + ?Sized> DriverModule for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn register(&self, registry: &mut DriverRegistry) -> Result<(), DriverLoadError> {
        (**self).register(registry)
    }
}

/// Outcome of [`DriverRegistry::load`], one entry per module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Modules that registered successfully, in load order.
    pub loaded: Vec<String>,
    /// Modules that failed, with the reason.
    pub failed: Vec<(String, DriverLoadError)>,
}

struct NamedHook {
    owner: String,
    hook: SdkHook,
}

/// Ordered collection of registered drivers and SDK hooks.
#[derive(Default)]
pub struct DriverRegistry {
    descriptors: Vec<DeviceDescriptor>,
    init_hooks: Vec<NamedHook>,
    close_hooks: Vec<NamedHook>,
    report: LoadReport,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry by asking every module, in order, to register.
    ///
    /// Logs a warning when no descriptor ends up registered.
    pub fn load<'a, I, M>(modules: I) -> Self
    where
        I: IntoIterator<Item = &'a M>,
        M: DriverModule + ?Sized + 'a,
    {
        let mut registry = Self::new();

        for module in modules {
            match module.register(&mut registry) {
                Ok(()) => {
                    debug!("registered device driver module '{}'", module.name());
                    registry.report.loaded.push(module.name().to_string());
                }
                Err(e) => {
                    warn!(
                        "could not load driver module '{}': {e}; support for it is disabled",
                        module.name()
                    );
                    registry.report.failed.push((module.name().to_string(), e));
                }
            }
        }

        if registry.descriptors.is_empty() {
            warn!(
                "No EEG device drivers have been registered. \
                 Please ensure at least one device driver is enabled."
            );
        } else {
            info!(
                "{} device driver(s) registered: {}",
                registry.descriptors.len(),
                registry
                    .descriptors
                    .iter()
                    .map(DeviceDescriptor::name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        registry
    }

    /// Appends a descriptor.  Registration order is fallback priority.
    pub fn register_device(&mut self, descriptor: DeviceDescriptor) {
        self.descriptors.push(descriptor);
    }

    /// Adds a hook run by [`DriverRegistry::init`].
    pub fn on_init(&mut self, owner: impl Into<String>, hook: SdkHook) {
        self.init_hooks.push(NamedHook {
            owner: owner.into(),
            hook,
        });
    }

    /// Adds a hook run by [`DriverRegistry::close`].
    pub fn on_close(&mut self, owner: impl Into<String>, hook: SdkHook) {
        self.close_hooks.push(NamedHook {
            owner: owner.into(),
            hook,
        });
    }

    pub fn descriptors(&self) -> &[DeviceDescriptor] {
        &self.descriptors
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Creates a connector over a copy of the registered descriptors.
    pub fn connector(&self) -> Connector {
        Connector::new(self.descriptors.clone())
    }

    /// Runs every init hook once, in registration order.
    ///
    /// A failing hook is logged and does not stop the others.  Returns the
    /// failures.  Calling `init` again runs every hook again.
    pub fn init(&self) -> Vec<(String, DeviceError)> {
        run_hooks("init", &self.init_hooks)
    }

    /// Runs every close hook once, in registration order.
    pub fn close(&self) -> Vec<(String, DeviceError)> {
        run_hooks("close", &self.close_hooks)
    }
}

fn run_hooks(stage: &str, hooks: &[NamedHook]) -> Vec<(String, DeviceError)> {
    let mut failures = Vec::new();
    for NamedHook { owner, hook } in hooks {
        match hook() {
            Ok(()) => debug!("{stage} hook for '{owner}' completed"),
            Err(e) => {
                warn!("{stage} hook for '{owner}' failed: {e}");
                failures.push((owner.clone(), e));
            }
        }
    }
    failures
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("descriptors", &self.descriptors)
            .field("init_hooks", &self.init_hooks.len())
            .field("close_hooks", &self.close_hooks.len())
            .field("report", &self.report)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
