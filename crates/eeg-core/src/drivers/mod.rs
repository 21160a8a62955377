//! Driver modules compiled into this build.
//!
//! Vendor SDK wrappers live in their own crates and implement
//! [`DriverModule`]; this module only knows about the ones shipped here and
//! maps configuration names onto them.

#[cfg(feature = "synthetic")]
pub mod synthetic;

use crate::registry::{DriverLoadError, DriverModule, DriverRegistry};

/// Names of every driver module compiled into this build, in default
/// priority order.
pub fn builtin_names() -> Vec<&'static str> {
    let mut names = Vec::new();
    #[cfg(feature = "synthetic")]
    names.push(synthetic::MODULE_NAME);
    names
}

/// Resolves configured driver names into modules, preserving order.
///
/// An empty list means "every built-in module".  Unknown names become a
/// module whose registration fails with [`DriverLoadError::Unknown`], so
/// they show up in the load report instead of aborting startup.
pub fn resolve<S: AsRef<str>>(names: &[S]) -> Vec<Box<dyn DriverModule>> {
    if names.is_empty() {
        return builtin_names().into_iter().filter_map(lookup).collect();
    }

    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            lookup(name).unwrap_or_else(|| {
                Box::new(UnknownModule {
                    name: name.to_string(),
                })
            })
        })
        .collect()
}

fn lookup(name: &str) -> Option<Box<dyn DriverModule>> {
    match name {
        #[cfg(feature = "synthetic")]
        synthetic::MODULE_NAME => Some(Box::new(synthetic::SyntheticModule::default())),
        _ => None,
    }
}

/// Placeholder for a configured name that matches no compiled-in module.
struct UnknownModule {
    name: String,
}

impl DriverModule for UnknownModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, _registry: &mut DriverRegistry) -> Result<(), DriverLoadError> {
        Err(DriverLoadError::Unknown(self.name.clone()))
    }
}
