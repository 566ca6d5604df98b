//! Provider driver registry.
//!
//! Maps provider identifiers to driver factories. Filled once at startup and
//! shared read-only afterwards.

use super::{DriverContext, ProviderDriver};
use crate::error::ControllerError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a driver bound to the given context
pub type DriverFactory = Box<dyn Fn(DriverContext) -> Arc<dyn ProviderDriver> + Send + Sync>;

/// Provider identifier to factory table
#[derive(Default)]
pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

impl DriverRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `provider`, replacing any previous one.
    pub fn register<F>(&mut self, provider: impl Into<String>, factory: F)
    where
        F: Fn(DriverContext) -> Arc<dyn ProviderDriver> + Send + Sync + 'static,
    {
        self.factories.insert(provider.into(), Box::new(factory));
    }

    /// Builds the driver for `provider`.
    pub fn resolve(&self, provider: &str, context: DriverContext) -> Result<Arc<dyn ProviderDriver>, ControllerError> {
        match self.factories.get(provider) {
            Some(factory) => Ok(factory(context)),
            None => Err(ControllerError::NotSupported {
                provider: provider.to_string(),
                supported: self.providers().join(", "),
            }),
        }
    }

    /// Registered provider identifiers, sorted
    pub fn providers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
