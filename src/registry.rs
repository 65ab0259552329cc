//! Driver registry: which driver families exist and how each is configured.
//!
//! Built once at startup and read-only afterwards, except for the per-entry
//! enabled flag. Entry order is declaration order, and detection results
//! preserve it. Drivers are registered as factories: every search run builds
//! its own scoped driver instances, so no state leaks between runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::LinkConfig;
use crate::driver::Driver;
use crate::error::{DeviceError, Result};

/// Per-driver settings, deserializable from the link configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Path prefix candidate serial ports must match.
    pub port_prefix: String,
    /// Serial bitrate.
    pub bitrate: u32,
    /// Timezone offset applied when the device reports local timestamps.
    pub tz_offset_minutes: Option<i32>,
    /// Free-form driver-specific settings.
    pub extra: BTreeMap<String, String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            port_prefix: "/dev/cu.usb".to_string(),
            bitrate: 9600,
            tz_offset_minutes: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Factory producing a fresh driver instance from its configuration.
pub type DriverFactory = Arc<dyn Fn(DriverConfig) -> Box<dyn Driver> + Send + Sync>;

/// One registered driver family.
pub struct RegistryEntry {
    name: String,
    factory: DriverFactory,
    config: DriverConfig,
    enabled: bool,
}

impl RegistryEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Build a fresh driver instance from this entry's factory and config.
    pub(crate) fn instantiate(&self) -> Box<dyn Driver> {
        (self.factory)(self.config.clone())
    }
}

/// Ordered set of registered driver families.
#[derive(Default)]
pub struct DriverRegistry {
    entries: Vec<RegistryEntry>,
}

impl DriverRegistry {
    pub fn builder() -> DriverRegistryBuilder {
        DriverRegistryBuilder { entries: Vec::new() }
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Flip the enabled flag for one driver family.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.enabled = enabled;
                Ok(())
            }
            None => Err(DeviceError::UnknownDriver { name: name.to_string() }),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(|e| e.enabled)
    }

    /// Names of all enabled entries, declaration order.
    pub fn enabled_names(&self) -> Vec<String> {
        self.entries.iter().filter(|e| e.enabled).map(|e| e.name.clone()).collect()
    }

    /// Overlay settings and enabled flags from a loaded configuration file.
    /// Config entries naming unregistered drivers are logged and skipped.
    pub fn apply(&mut self, config: &LinkConfig) {
        for entry in &config.drivers {
            match self.entries.iter_mut().find(|e| e.name == entry.name) {
                Some(registered) => {
                    registered.config = entry.config.clone();
                    registered.enabled = entry.enabled;
                }
                None => {
                    warn!(driver = %entry.name, "configuration names an unregistered driver");
                }
            }
        }
    }
}

/// Builder for [`DriverRegistry`].
pub struct DriverRegistryBuilder {
    entries: Vec<RegistryEntry>,
}

impl DriverRegistryBuilder {
    /// Register a driver family under `name`. Entries start disabled; enable
    /// them explicitly or through [`DriverRegistry::apply`].
    pub fn driver<F, D>(mut self, name: impl Into<String>, config: DriverConfig, factory: F) -> Self
    where
        F: Fn(DriverConfig) -> D + Send + Sync + 'static,
        D: Driver + 'static,
    {
        let factory: DriverFactory = Arc::new(move |cfg| Box::new(factory(cfg)) as Box<dyn Driver>);
        self.entries.push(RegistryEntry { name: name.into(), factory, config, enabled: false });
        self
    }

    /// Register a driver family and enable it immediately.
    pub fn enabled_driver<F, D>(self, name: impl Into<String>, config: DriverConfig, factory: F) -> Self
    where
        F: Fn(DriverConfig) -> D + Send + Sync + 'static,
        D: Driver + 'static,
    {
        let mut builder = self.driver(name, config, factory);
        if let Some(last) = builder.entries.last_mut() {
            last.enabled = true;
        }
        builder
    }

    pub fn build(self) -> DriverRegistry {
        DriverRegistry { entries: self.entries }
    }
}
