//! Link configuration loaded from YAML.
//!
//! The file selects the upload environment, the timezone offset applied to
//! device-local timestamps, and the per-driver settings and enabled flags
//! that get overlaid onto the [`crate::registry::DriverRegistry`]. Drivers
//! are a list, not a map: declaration order is meaningful (detection results
//! preserve it).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};
use crate::registry::DriverConfig;
use crate::session::Environment;

/// Top-level configuration for one uploader installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_environment")]
    pub environment: Environment,
    /// Offset in minutes applied when devices report wall-clock local time.
    #[serde(default)]
    pub tz_offset_minutes: Option<i32>,
    #[serde(default)]
    pub drivers: Vec<DriverEntry>,
}

fn default_environment() -> Environment {
    Environment::Prod
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { environment: Environment::Prod, tz_offset_minutes: None, drivers: Vec::new() }
    }
}

/// One driver family's configuration entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEntry {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub config: DriverConfig,
}

impl LinkConfig {
    /// Parse configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text)
            .map_err(|e| DeviceError::config("parsing link configuration", e.to_string()))
    }

    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DeviceError::config(format!("reading {}", path.display()), e.to_string()))?;
        Self::from_yaml(&text)
    }

    /// Names of enabled drivers, declaration order.
    pub fn enabled_names(&self) -> Vec<String> {
        self.drivers.iter().filter(|d| d.enabled).map(|d| d.name.clone()).collect()
    }
}
