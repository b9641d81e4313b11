//! Device inventory file parsing
//!
//! Lists the expanders `scan` should visit:
//!
//! ```toml
//! [[device]]
//! name = "front-backplane"
//! transport = "sg:dev=/dev/sg3"
//!
//! [[device]]
//! name = "jbod-expander"
//! transport = "bsg:dev=/dev/bsg/expander-6:0,timeout=5000"
//! enabled = false
//! ```

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Inventory loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read inventory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid inventory TOML
    #[error("Invalid inventory: {0}")]
    Parse(#[from] toml::de::Error),

    /// Two entries share a name
    #[error("Duplicate device name '{0}'")]
    DuplicateName(String),

    /// An entry has an empty name or transport
    #[error("Device entry {0} needs a name and a transport")]
    IncompleteEntry(usize),
}

/// One configured device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceEntry {
    /// Label used in scan output
    pub name: String,
    /// Transport string handed to the device registry
    pub transport: String,
    /// Skip the device when false
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Parsed inventory file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Inventory {
    /// Devices in file order
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceEntry>,
}

impl Inventory {
    /// Load an inventory from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse an inventory from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let inventory: Inventory = toml::from_str(content)?;

        let mut seen = HashSet::new();
        for (index, device) in inventory.devices.iter().enumerate() {
            if device.name.trim().is_empty() || device.transport.trim().is_empty() {
                return Err(ConfigError::IncompleteEntry(index));
            }
            if !seen.insert(device.name.as_str()) {
                return Err(ConfigError::DuplicateName(device.name.clone()));
            }
        }
        Ok(inventory)
    }

    /// Devices that are not disabled
    pub fn enabled(&self) -> impl Iterator<Item = &DeviceEntry> {
        self.devices.iter().filter(|d| d.enabled)
    }
}
