//! Run and launcher configuration.
//!
//! [`RunConfig`] is the per-launch input consumed by the invocation
//! builder. [`LauncherConfig`] holds persistent host defaults loaded
//! from `~/.config/vmlaunch/config.toml`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name for config file storage.
const APP_NAME: &str = "vmlaunch";

/// Config file name inside the application config directory.
const CONFIG_FILENAME: &str = "config.toml";

/// Default hypervisor binary.
pub const DEFAULT_HYPERVISOR: &str = "qemu-system-x86_64";

/// Default guest disk image path.
pub const DEFAULT_IMAGE: &str = "image";

/// Default guest memory size token.
pub const DEFAULT_MEMORY: &str = "2G";

/// Settings for a single VM launch.
///
/// Treated as read-only once handed to the invocation builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Memory size passed to `-m` (e.g. "2G").
    pub memory: String,

    /// TCP ports forwarded host -> guest in user-mode networking.
    pub ports: Vec<u16>,

    /// Use the bridged TAP topology instead of user-mode networking.
    pub bridged: bool,

    /// Print the full command line before launching.
    pub verbose: bool,

    /// Raw disk image used for both the boot and storage drives.
    pub image: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            memory: DEFAULT_MEMORY.to_string(),
            ports: Vec::new(),
            bridged: false,
            verbose: false,
            image: PathBuf::from(DEFAULT_IMAGE),
        }
    }
}

/// Host bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bridge interface name.
    pub name: String,

    /// Address assigned to the bridge.
    pub address: Ipv4Addr,

    /// Prefix length for `address`.
    pub prefix: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: "br0".to_string(),
            address: Ipv4Addr::new(192, 168, 42, 1),
            prefix: 24,
        }
    }
}

/// Persistent launcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Hypervisor binary (name on PATH or absolute path).
    pub hypervisor: String,

    /// Default disk image.
    pub image: PathBuf,

    /// Default memory size token.
    pub memory: String,

    /// Host bridge used by the bridged topology.
    pub bridge: BridgeConfig,

    /// DHCP lease timeout in seconds.
    pub dhcp_timeout_secs: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            hypervisor: DEFAULT_HYPERVISOR.to_string(),
            image: PathBuf::from(DEFAULT_IMAGE),
            memory: DEFAULT_MEMORY.to_string(),
            bridge: BridgeConfig::default(),
            dhcp_timeout_secs: 10,
        }
    }
}

impl LauncherConfig {
    /// Default config file location.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME).join(CONFIG_FILENAME))
            .ok_or_else(|| Error::ConfigLoad("could not determine config directory".into()))
    }

    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load configuration from `path`, falling back to defaults when it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::ConfigLoad(format!("{}: {}", path.display(), e)));
            }
        };

        toml::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::ConfigSave(e.to_string()))?;
        }
        let contents = toml::to_string_pretty(self).map_err(|e| Error::ConfigSave(e.to_string()))?;
        std::fs::write(path, contents).map_err(|e| Error::ConfigSave(e.to_string()))
    }

    /// DHCP lease timeout.
    pub fn dhcp_timeout(&self) -> Duration {
        Duration::from_secs(self.dhcp_timeout_secs)
    }

    /// Build a [`RunConfig`] seeded with this configuration's defaults.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            memory: self.memory.clone(),
            image: self.image.clone(),
            ..RunConfig::default()
        }
    }
}
