//! Configuration management for hostpal
//!
//! This module provides TOML persistence for discovery roots, admission
//! policies and device command parameters.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// hostpal configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Network interface enumeration
    #[serde(default)]
    pub network: NetworkConfig,
    /// Logical disk enumeration
    #[serde(default)]
    pub logical_disk: LogicalDiskConfig,
    /// Device power state decoding
    #[serde(default)]
    pub power: PowerConfig,
}

/// Network interface enumeration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Admit interfaces that are neither up nor running
    #[serde(default)]
    pub include_non_running: bool,
    /// IPv4 address prefixes never admitted as new instances
    #[serde(default = "default_excluded_address_prefixes")]
    pub excluded_address_prefixes: Vec<String>,
    /// sysfs directory listing interfaces
    #[serde(default = "default_sysfs_net_root")]
    pub sysfs_root: PathBuf,
}

/// Logical disk enumeration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalDiskConfig {
    /// Filesystem types never admitted as new instances
    #[serde(default = "default_excluded_fs_types")]
    pub excluded_fs_types: Vec<String>,
    /// Mount table to read
    #[serde(default = "default_mounts_file")]
    pub mounts_file: PathBuf,
    /// sysfs block device directory
    #[serde(default = "default_sys_block_root")]
    pub sys_block_root: PathBuf,
}

/// Device power state decoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConfig {
    /// SCSI command timeout in seconds
    #[serde(default = "default_scsi_timeout")]
    pub scsi_timeout_secs: u64,
    /// SCSI sense buffer length in bytes
    #[serde(default = "default_sense_buffer_len")]
    pub sense_buffer_len: usize,
    /// Expected SCSI response length in bytes
    #[serde(default = "default_response_buffer_len")]
    pub response_buffer_len: usize,
}

impl PowerConfig {
    /// SCSI command timeout
    pub fn scsi_timeout(&self) -> Duration {
        Duration::from_secs(self.scsi_timeout_secs)
    }
}

// Default value functions
fn default_excluded_address_prefixes() -> Vec<String> {
    vec!["127.0.0.".to_string()]
}

fn default_sysfs_net_root() -> PathBuf {
    PathBuf::from("/sys/class/net")
}

fn default_excluded_fs_types() -> Vec<String> {
    [
        "proc",
        "sysfs",
        "devtmpfs",
        "devpts",
        "tmpfs",
        "cgroup",
        "cgroup2",
        "securityfs",
        "debugfs",
        "tracefs",
        "pstore",
        "bpf",
        "configfs",
        "mqueue",
        "hugetlbfs",
        "autofs",
        "fusectl",
        "binfmt_misc",
        "rpc_pipefs",
        "nsfs",
        "overlay",
        "squashfs",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_mounts_file() -> PathBuf {
    PathBuf::from("/proc/mounts")
}

fn default_sys_block_root() -> PathBuf {
    PathBuf::from("/sys/block")
}

fn default_scsi_timeout() -> u64 {
    30
}

fn default_sense_buffer_len() -> usize {
    32
}

fn default_response_buffer_len() -> usize {
    252
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            include_non_running: false,
            excluded_address_prefixes: default_excluded_address_prefixes(),
            sysfs_root: default_sysfs_net_root(),
        }
    }
}

impl Default for LogicalDiskConfig {
    fn default() -> Self {
        Self {
            excluded_fs_types: default_excluded_fs_types(),
            mounts_file: default_mounts_file(),
            sys_block_root: default_sys_block_root(),
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            scsi_timeout_secs: default_scsi_timeout(),
            sense_buffer_len: default_sense_buffer_len(),
            response_buffer_len: default_response_buffer_len(),
        }
    }
}

impl Config {
    /// Get the default configuration directory
    ///
    /// Returns `~/.config/hostpal` on Unix-like systems,
    /// or `%APPDATA%\hostpal` on Windows.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(windows) {
            std::env::var("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        } else {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from(".config"))
        };

        Ok(config_dir.join("hostpal"))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_file = Self::default_path()?.join("config.toml");

        if !config_file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::default_path()?;
        std::fs::create_dir_all(&config_dir)?;
        self.save_to(&config_dir.join("config.toml"))
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the decoder cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.power.scsi_timeout_secs == 0 {
            return Err(Error::Config("power.scsi_timeout_secs must be > 0".into()));
        }
        // Fixed-format sense data needs at least bytes 0..=2 for the sense key
        if self.power.sense_buffer_len < 3 || self.power.sense_buffer_len > u8::MAX as usize {
            return Err(Error::Config(
                "power.sense_buffer_len must be between 3 and 255".into(),
            ));
        }
        if self.power.response_buffer_len > u16::MAX as usize {
            return Err(Error::Config(
                "power.response_buffer_len must fit in 16 bits".into(),
            ));
        }
        Ok(())
    }
}
