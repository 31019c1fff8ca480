//! Logical Disk Enumeration
//!
//! Tracks mounted filesystems across poll cycles. A logical disk is keyed by
//! its mount point; the instance remembers the previous used-space sample so
//! growth between cycles can be reported.
//!
//! Platform support:
//! - Linux: `/proc/mounts`, statvfs, `/sys/block/*/removable`

#[cfg(target_os = "linux")]
pub mod linux;

use crate::config::LogicalDiskConfig;
use crate::enumeration::{EntityEnumeration, EnumerationAdapter, ResourceProbe};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether the media behind a disk can be removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiskRemovability {
    /// Device supports removable media
    SupportsRemovableMedia,
    /// Device is not removable
    Other,
    /// Device not found or information not available
    Unknown,
}

/// Filesystem space usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsUsage {
    /// Total size in bytes
    pub total_bytes: u64,
    /// Used space in bytes
    pub used_bytes: u64,
    /// Space available to unprivileged users in bytes
    pub available_bytes: u64,
}

impl FsUsage {
    /// Calculate usage percentage
    pub fn usage_percent(&self) -> f32 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.used_bytes as f64 / self.total_bytes as f64 * 100.0) as f32
        }
    }
}

/// One mounted filesystem as seen by a single probe call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalDiskRecord {
    /// Mount point
    pub mount_point: PathBuf,
    /// Backing device (e.g., "/dev/sda1")
    pub device: String,
    /// Filesystem type (ext4, xfs, vfat, ...)
    pub fs_type: String,
    /// Mounted read-only
    pub read_only: bool,
    /// Space usage, if statvfs succeeded
    pub usage: Option<FsUsage>,
    /// Removability of the backing device
    pub removability: DiskRemovability,
}

/// A tracked logical disk
#[derive(Debug, Clone)]
pub struct LogicalDiskInstance {
    record: LogicalDiskRecord,
    previous_used: Option<u64>,
}

impl LogicalDiskInstance {
    /// Mount point
    pub fn mount_point(&self) -> &std::path::Path {
        &self.record.mount_point
    }

    /// Backing device
    pub fn device(&self) -> &str {
        &self.record.device
    }

    /// Filesystem type
    pub fn fs_type(&self) -> &str {
        &self.record.fs_type
    }

    /// Mounted read-only
    pub fn read_only(&self) -> bool {
        self.record.read_only
    }

    /// Latest space usage
    pub fn usage(&self) -> Option<&FsUsage> {
        self.record.usage.as_ref()
    }

    /// Removability of the backing device
    pub fn removability(&self) -> DiskRemovability {
        self.record.removability
    }

    /// Change in used bytes since the previous sample
    pub fn used_growth(&self) -> Option<i128> {
        let current = self.record.usage?.used_bytes;
        Some(current as i128 - self.previous_used? as i128)
    }
}

/// Admission policy for newly observed mounts
#[derive(Debug, Clone)]
pub struct LogicalDiskFilter {
    /// Filesystem types that are never admitted
    pub excluded_fs_types: Vec<String>,
}

impl LogicalDiskFilter {
    /// Whether a newly observed mount should be tracked
    pub fn accepts(&self, record: &LogicalDiskRecord) -> bool {
        !self.excluded_fs_types.iter().any(|t| *t == record.fs_type)
    }
}

impl From<&LogicalDiskConfig> for LogicalDiskFilter {
    fn from(config: &LogicalDiskConfig) -> Self {
        Self {
            excluded_fs_types: config.excluded_fs_types.clone(),
        }
    }
}

impl Default for LogicalDiskFilter {
    fn default() -> Self {
        Self::from(&LogicalDiskConfig::default())
    }
}

/// Logical disk adapter for the enumeration engine
#[derive(Debug, Clone, Default)]
pub struct LogicalDiskAdapter {
    filter: LogicalDiskFilter,
}

impl LogicalDiskAdapter {
    /// Create an adapter with the given admission policy
    pub fn new(filter: LogicalDiskFilter) -> Self {
        Self { filter }
    }
}

impl EnumerationAdapter for LogicalDiskAdapter {
    type Record = LogicalDiskRecord;
    type Instance = LogicalDiskInstance;

    fn identity(&self, record: &LogicalDiskRecord) -> String {
        record.mount_point.to_string_lossy().into_owned()
    }

    fn accept(&self, record: &LogicalDiskRecord) -> bool {
        self.filter.accepts(record)
    }

    fn create(&self, record: &LogicalDiskRecord) -> LogicalDiskInstance {
        LogicalDiskInstance {
            record: record.clone(),
            previous_used: None,
        }
    }

    fn refresh(&self, instance: &mut LogicalDiskInstance, record: &LogicalDiskRecord) -> Result<()> {
        if record.mount_point != instance.record.mount_point {
            return Err(Error::InstanceUpdate {
                id: instance.record.mount_point.display().to_string(),
                reason: format!("record belongs to {}", record.mount_point.display()),
            });
        }
        instance.previous_used = instance.record.usage.map(|u| u.used_bytes);
        instance.record = record.clone();
        Ok(())
    }
}

/// Boxed probe producing logical disk records
pub type LogicalDiskProbe = Box<dyn ResourceProbe<Record = LogicalDiskRecord>>;

/// Logical disk enumeration over any mount probe
pub type LogicalDiskEnumeration<P = LogicalDiskProbe> = EntityEnumeration<LogicalDiskAdapter, P>;

impl LogicalDiskEnumeration<LogicalDiskProbe> {
    /// Enumeration backed by the platform's mount probe
    pub fn system(config: &LogicalDiskConfig) -> Self {
        EntityEnumeration::new(LogicalDiskAdapter::new(config.into()), system_probe(config))
    }
}

#[cfg(target_os = "linux")]
fn system_probe(config: &LogicalDiskConfig) -> LogicalDiskProbe {
    Box::new(linux::MountTableProbe::new(
        &config.mounts_file,
        &config.sys_block_root,
    ))
}

#[cfg(not(target_os = "linux"))]
fn system_probe(_config: &LogicalDiskConfig) -> LogicalDiskProbe {
    Box::new(UnsupportedProbe)
}

#[cfg(not(target_os = "linux"))]
struct UnsupportedProbe;

#[cfg(not(target_os = "linux"))]
impl ResourceProbe for UnsupportedProbe {
    type Record = LogicalDiskRecord;

    fn probe(&self) -> Result<Vec<LogicalDiskRecord>> {
        Err(Error::UnsupportedPlatform(
            "logical disk discovery is only implemented for Linux".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn mount(path: &str, fs_type: &str, used: u64) -> LogicalDiskRecord {
        LogicalDiskRecord {
            mount_point: PathBuf::from(path),
            device: "/dev/sda1".to_string(),
            fs_type: fs_type.to_string(),
            read_only: false,
            usage: Some(FsUsage {
                total_bytes: 1000,
                used_bytes: used,
                available_bytes: 1000 - used,
            }),
            removability: DiskRemovability::Other,
        }
    }

    struct Mounts(RefCell<Vec<LogicalDiskRecord>>);

    impl ResourceProbe for Mounts {
        type Record = LogicalDiskRecord;

        fn probe(&self) -> Result<Vec<LogicalDiskRecord>> {
            Ok(self.0.borrow().clone())
        }
    }

    #[test]
    fn test_pseudo_filesystems_filtered() {
        let probe = Mounts(RefCell::new(vec![
            mount("/", "ext4", 100),
            mount("/proc", "proc", 0),
            mount("/boot", "vfat", 10),
        ]));
        let mut disks = EntityEnumeration::new(LogicalDiskAdapter::default(), probe);
        let summary = disks.init().unwrap();
        assert_eq!(summary.rejected, 1);
        let ids: Vec<&str> = disks.ids().collect();
        assert_eq!(ids, vec!["/", "/boot"]);
    }

    #[test]
    fn test_used_growth_across_cycles() {
        let probe = Mounts(RefCell::new(vec![mount("/", "ext4", 100)]));
        let mut disks = EntityEnumeration::new(LogicalDiskAdapter::default(), probe);
        disks.init().unwrap();
        assert_eq!(disks.get_by_id("/").unwrap().used_growth(), None);

        *disks.probe().0.borrow_mut() = vec![mount("/", "ext4", 250)];
        disks.update(true).unwrap();
        let root = disks.get_by_id("/").unwrap();
        assert_eq!(root.used_growth(), Some(150));
        assert!((root.usage().unwrap().usage_percent() - 25.0).abs() < 1e-3);

        *disks.probe().0.borrow_mut() = vec![mount("/", "ext4", 200)];
        disks.update(false).unwrap();
        assert_eq!(disks.get_by_id("/").unwrap().used_growth(), Some(-50));
    }
}
