//! Linux logical disk discovery via procfs, statvfs and sysfs

use super::{DiskRemovability, FsUsage, LogicalDiskRecord};
use crate::enumeration::ResourceProbe;
use crate::error::{Error, Result};
use log::trace;
use std::fs;
use std::path::{Path, PathBuf};

/// Mount table probe
#[derive(Debug, Clone)]
pub struct MountTableProbe {
    mounts_file: PathBuf,
    sys_block_root: PathBuf,
    stat_filesystems: bool,
}

impl MountTableProbe {
    /// Probe reading `mounts_file` (normally `/proc/mounts`) and
    /// `sys_block_root` (normally `/sys/block`)
    pub fn new(mounts_file: impl AsRef<Path>, sys_block_root: impl AsRef<Path>) -> Self {
        Self {
            mounts_file: mounts_file.as_ref().to_path_buf(),
            sys_block_root: sys_block_root.as_ref().to_path_buf(),
            stat_filesystems: true,
        }
    }

    /// Skip statvfs on mount points
    pub fn without_usage(mut self) -> Self {
        self.stat_filesystems = false;
        self
    }

    /// Check if a given disk device is removable.
    ///
    /// Accepts a device path or name ("/dev/sdb1", "sdb1", "nvme0n1p2");
    /// partitions resolve to their parent block device.
    pub fn removability(&self, device: &str) -> DiskRemovability {
        let name = device.strip_prefix("/dev/").unwrap_or(device);
        if name.is_empty() || name.contains('/') {
            return DiskRemovability::Unknown;
        }

        for candidate in block_device_candidates(name) {
            let path = self.sys_block_root.join(&candidate).join("removable");
            if let Ok(content) = fs::read_to_string(&path) {
                return match content.trim() {
                    "1" => DiskRemovability::SupportsRemovableMedia,
                    "0" => DiskRemovability::Other,
                    _ => DiskRemovability::Unknown,
                };
            }
        }
        DiskRemovability::Unknown
    }
}

impl Default for MountTableProbe {
    fn default() -> Self {
        Self::new("/proc/mounts", "/sys/block")
    }
}

impl ResourceProbe for MountTableProbe {
    type Record = LogicalDiskRecord;

    fn probe(&self) -> Result<Vec<LogicalDiskRecord>> {
        let mounts = fs::read_to_string(&self.mounts_file)
            .map_err(|e| Error::Discovery(format!("{}: {}", self.mounts_file.display(), e)))?;

        let mut records = Vec::new();
        for line in mounts.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                continue;
            }

            let device = unescape_mount_field(parts[0]);
            let mount_point = PathBuf::from(unescape_mount_field(parts[1]));
            let fs_type = parts[2].to_string();
            let read_only = parts[3].split(',').any(|opt| opt == "ro");

            let usage = if self.stat_filesystems {
                statvfs_usage(&mount_point)
            } else {
                None
            };
            let removability = if device.starts_with("/dev/") {
                self.removability(&device)
            } else {
                DiskRemovability::Unknown
            };

            records.push(LogicalDiskRecord {
                mount_point,
                device,
                fs_type,
                read_only,
                usage,
                removability,
            });
        }
        Ok(records)
    }
}

fn statvfs_usage(mount_point: &Path) -> Option<FsUsage> {
    match nix::sys::statvfs::statvfs(mount_point) {
        Ok(stat) => {
            let fragment = stat.fragment_size() as u64;
            let total_bytes = stat.blocks() as u64 * fragment;
            let free_bytes = stat.blocks_free() as u64 * fragment;
            Some(FsUsage {
                total_bytes,
                used_bytes: total_bytes.saturating_sub(free_bytes),
                available_bytes: stat.blocks_available() as u64 * fragment,
            })
        }
        Err(e) => {
            trace!("statvfs({}) failed: {}", mount_point.display(), e);
            None
        }
    }
}

/// The device itself, then its parent for partition names
/// ("sda1" -> "sda", "nvme0n1p2" / "mmcblk0p1" -> strip the "pN" suffix).
fn block_device_candidates(name: &str) -> Vec<String> {
    let mut candidates = vec![name.to_string()];
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if stem.len() < name.len() && !stem.is_empty() {
        match stem.strip_suffix('p') {
            Some(base) if base.ends_with(|c: char| c.is_ascii_digit()) => {
                candidates.push(base.to_string())
            }
            _ => candidates.push(stem.to_string()),
        }
    }
    candidates
}

/// Decode the octal escapes (`\040` for space, ...) used in the mount table
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MOUNTS: &str = "\
/dev/sda2 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/sdb1 /media/usb\\040stick vfat ro,nosuid 0 0
/dev/nvme0n1p1 /boot/efi vfat rw 0 0
broken-line
";

    fn fake_system() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mounts"), MOUNTS).unwrap();
        for (dev, removable) in [("sda", "0"), ("sdb", "1"), ("nvme0n1", "0")] {
            let d = dir.path().join("block").join(dev);
            fs::create_dir_all(&d).unwrap();
            fs::write(d.join("removable"), format!("{}\n", removable)).unwrap();
        }
        dir
    }

    fn probe(dir: &TempDir) -> MountTableProbe {
        MountTableProbe::new(dir.path().join("mounts"), dir.path().join("block")).without_usage()
    }

    #[test]
    fn test_probe_parses_mount_table() {
        let dir = fake_system();
        let records = probe(&dir).probe().unwrap();
        assert_eq!(records.len(), 4);

        assert_eq!(records[0].mount_point, PathBuf::from("/"));
        assert_eq!(records[0].fs_type, "ext4");
        assert!(!records[0].read_only);
        assert_eq!(records[0].removability, DiskRemovability::Other);

        assert_eq!(records[1].removability, DiskRemovability::Unknown);

        assert_eq!(records[2].mount_point, PathBuf::from("/media/usb stick"));
        assert!(records[2].read_only);
        assert_eq!(
            records[2].removability,
            DiskRemovability::SupportsRemovableMedia
        );

        assert_eq!(records[3].removability, DiskRemovability::Other);
    }

    #[test]
    fn test_removability_lookup() {
        let dir = fake_system();
        let p = probe(&dir);
        assert_eq!(p.removability("sdb"), DiskRemovability::SupportsRemovableMedia);
        assert_eq!(p.removability("/dev/sda2"), DiskRemovability::Other);
        assert_eq!(p.removability("/dev/nvme0n1p1"), DiskRemovability::Other);
        assert_eq!(p.removability("sdz"), DiskRemovability::Unknown);
        assert_eq!(p.removability("../etc"), DiskRemovability::Unknown);
    }

    #[test]
    fn test_block_device_candidates() {
        assert_eq!(block_device_candidates("sda1"), vec!["sda1", "sda"]);
        assert_eq!(block_device_candidates("nvme0n1p2"), vec!["nvme0n1p2", "nvme0n1"]);
        assert_eq!(block_device_candidates("mmcblk0p1"), vec!["mmcblk0p1", "mmcblk0"]);
        assert_eq!(block_device_candidates("sdb"), vec!["sdb"]);
    }

    #[test]
    fn test_missing_mount_table_is_discovery_failure() {
        let dir = TempDir::new().unwrap();
        let p = MountTableProbe::new(dir.path().join("none"), dir.path());
        assert!(matches!(p.probe(), Err(Error::Discovery(_))));
    }
}
