//! Linux network interface discovery via sysfs
//!
//! Reads `/sys/class/net/[interface]/`:
//! - **flags**: IFF_UP / IFF_RUNNING bits
//! - **statistics/**: RX/TX bytes, packets, errors, drops
//! - **mtu**, **speed**, **address**
//!
//! IPv4 addresses come from `getifaddrs`.

use super::{InterfaceCounters, NetworkInterfaceRecord};
use crate::enumeration::ResourceProbe;
use crate::error::{Error, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddrV4;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Default sysfs directory listing network interfaces
pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// Interface probe backed by sysfs
#[derive(Debug, Clone)]
pub struct SysfsNetworkProbe {
    root: PathBuf,
    resolve_addresses: bool,
}

impl SysfsNetworkProbe {
    /// Probe rooted at `root` (normally `/sys/class/net`)
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            resolve_addresses: true,
        }
    }

    /// Skip the `getifaddrs` address lookup
    pub fn without_addresses(mut self) -> Self {
        self.resolve_addresses = false;
        self
    }

    fn read_interface(
        &self,
        name: &str,
        addresses: &HashMap<String, String>,
        now: Instant,
    ) -> NetworkInterfaceRecord {
        let base = self.root.join(name);

        let flags = read_flags(&base);
        let is_up = flags.map(|f| f & libc::IFF_UP as u32 != 0);
        let is_running = flags.map(|f| f & libc::IFF_RUNNING as u32 != 0);

        let counters = match read_counters(&base.join("statistics")) {
            Ok(counters) => Some(counters),
            Err(e) => {
                debug!("No statistics for interface {}: {}", name, e);
                None
            }
        };

        NetworkInterfaceRecord {
            name: name.to_string(),
            is_up,
            is_running,
            ipv4_address: addresses.get(name).cloned(),
            mac_address: read_file_string(&base.join("address")),
            mtu: read_file_u32(&base.join("mtu")),
            // Down links report -1 here, which fails to parse as u32
            speed_mbps: read_file_u32(&base.join("speed")),
            counters,
            sampled_at: now,
        }
    }
}

impl Default for SysfsNetworkProbe {
    fn default() -> Self {
        Self::new(SYS_CLASS_NET)
    }
}

impl ResourceProbe for SysfsNetworkProbe {
    type Record = NetworkInterfaceRecord;

    fn probe(&self) -> Result<Vec<NetworkInterfaceRecord>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::Discovery(format!("{}: {}", self.root.display(), e)))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Error::discovery)?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        // read_dir order is unspecified
        names.sort();

        let addresses = if self.resolve_addresses {
            ipv4_addresses()?
        } else {
            HashMap::new()
        };

        let now = Instant::now();
        Ok(names
            .iter()
            .map(|name| self.read_interface(name, &addresses, now))
            .collect())
    }
}

/// First IPv4 address of every interface that has one
fn ipv4_addresses() -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for ifaddr in nix::ifaddrs::getifaddrs().map_err(Error::discovery)? {
        let Some(sin) = ifaddr.address.as_ref().and_then(|a| a.as_sockaddr_in()) else {
            continue;
        };
        let addr = SocketAddrV4::from(*sin);
        map.entry(ifaddr.interface_name)
            .or_insert_with(|| addr.ip().to_string());
    }
    Ok(map)
}

fn read_flags(base: &Path) -> Option<u32> {
    let raw = read_file_string(&base.join("flags"))?;
    u32::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

fn read_counters(stats: &Path) -> Result<InterfaceCounters> {
    Ok(InterfaceCounters {
        rx_bytes: read_stat(stats, "rx_bytes")?,
        rx_packets: read_stat(stats, "rx_packets")?,
        rx_errors: read_stat(stats, "rx_errors")?,
        rx_drops: read_stat(stats, "rx_dropped")?,
        tx_bytes: read_stat(stats, "tx_bytes")?,
        tx_packets: read_stat(stats, "tx_packets")?,
        tx_errors: read_stat(stats, "tx_errors")?,
        tx_drops: read_stat(stats, "tx_dropped")?,
    })
}

fn read_stat(stats: &Path, stat_name: &str) -> Result<u64> {
    let content = fs::read_to_string(stats.join(stat_name))?;
    content
        .trim()
        .parse()
        .map_err(|e| Error::Parse(format!("Failed to parse {}: {}", stat_name, e)))
}

fn read_file_u32(path: &Path) -> Option<u32> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

fn read_file_string(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
