//! Network Interface Enumeration
//!
//! Tracks network interfaces across poll cycles with an
//! [`EntityEnumeration`](crate::enumeration::EntityEnumeration). Interface
//! instances keep the counters of the previous sample so receive/transmit
//! rates can be computed between cycles.
//!
//! # Examples
//!
//! ```no_run
//! use hostpal::config::NetworkConfig;
//! use hostpal::network::NetworkInterfaceEnumeration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut interfaces = NetworkInterfaceEnumeration::system(&NetworkConfig::default());
//! interfaces.init()?;
//!
//! // Cheap counter refresh between full synchronizations
//! interfaces.update(true)?;
//! for iface in interfaces.instances() {
//!     if let Some((rx, tx)) = iface.bandwidth_rate() {
//!         println!("{}: rx {:.0} B/s, tx {:.0} B/s", iface.name(), rx, tx);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Admission policy
//!
//! Unless non-running interfaces are included, interfaces that are neither
//! up nor running are dropped from every snapshot by [`RunningInterfaces`],
//! so a tracked interface that goes down is removed on the next full
//! synchronization.
//!
//! A newly observed interface becomes an instance only when:
//! - both its up and running states are known
//! - its counters could be read
//! - its IPv4 address, when known, does not start with an excluded prefix
//!   (loopback `127.0.0.` by default)

#[cfg(target_os = "linux")]
pub mod linux;

use crate::config::NetworkConfig;
use crate::enumeration::{EntityEnumeration, EnumerationAdapter, ResourceProbe};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Cumulative interface counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    /// Bytes received
    pub rx_bytes: u64,
    /// Packets received
    pub rx_packets: u64,
    /// Receive errors
    pub rx_errors: u64,
    /// Receive drops
    pub rx_drops: u64,
    /// Bytes transmitted
    pub tx_bytes: u64,
    /// Packets transmitted
    pub tx_packets: u64,
    /// Transmit errors
    pub tx_errors: u64,
    /// Transmit drops
    pub tx_drops: u64,
}

impl InterfaceCounters {
    /// Get total errors (RX + TX)
    pub fn total_errors(&self) -> u64 {
        self.rx_errors.saturating_add(self.tx_errors)
    }

    /// Get total drops (RX + TX)
    pub fn total_drops(&self) -> u64 {
        self.rx_drops.saturating_add(self.tx_drops)
    }
}

/// One interface as seen by a single probe call
#[derive(Debug, Clone)]
pub struct NetworkInterfaceRecord {
    /// Interface name (e.g., "eth0", "wlan0")
    pub name: String,
    /// Interface is up, if known
    pub is_up: Option<bool>,
    /// Interface is running, if known
    pub is_running: Option<bool>,
    /// First IPv4 address, if known
    pub ipv4_address: Option<String>,
    /// MAC address
    pub mac_address: Option<String>,
    /// Maximum Transmission Unit
    pub mtu: Option<u32>,
    /// Link speed in Mbps
    pub speed_mbps: Option<u32>,
    /// Counters at sampling time, `None` when statistics could not be read
    pub counters: Option<InterfaceCounters>,
    /// When the counters were read
    pub sampled_at: Instant,
}

impl NetworkInterfaceRecord {
    /// Record with unknown state and unknown counters, sampled now
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_up: None,
            is_running: None,
            ipv4_address: None,
            mac_address: None,
            mtu: None,
            speed_mbps: None,
            counters: None,
            sampled_at: Instant::now(),
        }
    }

    /// Both up and running states are known
    pub fn is_state_known(&self) -> bool {
        self.is_up.is_some() && self.is_running.is_some()
    }

    /// Known to be neither up nor running
    pub fn is_down(&self) -> bool {
        self.is_up == Some(false) && self.is_running == Some(false)
    }
}

#[derive(Debug, Clone, Copy)]
struct CounterSample {
    counters: InterfaceCounters,
    at: Instant,
}

/// A tracked network interface
#[derive(Debug, Clone)]
pub struct NetworkInterfaceInstance {
    name: String,
    is_up: bool,
    is_running: bool,
    ipv4_address: Option<String>,
    mac_address: Option<String>,
    mtu: Option<u32>,
    speed_mbps: Option<u32>,
    current: CounterSample,
    previous: Option<CounterSample>,
    samples: u64,
}

impl NetworkInterfaceInstance {
    fn from_record(record: &NetworkInterfaceRecord) -> Self {
        Self {
            name: record.name.clone(),
            is_up: record.is_up.unwrap_or(false),
            is_running: record.is_running.unwrap_or(false),
            ipv4_address: record.ipv4_address.clone(),
            mac_address: record.mac_address.clone(),
            mtu: record.mtu,
            speed_mbps: record.speed_mbps,
            current: CounterSample {
                counters: record.counters.unwrap_or_default(),
                at: record.sampled_at,
            },
            previous: None,
            samples: 1,
        }
    }

    fn apply(&mut self, record: &NetworkInterfaceRecord) -> Result<()> {
        if record.name != self.name {
            return Err(Error::InstanceUpdate {
                id: self.name.clone(),
                reason: format!("record belongs to {}", record.name),
            });
        }
        let Some(counters) = record.counters else {
            return Err(Error::InstanceUpdate {
                id: self.name.clone(),
                reason: "interface statistics unavailable".to_string(),
            });
        };
        if let Some(up) = record.is_up {
            self.is_up = up;
        }
        if let Some(running) = record.is_running {
            self.is_running = running;
        }
        self.ipv4_address = record.ipv4_address.clone();
        self.mac_address = record.mac_address.clone();
        self.mtu = record.mtu;
        self.speed_mbps = record.speed_mbps;
        self.previous = Some(self.current);
        self.current = CounterSample {
            counters,
            at: record.sampled_at,
        };
        self.samples += 1;
        Ok(())
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interface is up
    pub fn is_up(&self) -> bool {
        self.is_up
    }

    /// Interface is running
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Check if interface is active (up and running)
    pub fn is_active(&self) -> bool {
        self.is_up && self.is_running
    }

    /// IPv4 address
    pub fn ipv4_address(&self) -> Option<&str> {
        self.ipv4_address.as_deref()
    }

    /// MAC address
    pub fn mac_address(&self) -> Option<&str> {
        self.mac_address.as_deref()
    }

    /// Maximum Transmission Unit
    pub fn mtu(&self) -> Option<u32> {
        self.mtu
    }

    /// Link speed in Mbps
    pub fn speed_mbps(&self) -> Option<u32> {
        self.speed_mbps
    }

    /// Latest counters
    pub fn counters(&self) -> &InterfaceCounters {
        &self.current.counters
    }

    /// Number of samples folded into this instance since it was created
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Receive/transmit rates in bytes per second between the last two samples.
    ///
    /// `None` until a second sample exists or when no time has elapsed.
    /// Counter resets yield a rate of zero rather than a wrapped value.
    pub fn bandwidth_rate(&self) -> Option<(f64, f64)> {
        let prev = self.previous?;
        let elapsed = self
            .current
            .at
            .checked_duration_since(prev.at)?
            .as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let rx = self
            .current
            .counters
            .rx_bytes
            .saturating_sub(prev.counters.rx_bytes) as f64;
        let tx = self
            .current
            .counters
            .tx_bytes
            .saturating_sub(prev.counters.tx_bytes) as f64;
        Some((rx / elapsed, tx / elapsed))
    }
}

/// Admission policy for newly observed interfaces
#[derive(Debug, Clone)]
pub struct NetworkFilter {
    /// IPv4 address prefixes that are never admitted
    pub excluded_address_prefixes: Vec<String>,
}

impl NetworkFilter {
    /// Whether a newly observed interface should be tracked
    pub fn accepts(&self, record: &NetworkInterfaceRecord) -> bool {
        if !record.is_state_known() || record.counters.is_none() {
            return false;
        }
        match &record.ipv4_address {
            Some(addr) => !self
                .excluded_address_prefixes
                .iter()
                .any(|prefix| addr.starts_with(prefix.as_str())),
            None => true,
        }
    }
}

impl Default for NetworkFilter {
    fn default() -> Self {
        Self::from(&NetworkConfig::default())
    }
}

impl From<&NetworkConfig> for NetworkFilter {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            excluded_address_prefixes: config.excluded_address_prefixes.clone(),
        }
    }
}

/// Probe wrapper that drops interfaces which are neither up nor running.
///
/// Applied to the snapshot itself, so a tracked interface that goes down
/// leaves the set on the next full synchronization.
#[derive(Debug, Clone)]
pub struct RunningInterfaces<P> {
    inner: P,
    include_non_running: bool,
}

impl<P> RunningInterfaces<P> {
    /// Wrap `inner`; with `include_non_running` every record passes through
    pub fn new(inner: P, include_non_running: bool) -> Self {
        Self {
            inner,
            include_non_running,
        }
    }

    /// Wrapped probe
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P> ResourceProbe for RunningInterfaces<P>
where
    P: ResourceProbe<Record = NetworkInterfaceRecord>,
{
    type Record = NetworkInterfaceRecord;

    fn probe(&self) -> Result<Vec<NetworkInterfaceRecord>> {
        let mut records = self.inner.probe()?;
        if !self.include_non_running {
            records.retain(|r| !r.is_down());
        }
        Ok(records)
    }
}

/// Network interface adapter for the enumeration engine
#[derive(Debug, Clone, Default)]
pub struct NetworkInterfaceAdapter {
    filter: NetworkFilter,
}

impl NetworkInterfaceAdapter {
    /// Create an adapter with the given admission policy
    pub fn new(filter: NetworkFilter) -> Self {
        Self { filter }
    }

    /// Admission policy
    pub fn filter(&self) -> &NetworkFilter {
        &self.filter
    }
}

impl EnumerationAdapter for NetworkInterfaceAdapter {
    type Record = NetworkInterfaceRecord;
    type Instance = NetworkInterfaceInstance;

    fn identity(&self, record: &NetworkInterfaceRecord) -> String {
        record.name.clone()
    }

    fn accept(&self, record: &NetworkInterfaceRecord) -> bool {
        self.filter.accepts(record)
    }

    fn create(&self, record: &NetworkInterfaceRecord) -> NetworkInterfaceInstance {
        NetworkInterfaceInstance::from_record(record)
    }

    fn refresh(
        &self,
        instance: &mut NetworkInterfaceInstance,
        record: &NetworkInterfaceRecord,
    ) -> Result<()> {
        instance.apply(record)
    }
}

/// Boxed probe producing interface records
pub type NetworkProbe = Box<dyn ResourceProbe<Record = NetworkInterfaceRecord>>;

/// Network interface enumeration over any interface probe
pub type NetworkInterfaceEnumeration<P = NetworkProbe> =
    EntityEnumeration<NetworkInterfaceAdapter, P>;

impl NetworkInterfaceEnumeration<NetworkProbe> {
    /// Enumeration backed by the platform's interface probe
    pub fn system(config: &NetworkConfig) -> Self {
        let probe = RunningInterfaces::new(system_probe(config), config.include_non_running);
        EntityEnumeration::new(NetworkInterfaceAdapter::new(config.into()), Box::new(probe))
    }
}

#[cfg(target_os = "linux")]
fn system_probe(config: &NetworkConfig) -> NetworkProbe {
    Box::new(linux::SysfsNetworkProbe::new(&config.sysfs_root))
}

#[cfg(not(target_os = "linux"))]
fn system_probe(_config: &NetworkConfig) -> NetworkProbe {
    Box::new(UnsupportedProbe)
}

#[cfg(not(target_os = "linux"))]
struct UnsupportedProbe;

#[cfg(not(target_os = "linux"))]
impl ResourceProbe for UnsupportedProbe {
    type Record = NetworkInterfaceRecord;

    fn probe(&self) -> Result<Vec<NetworkInterfaceRecord>> {
        Err(Error::UnsupportedPlatform(
            "network interface discovery is only implemented for Linux".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Duration;

    fn iface(name: &str, up: bool, running: bool, addr: Option<&str>) -> NetworkInterfaceRecord {
        NetworkInterfaceRecord {
            is_up: Some(up),
            is_running: Some(running),
            ipv4_address: addr.map(str::to_string),
            counters: Some(InterfaceCounters::default()),
            ..NetworkInterfaceRecord::new(name)
        }
    }

    struct ScriptedProbe(RefCell<Vec<NetworkInterfaceRecord>>);

    impl ResourceProbe for ScriptedProbe {
        type Record = NetworkInterfaceRecord;

        fn probe(&self) -> Result<Vec<NetworkInterfaceRecord>> {
            Ok(self.0.borrow().clone())
        }
    }

    fn running_only(
        records: Vec<NetworkInterfaceRecord>,
        include_non_running: bool,
    ) -> NetworkInterfaceEnumeration<RunningInterfaces<ScriptedProbe>> {
        EntityEnumeration::new(
            NetworkInterfaceAdapter::default(),
            RunningInterfaces::new(ScriptedProbe(RefCell::new(records)), include_non_running),
        )
    }

    #[test]
    fn test_filter_rejects_loopback_and_unknown_state() {
        let filter = NetworkFilter::default();
        assert!(filter.accepts(&iface("eth0", true, true, Some("10.0.0.2"))));
        assert!(filter.accepts(&iface("eth1", true, false, None)));
        assert!(!filter.accepts(&iface("lo", true, true, Some("127.0.0.1"))));
        assert!(!filter.accepts(&NetworkInterfaceRecord::new("tun0")));

        let mut half_known = iface("eth2", true, true, None);
        half_known.is_running = None;
        assert!(!filter.accepts(&half_known));

        let mut no_stats = iface("eth3", true, true, None);
        no_stats.counters = None;
        assert!(!filter.accepts(&no_stats));
    }

    #[test]
    fn test_filter_custom_prefixes() {
        let filter = NetworkFilter {
            excluded_address_prefixes: vec!["169.254.".to_string()],
        };
        assert!(!filter.accepts(&iface("eth0", true, true, Some("169.254.1.1"))));
        assert!(filter.accepts(&iface("lo", true, true, Some("127.0.0.1"))));
    }

    #[test]
    fn test_down_interfaces_left_out_of_snapshot() {
        let records = vec![
            iface("eth0", true, true, None),
            iface("eth1", false, false, None),
            iface("eth2", false, true, None),
            NetworkInterfaceRecord::new("tun0"),
        ];

        let probe = RunningInterfaces::new(ScriptedProbe(RefCell::new(records.clone())), false);
        let names: Vec<String> = probe.probe().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["eth0", "eth2", "tun0"]);

        let probe = RunningInterfaces::new(ScriptedProbe(RefCell::new(records)), true);
        assert_eq!(probe.probe().unwrap().len(), 4);
    }

    #[test]
    fn test_interface_going_down_is_removed() {
        let mut e = running_only(vec![iface("eth0", true, true, None)], false);
        e.init().unwrap();
        assert!(e.contains("eth0"));

        *e.probe().inner().0.borrow_mut() = vec![iface("eth0", false, false, None)];
        let summary = e.update(false).unwrap();
        assert_eq!(summary.removed, 1);
        assert!(e.is_empty());

        // Same membership as a fresh enumeration over that snapshot
        let mut fresh = running_only(vec![iface("eth0", false, false, None)], false);
        fresh.init().unwrap();
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_interface_going_down_is_kept_when_non_running_included() {
        let mut e = running_only(vec![iface("eth0", true, true, None)], true);
        e.init().unwrap();

        *e.probe().inner().0.borrow_mut() = vec![iface("eth0", false, false, None)];
        let summary = e.update(false).unwrap();
        assert_eq!((summary.removed, summary.updated), (0, 1));
        assert!(!e.get_by_id("eth0").unwrap().is_up());
    }

    #[test]
    fn test_bandwidth_rate_survives_sync() {
        let start = Instant::now();
        let mut first = iface("eth0", true, true, None);
        first.counters = Some(InterfaceCounters {
            rx_bytes: 1_000,
            tx_bytes: 500,
            ..InterfaceCounters::default()
        });
        first.sampled_at = start;

        let probe = ScriptedProbe(RefCell::new(vec![first.clone()]));
        let mut e = EntityEnumeration::new(NetworkInterfaceAdapter::default(), probe);
        e.init().unwrap();
        assert_eq!(e.get_by_id("eth0").unwrap().bandwidth_rate(), None);

        let mut second = first.clone();
        second.counters = Some(InterfaceCounters {
            rx_bytes: 3_000,
            tx_bytes: 400,
            ..InterfaceCounters::default()
        });
        second.sampled_at = start + Duration::from_secs(2);
        *e.probe().0.borrow_mut() = vec![second, iface("lo", true, true, Some("127.0.0.1"))];

        let summary = e.update(false).unwrap();
        assert_eq!(summary.rejected, 1);
        let eth0 = e.get_by_id("eth0").unwrap();
        assert_eq!(eth0.samples(), 2);
        let (rx, tx) = eth0.bandwidth_rate().unwrap();
        assert!((rx - 1_000.0).abs() < 1e-9);
        assert_eq!(tx, 0.0);
    }

    #[test]
    fn test_unreadable_statistics_keep_instance_and_history() {
        let start = Instant::now();
        let mut first = iface("eth0", true, true, None);
        first.counters = Some(InterfaceCounters {
            rx_bytes: 100,
            ..InterfaceCounters::default()
        });
        first.sampled_at = start;

        let probe = ScriptedProbe(RefCell::new(vec![first.clone()]));
        let mut e = EntityEnumeration::new(NetworkInterfaceAdapter::default(), probe);
        e.init().unwrap();
        let before = e.get_by_id("eth0").unwrap() as *const NetworkInterfaceInstance;

        let mut broken = first.clone();
        broken.counters = None;
        *e.probe().0.borrow_mut() = vec![broken];
        let summary = e.update(false).unwrap();
        assert_eq!((summary.removed, summary.failed), (0, 1));
        let eth0 = e.get_by_id("eth0").unwrap();
        assert_eq!(eth0 as *const NetworkInterfaceInstance, before);
        assert_eq!(eth0.samples(), 1);
        assert_eq!(eth0.counters().rx_bytes, 100);
    }

    #[test]
    fn test_refresh_keeps_last_known_state() {
        let mut inst = NetworkInterfaceInstance::from_record(&iface("eth0", true, true, None));
        let mut record = iface("eth0", true, true, None);
        record.is_up = None;
        record.is_running = Some(false);
        inst.apply(&record).unwrap();
        assert!(inst.is_up());
        assert!(!inst.is_running());

        let err = inst.apply(&iface("eth1", true, true, None));
        assert!(matches!(err, Err(Error::InstanceUpdate { .. })));
    }

    #[test]
    fn test_counter_totals_saturate() {
        let counters = InterfaceCounters {
            rx_errors: u64::MAX,
            tx_errors: 1,
            rx_drops: 2,
            tx_drops: u64::MAX,
            ..InterfaceCounters::default()
        };
        assert_eq!(counters.total_errors(), u64::MAX);
        assert_eq!(counters.total_drops(), u64::MAX);
    }
}
