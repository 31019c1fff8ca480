//! # hostpal
//!
//! Host resource enumeration for monitoring agents. hostpal keeps a live,
//! identity-stable set of instances for each kind of host resource and
//! decodes the power state of storage devices.
//!
//! ## Features
//!
//! - **Entity Enumeration**: Generic engine that reconciles a probe snapshot
//!   against tracked instances (create, refresh, remove) across poll cycles
//! - **Network Interfaces**: sysfs counters with receive/transmit rates
//! - **Logical Disks**: Mounted filesystems with usage and removability
//! - **Power States**: ATA CHECK POWER MODE and SCSI power condition decoding
//!
//! ## Quick Start
//!
//! ### Network Interfaces
//!
//! ```no_run
//! use hostpal::config::Config;
//! use hostpal::network::NetworkInterfaceEnumeration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let mut interfaces = NetworkInterfaceEnumeration::system(&config.network);
//! interfaces.init()?;
//!
//! loop {
//!     // Full synchronization picks up added and removed interfaces
//!     let summary = interfaces.update(false)?;
//!     if summary.membership_changed() {
//!         println!("{} interfaces tracked", interfaces.len());
//!     }
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//! }
//! # }
//! ```
//!
//! ### Storage Power State
//!
//! ```no_run
//! use hostpal::power::{CommandProtocol, PowerStateDecoder};
//! use std::path::Path;
//!
//! # #[cfg(target_os = "linux")]
//! # fn main() {
//! let decoder = PowerStateDecoder::system(Default::default());
//! let reading = decoder.availability(Path::new("/dev/sda"), CommandProtocol::Scsi);
//! println!("sda: {}", reading.state());
//! # }
//! # #[cfg(not(target_os = "linux"))]
//! # fn main() {}
//! ```
//!
//! ## Platform Support
//!
//! | Resource | Linux | Other |
//! |----------|-------|-------|
//! | Network interfaces | sysfs + getifaddrs | probe reports unsupported |
//! | Logical disks | /proc/mounts + statvfs | probe reports unsupported |
//! | Power states | HDIO_DRIVE_CMD / SG_IO | bring your own channel |

pub mod config; // Configuration management with TOML persistence
pub mod enumeration; // Generic entity enumeration engine
pub mod error;
pub mod logical_disk; // Mounted filesystem enumeration
pub mod network; // Network interface enumeration
pub mod power; // Storage device power state decoding

// Re-export main types
pub use config::{Config, LogicalDiskConfig, NetworkConfig, PowerConfig};
pub use enumeration::{EntityEnumeration, EnumerationAdapter, ResourceProbe, SyncSummary};
pub use error::{Error, Result};

// Re-export resource enumerations
pub use logical_disk::{LogicalDiskEnumeration, LogicalDiskInstance, LogicalDiskRecord};
pub use network::{
    NetworkInterfaceEnumeration, NetworkInterfaceInstance, NetworkInterfaceRecord,
    RunningInterfaces,
};

// Re-export power state decoding
pub use power::{AvailabilityState, CommandProtocol, PowerReading, PowerStateDecoder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
