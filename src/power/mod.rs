//! Storage device power state decoding
//!
//! Queries a block device for its power condition and normalizes the answer
//! to an [`AvailabilityState`]. ATA devices are asked with CHECK POWER MODE,
//! SCSI devices with a power condition sense request. Commands travel over a
//! [`DeviceCommandChannel`]; on Linux that is [`linux::LinuxDeviceChannel`].
//!
//! Every query opens the device, issues its commands and closes the handle
//! again, even when decoding fails.
//!
//! # Examples
//!
//! ```no_run
//! use hostpal::power::{CommandProtocol, PowerStateDecoder};
//! use std::path::Path;
//!
//! # #[cfg(target_os = "linux")]
//! # fn main() {
//! let decoder = PowerStateDecoder::system(Default::default());
//! let reading = decoder.availability(Path::new("/dev/sda"), CommandProtocol::Ata);
//! if reading.success() {
//!     println!("sda: {}", reading.state());
//! }
//! # }
//! # #[cfg(not(target_os = "linux"))]
//! # fn main() {}
//! ```

pub mod ata;
pub mod channel;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod scsi;
#[cfg(test)]
mod testing;
pub mod types;

pub use channel::{CommandResponse, DeviceCommand, DeviceCommandChannel};
pub use scsi::InquiryData;
pub use types::{AvailabilityState, DecodeError, PowerReading};

use crate::config::PowerConfig;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Command set used to talk to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandProtocol {
    /// ATA drive commands
    Ata,
    /// SCSI commands
    Scsi,
}

/// Decodes device power states over a command channel
pub struct PowerStateDecoder<C> {
    channel: C,
    config: PowerConfig,
}

#[cfg(target_os = "linux")]
impl PowerStateDecoder<linux::LinuxDeviceChannel> {
    /// Decoder using the Linux ioctl channel
    pub fn system(config: PowerConfig) -> Self {
        Self::new(linux::LinuxDeviceChannel::new(), config)
    }
}

impl<C: DeviceCommandChannel> PowerStateDecoder<C> {
    /// Decoder sending commands over `channel`
    pub fn new(channel: C, config: PowerConfig) -> Self {
        Self { channel, config }
    }

    /// Command channel
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Command parameters
    pub fn config(&self) -> &PowerConfig {
        &self.config
    }

    /// Power state of the device at `path`
    pub fn availability(&self, path: &Path, protocol: CommandProtocol) -> PowerReading {
        self.with_device(path, |channel, handle| {
            let reading = match protocol {
                CommandProtocol::Ata => ata::check_power_mode(channel, handle),
                CommandProtocol::Scsi => scsi::check_power_condition(channel, handle, &self.config),
            };
            Ok(reading)
        })
        .unwrap_or_else(PowerReading::failed)
    }

    /// Standard INQUIRY identification of the device at `path`
    pub fn inquiry(&self, path: &Path) -> Result<InquiryData, DecodeError> {
        self.with_device(path, |channel, handle| {
            scsi::inquiry(channel, handle, &self.config)
        })
    }

    /// Unit serial number of the device at `path`
    pub fn serial_number(&self, path: &Path) -> Result<String, DecodeError> {
        self.with_device(path, |channel, handle| {
            scsi::unit_serial_number(channel, handle, &self.config)
        })
    }

    fn with_device<T>(
        &self,
        path: &Path,
        query: impl FnOnce(&C, &mut C::Handle) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        let mut handle = match self.channel.open(path) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to open {}: {}", path.display(), e);
                return Err(DecodeError::DeviceOpen(format!("{}: {}", path.display(), e)));
            }
        };

        let result = query(&self.channel, &mut handle);

        if let Err(e) = self.channel.close(handle) {
            debug!("Failed to close {}: {}", path.display(), e);
        }
        result
    }
}
