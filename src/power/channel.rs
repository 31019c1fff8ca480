//! Device command channel abstraction
//!
//! The decoders only depend on this contract: open a device, send a
//! fixed-format command block, get back the raw status, response bytes and
//! OS error code. How the command reaches the device (ioctl or otherwise) is
//! up to the implementation.

use std::io;
use std::path::Path;
use std::time::Duration;

/// Fixed-format command blocks understood by a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandBlock {
    /// ATA drive command argument block: `[command, sector, feature, nsector]`.
    /// The device returns `[status, error, nsector, ...]` in the same block.
    AtaDrive([u8; 4]),
    /// SCSI command descriptor block; data flows from the device
    Scsi {
        /// Command descriptor block
        cdb: Vec<u8>,
        /// Sense buffer length in bytes
        sense_len: usize,
    },
}

/// One command to send through a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    /// Command block
    pub block: CommandBlock,
    /// Expected response length in bytes
    pub response_len: usize,
    /// Channel-imposed timeout
    pub timeout: Duration,
}

/// SCSI transport status fields reported with a response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScsiStatus {
    /// SCSI status byte
    pub status: u8,
    /// Host adapter status
    pub host_status: u16,
    /// Driver status
    pub driver_status: u16,
}

impl ScsiStatus {
    /// All three independent status fields report success
    pub fn is_good(&self) -> bool {
        self.status == 0 && self.host_status == 0 && self.driver_status == 0
    }
}

/// Raw outcome of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResponse {
    /// Return value of the underlying call (negative on failure)
    pub status: i32,
    /// Response bytes (for ATA drive commands, the returned argument block)
    pub data: Vec<u8>,
    /// Sense buffer (SCSI only)
    pub sense: Vec<u8>,
    /// Transport status (SCSI only)
    pub scsi: Option<ScsiStatus>,
    /// OS error code, 0 when the call succeeded
    pub os_error: i32,
}

impl CommandResponse {
    /// The call itself succeeded
    pub fn is_ok(&self) -> bool {
        self.status >= 0 && self.os_error == 0
    }

    /// Failed call carrying an OS error code
    pub fn os_failure(os_error: i32) -> Self {
        Self {
            status: -1,
            os_error,
            ..Self::default()
        }
    }
}

/// Blocking, single-shot command channel to a device
pub trait DeviceCommandChannel {
    /// Open device handle
    type Handle;

    /// Open a device for command submission
    fn open(&self, path: &Path) -> io::Result<Self::Handle>;

    /// Send one command and wait for its completion or timeout
    fn send(&self, handle: &mut Self::Handle, command: &DeviceCommand) -> CommandResponse;

    /// Release a device handle
    fn close(&self, handle: Self::Handle) -> io::Result<()> {
        drop(handle);
        Ok(())
    }
}

impl<C: DeviceCommandChannel + ?Sized> DeviceCommandChannel for &C {
    type Handle = C::Handle;

    fn open(&self, path: &Path) -> io::Result<Self::Handle> {
        (**self).open(path)
    }

    fn send(&self, handle: &mut Self::Handle, command: &DeviceCommand) -> CommandResponse {
        (**self).send(handle, command)
    }

    fn close(&self, handle: Self::Handle) -> io::Result<()> {
        (**self).close(handle)
    }
}
