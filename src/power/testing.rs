//! Scripted command channel for decoder tests

use super::channel::{CommandResponse, DeviceCommand, DeviceCommandChannel, ScsiStatus};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::Path;

/// Replays queued responses and records every command sent
#[derive(Default)]
pub struct ScriptedChannel {
    responses: RefCell<VecDeque<CommandResponse>>,
    pub sent: RefCell<Vec<DeviceCommand>>,
    pub fail_open: bool,
    pub closed: RefCell<usize>,
}

impl ScriptedChannel {
    pub fn with(responses: Vec<CommandResponse>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }
}

impl DeviceCommandChannel for ScriptedChannel {
    type Handle = ();

    fn open(&self, path: &Path) -> io::Result<()> {
        if self.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} denied", path.display()),
            ));
        }
        Ok(())
    }

    fn send(&self, _handle: &mut (), command: &DeviceCommand) -> CommandResponse {
        self.sent.borrow_mut().push(command.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| CommandResponse::os_failure(19))
    }

    fn close(&self, _handle: ()) -> io::Result<()> {
        *self.closed.borrow_mut() += 1;
        Ok(())
    }
}

/// Successful ATA drive command returning `args`
pub fn ata_ok(args: [u8; 4]) -> CommandResponse {
    CommandResponse {
        status: 0,
        data: args.to_vec(),
        ..CommandResponse::default()
    }
}

/// Failed ATA drive command with `os_error`, returning `args`
pub fn ata_err(os_error: i32, args: [u8; 4]) -> CommandResponse {
    CommandResponse {
        status: -1,
        data: args.to_vec(),
        os_error,
        ..CommandResponse::default()
    }
}

/// Completed SCSI command with the given transport status
pub fn scsi(status: ScsiStatus, data: Vec<u8>, sense: Vec<u8>) -> CommandResponse {
    CommandResponse {
        status: 0,
        data,
        sense,
        scsi: Some(status),
        os_error: 0,
    }
}

/// Fixed-format sense data with the given key/ASC/ASCQ
pub fn fixed_sense(key: u8, asc: u8, ascq: u8) -> Vec<u8> {
    let mut data = vec![0u8; 18];
    data[0] = 0x70;
    data[2] = key;
    data[7] = 10;
    data[12] = asc;
    data[13] = ascq;
    data
}
