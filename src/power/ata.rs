//! ATA CHECK POWER MODE decoding
//!
//! The device reports its power mode in the sector count register of the
//! returned argument block (byte 2). Some devices in standby fail the command
//! with EIO and zeroed status/error bytes instead of returning a mode.

use super::channel::{CommandBlock, CommandResponse, DeviceCommand, DeviceCommandChannel};
use super::types::{AvailabilityState, DecodeError, PowerReading};
use log::debug;
use std::time::Duration;

/// CHECK POWER MODE
pub const WIN_CHECKPOWERMODE1: u8 = 0xE5;
/// CHECK POWER MODE (retired opcode, still answered by older drives)
pub const WIN_CHECKPOWERMODE2: u8 = 0x98;

/// Power mode codes returned in the sector count register
pub mod power_mode {
    /// Sentinel: no mode was obtained
    pub const UNSET: u8 = 0xF0;
    /// Standby
    pub const STANDBY: u8 = 0x00;
    /// NV cache power mode, spindle spun or spinning down
    pub const SPINDOWN: u8 = 0x40;
    /// NV cache power mode, spindle spun or spinning up
    pub const SPINUP: u8 = 0x41;
    /// Idle
    pub const IDLE: u8 = 0x80;
    /// Active or idle
    pub const ACTIVE: u8 = 0xFF;
}

/// POSIX EIO
const EIO: i32 = 5;

/// Offset of the sector count register in the returned block
const NSECTOR_OFFSET: usize = 2;

/// Not honored by HDIO_DRIVE_CMD, which has no caller-settable timeout
const ATA_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a CHECK POWER MODE drive command for `opcode`
pub fn check_power_mode_command(opcode: u8) -> DeviceCommand {
    DeviceCommand {
        block: CommandBlock::AtaDrive([opcode, 0, 0, 0]),
        response_len: 4,
        timeout: ATA_COMMAND_TIMEOUT,
    }
}

/// Extract the power mode byte from a drive command response.
///
/// Returns [`power_mode::UNSET`] when the response carries no usable mode.
pub fn mode_byte(response: &CommandResponse) -> u8 {
    if response.is_ok() {
        return response
            .data
            .get(NSECTOR_OFFSET)
            .copied()
            .unwrap_or(power_mode::UNSET);
    }
    match (response.data.first(), response.data.get(1)) {
        (Some(&0), Some(&0)) if response.os_error == EIO => power_mode::STANDBY,
        _ => power_mode::UNSET,
    }
}

/// Map a power mode byte to an availability state
pub fn decode_power_mode(mode: u8) -> AvailabilityState {
    match mode {
        power_mode::STANDBY => AvailabilityState::PowerSaveStandby,
        power_mode::SPINDOWN | power_mode::SPINUP => AvailabilityState::PowerSaveLowPowerMode,
        power_mode::IDLE | power_mode::ACTIVE => AvailabilityState::RunningOrFullPower,
        _ => AvailabilityState::Unknown,
    }
}

/// Query the ATA power mode, falling back to the second opcode when the
/// first yields no mode byte.
pub fn check_power_mode<C: DeviceCommandChannel>(
    channel: &C,
    handle: &mut C::Handle,
) -> PowerReading {
    let mut failure = None;
    let mut mode = power_mode::UNSET;

    for opcode in [WIN_CHECKPOWERMODE1, WIN_CHECKPOWERMODE2] {
        let response = channel.send(handle, &check_power_mode_command(opcode));
        mode = mode_byte(&response);
        if mode != power_mode::UNSET {
            break;
        }
        debug!(
            "CHECK POWER MODE {:#04x} gave no mode (status {}, errno {})",
            opcode, response.status, response.os_error
        );
        failure = Some(if !response.is_ok() {
            DecodeError::Channel {
                os_error: response.os_error,
            }
        } else if response.data.len() <= NSECTOR_OFFSET {
            DecodeError::MalformedResponse {
                needed: NSECTOR_OFFSET + 1,
                len: response.data.len(),
            }
        } else {
            DecodeError::UnknownPowerMode(mode)
        });
    }

    match decode_power_mode(mode) {
        AvailabilityState::Unknown => PowerReading::failed(
            failure
                .filter(|_| mode == power_mode::UNSET)
                .unwrap_or(DecodeError::UnknownPowerMode(mode)),
        ),
        state => PowerReading::decoded(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::testing::{ata_err, ata_ok, ScriptedChannel};

    fn run(channel: &ScriptedChannel) -> PowerReading {
        check_power_mode(channel, &mut ())
    }

    fn opcodes(channel: &ScriptedChannel) -> Vec<u8> {
        channel
            .sent
            .borrow()
            .iter()
            .map(|c| match c.block {
                CommandBlock::AtaDrive(args) => args[0],
                _ => panic!("unexpected command"),
            })
            .collect()
    }

    #[test]
    fn test_standby_from_first_opcode() {
        let channel = ScriptedChannel::with(vec![ata_ok([0x50, 0, 0x00, 0])]);
        let reading = run(&channel);
        assert!(reading.success());
        assert_eq!(reading.state(), AvailabilityState::PowerSaveStandby);
        assert_eq!(opcodes(&channel), vec![WIN_CHECKPOWERMODE1]);
    }

    #[test]
    fn test_mode_table() {
        assert_eq!(decode_power_mode(0x40), AvailabilityState::PowerSaveLowPowerMode);
        assert_eq!(decode_power_mode(0x41), AvailabilityState::PowerSaveLowPowerMode);
        assert_eq!(decode_power_mode(0x80), AvailabilityState::RunningOrFullPower);
        assert_eq!(decode_power_mode(0xFF), AvailabilityState::RunningOrFullPower);
        assert_eq!(decode_power_mode(power_mode::UNSET), AvailabilityState::Unknown);
        assert_eq!(decode_power_mode(0x01), AvailabilityState::Unknown);
    }

    #[test]
    fn test_falls_back_to_second_opcode() {
        let channel = ScriptedChannel::with(vec![
            ata_err(22, [WIN_CHECKPOWERMODE1, 0, 0, 0]),
            ata_ok([0x50, 0, 0xFF, 0]),
        ]);
        let reading = run(&channel);
        assert!(reading.success());
        assert_eq!(reading.state(), AvailabilityState::RunningOrFullPower);
        assert_eq!(
            opcodes(&channel),
            vec![WIN_CHECKPOWERMODE1, WIN_CHECKPOWERMODE2]
        );
    }

    #[test]
    fn test_eio_with_zero_status_is_standby() {
        let channel = ScriptedChannel::with(vec![ata_err(EIO, [0, 0, 0x80, 0])]);
        let reading = run(&channel);
        assert!(reading.success());
        assert_eq!(reading.state(), AvailabilityState::PowerSaveStandby);
        assert_eq!(channel.sent.borrow().len(), 1);
    }

    #[test]
    fn test_eio_with_nonzero_status_is_not_standby() {
        let channel = ScriptedChannel::with(vec![
            ata_err(EIO, [0x51, 0x04, 0, 0]),
            ata_err(EIO, [0x51, 0x04, 0, 0]),
        ]);
        let reading = run(&channel);
        assert!(!reading.success());
        assert_eq!(reading.state(), AvailabilityState::Unknown);
        assert_eq!(reading.error(), Some(&DecodeError::Channel { os_error: EIO }));
    }

    #[test]
    fn test_unrecognized_mode_does_not_retry() {
        let channel = ScriptedChannel::with(vec![ata_ok([0x50, 0, 0x01, 0])]);
        let reading = run(&channel);
        assert!(!reading.success());
        assert_eq!(reading.error(), Some(&DecodeError::UnknownPowerMode(0x01)));
        assert_eq!(channel.sent.borrow().len(), 1);
    }

    #[test]
    fn test_short_response_is_malformed() {
        let short = CommandResponse {
            status: 0,
            data: vec![0x50, 0],
            ..CommandResponse::default()
        };
        let channel = ScriptedChannel::with(vec![short.clone(), short]);
        let reading = run(&channel);
        assert!(!reading.success());
        assert_eq!(
            reading.error(),
            Some(&DecodeError::MalformedResponse { needed: 3, len: 2 })
        );
    }
}
