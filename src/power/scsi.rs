//! SCSI INQUIRY / power condition decoding
//!
//! Three 6-byte commands are issued through the channel, all reading from the
//! device:
//! - standard INQUIRY (vendor, product, revision, removable bit)
//! - INQUIRY of the unit serial number VPD page (0x80)
//! - the power condition request, which reuses the INQUIRY layout with the
//!   opcode switched to REQUEST SENSE and returns fixed-format sense data
//!
//! Every read from a response goes through a bounds check; a short buffer
//! yields [`DecodeError::MalformedResponse`].

use super::channel::{CommandBlock, CommandResponse, DeviceCommand, DeviceCommandChannel};
use super::types::{AvailabilityState, DecodeError, PowerReading};
use crate::config::PowerConfig;
use log::debug;
use serde::{Deserialize, Serialize};

/// INQUIRY opcode
pub const INQUIRY: u8 = 0x12;
/// REQUEST SENSE opcode
pub const REQUEST_SENSE: u8 = 0x03;
/// Unit serial number VPD page
pub const VPD_UNIT_SERIAL_NUMBER: u8 = 0x80;

/// Sense keys
pub mod sense_key {
    /// No sense
    pub const NO_SENSE: u8 = 0x00;
    /// Command completed with recovery action
    pub const RECOVERED_ERROR: u8 = 0x01;
}

// Fixed-format sense data offsets
const SENSE_KEY_OFFSET: usize = 2;
const ASC_OFFSET: usize = 12;
const ASCQ_OFFSET: usize = 13;

/// Response code bit set for descriptor-format sense data (72h/73h)
const DESCRIPTOR_FORMAT_BIT: u8 = 0x02;

/// Page requested by a 6-byte command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScsiPage {
    /// Standard INQUIRY data
    Standard,
    /// Unit serial number VPD page
    UnitSerialNumber,
    /// Power condition (REQUEST SENSE)
    PowerCondition,
}

/// Build the 6-byte command block for `page` with the given allocation length
pub fn command_block(page: ScsiPage, allocation_len: u16) -> [u8; 6] {
    let [len_hi, len_lo] = allocation_len.to_be_bytes();
    let mut cdb = [INQUIRY, 0, 0, len_hi, len_lo, 0];
    match page {
        ScsiPage::Standard => {}
        ScsiPage::UnitSerialNumber => {
            cdb[1] |= 0x01; // EVPD
            cdb[2] = VPD_UNIT_SERIAL_NUMBER;
        }
        ScsiPage::PowerCondition => cdb[0] = REQUEST_SENSE,
    }
    cdb
}

/// Channel command for `page`
pub fn command(page: ScsiPage, config: &PowerConfig) -> DeviceCommand {
    let allocation_len = u16::try_from(config.response_buffer_len).unwrap_or(u16::MAX);
    DeviceCommand {
        block: CommandBlock::Scsi {
            cdb: command_block(page, allocation_len).to_vec(),
            sense_len: config.sense_buffer_len,
        },
        response_len: usize::from(allocation_len),
        timeout: config.scsi_timeout(),
    }
}

/// Sense key from a sense buffer.
///
/// Descriptor-format sense keeps it in byte 1, fixed format in byte 2.
pub fn sense_key(sense: &[u8]) -> Option<u8> {
    let response_code = *sense.first()?;
    let offset = if response_code & DESCRIPTOR_FORMAT_BIT != 0 {
        1
    } else {
        2
    };
    sense.get(offset).map(|b| b & 0x0f)
}

/// Validate the call result and the three transport status fields.
///
/// A non-good status still passes when the sense key is RECOVERED ERROR.
pub fn check_status(response: &CommandResponse) -> Result<(), DecodeError> {
    if !response.is_ok() {
        return Err(DecodeError::Channel {
            os_error: response.os_error,
        });
    }
    let Some(status) = response.scsi else {
        return Err(DecodeError::Unsupported(
            "channel reported no SCSI status".to_string(),
        ));
    };
    if status.is_good() {
        return Ok(());
    }
    match sense_key(&response.sense) {
        Some(sense_key::RECOVERED_ERROR) => Ok(()),
        key => Err(DecodeError::CommandStatus {
            status: status.status,
            host_status: status.host_status,
            driver_status: status.driver_status,
            sense_key: key,
        }),
    }
}

fn byte_at(data: &[u8], offset: usize) -> Result<u8, DecodeError> {
    data.get(offset)
        .copied()
        .ok_or(DecodeError::MalformedResponse {
            needed: offset + 1,
            len: data.len(),
        })
}

/// Decode power condition sense data
pub fn decode_power_condition(data: &[u8]) -> Result<AvailabilityState, DecodeError> {
    if byte_at(data, SENSE_KEY_OFFSET)? & 0x0f == sense_key::NO_SENSE {
        return Ok(AvailabilityState::RunningOrFullPower);
    }
    let asc = byte_at(data, ASC_OFFSET)?;
    let ascq = byte_at(data, ASCQ_OFFSET)?;
    match (asc, ascq) {
        // NOT READY: self-test in progress / offline
        (0x04, 0x09) => Ok(AvailabilityState::InTest),
        (0x04, 0x12) => Ok(AvailabilityState::OffLine),
        (0x0B, _) => Ok(AvailabilityState::Warning),
        // LOW POWER CONDITION ON
        (0x5E, 0x00) => Ok(AvailabilityState::PowerSaveLowPowerMode),
        // POWER STATE CHANGE TO ACTIVE / IDLE
        (0x5E, 0x41) | (0x5E, 0x42) => Ok(AvailabilityState::RunningOrFullPower),
        // POWER STATE CHANGE TO STANDBY
        (0x5E, 0x43) => Ok(AvailabilityState::PowerSaveStandby),
        _ => Err(DecodeError::UnknownSenseCondition { asc, ascq }),
    }
}

/// Decode a full power condition response
pub fn decode_power_response(response: &CommandResponse) -> PowerReading {
    check_status(response)
        .and_then(|()| decode_power_condition(&response.data))
        .into()
}

/// Query the SCSI power condition
pub fn check_power_condition<C: DeviceCommandChannel>(
    channel: &C,
    handle: &mut C::Handle,
    config: &PowerConfig,
) -> PowerReading {
    let response = channel.send(handle, &command(ScsiPage::PowerCondition, config));
    let reading = decode_power_response(&response);
    if let Some(e) = reading.error() {
        debug!("SCSI power condition not decoded: {}", e);
    }
    reading
}

/// Standard INQUIRY identification fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryData {
    /// T10 vendor identification
    pub vendor: String,
    /// Product identification
    pub product: String,
    /// Product revision level
    pub revision: String,
    /// Removable medium bit
    pub removable: bool,
}

/// Parse standard INQUIRY data
pub fn parse_inquiry(data: &[u8]) -> Result<InquiryData, DecodeError> {
    let field = |range: std::ops::Range<usize>| -> Result<String, DecodeError> {
        let end = range.end;
        data.get(range)
            .map(ascii_field)
            .ok_or(DecodeError::MalformedResponse {
                needed: end,
                len: data.len(),
            })
    };
    Ok(InquiryData {
        removable: byte_at(data, 1)? & 0x80 != 0,
        vendor: field(8..16)?,
        product: field(16..32)?,
        revision: field(32..36)?,
    })
}

/// Parse the unit serial number VPD page
pub fn parse_unit_serial(data: &[u8]) -> Result<String, DecodeError> {
    let len = usize::from(byte_at(data, 3)?);
    data.get(4..4 + len)
        .map(ascii_field)
        .ok_or(DecodeError::MalformedResponse {
            needed: 4 + len,
            len: data.len(),
        })
}

/// Issue a standard INQUIRY
pub fn inquiry<C: DeviceCommandChannel>(
    channel: &C,
    handle: &mut C::Handle,
    config: &PowerConfig,
) -> Result<InquiryData, DecodeError> {
    let response = channel.send(handle, &command(ScsiPage::Standard, config));
    check_status(&response)?;
    parse_inquiry(&response.data)
}

/// Read the unit serial number
pub fn unit_serial_number<C: DeviceCommandChannel>(
    channel: &C,
    handle: &mut C::Handle,
    config: &PowerConfig,
) -> Result<String, DecodeError> {
    let response = channel.send(handle, &command(ScsiPage::UnitSerialNumber, config));
    check_status(&response)?;
    parse_unit_serial(&response.data)
}

/// Printable ASCII with padding trimmed; other bytes become '.'
fn ascii_field(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0 => ' ',
            b' '..=b'~' => b as char,
            _ => '.',
        })
        .collect::<String>()
        .trim()
        .to_string()
}
