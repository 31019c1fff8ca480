//! Decoded power state types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized power/operational condition of a storage device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvailabilityState {
    /// State could not be determined
    #[default]
    Unknown,
    /// Active or idle
    RunningOrFullPower,
    /// Standby
    #[serde(rename = "PowerSave_Standby")]
    PowerSaveStandby,
    /// Low power condition (NV cache power mode with spindle down/up)
    #[serde(rename = "PowerSave_LowPowerMode")]
    PowerSaveLowPowerMode,
    /// Self-test in progress
    InTest,
    /// Device is offline
    OffLine,
    /// Device reported a warning condition
    Warning,
}

impl AvailabilityState {
    /// Name used when reporting the state
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::Unknown => "Unknown",
            AvailabilityState::RunningOrFullPower => "RunningOrFullPower",
            AvailabilityState::PowerSaveStandby => "PowerSave_Standby",
            AvailabilityState::PowerSaveLowPowerMode => "PowerSave_LowPowerMode",
            AvailabilityState::InTest => "InTest",
            AvailabilityState::OffLine => "OffLine",
            AvailabilityState::Warning => "Warning",
        }
    }
}

impl fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a decode produced no usable state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Failed to open device: {0}")]
    DeviceOpen(String),

    #[error("Device command failed (OS error {os_error})")]
    Channel { os_error: i32 },

    #[error(
        "Command status not good (status {status:#04x}, host {host_status:#06x}, driver {driver_status:#06x}, sense key {sense_key:?})"
    )]
    CommandStatus {
        status: u8,
        host_status: u16,
        driver_status: u16,
        sense_key: Option<u8>,
    },

    #[error("Response too short: need {needed} bytes, got {len}")]
    MalformedResponse { needed: usize, len: usize },

    #[error("Unrecognized ATA power mode {0:#04x}")]
    UnknownPowerMode(u8),

    #[error("Unrecognized sense condition ASC {asc:#04x} ASCQ {ascq:#04x}")]
    UnknownSenseCondition { asc: u8, ascq: u8 },

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Result of one power state decode.
///
/// A failed decode always carries [`AvailabilityState::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerReading {
    state: AvailabilityState,
    error: Option<DecodeError>,
}

impl PowerReading {
    /// Successfully decoded state
    pub fn decoded(state: AvailabilityState) -> Self {
        Self { state, error: None }
    }

    /// Failed decode
    pub fn failed(error: DecodeError) -> Self {
        Self {
            state: AvailabilityState::Unknown,
            error: Some(error),
        }
    }

    /// Decoded state, `Unknown` on failure
    pub fn state(&self) -> AvailabilityState {
        self.state
    }

    /// Whether decoding succeeded
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Why decoding failed
    pub fn error(&self) -> Option<&DecodeError> {
        self.error.as_ref()
    }
}

impl From<Result<AvailabilityState, DecodeError>> for PowerReading {
    fn from(result: Result<AvailabilityState, DecodeError>) -> Self {
        match result {
            Ok(state) => PowerReading::decoded(state),
            Err(e) => PowerReading::failed(e),
        }
    }
}
