//! Error types for hostpal

use std::io;
use thiserror::Error;

/// Result type alias for hostpal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for enumeration, probing and configuration
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A resource probe could not produce a snapshot
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single instance could not be created or refreshed from its record
    #[error("Failed to update instance {id}: {reason}")]
    InstanceUpdate { id: String, reason: String },

    /// Unsupported platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl Error {
    /// Wrap any displayable cause as a discovery failure
    pub fn discovery(cause: impl std::fmt::Display) -> Self {
        Error::Discovery(cause.to_string())
    }
}
