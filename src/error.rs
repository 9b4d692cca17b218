//! # SX127x Error Handling
//!
//! This module defines the error types returned by the sx127x-rs crate.
//! Bus and GPIO failures originate in the HAL as [`HalError`]; everything
//! the device API can report is collected in [`DriverError`].

use crate::radio::fec::FecError;
use crate::radio::hal::HalError;
use crate::radio::mode::PhyKind;
use thiserror::Error;

/// Errors returned by the device API
#[derive(Debug, Error)]
pub enum DriverError {
    /// A register or GPIO access failed
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    /// A received FSK payload could not be recovered
    #[error("FEC error: {0}")]
    Fec(#[from] FecError),

    /// `RegVersion` did not identify an SX1276/77/78/79
    #[error("Unexpected chip version 0x{found:02X} (expected 0x{expected:02X})")]
    UnexpectedVersion { found: u8, expected: u8 },

    /// The requested FSK filter bandwidth is not in the chip's table
    #[error("Invalid FSK bandwidth: {0} Hz")]
    InvalidBandwidth(u32),

    /// Payload exceeds what the active physical layer can carry
    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// A PHY-specific setting was requested while the other PHY is active
    #[error("Operation requires {expected}, but {actual} is active")]
    WrongPhy { expected: PhyKind, actual: PhyKind },

    /// The completion worker could not be started
    #[error("Completion worker error: {0}")]
    Worker(String),

    /// The driver has been shut down and no longer drives the chip
    #[error("Radio has been shut down")]
    ShutDown,
}

/// Errors loading a [`RadioConfig`](crate::config::RadioConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
