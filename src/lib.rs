//! # sx127x-rs - A Rust Driver for Semtech SX1276/77/78/79 Transceivers
//!
//! The sx127x-rs crate drives the SX127x family of sub-GHz radios over SPI.
//! One chip carries both an (G)FSK packet engine and a LoRa modem; the
//! driver hides the differences behind a single device API.
//!
//! ## Features
//!
//! - Operating mode state machine with write suppression
//! - Frequency programming with crystal error and PPM correction
//! - Automatic 500 kHz LoRa sensitivity errata handling
//! - FSK and LoRa PHY configuration with clamping of out-of-range inputs
//! - FEC-protected FSK payloads (extended Hamming(8,4) by default)
//! - Interrupt driven TX/RX completion with callbacks from a worker thread
//! - RSSI, SNR, link quality, receiver sensitivity and LoRa frequency error
//! - Register-level chip simulator for tests and host tooling
//! - Raspberry Pi backend behind the `raspberry-pi` feature
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! sx127x-rs = "0.1.0"
//! ```
//!
//! ```rust
//! use sx127x_rs::{MockHal, PhyKind, RadioConfig, Sx127x};
//!
//! let mut config = RadioConfig::default();
//! config.reset.low_ms = 0;
//! config.reset.settle_ms = 0;
//!
//! let mut radio = Sx127x::init(MockHal::new(), config)?;
//! radio.set_physical_layer(PhyKind::LoRa)?;
//! radio.set_frequency(915_000_000, 0)?;
//! radio.set_callback(|status, reason| {
//!     log::info!("{}: {reason:?}", status.device());
//! });
//! radio.enable_continuous_rx()?;
//! # Ok::<(), sx127x_rs::DriverError>(())
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod radio;

pub use crate::config::{OutputStage, PinConfig, RadioConfig, ResetTiming};
pub use crate::error::{ConfigError, DriverError};
pub use crate::logging::{init_logger, init_logger_with_level};

pub use radio::driver::{Sx127x, Sx127xBuilder};
pub use radio::hal::{Hal, HalError, MockHal};
pub use radio::irq::{CompletionReason, CompletionStatus, DeviceId};
pub use radio::mode::PhyKind;
pub use radio::modulation::{CodingRate, HeaderMode, LoRaBandwidth, SpreadingFactor};
pub use radio::quality::SignalQuality;
