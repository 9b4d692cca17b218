//! # Board Configuration
//!
//! Everything about the board the radio sits on: which GPIO lines it is wired
//! to, which PA output drives the antenna, the TX power and the reset pulse.
//! Configurations are plain JSON so a deployment can ship one file per board.
//!
//! ```json
//! {
//!   "pins": { "reset": 22, "dio0": 24 },
//!   "output": "pa_boost",
//!   "tx_power_dbm": 14
//! }
//! ```
//!
//! Missing fields fall back to the defaults below.

use crate::constants::*;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// GPIO wiring (BCM numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub reset: u8,
    pub cs: u8,
    pub sck: u8,
    pub miso: u8,
    pub mosi: u8,
    pub dio0: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            reset: DEFAULT_RESET_PIN,
            cs: DEFAULT_CS_PIN,
            sck: DEFAULT_SCK_PIN,
            miso: DEFAULT_MISO_PIN,
            mosi: DEFAULT_MOSI_PIN,
            dio0: DEFAULT_DIO0_PIN,
        }
    }
}

/// PA output the antenna is connected to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStage {
    /// RFO pin, up to +14 dBm
    Rfo,
    /// PA_BOOST pin, up to +17 dBm (+20 dBm with the high power DAC)
    PaBoost,
}

/// Reset pulse timing in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetTiming {
    pub low_ms: u64,
    pub settle_ms: u64,
}

impl Default for ResetTiming {
    fn default() -> Self {
        Self {
            low_ms: DEFAULT_RESET_LOW_MS,
            settle_ms: DEFAULT_RESET_SETTLE_MS,
        }
    }
}

/// Board-level radio configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub pins: PinConfig,
    pub output: OutputStage,
    pub tx_power_dbm: i32,
    /// Route the oscillator clock to DIO5
    pub dio5_clock_out: bool,
    pub reset: ResetTiming,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            pins: PinConfig::default(),
            output: OutputStage::PaBoost,
            tx_power_dbm: DEFAULT_TX_POWER_DBM,
            dio5_clock_out: false,
            reset: ResetTiming::default(),
        }
    }
}

impl RadioConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RadioConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject wirings where two functions share a GPIO line
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pins;
        let pins = [
            ("reset", p.reset),
            ("cs", p.cs),
            ("sck", p.sck),
            ("miso", p.miso),
            ("mosi", p.mosi),
            ("dio0", p.dio0),
        ];
        for (i, (name, pin)) in pins.iter().enumerate() {
            if let Some((other, _)) = pins[i + 1..].iter().find(|(_, o)| o == pin) {
                return Err(ConfigError::Invalid(format!(
                    "GPIO {pin} assigned to both {name} and {other}"
                )));
            }
        }
        Ok(())
    }
}
