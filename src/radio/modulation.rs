//! # SX127x Modulation Parameters
//!
//! Typed LoRa parameters (spreading factor, bandwidth, coding rate, header
//! mode), the FSK register word derivations and the PA output mapping.
//!
//! Out-of-range inputs are clamped or remapped to the nearest valid value
//! rather than rejected. The one exception is the FSK receiver bandwidth:
//! a value outside the filter table is a programming error and is reported
//! to the caller.
//!
//! ## LoRa register fields
//!
//! ```text
//! RegModemConfig1  [7:4] bandwidth   [3:1] coding rate   [0] implicit header
//! RegModemConfig2  [7:4] SF          [2] RX payload CRC
//! RegModemConfig3  [3] low data rate optimize   [2] AGC auto
//! ```

use crate::config::OutputStage;
use crate::constants::{FSK_FREQ_STEP_HZ, FXOSC_HZ};
use crate::radio::registers::{PA_BOOST, PA_DAC_DEFAULT, PA_DAC_HIGH_POWER, PA_RFO_MAX_POWER};
use serde::{Deserialize, Serialize};

/// Spreading factor for LoRa
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpreadingFactor {
    SF6 = 6,
    SF7 = 7,
    SF8 = 8,
    SF9 = 9,
    SF10 = 10,
    SF11 = 11,
    SF12 = 12,
}

impl SpreadingFactor {
    /// Clamp any integer into SF6..=SF12
    ///
    /// # Examples
    /// ```rust
    /// use sx127x_rs::radio::modulation::SpreadingFactor;
    ///
    /// assert_eq!(SpreadingFactor::from_clamped(3), SpreadingFactor::SF6);
    /// assert_eq!(SpreadingFactor::from_clamped(9), SpreadingFactor::SF9);
    /// assert_eq!(SpreadingFactor::from_clamped(20), SpreadingFactor::SF12);
    /// ```
    pub fn from_clamped(sf: i32) -> Self {
        match sf {
            i32::MIN..=6 => SpreadingFactor::SF6,
            7 => SpreadingFactor::SF7,
            8 => SpreadingFactor::SF8,
            9 => SpreadingFactor::SF9,
            10 => SpreadingFactor::SF10,
            11 => SpreadingFactor::SF11,
            _ => SpreadingFactor::SF12,
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    /// `RegDetectOptimize` / `RegDetectionThreshold` pair for this SF
    pub fn detection_registers(self) -> (u8, u8) {
        use crate::radio::registers::{LORA_DETECTION_SF6, LORA_DETECTION_SF7_TO_12};
        match self {
            SpreadingFactor::SF6 => LORA_DETECTION_SF6,
            _ => LORA_DETECTION_SF7_TO_12,
        }
    }
}

/// Signal bandwidth for LoRa, valued by its `RegModemConfig1` code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoRaBandwidth {
    Bw7_8 = 0x00,
    Bw10_4 = 0x01,
    Bw15_6 = 0x02,
    Bw20_8 = 0x03,
    Bw31_25 = 0x04,
    Bw41_7 = 0x05,
    Bw62_5 = 0x06,
    Bw125 = 0x07,
    Bw250 = 0x08,
    Bw500 = 0x09,
}

impl LoRaBandwidth {
    const ALL: [LoRaBandwidth; 10] = [
        LoRaBandwidth::Bw7_8,
        LoRaBandwidth::Bw10_4,
        LoRaBandwidth::Bw15_6,
        LoRaBandwidth::Bw20_8,
        LoRaBandwidth::Bw31_25,
        LoRaBandwidth::Bw41_7,
        LoRaBandwidth::Bw62_5,
        LoRaBandwidth::Bw125,
        LoRaBandwidth::Bw250,
        LoRaBandwidth::Bw500,
    ];

    /// Map a register code to a bandwidth, clamping to 7.8 kHz..=500 kHz
    pub fn from_code_clamped(code: i32) -> Self {
        Self::ALL[code.clamp(0, Self::ALL.len() as i32 - 1) as usize]
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn khz(self) -> f64 {
        match self {
            LoRaBandwidth::Bw7_8 => 7.8,
            LoRaBandwidth::Bw10_4 => 10.4,
            LoRaBandwidth::Bw15_6 => 15.6,
            LoRaBandwidth::Bw20_8 => 20.8,
            LoRaBandwidth::Bw31_25 => 31.25,
            LoRaBandwidth::Bw41_7 => 41.7,
            LoRaBandwidth::Bw62_5 => 62.5,
            LoRaBandwidth::Bw125 => 125.0,
            LoRaBandwidth::Bw250 => 250.0,
            LoRaBandwidth::Bw500 => 500.0,
        }
    }
}

/// Forward error correction rate for LoRa
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CodingRate {
    CR4_5 = 0x01,
    CR4_6 = 0x02,
    CR4_7 = 0x03,
    CR4_8 = 0x04,
}

impl CodingRate {
    /// Clamp a denominator offset (1 => 4/5 ... 4 => 4/8)
    pub fn from_clamped(rate: i32) -> Self {
        match rate {
            i32::MIN..=1 => CodingRate::CR4_5,
            2 => CodingRate::CR4_6,
            3 => CodingRate::CR4_7,
            _ => CodingRate::CR4_8,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// LoRa header mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderMode {
    /// Length, coding rate and CRC presence are sent in a header
    Explicit,
    /// Both ends agree on the packet format; required for SF6
    Implicit,
}

/// Adjust a LoRa sync word to one the chip can use.
///
/// Zero never matches, and 0x34 is reserved for LoRaWAN networks.
pub fn remap_sync_word(sync_word: u8) -> u8 {
    match sync_word {
        0 => 1,
        crate::radio::registers::LORA_SYNC_WORD_LORAWAN => 0x35,
        other => other,
    }
}

/// Symbol duration in milliseconds
pub fn lora_symbol_time_ms(sf: SpreadingFactor, bandwidth: LoRaBandwidth) -> f64 {
    (1u32 << sf.value()) as f64 / bandwidth.khz()
}

/// Low data rate optimisation is mandated above 16 ms per symbol
pub fn lora_low_data_rate_optimize(sf: SpreadingFactor, bandwidth: LoRaBandwidth) -> bool {
    lora_symbol_time_ms(sf, bandwidth) > 16.0
}

/// Receiver filter table: (lowest Hz covered, `RegRxBw` code), ascending.
/// The last row only bounds the one before it.
const FSK_BANDWIDTHS: [(u32, u8); 22] = [
    (2_600, 0x17),
    (3_100, 0x0F),
    (3_900, 0x07),
    (5_200, 0x16),
    (6_300, 0x0E),
    (7_800, 0x06),
    (10_400, 0x15),
    (12_500, 0x0D),
    (15_600, 0x05),
    (20_800, 0x14),
    (25_000, 0x0C),
    (31_300, 0x04),
    (41_700, 0x13),
    (50_000, 0x0B),
    (62_500, 0x03),
    (83_333, 0x12),
    (100_000, 0x0A),
    (125_000, 0x02),
    (166_700, 0x11),
    (200_000, 0x09),
    (250_000, 0x01),
    (300_000, 0x00),
];

/// `RegRxBw`/`RegAfcBw` code for a requested filter bandwidth.
///
/// Picks the row whose `[hz[i], hz[i+1])` range contains `hz`.
pub fn fsk_bandwidth_code(hz: u32) -> Option<u8> {
    FSK_BANDWIDTHS
        .windows(2)
        .find(|pair| hz >= pair[0].0 && hz < pair[1].0)
        .map(|pair| pair[0].1)
}

/// `RegFdev` word for a frequency deviation in Hz
pub fn fsk_deviation_word(hz: u32) -> u16 {
    (hz as f64 / FSK_FREQ_STEP_HZ)
        .round()
        .min(u16::MAX as f64) as u16
}

/// `RegBitrate` word for a bitrate in bits per second
pub fn fsk_bitrate_word(bps: u32) -> u16 {
    (FXOSC_HZ as f64 / bps.max(1) as f64)
        .round()
        .min(u16::MAX as f64) as u16
}

/// Register values for a transmit power request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaSettings {
    pub pa_config: u8,
    pub pa_dac: u8,
    /// Power actually programmed after clamping
    pub dbm: i32,
}

/// Map a requested output power to `RegPaConfig`/`RegPaDac`.
///
/// RFO covers 0..=14 dBm. PA_BOOST covers 2..=17 dBm; asking for more
/// enables the +20 dBm DAC while `RegPaConfig` stays at its 17 dBm setting.
pub fn pa_settings(output: OutputStage, dbm: i32) -> PaSettings {
    match output {
        OutputStage::Rfo => {
            let level = dbm.clamp(0, 14);
            PaSettings {
                pa_config: PA_RFO_MAX_POWER | level as u8,
                pa_dac: PA_DAC_DEFAULT,
                dbm: level,
            }
        }
        OutputStage::PaBoost => {
            let level = dbm.clamp(2, 17);
            PaSettings {
                pa_config: PA_BOOST | (level - 2) as u8,
                pa_dac: if dbm > 17 {
                    PA_DAC_HIGH_POWER
                } else {
                    PA_DAC_DEFAULT
                },
                dbm: if dbm > 17 { 20 } else { level },
            }
        }
    }
}
