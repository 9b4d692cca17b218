//! # Signal Quality
//!
//! RSSI, SNR, link quality and receiver sensitivity calculations. The
//! register reads happen in the per-PHY modems; everything here is pure
//! arithmetic on raw register values so it can be tested exhaustively.

use crate::constants::{
    FSK_RX_SENSITIVITY_DBM, FXOSC_HZ, HF_PORT_MIN_HZ, LORA_HF_RSSI_FLOOR_DBM,
    LORA_LF_RSSI_FLOOR_DBM,
};
use crate::radio::modulation::{LoRaBandwidth, SpreadingFactor};
use serde::Serialize;

/// Result of a signal quality query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalQuality {
    /// Received signal strength in dBm
    pub rssi_dbm: i32,
    /// Signal to noise ratio in 0.25 dB units
    pub snr: i32,
    /// Link quality in percent
    pub link_quality: u8,
}

/// Map a received power onto 0..=100.
///
/// Quadratic in the distance from `max_dbm`, so resolution is concentrated
/// near the sensitivity floor. Anything at or below `min_dbm` is 0 and
/// anything at or above `max_dbm` is 100.
///
/// # Examples
/// ```rust
/// use sx127x_rs::radio::quality::link_quality;
///
/// assert_eq!(link_quality(-95, 0, -95), 0);
/// assert_eq!(link_quality(-95, 0, 0), 100);
/// assert_eq!(link_quality(-120, 0, -60), 68);
/// ```
pub fn link_quality(min_dbm: i32, max_dbm: i32, dbm: i32) -> u8 {
    if dbm >= max_dbm {
        return 100;
    }
    if dbm <= min_dbm {
        return 0;
    }
    let range = (max_dbm - min_dbm) as i64;
    let below = (max_dbm - dbm) as i64;
    let quality = (100 * range * range - below * (25 * range + 75 * below)) / (range * range);
    quality.clamp(0, 100) as u8
}

/// FSK `RegRssiValue` is -2 * dBm
pub fn fsk_rssi_dbm(raw: u8) -> i32 {
    raw as i32 / -2
}

/// FSK has no hardware SNR; approximate it from the margin over sensitivity
pub fn fsk_snr_estimate(sensitivity_dbm: i32, rssi_dbm: i32) -> i32 {
    (-sensitivity_dbm + rssi_dbm) * 4
}

/// RSSI floor of the RF port serving `freq_hz`
pub fn lora_rssi_floor_dbm(freq_hz: u32) -> i32 {
    if freq_hz >= HF_PORT_MIN_HZ {
        LORA_HF_RSSI_FLOOR_DBM
    } else {
        LORA_LF_RSSI_FLOOR_DBM
    }
}

/// Packet RSSI from `RegPktRssiValue` and the signed `RegPktSnrValue`.
///
/// With a positive SNR the raw value is slope-corrected by 16/15. Below the
/// noise floor the SNR (quarter dB) is added instead.
pub fn lora_packet_rssi_dbm(freq_hz: u32, raw_rssi: u8, snr: i8) -> i32 {
    let floor = lora_rssi_floor_dbm(freq_hz) as f64;
    let rssi = if snr >= 0 {
        floor + 16.0 * raw_rssi as f64 / 15.0
    } else {
        floor + raw_rssi as f64 + snr as f64 * 0.25
    };
    rssi as i32
}

/// Sign-extend the 20-bit `RegFei` value read as three bytes
pub fn lora_fei_raw(bytes: [u8; 3]) -> i32 {
    let raw = ((bytes[0] as u32 & 0x0F) << 16) | (bytes[1] as u32) << 8 | bytes[2] as u32;
    ((raw << 12) as i32) >> 12
}

/// Carrier offset in Hz for a LoRa frequency error indication
pub fn lora_frequency_error_hz(bytes: [u8; 3], bandwidth: LoRaBandwidth) -> i32 {
    let scale = (1u32 << 24) as f64 / FXOSC_HZ as f64 / 500.0;
    (lora_fei_raw(bytes) as f64 * bandwidth.khz() * scale) as i32
}

/// LoRa sensitivity at 500 kHz, shared RFIO
fn lora_bw500_sensitivity_dbm(sf: SpreadingFactor) -> i32 {
    match sf {
        SpreadingFactor::SF6 => -109,
        SpreadingFactor::SF7 => -114,
        SpreadingFactor::SF8 => -117,
        SpreadingFactor::SF9 => -120,
        SpreadingFactor::SF10 => -123,
        SpreadingFactor::SF11 => -125,
        SpreadingFactor::SF12 => -128,
    }
}

/// LoRa sensitivity for any bandwidth.
///
/// Narrower filters let in less thermal noise: the BW500 figure improves by
/// `10 * log10(500 / bw)` dB.
pub fn lora_sensitivity_dbm(sf: SpreadingFactor, bandwidth: LoRaBandwidth) -> i32 {
    let gain = 10.0 * (500.0 / bandwidth.khz()).log10();
    (lora_bw500_sensitivity_dbm(sf) as f64 - gain).round() as i32
}

pub fn fsk_sensitivity_dbm() -> i32 {
    FSK_RX_SENSITIVITY_DBM
}
