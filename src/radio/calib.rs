//! # SX127x Frequency Calibration
//!
//! Synthesizer word computation, the LoRa PPM offset correction and the
//! 500 kHz sensitivity workaround from the SX1276/77/78 errata note.
//!
//! ## Synthesizer words
//!
//! Both physical layers program the same 24-bit `RegFrf` but derive the word
//! differently:
//!
//! - FSK divides the carrier by the synthesizer step (FXOSC / 2^19, ~61 Hz)
//! - LoRa computes the 19-bit fixed point `(freq << 19) / FXOSC`
//!
//! ## Errata 2.1 (BW500 sensitivity)
//!
//! With a 500 kHz LoRa bandwidth the receiver loses sensitivity unless two
//! detection registers are overridden:
//!
//! | bandwidth | carrier             | 0x36 | 0x3A          |
//! |-----------|---------------------|------|---------------|
//! | 500 kHz   | 862 MHz - 1020 MHz  | 0x02 | 0x64          |
//! | 500 kHz   | 410 MHz - 525 MHz   | 0x02 | 0x7F          |
//! | otherwise |                     | 0x03 | chip selected |

use crate::constants::{FRF_FRACTION_BITS, FSK_FREQ_STEP_HZ, FXOSC_HZ};
use crate::radio::hal::{Hal, HalError};
use crate::radio::mode::Chip;
use crate::radio::modulation::LoRaBandwidth;
use crate::radio::registers::{
    REG_FRF_LSB, REG_FRF_MID, REG_FRF_MSB, REG_LORA_DETECTION_BW500_OPTIMIZE_1,
    REG_LORA_DETECTION_BW500_OPTIMIZE_2,
};

/// Weight applied to the measured offset before converting it to PPM
const PPM_CORRECTION_GAIN: f64 = 0.95;

/// Apply a known oscillator error to a target carrier
pub fn corrected_frequency(target_hz: u32, error_hz: i32) -> u32 {
    let corrected = target_hz as i64 - error_hz as i64;
    corrected.clamp(0, u32::MAX as i64) as u32
}

/// FSK synthesizer word for `freq_hz`
pub fn fsk_frf(freq_hz: u32) -> u32 {
    (freq_hz as f64 / FSK_FREQ_STEP_HZ) as u32
}

/// LoRa synthesizer word for `freq_hz`
///
/// # Examples
/// ```rust
/// use sx127x_rs::radio::calib::lora_frf;
///
/// // 915 MHz on a 32 MHz crystal
/// assert_eq!(lora_frf(915_000_000), 0xE4C000);
/// ```
pub fn lora_frf(freq_hz: u32) -> u32 {
    (((freq_hz as u64) << FRF_FRACTION_BITS) / FXOSC_HZ as u64) as u32
}

/// Carrier programmed by an FSK synthesizer word
pub fn fsk_frequency(frf: u32) -> u32 {
    (frf as f64 * FSK_FREQ_STEP_HZ) as u32
}

/// Carrier programmed by a LoRa synthesizer word
pub fn lora_frequency(frf: u32) -> u32 {
    ((frf as u64 * FXOSC_HZ as u64) >> FRF_FRACTION_BITS) as u32
}

/// Split a synthesizer word into `RegFrfMsb/Mid/Lsb`
pub fn frf_bytes(frf: u32) -> [u8; 3] {
    [(frf >> 16) as u8, (frf >> 8) as u8, frf as u8]
}

/// Program `RegFrf` and wait for the PLL to lock.
///
/// The caller must have put the chip in a writable mode.
pub fn write_frf<H: Hal>(chip: &mut Chip<H>, frf: u32) -> Result<(), HalError> {
    let [msb, mid, lsb] = frf_bytes(frf);
    chip.write(REG_FRF_MSB, msb)?;
    chip.write(REG_FRF_MID, mid)?;
    chip.write(REG_FRF_LSB, lsb)?;
    chip.settle_pll();
    Ok(())
}

/// Signed `RegPpmCorrection` value for a measured offset
///
/// `freq_hz` is the programmed (already corrected) carrier.
pub fn ppm_correction(freq_hz: u32, error_hz: i32) -> i8 {
    if freq_hz == 0 {
        return 0;
    }
    let ppm = PPM_CORRECTION_GAIN * (error_hz as f64 / (freq_hz as f64 / 1_000_000.0));
    ppm.round().clamp(i8::MIN as f64, i8::MAX as f64) as i8
}

/// Errata 2.1 override selected for the current bandwidth and carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bw500Errata {
    /// Chip defaults (0x36 = 0x03)
    None,
    /// 500 kHz in 862-1020 MHz
    HighBand,
    /// 500 kHz in 410-525 MHz
    LowBand,
}

impl Bw500Errata {
    pub fn select(bandwidth: LoRaBandwidth, freq_hz: u32) -> Self {
        if bandwidth != LoRaBandwidth::Bw500 {
            return Bw500Errata::None;
        }
        match freq_hz {
            862_000_000..=1_020_000_000 => Bw500Errata::HighBand,
            410_000_000..=525_000_000 => Bw500Errata::LowBand,
            _ => Bw500Errata::None,
        }
    }

    /// Values for registers 0x36 and 0x3A; `None` leaves 0x3A to the chip
    pub fn registers(self) -> (u8, Option<u8>) {
        match self {
            Bw500Errata::None => (0x03, None),
            Bw500Errata::HighBand => (0x02, Some(0x64)),
            Bw500Errata::LowBand => (0x02, Some(0x7F)),
        }
    }
}

/// Re-evaluate the errata and program it if it differs from `current`.
///
/// `current` is `None` until the first evaluation, which therefore always
/// writes. Returns the state now in effect.
pub fn apply_bw500_errata<H: Hal>(
    chip: &mut Chip<H>,
    current: Option<Bw500Errata>,
    bandwidth: LoRaBandwidth,
    freq_hz: u32,
) -> Result<Bw500Errata, HalError> {
    let wanted = Bw500Errata::select(bandwidth, freq_hz);
    if current == Some(wanted) {
        return Ok(wanted);
    }
    let (opt1, opt2) = wanted.registers();
    chip.write(REG_LORA_DETECTION_BW500_OPTIMIZE_1, opt1)?;
    if let Some(opt2) = opt2 {
        chip.write(REG_LORA_DETECTION_BW500_OPTIMIZE_2, opt2)?;
    }
    log::debug!("BW500 errata: {current:?} -> {wanted:?}");
    Ok(wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::hal::{MockHal, MonotonicClock};

    #[test]
    fn test_lora_frf_known_values() {
        assert_eq!(lora_frf(868_000_000), 0xD9_0000);
        assert_eq!(lora_frf(433_000_000), 0x6C_4000);
        assert_eq!(lora_frequency(0xD9_0000), 868_000_000);
    }

    #[test]
    fn test_fsk_frf_reconstructs_within_one_step() {
        for freq in [433_920_000u32, 868_950_000, 915_000_000] {
            let back = fsk_frequency(fsk_frf(freq));
            assert!(freq - back <= FSK_FREQ_STEP_HZ.ceil() as u32);
        }
    }

    #[test]
    fn test_corrected_frequency() {
        assert_eq!(corrected_frequency(868_000_000, 1_000), 867_999_000);
        assert_eq!(corrected_frequency(868_000_000, -500), 868_000_500);
        assert_eq!(corrected_frequency(100, 1_000), 0);
    }

    #[test]
    fn test_ppm_correction() {
        // 0.95 * 868 / 868 = 0.95 -> 1
        assert_eq!(ppm_correction(868_000_000, 868), 1);
        assert_eq!(ppm_correction(868_000_000, -8_680), -10);
        assert_eq!(ppm_correction(868_000_000, 1_000_000), 127);
        assert_eq!(ppm_correction(868_000_000, -1_000_000), -128);
        assert_eq!(ppm_correction(0, 5_000), 0);
    }

    #[test]
    fn test_errata_selection() {
        assert_eq!(
            Bw500Errata::select(LoRaBandwidth::Bw500, 900_000_000).registers(),
            (0x02, Some(0x64))
        );
        assert_eq!(
            Bw500Errata::select(LoRaBandwidth::Bw500, 450_000_000).registers(),
            (0x02, Some(0x7F))
        );
        assert_eq!(
            Bw500Errata::select(LoRaBandwidth::Bw125, 868_000_000),
            Bw500Errata::None
        );
        // Band edges are inclusive
        assert_eq!(
            Bw500Errata::select(LoRaBandwidth::Bw500, 862_000_000),
            Bw500Errata::HighBand
        );
        assert_eq!(
            Bw500Errata::select(LoRaBandwidth::Bw500, 525_000_000),
            Bw500Errata::LowBand
        );
        assert_eq!(
            Bw500Errata::select(LoRaBandwidth::Bw500, 600_000_000),
            Bw500Errata::None
        );
    }

    #[test]
    fn test_apply_errata_writes_only_on_change() {
        let hal = MockHal::new();
        let mut chip = Chip::new(hal.clone(), Box::new(MonotonicClock::new()));

        let state = apply_bw500_errata(&mut chip, None, LoRaBandwidth::Bw125, 868_000_000).unwrap();
        assert_eq!(state, Bw500Errata::None);
        assert_eq!(hal.writes(), vec![(0x36, 0x03)]);

        hal.clear_log();
        apply_bw500_errata(&mut chip, Some(state), LoRaBandwidth::Bw250, 868_000_000).unwrap();
        assert!(hal.writes().is_empty());

        let state =
            apply_bw500_errata(&mut chip, Some(state), LoRaBandwidth::Bw500, 868_000_000).unwrap();
        assert_eq!(state, Bw500Errata::HighBand);
        assert_eq!(hal.writes(), vec![(0x36, 0x02), (0x3A, 0x64)]);
    }
}
