//! # Per-PHY Modems
//!
//! The FSK packet engine and the LoRa modem share one mode register and one
//! synthesizer but diverge everywhere else: buffer access, payload length
//! registers, DIO0 mappings, signal quality and frequency error. [`Modem`]
//! captures the operations the device needs from either, and
//! [`FskModem`] / [`LoRaModem`] hold the cached register state that makes
//! write suppression possible.
//!
//! PHY-specific configuration (bitrate, spreading factor...) lives in inherent
//! methods on the concrete types.

use crate::constants::{
    FSK_MAX_ENCODED_LEN, FSK_MAX_RSSI_DBM, LORA_MAX_PAYLOAD_LEN, LORA_MAX_RSSI_DBM,
    LORA_RX_BASE_ADDR, LORA_TX_BASE_ADDR,
};
use crate::error::DriverError;
use crate::radio::calib::{
    apply_bw500_errata, corrected_frequency, fsk_frf, lora_frf, ppm_correction, write_frf,
    Bw500Errata,
};
use crate::radio::fec::{max_payload_len, FecCodec};
use crate::radio::hal::{Hal, HalError};
use crate::radio::mode::{Activity, Chip, PhyKind};
use crate::radio::modulation::{
    fsk_bandwidth_code, fsk_bitrate_word, fsk_deviation_word, lora_low_data_rate_optimize,
    remap_sync_word, CodingRate, HeaderMode, LoRaBandwidth, SpreadingFactor,
};
use crate::radio::quality::{self, SignalQuality};
use crate::radio::registers::*;

/// Operations every physical layer provides to the device
pub trait Modem<H: Hal> {
    fn kind(&self) -> PhyKind;

    /// Corrected carrier last programmed through this modem
    fn frequency(&self) -> Option<u32>;

    /// Program `target_hz - error_hz`, skipping the write if unchanged
    fn set_frequency(
        &mut self,
        chip: &mut Chip<H>,
        target_hz: u32,
        error_hz: i32,
    ) -> Result<(), DriverError>;

    /// Largest payload `send` accepts
    fn max_payload_len(&self) -> usize;

    /// Update the payload length register for an `len`-byte payload
    fn set_payload_size(&mut self, chip: &mut Chip<H>, len: usize) -> Result<(), DriverError>;

    /// Load `payload` into the chip buffer and set its length
    fn stage_tx(&mut self, chip: &mut Chip<H>, payload: &[u8]) -> Result<(), DriverError>;

    /// Route DIO0 to TX done and enter TX
    fn start_tx(&mut self, chip: &mut Chip<H>) -> Result<(), DriverError>;

    /// Route DIO0 to RX done and enter continuous RX
    fn start_rx(&mut self, chip: &mut Chip<H>) -> Result<(), DriverError>;

    /// Fetch an `len`-byte payload from the chip buffer
    fn read(&mut self, chip: &mut Chip<H>, len: usize) -> Result<Vec<u8>, DriverError>;

    /// Detach DIO0 from every event
    fn disable_dio0(&mut self, chip: &mut Chip<H>) -> Result<(), HalError>;

    /// Called after the chip has been switched into this PHY (in sleep)
    fn on_enter(&mut self, chip: &mut Chip<H>) -> Result<(), HalError>;

    fn rx_sensitivity(&self) -> i32;

    fn signal_quality(&mut self, chip: &mut Chip<H>) -> Result<SignalQuality, DriverError>;

    /// Carrier offset of the last packet in Hz
    fn frequency_error(&mut self, chip: &mut Chip<H>) -> Result<i32, DriverError>;
}

fn check_len(len: usize, max: usize) -> Result<(), DriverError> {
    if len > max {
        return Err(DriverError::PayloadTooLarge { len, max });
    }
    Ok(())
}

// =============================================================================
// FSK
// =============================================================================

/// FSK packet engine with host-side FEC
pub struct FskModem {
    codec: Box<dyn FecCodec + Send>,
    freq: Option<u32>,
    /// Encoded length currently in `RegPayloadLength`
    payload_length: Option<u8>,
    rx_bandwidth: Option<u32>,
}

impl FskModem {
    pub fn new(codec: Box<dyn FecCodec + Send>) -> Self {
        Self {
            codec,
            freq: None,
            payload_length: None,
            rx_bandwidth: None,
        }
    }

    pub fn codec(&self) -> &dyn FecCodec {
        self.codec.as_ref()
    }

    pub fn rx_bandwidth(&self) -> Option<u32> {
        self.rx_bandwidth
    }

    fn bandwidth_code(hz: u32) -> Result<u8, DriverError> {
        fsk_bandwidth_code(hz).ok_or_else(|| {
            log::error!("Invalid FSK bandwidth {hz} Hz");
            DriverError::InvalidBandwidth(hz)
        })
    }

    pub fn set_deviation<H: Hal>(&mut self, chip: &mut Chip<H>, hz: u32) -> Result<(), DriverError> {
        chip.prepare_write()?;
        chip.write_u16(REG_FSK_FDEV_MSB, fsk_deviation_word(hz))?;
        Ok(())
    }

    pub fn set_bitrate<H: Hal>(&mut self, chip: &mut Chip<H>, bps: u32) -> Result<(), DriverError> {
        chip.prepare_write()?;
        chip.write_u16(REG_FSK_BITRATE_MSB, fsk_bitrate_word(bps))?;
        Ok(())
    }

    /// Receiver channel filter; fails for widths outside the filter table
    pub fn set_rx_bandwidth<H: Hal>(
        &mut self,
        chip: &mut Chip<H>,
        hz: u32,
    ) -> Result<(), DriverError> {
        let code = Self::bandwidth_code(hz)?;
        chip.prepare_write()?;
        chip.write(REG_FSK_RX_BW, code)?;
        self.rx_bandwidth = Some(hz);
        Ok(())
    }

    pub fn set_afc_bandwidth<H: Hal>(
        &mut self,
        chip: &mut Chip<H>,
        hz: u32,
    ) -> Result<(), DriverError> {
        let code = Self::bandwidth_code(hz)?;
        chip.prepare_write()?;
        chip.write(REG_FSK_AFC_BW, code)?;
        Ok(())
    }

    /// Preamble length in bytes
    pub fn set_preamble_length<H: Hal>(
        &mut self,
        chip: &mut Chip<H>,
        len: u16,
    ) -> Result<(), DriverError> {
        chip.prepare_write()?;
        chip.write_u16(REG_FSK_PREAMBLE_MSB, len)?;
        Ok(())
    }
}

impl<H: Hal> Modem<H> for FskModem {
    fn kind(&self) -> PhyKind {
        PhyKind::Fsk
    }

    fn frequency(&self) -> Option<u32> {
        self.freq
    }

    fn set_frequency(
        &mut self,
        chip: &mut Chip<H>,
        target_hz: u32,
        error_hz: i32,
    ) -> Result<(), DriverError> {
        let freq = corrected_frequency(target_hz, error_hz);
        if self.freq == Some(freq) {
            return Ok(());
        }
        chip.prepare_write()?;
        write_frf(chip, fsk_frf(freq))?;
        self.freq = Some(freq);
        Ok(())
    }

    fn max_payload_len(&self) -> usize {
        max_payload_len(self.codec.as_ref(), FSK_MAX_ENCODED_LEN)
    }

    fn set_payload_size(&mut self, chip: &mut Chip<H>, len: usize) -> Result<(), DriverError> {
        check_len(len, Modem::<H>::max_payload_len(self))?;
        let encoded = self.codec.encoded_size(len) as u8;
        if self.payload_length == Some(encoded) {
            return Ok(());
        }
        chip.prepare_write()?;
        chip.write(REG_FSK_PAYLOAD_LENGTH, encoded)?;
        self.payload_length = Some(encoded);
        Ok(())
    }

    fn stage_tx(&mut self, chip: &mut Chip<H>, payload: &[u8]) -> Result<(), DriverError> {
        check_len(payload.len(), Modem::<H>::max_payload_len(self))?;
        chip.sleep()?;
        let encoded = self.codec.encode(payload);
        // FIFO writes are ignored until sleep is fully entered
        chip.wait_mode_ready()?;
        chip.write_burst(REG_FIFO, &encoded)?;
        self.set_payload_size(chip, payload.len())
    }

    fn start_tx(&mut self, chip: &mut Chip<H>) -> Result<(), DriverError> {
        // PacketSent clears itself on leaving TX
        chip.write(REG_DIO_MAPPING_1, DIO0_FSK_PACKET_SENT)?;
        // Must be rewritten before every send or PacketSent never fires
        chip.write(REG_FSK_FIFO_THRESH, FSK_TX_START_FIFO_NOT_EMPTY)?;
        chip.set_activity(Activity::Tx)?;
        Ok(())
    }

    fn start_rx(&mut self, chip: &mut Chip<H>) -> Result<(), DriverError> {
        chip.standby()?;
        chip.wait_mode_ready()?;
        chip.write(REG_DIO_MAPPING_1, DIO0_FSK_PAYLOAD_READY)?;
        let threshold = self.payload_length.unwrap_or(0) & FSK_FIFO_THRESHOLD_MASK;
        chip.write(REG_FSK_FIFO_THRESH, FSK_TX_START_FIFO_NOT_EMPTY | threshold)?;
        chip.set_activity(Activity::RxContinuous)?;
        Ok(())
    }

    fn read(&mut self, chip: &mut Chip<H>, len: usize) -> Result<Vec<u8>, DriverError> {
        check_len(len, Modem::<H>::max_payload_len(self))?;
        let mut encoded = vec![0u8; self.codec.encoded_size(len)];
        // PayloadReady clears once the FIFO is drained
        chip.read_burst(REG_FIFO, &mut encoded)?;
        Ok(self.codec.decode(&encoded, len)?)
    }

    fn disable_dio0(&mut self, chip: &mut Chip<H>) -> Result<(), HalError> {
        chip.write(REG_DIO_MAPPING_1, DIO0_FSK_NONE)
    }

    fn on_enter(&mut self, chip: &mut Chip<H>) -> Result<(), HalError> {
        // RegFrf is shared with LoRa; put back this PHY's carrier
        if let Some(freq) = self.freq {
            write_frf(chip, fsk_frf(freq))?;
        }
        chip.write(REG_FSK_RX_CONFIG, FSK_RX_CONFIG_BASELINE)?;
        chip.write(REG_FSK_PREAMBLE_DETECT, FSK_PREAMBLE_DETECT_BASELINE)?;
        chip.write(REG_FSK_RSSI_THRESH, 0xFF)?;
        chip.write(REG_FSK_SYNC_CONFIG, FSK_SYNC_CONFIG_BASELINE)?;
        chip.write_burst(REG_FSK_SYNC_VALUE_1, &FSK_SYNC_WORD)?;
        chip.write(REG_FSK_PACKET_CONFIG_1, FSK_PACKET_CONFIG_1_BASELINE)
    }

    fn rx_sensitivity(&self) -> i32 {
        quality::fsk_sensitivity_dbm()
    }

    fn signal_quality(&mut self, chip: &mut Chip<H>) -> Result<SignalQuality, DriverError> {
        let sensitivity = Modem::<H>::rx_sensitivity(self);
        let rssi_dbm = quality::fsk_rssi_dbm(chip.read(REG_FSK_RSSI_VALUE)?);
        Ok(SignalQuality {
            rssi_dbm,
            snr: quality::fsk_snr_estimate(sensitivity, rssi_dbm),
            link_quality: quality::link_quality(sensitivity, FSK_MAX_RSSI_DBM, rssi_dbm),
        })
    }

    /// `RegFei` readings in FSK are too erratic to act on
    fn frequency_error(&mut self, _chip: &mut Chip<H>) -> Result<i32, DriverError> {
        Ok(0)
    }
}

// =============================================================================
// LoRa
// =============================================================================

/// LoRa modem state mirrored from the chip
#[derive(Debug, Clone)]
pub struct LoRaModem {
    freq: Option<u32>,
    ppm_correction: Option<i8>,
    spreading_factor: SpreadingFactor,
    bandwidth: LoRaBandwidth,
    coding_rate: CodingRate,
    header_mode: HeaderMode,
    payload_length: Option<u8>,
    errata: Option<Bw500Errata>,
    low_data_rate_optimize: Option<bool>,
    last_crc_error: bool,
}

impl Default for LoRaModem {
    /// Chip power-on settings: SF7, 125 kHz, 4/5, explicit header
    fn default() -> Self {
        Self {
            freq: None,
            ppm_correction: None,
            spreading_factor: SpreadingFactor::SF7,
            bandwidth: LoRaBandwidth::Bw125,
            coding_rate: CodingRate::CR4_5,
            header_mode: HeaderMode::Explicit,
            payload_length: None,
            errata: None,
            low_data_rate_optimize: None,
            last_crc_error: false,
        }
    }
}

impl LoRaModem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spreading_factor(&self) -> SpreadingFactor {
        self.spreading_factor
    }

    pub fn bandwidth(&self) -> LoRaBandwidth {
        self.bandwidth
    }

    pub fn coding_rate(&self) -> CodingRate {
        self.coding_rate
    }

    pub fn header_mode(&self) -> HeaderMode {
        self.header_mode
    }

    pub fn errata(&self) -> Option<Bw500Errata> {
        self.errata
    }

    pub fn ppm_correction(&self) -> Option<i8> {
        self.ppm_correction
    }

    /// Whether the last packet fetched by `read` failed its payload CRC
    pub fn last_crc_error(&self) -> bool {
        self.last_crc_error
    }

    /// Buffer layout and AGC programmed once at init; chip must be in LoRa sleep
    pub fn write_baseline<H: Hal>(&mut self, chip: &mut Chip<H>) -> Result<(), HalError> {
        chip.write(REG_LORA_FIFO_TX_BASE_ADDR, LORA_TX_BASE_ADDR)?;
        chip.write(REG_LORA_FIFO_RX_BASE_ADDR, LORA_RX_BASE_ADDR)?;
        chip.write(REG_LORA_MODEM_CONFIG_3, LORA_AGC_AUTO_ON)?;
        self.low_data_rate_optimize = Some(false);
        Ok(())
    }

    fn apply_errata<H: Hal>(&mut self, chip: &mut Chip<H>) -> Result<(), HalError> {
        let freq = self.freq.unwrap_or(0);
        if self.errata == Some(Bw500Errata::select(self.bandwidth, freq)) {
            return Ok(());
        }
        chip.prepare_write()?;
        self.errata = Some(apply_bw500_errata(chip, self.errata, self.bandwidth, freq)?);
        Ok(())
    }

    fn apply_low_data_rate_optimize<H: Hal>(&mut self, chip: &mut Chip<H>) -> Result<(), HalError> {
        let wanted = lora_low_data_rate_optimize(self.spreading_factor, self.bandwidth);
        if self.low_data_rate_optimize == Some(wanted) {
            return Ok(());
        }
        let bit = if wanted { LORA_LOW_DATA_RATE_OPTIMIZE } else { 0 };
        chip.modify(REG_LORA_MODEM_CONFIG_3, !LORA_LOW_DATA_RATE_OPTIMIZE, bit)?;
        self.low_data_rate_optimize = Some(wanted);
        log::debug!("LoRa low data rate optimize: {wanted}");
        Ok(())
    }

    fn warn_sf6_header(&self) {
        if self.spreading_factor == SpreadingFactor::SF6 && self.header_mode == HeaderMode::Explicit
        {
            log::warn!("SF6 only works in implicit header mode");
        }
    }

    /// Spreading factor, clamped to 6..=12
    pub fn set_spreading_factor<H: Hal>(
        &mut self,
        chip: &mut Chip<H>,
        sf: i32,
    ) -> Result<(), DriverError> {
        chip.prepare_write()?;
        let sf = SpreadingFactor::from_clamped(sf);
        let (optimize, threshold) = sf.detection_registers();
        chip.write(REG_LORA_DETECTION_OPTIMIZE, optimize)?;
        chip.write(REG_LORA_DETECTION_THRESHOLD, threshold)?;
        chip.modify(REG_LORA_MODEM_CONFIG_2, 0x0F, sf.value() << 4)?;
        self.spreading_factor = sf;
        self.apply_low_data_rate_optimize(chip)?;
        self.warn_sf6_header();
        Ok(())
    }

    pub fn set_signal_bandwidth<H: Hal>(
        &mut self,
        chip: &mut Chip<H>,
        bandwidth: LoRaBandwidth,
    ) -> Result<(), DriverError> {
        chip.prepare_write()?;
        chip.modify(REG_LORA_MODEM_CONFIG_1, 0x0F, bandwidth.code() << 4)?;
        self.bandwidth = bandwidth;
        self.apply_errata(chip)?;
        self.apply_low_data_rate_optimize(chip)?;
        Ok(())
    }

    pub fn set_coding_rate<H: Hal>(
        &mut self,
        chip: &mut Chip<H>,
        rate: CodingRate,
    ) -> Result<(), DriverError> {
        chip.prepare_write()?;
        chip.modify(REG_LORA_MODEM_CONFIG_1, 0xF1, rate.code() << 1)?;
        self.coding_rate = rate;
        Ok(())
    }

    /// Preamble length in symbols
    pub fn set_preamble_length<H: Hal>(
        &mut self,
        chip: &mut Chip<H>,
        len: u16,
    ) -> Result<(), DriverError> {
        chip.prepare_write()?;
        chip.write_u16(REG_LORA_PREAMBLE_MSB, len)?;
        Ok(())
    }

    pub fn set_crc<H: Hal>(&mut self, chip: &mut Chip<H>, enabled: bool) -> Result<(), DriverError> {
        chip.prepare_write()?;
        let bit = if enabled { LORA_RX_PAYLOAD_CRC_ON } else { 0 };
        chip.modify(REG_LORA_MODEM_CONFIG_2, !LORA_RX_PAYLOAD_CRC_ON, bit)?;
        Ok(())
    }

    pub fn set_header_mode<H: Hal>(
        &mut self,
        chip: &mut Chip<H>,
        mode: HeaderMode,
    ) -> Result<(), DriverError> {
        chip.prepare_write()?;
        let bit = match mode {
            HeaderMode::Implicit => LORA_IMPLICIT_HEADER,
            HeaderMode::Explicit => 0,
        };
        chip.modify(REG_LORA_MODEM_CONFIG_1, !LORA_IMPLICIT_HEADER, bit)?;
        self.header_mode = mode;
        self.warn_sf6_header();
        Ok(())
    }

    /// Sync word after remapping unusable values; returns what was written
    pub fn set_sync_word<H: Hal>(
        &mut self,
        chip: &mut Chip<H>,
        sync_word: u8,
    ) -> Result<u8, DriverError> {
        chip.prepare_write()?;
        let sync_word = remap_sync_word(sync_word);
        chip.write(REG_LORA_SYNC_WORD, sync_word)?;
        Ok(sync_word)
    }
}

impl<H: Hal> Modem<H> for LoRaModem {
    fn kind(&self) -> PhyKind {
        PhyKind::LoRa
    }

    fn frequency(&self) -> Option<u32> {
        self.freq
    }

    fn set_frequency(
        &mut self,
        chip: &mut Chip<H>,
        target_hz: u32,
        error_hz: i32,
    ) -> Result<(), DriverError> {
        let freq = corrected_frequency(target_hz, error_hz);
        if self.freq != Some(freq) {
            chip.prepare_write()?;
            write_frf(chip, lora_frf(freq))?;
            self.freq = Some(freq);
        }

        let ppm = ppm_correction(freq, error_hz);
        if self.ppm_correction != Some(ppm) {
            chip.prepare_write()?;
            chip.write(REG_LORA_PPM_CORRECTION, ppm as u8)?;
            self.ppm_correction = Some(ppm);
        }

        self.apply_errata(chip)?;
        Ok(())
    }

    fn max_payload_len(&self) -> usize {
        LORA_MAX_PAYLOAD_LEN
    }

    fn set_payload_size(&mut self, chip: &mut Chip<H>, len: usize) -> Result<(), DriverError> {
        check_len(len, LORA_MAX_PAYLOAD_LEN)?;
        let len = len as u8;
        if self.payload_length == Some(len) {
            return Ok(());
        }
        chip.prepare_write()?;
        chip.write(REG_LORA_PAYLOAD_LENGTH, len)?;
        self.payload_length = Some(len);
        Ok(())
    }

    fn stage_tx(&mut self, chip: &mut Chip<H>, payload: &[u8]) -> Result<(), DriverError> {
        check_len(payload.len(), LORA_MAX_PAYLOAD_LEN)?;
        // The data buffer is not accessible in LoRa sleep
        chip.standby()?;
        chip.write(REG_LORA_FIFO_ADDR_PTR, LORA_TX_BASE_ADDR)?;
        chip.write_burst(REG_FIFO, payload)?;
        self.set_payload_size(chip, payload.len())
    }

    fn start_tx(&mut self, chip: &mut Chip<H>) -> Result<(), DriverError> {
        chip.write(REG_LORA_IRQ_FLAGS, LoRaIrq::TX_DONE.bits())?;
        chip.write(REG_DIO_MAPPING_1, DIO0_LORA_TX_DONE)?;
        chip.set_activity(Activity::Tx)?;
        Ok(())
    }

    fn start_rx(&mut self, chip: &mut Chip<H>) -> Result<(), DriverError> {
        chip.prepare_write()?;
        chip.write(REG_DIO_MAPPING_1, DIO0_LORA_RX_DONE)?;
        chip.set_activity(Activity::RxContinuous)?;
        Ok(())
    }

    fn read(&mut self, chip: &mut Chip<H>, len: usize) -> Result<Vec<u8>, DriverError> {
        check_len(len, LORA_MAX_PAYLOAD_LEN)?;
        chip.prepare_write()?;
        chip.write(REG_LORA_FIFO_ADDR_PTR, LORA_RX_BASE_ADDR)?;
        let mut payload = vec![0u8; len];
        chip.read_burst(REG_FIFO, &mut payload)?;

        let flags = LoRaIrq::from_bits_truncate(chip.read(REG_LORA_IRQ_FLAGS)?);
        self.last_crc_error = flags.contains(LoRaIrq::PAYLOAD_CRC_ERROR);
        if self.last_crc_error {
            log::debug!("LoRa payload CRC error");
        }
        chip.write(
            REG_LORA_IRQ_FLAGS,
            (LoRaIrq::RX_DONE | LoRaIrq::PAYLOAD_CRC_ERROR).bits(),
        )?;
        Ok(payload)
    }

    fn disable_dio0(&mut self, chip: &mut Chip<H>) -> Result<(), HalError> {
        chip.write(REG_DIO_MAPPING_1, DIO0_LORA_NONE)
    }

    fn on_enter(&mut self, chip: &mut Chip<H>) -> Result<(), HalError> {
        // RegFrf is shared with FSK; put back this PHY's carrier so the
        // errata and RSSI band selection keep matching the chip
        if let Some(freq) = self.freq {
            write_frf(chip, lora_frf(freq))?;
        }
        Ok(())
    }

    fn rx_sensitivity(&self) -> i32 {
        quality::lora_sensitivity_dbm(self.spreading_factor, self.bandwidth)
    }

    fn signal_quality(&mut self, chip: &mut Chip<H>) -> Result<SignalQuality, DriverError> {
        // SNR and RSSI must come from the same packet: one transaction
        let mut raw = [0u8; 2];
        chip.read_burst(REG_LORA_PKT_SNR_VALUE, &mut raw)?;
        let snr = raw[0] as i8;
        let rssi_dbm = quality::lora_packet_rssi_dbm(self.freq.unwrap_or(0), raw[1], snr);
        let sensitivity = Modem::<H>::rx_sensitivity(self);
        Ok(SignalQuality {
            rssi_dbm,
            snr: snr as i32,
            link_quality: quality::link_quality(sensitivity, LORA_MAX_RSSI_DBM, rssi_dbm),
        })
    }

    fn frequency_error(&mut self, chip: &mut Chip<H>) -> Result<i32, DriverError> {
        let mut raw = [0u8; 3];
        chip.read_burst(REG_LORA_FEI_MSB, &mut raw)?;
        Ok(quality::lora_frequency_error_hz(raw, self.bandwidth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::fec::Hamming84;
    use crate::radio::hal::{MockHal, MonotonicClock};

    fn lora_chip() -> (Chip<MockHal>, MockHal) {
        let hal = MockHal::new();
        let mut chip = Chip::new(hal.clone(), Box::new(MonotonicClock::new()));
        chip.sync_op_mode().unwrap();
        chip.switch_phy(PhyKind::LoRa).unwrap();
        chip.standby().unwrap();
        hal.clear_log();
        (chip, hal)
    }

    #[test]
    fn test_fsk_max_payload() {
        let modem = FskModem::new(Box::new(Hamming84));
        assert_eq!(Modem::<MockHal>::max_payload_len(&modem), 31);
    }

    #[test]
    fn test_lora_set_frequency_programs_frf_ppm_and_errata() {
        let (mut chip, hal) = lora_chip();
        let mut modem = LoRaModem::new();
        modem.set_frequency(&mut chip, 868_000_000, 0).unwrap();
        assert_eq!(
            hal.writes(),
            vec![
                (REG_FRF_MSB, 0xD9),
                (REG_FRF_MID, 0x00),
                (REG_FRF_LSB, 0x00),
                (REG_LORA_PPM_CORRECTION, 0),
                (REG_LORA_DETECTION_BW500_OPTIMIZE_1, 0x03),
            ]
        );

        hal.clear_log();
        modem.set_frequency(&mut chip, 868_000_000, 0).unwrap();
        assert!(hal.writes().is_empty());
    }

    #[test]
    fn test_lora_bandwidth_switches_errata_and_ldro() {
        let (mut chip, hal) = lora_chip();
        let mut modem = LoRaModem::new();
        modem.write_baseline(&mut chip).unwrap();
        modem.set_frequency(&mut chip, 915_000_000, 0).unwrap();
        modem.set_spreading_factor(&mut chip, 12).unwrap();
        assert_eq!(hal.lora_register(REG_LORA_MODEM_CONFIG_3), 0x0C);

        modem
            .set_signal_bandwidth(&mut chip, LoRaBandwidth::Bw500)
            .unwrap();
        assert_eq!(modem.errata(), Some(Bw500Errata::HighBand));
        assert_eq!(hal.lora_register(REG_LORA_DETECTION_BW500_OPTIMIZE_2), 0x64);
        assert_eq!(hal.lora_register(REG_LORA_MODEM_CONFIG_1) >> 4, 9);
        // SF12 at 500 kHz is 8 ms per symbol
        assert_eq!(hal.lora_register(REG_LORA_MODEM_CONFIG_3), 0x04);
    }

    #[test]
    fn test_lora_read_reports_crc_error() {
        let (mut chip, hal) = lora_chip();
        let mut modem = LoRaModem::new();
        hal.inject_rx_with_crc_error(&[1, 2, 3]);
        assert_eq!(modem.read(&mut chip, 3).unwrap(), vec![1, 2, 3]);
        assert!(modem.last_crc_error());
        assert_eq!(hal.lora_register(REG_LORA_IRQ_FLAGS) & 0x60, 0);
    }

    #[test]
    fn test_fsk_bandwidth_error_touches_nothing() {
        let hal = MockHal::new();
        let mut chip = Chip::new(hal.clone(), Box::new(MonotonicClock::new()));
        let mut modem = FskModem::new(Box::new(Hamming84));
        assert!(matches!(
            modem.set_rx_bandwidth(&mut chip, 400_000),
            Err(DriverError::InvalidBandwidth(400_000))
        ));
        assert_eq!(hal.transactions(), 0);
    }
}
