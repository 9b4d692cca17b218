//! # SX127x Radio Driver
//!
//! High-level driver for the Semtech SX1276/77/78/79 sub-GHz transceivers.
//! One chip carries two physical layers, an (G)FSK packet engine and a LoRa
//! modem, selected through the operating mode register. The driver exposes a
//! single device API on top of both and routes every PHY-dependent step to
//! the matching [`Modem`] implementation.
//!
//! ## Features
//!
//! - Chip identity check and baseline programming at init
//! - Frequency programming with crystal error correction (FRF + LoRa PPM)
//! - 500 kHz LoRa sensitivity errata handled automatically
//! - FSK payloads protected by a pluggable FEC codec
//! - Interrupt driven completion: DIO0 wakes a per-device worker thread which
//!   latches TX/RX done and invokes the registered callback
//! - RSSI, SNR, link quality and LoRa frequency error
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────┐
//! │        Application Layer        │
//! ├─────────────────────────────────┤
//! │      Sx127x (this file)         │──── CompletionWorker (irq.rs)
//! ├────────────────┬────────────────┤
//! │   FskModem     │   LoRaModem    │     modem.rs
//! ├────────────────┴────────────────┤
//! │   Chip: op mode cache (mode.rs) │
//! ├─────────────────────────────────┤
//! │      HAL Abstraction Layer      │
//! └─────────────────────────────────┘
//! ```
//!
//! ## Caller contract
//!
//! Nothing here locks. At most one send or receive may be outstanding per
//! device, and setters must not be called while the chip is transmitting or
//! receiving: they drop it into sleep/standby and do not restore it.
//!
//! ## Usage Example
//!
//! ```rust
//! use sx127x_rs::config::{RadioConfig, ResetTiming};
//! use sx127x_rs::radio::driver::Sx127x;
//! use sx127x_rs::radio::hal::MockHal;
//! use sx127x_rs::radio::mode::PhyKind;
//!
//! let config = RadioConfig {
//!     reset: ResetTiming { low_ms: 0, settle_ms: 0 },
//!     ..RadioConfig::default()
//! };
//! let mut radio = Sx127x::init(MockHal::new(), config)?;
//! radio.set_physical_layer(PhyKind::LoRa)?;
//! radio.set_frequency(868_100_000, 0)?;
//! radio.set_spreading_factor(9)?;
//! radio.send(b"hello")?;
//! radio.shutdown()?;
//! # Ok::<(), sx127x_rs::error::DriverError>(())
//! ```

use crate::config::RadioConfig;
use crate::constants::EXPECTED_VERSION;
use crate::error::DriverError;
use crate::radio::fec::{FecCodec, Hamming84};
use crate::radio::hal::{Clock, EdgeType, Hal, IrqHandler, MonotonicClock, PinDirection, Pull};
use crate::radio::irq::{
    CompletionReason, CompletionStatus, CompletionTrigger, CompletionWorker, DeviceId,
};
use crate::radio::mode::{Chip, OpMode, PhyKind};
use crate::radio::modem::{FskModem, LoRaModem, Modem};
use crate::radio::modulation::{pa_settings, CodingRate, HeaderMode, LoRaBandwidth};
use crate::radio::quality::SignalQuality;
use crate::radio::registers::{
    DIO5_CLK_OUT, LNA_BOOST_HF, REG_DIO_MAPPING_2, REG_LNA, REG_PA_CONFIG, REG_PA_DAC,
    REG_VERSION,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// DIO5 mapping field in `RegDioMapping2`
const DIO5_MAPPING_MASK: u8 = 0x30;

/// Builder for an [`Sx127x`] device
///
/// # Examples
///
/// ```rust
/// use sx127x_rs::config::{RadioConfig, ResetTiming};
/// use sx127x_rs::radio::driver::Sx127x;
/// use sx127x_rs::radio::fec::Hamming84;
/// use sx127x_rs::radio::hal::{MockHal, MonotonicClock};
///
/// let radio = Sx127x::builder(MockHal::new())
///     .config(RadioConfig {
///         reset: ResetTiming { low_ms: 0, settle_ms: 0 },
///         ..RadioConfig::default()
///     })
///     .clock(MonotonicClock::new())
///     .codec(Hamming84)
///     .init()?;
/// assert!(!radio.is_tx_done());
/// # Ok::<(), sx127x_rs::error::DriverError>(())
/// ```
pub struct Sx127xBuilder<H: Hal> {
    hal: H,
    config: RadioConfig,
    clock: Option<Box<dyn Clock + Send>>,
    codec: Option<Box<dyn FecCodec + Send>>,
}

impl<H: Hal> Sx127xBuilder<H> {
    pub fn new(hal: H) -> Self {
        Self {
            hal,
            config: RadioConfig::default(),
            clock: None,
            codec: None,
        }
    }

    /// Board configuration (pins, output stage, TX power, reset timing)
    pub fn config(mut self, config: RadioConfig) -> Self {
        self.config = config;
        self
    }

    /// Time source for the PLL lock wait
    pub fn clock(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// FEC applied to FSK payloads (default [`Hamming84`])
    pub fn codec(mut self, codec: impl FecCodec + Send + 'static) -> Self {
        self.codec = Some(Box::new(codec));
        self
    }

    /// Reset and identify the chip, program the baseline and start the
    /// completion worker.
    ///
    /// # Returns
    ///
    /// * `Ok(Sx127x)` - Device in standby on the PHY the chip came up in
    /// * `Err(DriverError::UnexpectedVersion)` - No SX1276/77/78/79 on the bus
    /// * `Err(DriverError)` - Bus, GPIO or worker failure
    pub fn init(self) -> Result<Sx127x<H>, DriverError> {
        let Sx127xBuilder {
            mut hal,
            config,
            clock,
            codec,
        } = self;

        reset_pulse(&mut hal, &config)?;

        let clock = clock.unwrap_or_else(|| Box::new(MonotonicClock::new()));
        let mut chip = Chip::new(hal, clock);

        let version = chip.read(REG_VERSION)?;
        if version != EXPECTED_VERSION {
            log::error!(
                "Unexpected SX127x version 0x{version:02X}, expected 0x{EXPECTED_VERSION:02X}"
            );
            return Err(DriverError::UnexpectedVersion {
                found: version,
                expected: EXPECTED_VERSION,
            });
        }
        log::info!("SX127x version 0x{version:02X}");

        let initial = chip.sync_op_mode()?;
        chip.sleep()?;

        let mut fsk = FskModem::new(codec.unwrap_or_else(|| Box::new(Hamming84)));
        let mut lora = LoRaModem::new();

        // LoRa page registers are only reachable from LoRa mode
        chip.switch_phy(PhyKind::LoRa)?;
        lora.write_baseline(&mut chip)?;
        chip.modify(REG_LNA, 0xFF, LNA_BOOST_HF)?;
        if config.dio5_clock_out {
            chip.modify(REG_DIO_MAPPING_2, !DIO5_MAPPING_MASK, DIO5_CLK_OUT)?;
        }

        if chip.switch_phy(initial.phy)? {
            Modem::<H>::on_enter(&mut fsk, &mut chip)?;
        }

        let device = DeviceId::next();
        let status = Arc::new(CompletionStatus::new(device));
        let worker = CompletionWorker::spawn(Arc::clone(&status))?;

        let mut radio = Sx127x {
            chip,
            tx_power_dbm: config.tx_power_dbm,
            config,
            fsk,
            lora,
            status,
            worker,
            shut_down: false,
        };

        radio.set_tx_power(radio.config.tx_power_dbm)?;
        radio.chip.standby()?;
        radio.attach_interrupt()?;
        let (modem, chip) = radio.active();
        modem.disable_dio0(chip)?;
        radio.status.disarm();

        log::debug!("{device}: initialised in {}", radio.physical_layer());
        Ok(radio)
    }
}

/// Active-low reset: hold low, release, let the oscillator settle
fn reset_pulse<H: Hal>(hal: &mut H, config: &RadioConfig) -> Result<(), DriverError> {
    let pin = config.pins.reset;
    hal.gpio_set_direction(pin, PinDirection::Output)?;
    hal.gpio_write(pin, false)?;
    thread::sleep(Duration::from_millis(config.reset.low_ms));
    hal.gpio_write(pin, true)?;
    thread::sleep(Duration::from_millis(config.reset.settle_ms));
    Ok(())
}

/// One SX127x transceiver
pub struct Sx127x<H: Hal> {
    chip: Chip<H>,
    config: RadioConfig,
    fsk: FskModem,
    lora: LoRaModem,
    status: Arc<CompletionStatus>,
    worker: CompletionWorker,
    tx_power_dbm: i32,
    shut_down: bool,
}

impl<H: Hal> Sx127x<H> {
    pub fn builder(hal: H) -> Sx127xBuilder<H> {
        Sx127xBuilder::new(hal)
    }

    /// Initialise with the default clock and codec
    pub fn init(hal: H, config: RadioConfig) -> Result<Self, DriverError> {
        Sx127xBuilder::new(hal).config(config).init()
    }

    fn attach_interrupt(&mut self) -> Result<(), DriverError> {
        let pin = self.config.pins.dio0;
        let waker = self.worker.waker();
        let handler: IrqHandler = Arc::new(move || waker.wake());
        let hal = self.chip.hal_mut();
        hal.gpio_set_direction(pin, PinDirection::Input)?;
        hal.gpio_set_pull(pin, Pull::None)?;
        hal.gpio_set_interrupt(pin, EdgeType::Rising, handler)?;
        Ok(())
    }

    /// Modem for the PHY the chip is currently in
    fn active(&mut self) -> (&mut dyn Modem<H>, &mut Chip<H>) {
        let modem: &mut dyn Modem<H> = match self.chip.phy() {
            PhyKind::Fsk => &mut self.fsk,
            PhyKind::LoRa => &mut self.lora,
        };
        (modem, &mut self.chip)
    }

    fn require(&self, expected: PhyKind) -> Result<(), DriverError> {
        let actual = self.chip.phy();
        if actual != expected {
            return Err(DriverError::WrongPhy { expected, actual });
        }
        Ok(())
    }

    pub fn device_id(&self) -> DeviceId {
        self.status.device()
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    pub fn op_mode(&self) -> OpMode {
        self.chip.op_mode()
    }

    pub fn physical_layer(&self) -> PhyKind {
        self.chip.phy()
    }

    pub fn hal(&self) -> &H {
        self.chip.hal()
    }

    /// Completion state shared with the worker
    pub fn completion(&self) -> Arc<CompletionStatus> {
        Arc::clone(&self.status)
    }

    // =========================================================================
    // Mode control
    // =========================================================================

    pub fn sleep(&mut self) -> Result<(), DriverError> {
        self.chip.sleep()?;
        Ok(())
    }

    /// Standby
    pub fn idle(&mut self) -> Result<(), DriverError> {
        self.chip.standby()?;
        Ok(())
    }

    /// Select FSK or LoRa. The chip is left in sleep on the new PHY.
    pub fn set_physical_layer(&mut self, phy: PhyKind) -> Result<(), DriverError> {
        if !self.chip.switch_phy(phy)? {
            return Ok(());
        }
        log::debug!("{}: physical layer {phy}", self.device_id());
        self.status.disarm();
        let (modem, chip) = self.active();
        modem.on_enter(chip)?;
        modem.disable_dio0(chip)?;
        Ok(())
    }

    // =========================================================================
    // Common configuration
    // =========================================================================

    /// Program the carrier, compensating a known crystal error.
    ///
    /// # Arguments
    ///
    /// * `target_hz` - Desired carrier frequency
    /// * `error_hz` - Measured offset of this board (positive: the radio
    ///   lands above the target)
    pub fn set_frequency(&mut self, target_hz: u32, error_hz: i32) -> Result<(), DriverError> {
        let (modem, chip) = self.active();
        modem.set_frequency(chip, target_hz, error_hz)
    }

    /// Corrected carrier last programmed on the active PHY
    pub fn frequency(&mut self) -> Option<u32> {
        let (modem, _) = self.active();
        modem.frequency()
    }

    pub fn set_payload_size(&mut self, len: usize) -> Result<(), DriverError> {
        let (modem, chip) = self.active();
        modem.set_payload_size(chip, len)
    }

    /// Largest payload the active PHY can carry
    pub fn max_payload_len(&mut self) -> usize {
        let (modem, _) = self.active();
        modem.max_payload_len()
    }

    /// Output power, clamped to what the configured PA output supports
    pub fn set_tx_power(&mut self, dbm: i32) -> Result<(), DriverError> {
        let settings = pa_settings(self.config.output, dbm);
        self.chip.prepare_write()?;
        self.chip.write(REG_PA_CONFIG, settings.pa_config)?;
        self.chip.write(REG_PA_DAC, settings.pa_dac)?;
        self.tx_power_dbm = settings.dbm;
        Ok(())
    }

    /// Output power in effect after clamping
    pub fn tx_power(&self) -> i32 {
        self.tx_power_dbm
    }

    // =========================================================================
    // Data path
    // =========================================================================

    /// Start transmitting `payload`. Completion is reported through
    /// [`is_tx_done`](Self::is_tx_done) and the callback.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), DriverError> {
        self.ensure_running()?;
        let status = Arc::clone(&self.status);
        let (modem, chip) = self.active();
        modem.stage_tx(chip, payload)?;
        status.arm(CompletionTrigger::TxDone);
        modem.start_tx(chip)
    }

    /// Fetch a received payload of `len` bytes and clear RX done.
    ///
    /// Continuous reception has to be re-armed afterwards.
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>, DriverError> {
        self.ensure_running()?;
        let (modem, chip) = self.active();
        let payload = modem.read(chip, len);
        self.status.clear_rx_done();
        payload
    }

    pub fn enable_continuous_rx(&mut self) -> Result<(), DriverError> {
        self.ensure_running()?;
        self.status.arm(CompletionTrigger::RxDone);
        let (modem, chip) = self.active();
        modem.start_rx(chip)
    }

    pub fn is_tx_done(&self) -> bool {
        self.status.is_tx_done()
    }

    pub fn is_rx_done(&self) -> bool {
        self.status.is_rx_done()
    }

    /// Register the completion callback, replacing any previous one.
    ///
    /// Runs on the worker thread; user context is whatever the closure
    /// captures.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&CompletionStatus, CompletionReason) + Send + Sync + 'static,
    {
        self.status.set_callback(Arc::new(callback));
    }

    pub fn clear_callback(&self) {
        self.status.clear_callback();
    }

    // =========================================================================
    // Signal quality
    // =========================================================================

    /// RSSI of the last packet (LoRa) or the current channel (FSK)
    pub fn rssi(&mut self) -> Result<SignalQuality, DriverError> {
        let (modem, chip) = self.active();
        modem.signal_quality(chip)
    }

    pub fn rx_sensitivity(&mut self) -> i32 {
        let (modem, _) = self.active();
        modem.rx_sensitivity()
    }

    /// Carrier offset of the last LoRa packet in Hz; always 0 in FSK
    pub fn frequency_error(&mut self) -> Result<i32, DriverError> {
        let (modem, chip) = self.active();
        modem.frequency_error(chip)
    }

    /// Whether the last LoRa packet read failed its payload CRC
    pub fn last_crc_error(&self) -> bool {
        self.lora.last_crc_error()
    }

    // =========================================================================
    // FSK configuration
    // =========================================================================

    pub fn set_fsk_deviation(&mut self, hz: u32) -> Result<(), DriverError> {
        self.require(PhyKind::Fsk)?;
        self.fsk.set_deviation(&mut self.chip, hz)
    }

    pub fn set_fsk_bitrate(&mut self, bps: u32) -> Result<(), DriverError> {
        self.require(PhyKind::Fsk)?;
        self.fsk.set_bitrate(&mut self.chip, bps)
    }

    /// Fails with [`DriverError::InvalidBandwidth`] outside 2.6 kHz..250 kHz
    pub fn set_fsk_rx_bandwidth(&mut self, hz: u32) -> Result<(), DriverError> {
        self.require(PhyKind::Fsk)?;
        self.fsk.set_rx_bandwidth(&mut self.chip, hz)
    }

    pub fn set_fsk_afc_bandwidth(&mut self, hz: u32) -> Result<(), DriverError> {
        self.require(PhyKind::Fsk)?;
        self.fsk.set_afc_bandwidth(&mut self.chip, hz)
    }

    pub fn set_fsk_preamble_length(&mut self, len: u16) -> Result<(), DriverError> {
        self.require(PhyKind::Fsk)?;
        self.fsk.set_preamble_length(&mut self.chip, len)
    }

    // =========================================================================
    // LoRa configuration
    // =========================================================================

    pub fn lora(&self) -> &LoRaModem {
        &self.lora
    }

    /// Clamped to SF6..SF12. SF6 needs implicit header mode.
    pub fn set_spreading_factor(&mut self, sf: i32) -> Result<(), DriverError> {
        self.require(PhyKind::LoRa)?;
        self.lora.set_spreading_factor(&mut self.chip, sf)
    }

    pub fn set_signal_bandwidth(&mut self, bandwidth: LoRaBandwidth) -> Result<(), DriverError> {
        self.require(PhyKind::LoRa)?;
        self.lora.set_signal_bandwidth(&mut self.chip, bandwidth)
    }

    /// Bandwidth by register code, clamped to 0..=9
    pub fn set_signal_bandwidth_code(&mut self, code: i32) -> Result<(), DriverError> {
        self.set_signal_bandwidth(LoRaBandwidth::from_code_clamped(code))
    }

    /// Coding rate 4/(4+`rate`), clamped to 1..=4
    pub fn set_coding_rate(&mut self, rate: i32) -> Result<(), DriverError> {
        self.require(PhyKind::LoRa)?;
        self.lora
            .set_coding_rate(&mut self.chip, CodingRate::from_clamped(rate))
    }

    pub fn set_preamble_length(&mut self, len: u16) -> Result<(), DriverError> {
        self.require(PhyKind::LoRa)?;
        self.lora.set_preamble_length(&mut self.chip, len)
    }

    pub fn set_crc(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.require(PhyKind::LoRa)?;
        self.lora.set_crc(&mut self.chip, enabled)
    }

    pub fn set_header_mode(&mut self, mode: HeaderMode) -> Result<(), DriverError> {
        self.require(PhyKind::LoRa)?;
        self.lora.set_header_mode(&mut self.chip, mode)
    }

    /// Returns the sync word actually programmed
    pub fn set_sync_word(&mut self, sync_word: u8) -> Result<u8, DriverError> {
        self.require(PhyKind::LoRa)?;
        self.lora.set_sync_word(&mut self.chip, sync_word)
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Standby, hold the chip in reset and stop the worker.
    ///
    /// Best effort: the worker is stopped even if the bus fails. Some boards
    /// need a power cycle for a full reset. Idempotent.
    pub fn shutdown(&mut self) -> Result<(), DriverError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.status.disarm();

        let pins = self.config.pins;
        let result = self.chip.standby().and_then(|()| {
            let hal = self.chip.hal_mut();
            hal.gpio_write(pins.reset, false)?;
            hal.gpio_clear_interrupt(pins.dio0)
        });
        self.worker.shutdown();
        log::debug!("{}: shut down", self.device_id());
        result.map_err(DriverError::from)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// The worker is gone after shutdown, so nothing could report completion
    fn ensure_running(&self) -> Result<(), DriverError> {
        if self.shut_down {
            return Err(DriverError::ShutDown);
        }
        Ok(())
    }
}

impl<H: Hal> Drop for Sx127x<H> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("{}: shutdown failed: {e}", self.device_id());
        }
    }
}
