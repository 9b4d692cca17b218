//! # Operating Mode State Machine
//!
//! One write to `RegOpMode` selects both the physical layer (FSK or LoRa)
//! and the activity (sleep, standby, TX, RX...). `Chip` is the register
//! front-end the driver talks through: it owns the HAL, caches the last
//! written mode so redundant mode writes are suppressed, and implements the
//! sequencing helpers every configuration path relies on.
//!
//! ## Rules enforced here
//!
//! - Configuration registers only accept writes in sleep or standby.
//!   [`Chip::prepare_write`] gets the chip there: FSK is always forced to
//!   sleep, LoRa is moved to standby only when it is neither sleeping nor
//!   idle. The previous activity is *not* restored afterwards.
//! - Switching the physical layer always passes through sleep.
//! - FSK FIFO writes are dropped until the chip has fully entered sleep,
//!   which is what [`Chip::wait_mode_ready`] is for.

use crate::constants::PLL_LOCK_TIME_US;
use crate::radio::hal::{spin_wait_micros, Clock, Hal, HalError};
use crate::radio::registers::*;
use std::fmt;

/// Physical layer selected by `RegOpMode` bit 7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhyKind {
    /// (G)FSK packet engine
    Fsk,
    /// LoRa spread-spectrum modem
    LoRa,
}

impl fmt::Display for PhyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhyKind::Fsk => write!(f, "FSK"),
            PhyKind::LoRa => write!(f, "LoRa"),
        }
    }
}

/// Chip activity encoded in `RegOpMode` bits 2:0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Sleep,
    Standby,
    FsTx,
    Tx,
    FsRx,
    RxContinuous,
    RxSingle,
    Cad,
}

impl Activity {
    pub fn bits(self) -> u8 {
        match self {
            Activity::Sleep => MODE_SLEEP,
            Activity::Standby => MODE_STANDBY,
            Activity::FsTx => MODE_FS_TX,
            Activity::Tx => MODE_TX,
            Activity::FsRx => MODE_FS_RX,
            Activity::RxContinuous => MODE_RX_CONTINUOUS,
            Activity::RxSingle => MODE_RX_SINGLE,
            Activity::Cad => MODE_CAD,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & MODE_MASK {
            MODE_SLEEP => Activity::Sleep,
            MODE_STANDBY => Activity::Standby,
            MODE_FS_TX => Activity::FsTx,
            MODE_TX => Activity::Tx,
            MODE_FS_RX => Activity::FsRx,
            MODE_RX_CONTINUOUS => Activity::RxContinuous,
            MODE_RX_SINGLE => Activity::RxSingle,
            _ => Activity::Cad,
        }
    }

    /// Sleep and standby are the only states that accept configuration writes
    pub fn accepts_config(self) -> bool {
        matches!(self, Activity::Sleep | Activity::Standby)
    }
}

/// Full `RegOpMode` value as cached by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpMode {
    pub phy: PhyKind,
    pub activity: Activity,
}

impl OpMode {
    pub const fn new(phy: PhyKind, activity: Activity) -> Self {
        Self { phy, activity }
    }

    /// Encode as a `RegOpMode` byte
    ///
    /// # Examples
    /// ```rust
    /// use sx127x_rs::radio::mode::{Activity, OpMode, PhyKind};
    ///
    /// assert_eq!(OpMode::new(PhyKind::LoRa, Activity::Tx).bits(), 0x83);
    /// assert_eq!(OpMode::new(PhyKind::Fsk, Activity::RxContinuous).bits(), 0x05);
    /// ```
    pub fn bits(self) -> u8 {
        let phy = match self.phy {
            PhyKind::Fsk => 0,
            PhyKind::LoRa => MODE_LONG_RANGE,
        };
        phy | self.activity.bits()
    }

    pub fn from_bits(bits: u8) -> Self {
        let phy = if bits & MODE_LONG_RANGE != 0 {
            PhyKind::LoRa
        } else {
            PhyKind::Fsk
        };
        Self::new(phy, Activity::from_bits(bits))
    }

    /// Same physical layer, different activity
    pub fn with_activity(self, activity: Activity) -> Self {
        Self::new(self.phy, activity)
    }
}

/// Register front-end: HAL access plus the cached operating mode
pub struct Chip<H: Hal> {
    hal: H,
    clock: Box<dyn Clock + Send>,
    op_mode: OpMode,
}

impl<H: Hal> Chip<H> {
    /// Wrap a HAL; the cached mode is a placeholder until [`Chip::sync_op_mode`]
    pub fn new(hal: H, clock: Box<dyn Clock + Send>) -> Self {
        Self {
            hal,
            clock,
            op_mode: OpMode::new(PhyKind::Fsk, Activity::Standby),
        }
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    pub fn op_mode(&self) -> OpMode {
        self.op_mode
    }

    pub fn phy(&self) -> PhyKind {
        self.op_mode.phy
    }

    pub fn read(&mut self, addr: u8) -> Result<u8, HalError> {
        self.hal.read_register(addr)
    }

    pub fn write(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        log::trace!("write 0x{addr:02X} <- 0x{value:02X}");
        self.hal.write_register(addr, value)
    }

    pub fn read_burst(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), HalError> {
        self.hal.read_burst(addr, buf)
    }

    pub fn write_burst(&mut self, addr: u8, data: &[u8]) -> Result<(), HalError> {
        log::trace!("burst 0x{addr:02X} <- {} bytes", data.len());
        self.hal.write_burst(addr, data)
    }

    /// Read-modify-write: keep the bits in `keep`, then OR in `set`
    pub fn modify(&mut self, addr: u8, keep: u8, set: u8) -> Result<(), HalError> {
        let value = self.read(addr)?;
        self.write(addr, (value & keep) | set)
    }

    /// Write a big-endian 16-bit value into an MSB/LSB register pair
    pub fn write_u16(&mut self, msb_addr: u8, value: u16) -> Result<(), HalError> {
        self.write(msb_addr, (value >> 8) as u8)?;
        self.write(msb_addr + 1, value as u8)
    }

    /// Load the cache from the chip's current `RegOpMode`
    pub fn sync_op_mode(&mut self) -> Result<OpMode, HalError> {
        let raw = self.read(REG_OP_MODE)?;
        self.op_mode = OpMode::from_bits(raw);
        Ok(self.op_mode)
    }

    /// Write `RegOpMode` unless the cache says the chip is already there
    pub fn set_op_mode(&mut self, mode: OpMode) -> Result<(), HalError> {
        if mode == self.op_mode {
            return Ok(());
        }
        self.write(REG_OP_MODE, mode.bits())?;
        self.op_mode = mode;
        Ok(())
    }

    /// Change activity on the current physical layer
    pub fn set_activity(&mut self, activity: Activity) -> Result<(), HalError> {
        self.set_op_mode(self.op_mode.with_activity(activity))
    }

    pub fn sleep(&mut self) -> Result<(), HalError> {
        self.set_activity(Activity::Sleep)
    }

    pub fn standby(&mut self) -> Result<(), HalError> {
        self.set_activity(Activity::Standby)
    }

    /// Switch physical layer through sleep; returns `true` if anything changed
    pub fn switch_phy(&mut self, phy: PhyKind) -> Result<bool, HalError> {
        if self.op_mode.phy == phy {
            return Ok(false);
        }
        self.sleep()?;
        self.set_op_mode(OpMode::new(phy, Activity::Sleep))?;
        Ok(true)
    }

    /// Put the chip in a state where configuration writes take effect
    pub fn prepare_write(&mut self) -> Result<(), HalError> {
        match self.op_mode.phy {
            PhyKind::Fsk => self.sleep(),
            PhyKind::LoRa if !self.op_mode.activity.accepts_config() => self.standby(),
            PhyKind::LoRa => Ok(()),
        }
    }

    /// Poll `RegIrqFlags1` until ModeReady is set. No timeout.
    pub fn wait_mode_ready(&mut self) -> Result<(), HalError> {
        loop {
            let flags = FskIrq1::from_bits_truncate(self.read(REG_FSK_IRQ_FLAGS_1)?);
            if flags.contains(FskIrq1::MODE_READY) {
                return Ok(());
            }
            std::hint::spin_loop();
        }
    }

    /// Busy-wait for the synthesizer to lock after an FRF write
    pub fn settle_pll(&self) {
        spin_wait_micros(self.clock.as_ref(), PLL_LOCK_TIME_US);
    }

    pub fn into_hal(self) -> H {
        self.hal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::hal::{MockHal, MonotonicClock};

    fn chip() -> (Chip<MockHal>, MockHal) {
        let hal = MockHal::new();
        let mut chip = Chip::new(hal.clone(), Box::new(MonotonicClock::new()));
        chip.sync_op_mode().unwrap();
        hal.clear_log();
        (chip, hal)
    }

    #[test]
    fn test_op_mode_encoding() {
        for bits in [0x00, 0x01, 0x03, 0x05, 0x80, 0x81, 0x83, 0x85, 0x87] {
            assert_eq!(OpMode::from_bits(bits).bits(), bits);
        }
        // The low-frequency page bit is not part of the cached mode
        assert_eq!(
            OpMode::from_bits(0x09),
            OpMode::new(PhyKind::Fsk, Activity::Standby)
        );
    }

    #[test]
    fn test_set_op_mode_suppresses_repeats() {
        let (mut chip, hal) = chip();
        chip.sleep().unwrap();
        chip.sleep().unwrap();
        chip.standby().unwrap();
        assert_eq!(hal.writes_to(REG_OP_MODE), vec![0x00, 0x01]);
    }

    #[test]
    fn test_prepare_write_fsk_always_sleeps() {
        let (mut chip, hal) = chip();
        chip.set_activity(Activity::RxContinuous).unwrap();
        chip.prepare_write().unwrap();
        assert_eq!(chip.op_mode().activity, Activity::Sleep);
        assert_eq!(hal.writes_to(REG_OP_MODE), vec![0x05, 0x00]);
    }

    #[test]
    fn test_prepare_write_lora_keeps_idle_states() {
        let (mut chip, hal) = chip();
        chip.switch_phy(PhyKind::LoRa).unwrap();
        hal.clear_log();

        chip.prepare_write().unwrap();
        assert!(hal.writes_to(REG_OP_MODE).is_empty());

        chip.set_activity(Activity::Tx).unwrap();
        chip.prepare_write().unwrap();
        assert_eq!(hal.writes_to(REG_OP_MODE), vec![0x83, 0x81]);
        // Not restored afterwards
        assert_eq!(chip.op_mode().activity, Activity::Standby);
    }

    #[test]
    fn test_switch_phy_routes_through_sleep() {
        let (mut chip, hal) = chip();
        assert!(chip.switch_phy(PhyKind::LoRa).unwrap());
        assert_eq!(hal.writes_to(REG_OP_MODE), vec![0x00, 0x80]);
        assert!(!chip.switch_phy(PhyKind::LoRa).unwrap());
    }

    #[test]
    fn test_modify_and_u16() {
        let (mut chip, hal) = chip();
        hal.set_fsk_register(REG_LNA, 0x20);
        chip.modify(REG_LNA, 0xFF, LNA_BOOST_HF).unwrap();
        assert_eq!(hal.fsk_register(REG_LNA), 0x23);

        chip.write_u16(REG_FSK_BITRATE_MSB, 0x0683).unwrap();
        assert_eq!(hal.fsk_register(REG_FSK_BITRATE_MSB), 0x06);
        assert_eq!(hal.fsk_register(REG_FSK_BITRATE_LSB), 0x83);
    }
}
