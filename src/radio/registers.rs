//! # SX127x Register Definitions and Constants
//!
//! Register addresses, operating-mode bit patterns, interrupt flag layouts and
//! DIO mappings for the SX1276/77/78/79. The chip exposes two register pages
//! that share the 0x00-0x3F address range: which one is visible depends on the
//! `LongRangeMode` bit of `RegOpMode`. Addresses at 0x40 and above are common.
//!
//! ## Register Map
//!
//! - 0x00-0x0C: common (FIFO, operating mode, synthesizer, PA, LNA)
//! - 0x0D-0x3F: FSK page or LoRa page, selected by `RegOpMode` bit 7
//! - 0x40-0x4D: common (DIO mapping, version, PA DAC)
//!
//! ## Bus Framing
//!
//! Each access is one full-duplex exchange: a header byte carrying the
//! write bit and a 7-bit address, followed by the data lane. Burst accesses
//! keep the address fixed for `RegFifo` and auto-increment it otherwise.

use bitflags::bitflags;

// =============================================================================
// Common Registers
// =============================================================================

/// FIFO read/write access
pub const REG_FIFO: u8 = 0x00;

/// Operating mode and PHY selection
pub const REG_OP_MODE: u8 = 0x01;

/// RF carrier frequency (MSB)
pub const REG_FRF_MSB: u8 = 0x06;

/// RF carrier frequency (MID)
pub const REG_FRF_MID: u8 = 0x07;

/// RF carrier frequency (LSB)
pub const REG_FRF_LSB: u8 = 0x08;

/// PA selection and output power control
pub const REG_PA_CONFIG: u8 = 0x09;

/// PA ramp time (and FSK Gaussian shaping)
pub const REG_PA_RAMP: u8 = 0x0A;

/// LNA gain and boost
pub const REG_LNA: u8 = 0x0C;

/// Mapping of pins DIO0 to DIO3
pub const REG_DIO_MAPPING_1: u8 = 0x40;

/// Mapping of pins DIO4 and DIO5, ClkOut frequency
pub const REG_DIO_MAPPING_2: u8 = 0x41;

/// Silicon revision (read-only)
pub const REG_VERSION: u8 = 0x42;

/// High power PA settings
pub const REG_PA_DAC: u8 = 0x4D;

// =============================================================================
// FSK Page
// =============================================================================

pub const REG_FSK_BITRATE_MSB: u8 = 0x02;
pub const REG_FSK_BITRATE_LSB: u8 = 0x03;
pub const REG_FSK_FDEV_MSB: u8 = 0x04;
pub const REG_FSK_FDEV_LSB: u8 = 0x05;
pub const REG_FSK_RX_CONFIG: u8 = 0x0D;
pub const REG_FSK_RSSI_THRESH: u8 = 0x10;
pub const REG_FSK_RSSI_VALUE: u8 = 0x11;
pub const REG_FSK_RX_BW: u8 = 0x12;
pub const REG_FSK_AFC_BW: u8 = 0x13;
pub const REG_FSK_FEI_MSB: u8 = 0x1D;
pub const REG_FSK_FEI_LSB: u8 = 0x1E;
pub const REG_FSK_PREAMBLE_DETECT: u8 = 0x1F;
pub const REG_FSK_PREAMBLE_MSB: u8 = 0x25;
pub const REG_FSK_PREAMBLE_LSB: u8 = 0x26;
pub const REG_FSK_SYNC_CONFIG: u8 = 0x27;
pub const REG_FSK_SYNC_VALUE_1: u8 = 0x28;
pub const REG_FSK_SYNC_VALUE_2: u8 = 0x29;
pub const REG_FSK_SYNC_VALUE_3: u8 = 0x2A;
pub const REG_FSK_SYNC_VALUE_4: u8 = 0x2B;
pub const REG_FSK_PACKET_CONFIG_1: u8 = 0x30;
pub const REG_FSK_PACKET_CONFIG_2: u8 = 0x31;
pub const REG_FSK_PAYLOAD_LENGTH: u8 = 0x32;

/// FIFO threshold and TX start condition; doubles as the RX start level
pub const REG_FSK_FIFO_THRESH: u8 = 0x35;

pub const REG_FSK_IRQ_FLAGS_1: u8 = 0x3E;
pub const REG_FSK_IRQ_FLAGS_2: u8 = 0x3F;

// =============================================================================
// LoRa Page
// =============================================================================

pub const REG_LORA_FIFO_ADDR_PTR: u8 = 0x0D;
pub const REG_LORA_FIFO_TX_BASE_ADDR: u8 = 0x0E;
pub const REG_LORA_FIFO_RX_BASE_ADDR: u8 = 0x0F;
pub const REG_LORA_FIFO_RX_CURRENT_ADDR: u8 = 0x10;
pub const REG_LORA_IRQ_FLAGS: u8 = 0x12;
pub const REG_LORA_RX_NB_BYTES: u8 = 0x13;

/// Packet SNR in 0.25 dB steps; must be read together with `REG_LORA_PKT_RSSI_VALUE`
pub const REG_LORA_PKT_SNR_VALUE: u8 = 0x19;
pub const REG_LORA_PKT_RSSI_VALUE: u8 = 0x1A;

pub const REG_LORA_MODEM_CONFIG_1: u8 = 0x1D;
pub const REG_LORA_MODEM_CONFIG_2: u8 = 0x1E;
pub const REG_LORA_PREAMBLE_MSB: u8 = 0x20;
pub const REG_LORA_PREAMBLE_LSB: u8 = 0x21;
pub const REG_LORA_PAYLOAD_LENGTH: u8 = 0x22;
pub const REG_LORA_MODEM_CONFIG_3: u8 = 0x26;
pub const REG_LORA_PPM_CORRECTION: u8 = 0x27;

/// Frequency error indicator, 20-bit two's complement over three registers
pub const REG_LORA_FEI_MSB: u8 = 0x28;
pub const REG_LORA_FEI_MID: u8 = 0x29;
pub const REG_LORA_FEI_LSB: u8 = 0x2A;

pub const REG_LORA_RSSI_WIDEBAND: u8 = 0x2C;
pub const REG_LORA_DETECTION_OPTIMIZE: u8 = 0x31;

/// Errata 2.1 register (sensitivity optimisation at 500 kHz)
pub const REG_LORA_DETECTION_BW500_OPTIMIZE_1: u8 = 0x36;
pub const REG_LORA_DETECTION_THRESHOLD: u8 = 0x37;
pub const REG_LORA_SYNC_WORD: u8 = 0x39;

/// Errata 2.1 register (sensitivity optimisation at 500 kHz)
pub const REG_LORA_DETECTION_BW500_OPTIMIZE_2: u8 = 0x3A;

// =============================================================================
// Operating Mode Bit Patterns (RegOpMode)
// =============================================================================

/// `LongRangeMode` bit: set selects the LoRa page
pub const MODE_LONG_RANGE: u8 = 0x80;

/// Low-frequency register page bit (reset default 1)
pub const MODE_LOW_FREQUENCY: u8 = 0x08;

/// Mask of the three activity bits
pub const MODE_MASK: u8 = 0x07;

pub const MODE_SLEEP: u8 = 0x00;
pub const MODE_STANDBY: u8 = 0x01;
pub const MODE_FS_TX: u8 = 0x02;
pub const MODE_TX: u8 = 0x03;
pub const MODE_FS_RX: u8 = 0x04;
pub const MODE_RX_CONTINUOUS: u8 = 0x05;
pub const MODE_RX_SINGLE: u8 = 0x06;
pub const MODE_CAD: u8 = 0x07;

// =============================================================================
// IRQ Flag Definitions
// =============================================================================

bitflags! {
    /// FSK `RegIrqFlags1`
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FskIrq1: u8 {
        const SYNC_ADDRESS_MATCH = 0x01;
        const PREAMBLE_DETECT    = 0x02;
        const TIMEOUT            = 0x04;
        const RSSI               = 0x08;
        const PLL_LOCK           = 0x10;
        const TX_READY           = 0x20;
        const RX_READY           = 0x40;
        /// Requested mode transition completed
        const MODE_READY         = 0x80;
    }
}

bitflags! {
    /// FSK `RegIrqFlags2`
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FskIrq2: u8 {
        const LOW_BAT        = 0x01;
        const CRC_OK         = 0x02;
        const PAYLOAD_READY  = 0x04;
        const PACKET_SENT    = 0x08;
        const FIFO_OVERRUN   = 0x10;
        const FIFO_LEVEL     = 0x20;
        const FIFO_EMPTY     = 0x40;
        const FIFO_FULL      = 0x80;
    }
}

bitflags! {
    /// LoRa `RegIrqFlags`; bits are cleared by writing them back as ones
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LoRaIrq: u8 {
        const CAD_DETECTED        = 0x01;
        const FHSS_CHANGE_CHANNEL = 0x02;
        const CAD_DONE            = 0x04;
        const TX_DONE             = 0x08;
        const VALID_HEADER        = 0x10;
        const PAYLOAD_CRC_ERROR   = 0x20;
        const RX_DONE             = 0x40;
        const RX_TIMEOUT          = 0x80;
    }
}

// =============================================================================
// DIO0 Mappings (RegDioMapping1 bits 7:6)
// =============================================================================

/// Bit offset of the DIO0 field in `RegDioMapping1`
pub const DIO0_SHIFT: u8 = 6;

pub const DIO0_LORA_RX_DONE: u8 = 0 << DIO0_SHIFT;
pub const DIO0_LORA_TX_DONE: u8 = 1 << DIO0_SHIFT;
pub const DIO0_LORA_NONE: u8 = 3 << DIO0_SHIFT;

/// Packet mode: PayloadReady while receiving, PacketSent while transmitting
pub const DIO0_FSK_PAYLOAD_READY: u8 = 0 << DIO0_SHIFT;
pub const DIO0_FSK_PACKET_SENT: u8 = DIO0_FSK_PAYLOAD_READY;
pub const DIO0_FSK_NONE: u8 = 2 << DIO0_SHIFT;

/// DIO5 routed to ClkOut (`RegDioMapping2` bit 5)
pub const DIO5_CLK_OUT: u8 = 1 << 5;

// =============================================================================
// Field Values
// =============================================================================

/// FSK FIFO threshold: start transmitting as soon as the FIFO is not empty
pub const FSK_TX_START_FIFO_NOT_EMPTY: u8 = 0x80;

/// Mask of the FIFO threshold level field
pub const FSK_FIFO_THRESHOLD_MASK: u8 = 0x3F;

/// `RegPaConfig` PaSelect: route output through PA_BOOST
pub const PA_BOOST: u8 = 0x80;

/// `RegPaConfig` MaxPower field used with the RFO output
pub const PA_RFO_MAX_POWER: u8 = 0x70;

/// `RegPaDac` default (+17 dBm ceiling on PA_BOOST)
pub const PA_DAC_DEFAULT: u8 = 0x84;

/// `RegPaDac` +20 dBm ceiling on PA_BOOST
pub const PA_DAC_HIGH_POWER: u8 = 0x87;

/// `RegLna` LnaBoostHf: 150% LNA current
pub const LNA_BOOST_HF: u8 = 0x03;

/// `RegModemConfig3` AgcAutoOn
pub const LORA_AGC_AUTO_ON: u8 = 0x04;

/// `RegModemConfig3` LowDataRateOptimize
pub const LORA_LOW_DATA_RATE_OPTIMIZE: u8 = 0x08;

/// `RegModemConfig2` RxPayloadCrcOn
pub const LORA_RX_PAYLOAD_CRC_ON: u8 = 0x04;

/// `RegModemConfig1` ImplicitHeaderModeOn
pub const LORA_IMPLICIT_HEADER: u8 = 0x01;

/// Detection optimize/threshold pair for SF6
pub const LORA_DETECTION_SF6: (u8, u8) = (0xC5, 0x0C);

/// Detection optimize/threshold pair for SF7..SF12
pub const LORA_DETECTION_SF7_TO_12: (u8, u8) = (0xC3, 0x0A);

/// Sync word reserved for LoRaWAN networks
pub const LORA_SYNC_WORD_LORAWAN: u8 = 0x34;

// FSK baseline applied when switching into FSK

/// AFC and AGC automatic, receiver triggered on preamble detect
pub const FSK_RX_CONFIG_BASELINE: u8 = 0x08 | 0x06;

/// Detector on, 2-byte detector, 10 chip error tolerance
pub const FSK_PREAMBLE_DETECT_BASELINE: u8 = 1 << 7 | 1 << 5 | 10;

/// Auto-restart on, 0xAA preamble polarity, sync on, 4-byte sync
pub const FSK_SYNC_CONFIG_BASELINE: u8 = 2 << 5 | 1 << 4 | 0x03;

/// Sync word programmed into `REG_FSK_SYNC_VALUE_1..4`
pub const FSK_SYNC_WORD: [u8; 4] = [0x69, 0x81, 0x7E, 0x96];

/// Fixed length, Manchester DC-free coding, hardware CRC off
pub const FSK_PACKET_CONFIG_1_BASELINE: u8 = 1 << 5;

// =============================================================================
// Bus Framing
// =============================================================================

/// Write flag in the bus header byte
pub const BUS_WRITE: u8 = 0x80;

/// Build the header byte for a register access
///
/// # Examples
/// ```rust
/// use sx127x_rs::radio::registers::{bus_header, REG_OP_MODE};
///
/// assert_eq!(bus_header(REG_OP_MODE, false), 0x01);
/// assert_eq!(bus_header(REG_OP_MODE, true), 0x81);
/// ```
pub const fn bus_header(addr: u8, write: bool) -> u8 {
    let addr = addr & 0x7F;
    if write {
        BUS_WRITE | addr
    } else {
        addr
    }
}

/// Registers that keep their address during a burst access
pub const fn is_fifo(addr: u8) -> bool {
    addr & 0x7F == REG_FIFO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_header_encoding() {
        assert_eq!(bus_header(REG_FIFO, true), 0x80);
        assert_eq!(bus_header(REG_VERSION, false), 0x42);
        assert_eq!(bus_header(REG_PA_DAC, true), 0xCD);
        // Address is truncated to seven bits
        assert_eq!(bus_header(0xFF, false), 0x7F);
        assert!(is_fifo(0x80));
        assert!(!is_fifo(REG_OP_MODE));
    }

    #[test]
    fn test_dio0_mappings_live_in_top_bits() {
        for value in [
            DIO0_LORA_RX_DONE,
            DIO0_LORA_TX_DONE,
            DIO0_LORA_NONE,
            DIO0_FSK_PAYLOAD_READY,
            DIO0_FSK_NONE,
        ] {
            assert_eq!(value & 0x3F, 0);
        }
        assert_eq!(DIO0_LORA_TX_DONE, 0x40);
        assert_eq!(DIO0_LORA_NONE, 0xC0);
        assert_eq!(DIO0_FSK_NONE, 0x80);
    }

    #[test]
    fn test_irq_layouts() {
        assert_eq!(LoRaIrq::TX_DONE.bits(), 0x08);
        assert_eq!(LoRaIrq::RX_DONE.bits(), 0x40);
        assert_eq!(LoRaIrq::PAYLOAD_CRC_ERROR.bits(), 0x20);
        assert_eq!(FskIrq1::MODE_READY.bits(), 0x80);
        assert_eq!(FskIrq2::PACKET_SENT.bits(), 0x08);
        assert_eq!(FskIrq2::PAYLOAD_READY.bits(), 0x04);
    }

    #[test]
    fn test_fsk_baseline_values() {
        assert_eq!(FSK_RX_CONFIG_BASELINE, 0x0E);
        assert_eq!(FSK_PREAMBLE_DETECT_BASELINE, 0xAA);
        assert_eq!(FSK_SYNC_CONFIG_BASELINE, 0x53);
        assert_eq!(FSK_PACKET_CONFIG_1_BASELINE, 0x20);
    }

    #[test]
    fn test_detection_pairs() {
        assert_eq!(LORA_DETECTION_SF6, (0xC5, 0x0C));
        assert_eq!(LORA_DETECTION_SF7_TO_12, (0xC3, 0x0A));
    }
}
