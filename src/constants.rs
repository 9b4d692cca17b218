//! SX127x Chip Constants
//!
//! This module defines chip-wide constants for the Semtech SX1276/77/78/79
//! transceiver family, taken from the SX1276/77/78/79 datasheet (rev. 7)
//! and the SX1276/77/78 errata note.

/// Crystal oscillator reference frequency in Hz (FXOSC)
pub const FXOSC_HZ: u32 = 32_000_000;

/// FSK synthesizer frequency step in Hz (FXOSC / 2^19)
pub const FSK_FREQ_STEP_HZ: f64 = 61.035_156_25;

/// Width of the LoRa synthesizer fixed-point fraction (FRF = freq * 2^19 / FXOSC)
pub const FRF_FRACTION_BITS: u32 = 19;

/// Value of `RegVersion` for silicon this driver targets
pub const EXPECTED_VERSION: u8 = 0x12;

/// Phase-lock settle window after a synthesizer write (datasheet table 7)
pub const PLL_LOCK_TIME_US: u64 = 50;

/// FSK FIFO depth in bytes
pub const FSK_FIFO_SIZE: usize = 64;

/// Largest encoded FSK frame: the FIFO threshold field is six bits wide
pub const FSK_MAX_ENCODED_LEN: usize = 63;

/// LoRa data buffer size in bytes
pub const LORA_FIFO_SIZE: usize = 256;

/// Largest LoRa payload (`RegPayloadLength` is eight bits)
pub const LORA_MAX_PAYLOAD_LEN: usize = 255;

/// LoRa buffer base address used for transmission
pub const LORA_TX_BASE_ADDR: u8 = 0x80;

/// LoRa buffer base address used for reception
pub const LORA_RX_BASE_ADDR: u8 = 0x00;

/// Receiver sensitivity used for FSK link quality (dBm)
///
/// Not measured by the chip; empirically tuned for the default
/// bitrate/bandwidth pair.
pub const FSK_RX_SENSITIVITY_DBM: i32 = -95;

/// Strongest RSSI considered for FSK link quality (dBm)
pub const FSK_MAX_RSSI_DBM: i32 = 0;

/// Strongest RSSI considered for LoRa link quality (dBm)
pub const LORA_MAX_RSSI_DBM: i32 = 1;

/// RSSI floor on the high-frequency RF port (dBm)
pub const LORA_HF_RSSI_FLOOR_DBM: i32 = -157;

/// RSSI floor on the low-frequency RF port (dBm)
pub const LORA_LF_RSSI_FLOOR_DBM: i32 = -164;

/// Lowest carrier routed through the high-frequency port (band 1, 779 MHz)
pub const HF_PORT_MIN_HZ: u32 = 779_000_000;

/// Default transmit power programmed at init (dBm)
pub const DEFAULT_TX_POWER_DBM: i32 = 17;

/// Default SPI clock; 10 MHz produces corrupted reads of `RegModemConfig1`
pub const SPI_SPEED_HZ: u32 = 9_000_000;

/// Default GPIO pins (BCM numbering, can be overridden in configuration)
pub const DEFAULT_RESET_PIN: u8 = 22;
pub const DEFAULT_CS_PIN: u8 = 8;
pub const DEFAULT_SCK_PIN: u8 = 11;
pub const DEFAULT_MISO_PIN: u8 = 9;
pub const DEFAULT_MOSI_PIN: u8 = 10;
pub const DEFAULT_DIO0_PIN: u8 = 24;

/// Reset pulse timing defaults in milliseconds
pub const DEFAULT_RESET_LOW_MS: u64 = 20;
pub const DEFAULT_RESET_SETTLE_MS: u64 = 50;

/// How long shutdown waits for the completion worker before detaching it
pub const WORKER_STOP_TIMEOUT_MS: u64 = 500;
