//! # Raspberry Pi HAL Implementation
//!
//! Hardware abstraction layer for Raspberry Pi 4 and 5 using `rppal`,
//! providing the SX127x register bus over hardware SPI plus the reset and
//! DIO0 lines.
//!
//! ## Hardware Setup
//!
//! #### SPI0 Pins (default)
//! ```text
//! Pi Pin │ BCM GPIO │ SX127x Pin │ Function
//! ───────┼──────────┼────────────┼─────────────
//! 19     │ GPIO 10  │ MOSI       │ SPI data out
//! 21     │ GPIO 9   │ MISO       │ SPI data in
//! 23     │ GPIO 11  │ SCK        │ SPI clock
//! 24     │ GPIO 8   │ NSS        │ Chip select (CE0)
//! ```
//!
//! #### Control Pins (configurable)
//! ```text
//! Pi Pin │ BCM GPIO │ SX127x Pin │ Function
//! ───────┼──────────┼────────────┼─────────────
//! 18     │ GPIO 24  │ DIO0       │ TX/RX done (input)
//! 15     │ GPIO 22  │ NRESET     │ Reset (output, active low)
//! ```
//!
//! SCK/MISO/MOSI are fixed by the SPI controller; the configured values
//! select the controller and are validated against it. The chip select
//! must be one of the controller's hardware CE lines.
//!
//! ## Bus framing
//!
//! Every access is one full-duplex transfer: a header byte carrying the
//! write flag in bit 7 and the register address in bits 6:0, followed by the
//! data bytes. Bursts keep the address fixed for the FIFO and let the chip
//! auto-increment it everywhere else.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use sx127x_rs::config::RadioConfig;
//! use sx127x_rs::radio::driver::Sx127x;
//! use sx127x_rs::radio::hal::RaspberryPiHalBuilder;
//!
//! let config = RadioConfig::default();
//! let hal = RaspberryPiHalBuilder::new().pins(config.pins).build()?;
//! let radio = Sx127x::init(hal, config)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use super::{EdgeType, Hal, HalError, IrqHandler, PinDirection, Pull};
use crate::config::PinConfig;
use crate::constants::SPI_SPEED_HZ;
use crate::radio::registers::bus_header;
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use rppal::spi::{BitOrder, Bus, Error as SpiError, Mode, SlaveSelect, Spi};
use thiserror::Error;

/// Highest SCK the SX127x accepts
const MAX_SPI_SPEED_HZ: u32 = 10_000_000;

/// Errors specific to Raspberry Pi HAL implementation
#[derive(Error, Debug)]
pub enum RpiHalError {
    /// SPI bus initialization failed
    #[error("SPI initialization failed: {0}")]
    SpiInit(#[from] SpiError),
    /// GPIO initialization failed
    #[error("GPIO initialization failed: {0}")]
    GpioInit(#[from] rppal::gpio::Error),
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Fixed pins of one SPI controller: (sck, miso, mosi, ce0, ce1)
fn spi_pins(bus: Bus) -> (u8, u8, u8, u8, u8) {
    match bus {
        Bus::Spi1 => (21, 19, 20, 18, 17),
        _ => (11, 9, 10, 8, 7),
    }
}

/// Pick the controller and chip select matching a pin map
fn select_bus(pins: &PinConfig) -> Result<(Bus, SlaveSelect), RpiHalError> {
    for bus in [Bus::Spi0, Bus::Spi1] {
        let (sck, miso, mosi, ce0, ce1) = spi_pins(bus);
        if (pins.sck, pins.miso, pins.mosi) != (sck, miso, mosi) {
            continue;
        }
        let ss = match pins.cs {
            cs if cs == ce0 => SlaveSelect::Ss0,
            cs if cs == ce1 => SlaveSelect::Ss1,
            cs => {
                return Err(RpiHalError::InvalidConfig(format!(
                    "GPIO {cs} is not a chip select of {bus:?}"
                )))
            }
        };
        return Ok((bus, ss));
    }
    Err(RpiHalError::InvalidConfig(format!(
        "SCK/MISO/MOSI {}/{}/{} do not match any SPI controller",
        pins.sck, pins.miso, pins.mosi
    )))
}

/// Raspberry Pi HAL implementation for SX127x radios
pub struct RaspberryPiHal {
    spi: Spi,
    gpio: Gpio,
    reset_pin: OutputPin,
    dio0_pin: InputPin,
    pins: PinConfig,
}

impl RaspberryPiHal {
    /// Open the SPI controller and claim the reset and DIO0 lines
    ///
    /// # Arguments
    ///
    /// * `pins` - Wiring of the module (BCM numbering)
    /// * `spi_speed` - SCK frequency in Hz
    ///
    /// # SPI Configuration
    ///
    /// - **Mode**: Mode 0 (CPOL=0, CPHA=0)
    /// - **Bit Order**: MSB first
    pub fn new(pins: &PinConfig, spi_speed: u32) -> Result<Self, RpiHalError> {
        let (bus, slave_select) = select_bus(pins)?;
        let spi = Spi::new(bus, slave_select, spi_speed, Mode::Mode0)?;
        spi.set_bit_order(BitOrder::MsbFirst)?;

        let gpio = Gpio::new()?;
        let mut reset_pin = gpio.get(pins.reset)?.into_output();
        // Active low: keep the chip running until the driver pulses it
        reset_pin.set_high();
        let dio0_pin = gpio.get(pins.dio0)?.into_input();

        log::info!("Raspberry Pi HAL initialized:");
        log::info!("  SPI: {bus:?} {slave_select:?} @ {spi_speed} Hz");
        log::info!("  RESET: GPIO {}", pins.reset);
        log::info!("  DIO0: GPIO {}", pins.dio0);

        Ok(Self {
            spi,
            gpio,
            reset_pin,
            dio0_pin,
            pins: *pins,
        })
    }

    pub fn pins(&self) -> &PinConfig {
        &self.pins
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), HalError> {
        self.spi.transfer(rx, tx).map_err(|e| {
            log::error!("SPI transfer failed: {e}");
            HalError::Spi
        })?;
        Ok(())
    }

    fn unknown_pin(&self, pin: u8) -> HalError {
        log::warn!("GPIO {pin} is not wired to the radio");
        HalError::Gpio
    }
}

impl Hal for RaspberryPiHal {
    fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        let mut rx = [0u8; 2];
        self.transfer(&[bus_header(addr, false), 0], &mut rx)?;
        Ok(rx[1])
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        let mut rx = [0u8; 2];
        self.transfer(&[bus_header(addr, true), value], &mut rx)
    }

    fn read_burst(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), HalError> {
        let mut tx = vec![0u8; buf.len() + 1];
        tx[0] = bus_header(addr, false);
        let mut rx = vec![0u8; tx.len()];
        self.transfer(&tx, &mut rx)?;
        buf.copy_from_slice(&rx[1..]);
        Ok(())
    }

    fn write_burst(&mut self, addr: u8, data: &[u8]) -> Result<(), HalError> {
        let mut tx = Vec::with_capacity(data.len() + 1);
        tx.push(bus_header(addr, true));
        tx.extend_from_slice(data);
        let mut rx = vec![0u8; tx.len()];
        self.transfer(&tx, &mut rx)
    }

    fn gpio_read(&mut self, pin: u8) -> Result<bool, HalError> {
        if pin == self.pins.dio0 {
            Ok(self.dio0_pin.read() == Level::High)
        } else if pin == self.pins.reset {
            Ok(self.reset_pin.is_set_high())
        } else {
            Err(self.unknown_pin(pin))
        }
    }

    fn gpio_write(&mut self, pin: u8, value: bool) -> Result<(), HalError> {
        if pin != self.pins.reset {
            return Err(self.unknown_pin(pin));
        }
        if value {
            self.reset_pin.set_high();
        } else {
            self.reset_pin.set_low();
        }
        Ok(())
    }

    /// Directions are fixed at construction: reset out, DIO0 in
    fn gpio_set_direction(&mut self, pin: u8, direction: PinDirection) -> Result<(), HalError> {
        match direction {
            PinDirection::Output if pin == self.pins.reset => Ok(()),
            PinDirection::Input if pin == self.pins.dio0 => Ok(()),
            _ => Err(HalError::InvalidConfig(format!(
                "GPIO {pin} cannot be used as {direction:?}"
            ))),
        }
    }

    fn gpio_set_pull(&mut self, pin: u8, pull: Pull) -> Result<(), HalError> {
        if pin != self.pins.dio0 {
            return Err(self.unknown_pin(pin));
        }
        // rppal fixes the bias when the pin is claimed: claim it again
        let gpio_pin = self.gpio.get(pin).map_err(|e| {
            log::error!("GPIO {pin} unavailable: {e}");
            HalError::Gpio
        })?;
        self.dio0_pin = match pull {
            Pull::None => gpio_pin.into_input(),
            Pull::Up => gpio_pin.into_input_pullup(),
            Pull::Down => gpio_pin.into_input_pulldown(),
        };
        Ok(())
    }

    fn gpio_set_interrupt(
        &mut self,
        pin: u8,
        edge: EdgeType,
        handler: IrqHandler,
    ) -> Result<(), HalError> {
        if pin != self.pins.dio0 {
            return Err(self.unknown_pin(pin));
        }
        let trigger = match edge {
            EdgeType::Rising => Trigger::RisingEdge,
            EdgeType::Falling => Trigger::FallingEdge,
            EdgeType::Both => Trigger::Both,
        };
        self.dio0_pin
            .set_async_interrupt(trigger, move |_level| handler())
            .map_err(|e| {
                log::error!("DIO0 interrupt setup failed: {e}");
                HalError::Gpio
            })
    }

    fn gpio_clear_interrupt(&mut self, pin: u8) -> Result<(), HalError> {
        if pin != self.pins.dio0 {
            return Err(self.unknown_pin(pin));
        }
        self.dio0_pin.clear_async_interrupt().map_err(|e| {
            log::error!("DIO0 interrupt removal failed: {e}");
            HalError::Gpio
        })
    }
}

/// Builder for Raspberry Pi HAL configuration
///
/// # Examples
///
/// ```rust,no_run
/// use sx127x_rs::radio::hal::RaspberryPiHalBuilder;
///
/// let hal = RaspberryPiHalBuilder::new()
///     .spi_speed(8_000_000)
///     .reset_pin(17)
///     .dio0_pin(27)
///     .build()?;
/// # Ok::<(), sx127x_rs::radio::hal::raspberry_pi::RpiHalError>(())
/// ```
pub struct RaspberryPiHalBuilder {
    spi_speed: u32,
    pins: PinConfig,
}

impl Default for RaspberryPiHalBuilder {
    fn default() -> Self {
        Self {
            spi_speed: SPI_SPEED_HZ,
            pins: PinConfig::default(),
        }
    }
}

impl RaspberryPiHalBuilder {
    /// Create a new HAL builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SPI clock speed in Hz (max 10 MHz for SX127x)
    pub fn spi_speed(mut self, speed: u32) -> Self {
        self.spi_speed = speed.min(MAX_SPI_SPEED_HZ);
        self
    }

    /// Take the whole wiring from a board configuration
    pub fn pins(mut self, pins: PinConfig) -> Self {
        self.pins = pins;
        self
    }

    pub fn reset_pin(mut self, pin: u8) -> Self {
        self.pins.reset = pin;
        self
    }

    pub fn dio0_pin(mut self, pin: u8) -> Self {
        self.pins.dio0 = pin;
        self
    }

    /// Build the HAL instance with current configuration
    pub fn build(self) -> Result<RaspberryPiHal, RpiHalError> {
        if self.spi_speed == 0 {
            return Err(RpiHalError::InvalidConfig(
                "SPI speed must be non-zero".to_string(),
            ));
        }
        if self.pins.reset == self.pins.dio0 {
            return Err(RpiHalError::InvalidConfig(format!(
                "GPIO {} used for both reset and DIO0",
                self.pins.reset
            )));
        }
        RaspberryPiHal::new(&self.pins, self.spi_speed)
    }
}
