//! # Hardware Abstraction Layer for Radio Hardware
//!
//! This module defines the HAL trait the SX127x driver is written against,
//! plus the monotonic clock used for the short busy-wait after synthesizer
//! writes. Platform implementations live in submodules: a register-file
//! simulator for tests and host tooling, and an `rppal` backend for the
//! Raspberry Pi behind the `raspberry-pi` feature.

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur during HAL operations
#[derive(Debug, Error)]
pub enum HalError {
    #[error("SPI communication error")]
    Spi,

    #[error("GPIO operation error")]
    Gpio,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// GPIO edge detection types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeType {
    /// Trigger on rising edge (low to high)
    Rising,
    /// Trigger on falling edge (high to low)
    Falling,
    /// Trigger on both edges
    Both,
}

/// GPIO pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

/// Internal pull resistor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
    Down,
}

/// Handler invoked from interrupt context when a configured edge is seen.
///
/// Runs on whatever thread the platform delivers interrupts on, so it must
/// not block; the driver only uses it to post a wake message.
pub type IrqHandler = Arc<dyn Fn() + Send + Sync>;

/// Hardware Abstraction Layer trait for SX127x radio control
///
/// Register addresses are the 7-bit chip addresses; implementations add the
/// write bit when framing the bus transaction.
pub trait Hal {
    /// Read a single register
    fn read_register(&mut self, addr: u8) -> Result<u8, HalError>;

    /// Write a single register
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError>;

    /// Read consecutive bytes in one transaction starting at `addr`
    fn read_burst(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), HalError>;

    /// Write consecutive bytes in one transaction starting at `addr`
    fn write_burst(&mut self, addr: u8, data: &[u8]) -> Result<(), HalError>;

    /// Read the state of a GPIO pin
    fn gpio_read(&mut self, pin: u8) -> Result<bool, HalError>;

    /// Write to a GPIO pin
    fn gpio_write(&mut self, pin: u8, value: bool) -> Result<(), HalError>;

    /// Configure a GPIO pin as input or output
    fn gpio_set_direction(&mut self, pin: u8, direction: PinDirection) -> Result<(), HalError>;

    /// Configure the pull resistor of an input pin
    fn gpio_set_pull(&mut self, pin: u8, pull: Pull) -> Result<(), HalError>;

    /// Register an edge interrupt handler on a pin, replacing any previous one
    fn gpio_set_interrupt(
        &mut self,
        pin: u8,
        edge: EdgeType,
        handler: IrqHandler,
    ) -> Result<(), HalError>;

    /// Remove the interrupt handler from a pin
    fn gpio_clear_interrupt(&mut self, pin: u8) -> Result<(), HalError>;
}

/// Monotonic time source for sub-millisecond waits
pub trait Clock {
    /// Microseconds since an arbitrary fixed origin; never goes backwards
    fn now_micros(&self) -> u64;
}

/// `Clock` backed by `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> u64 {
        let elapsed: Duration = self.origin.elapsed();
        elapsed.as_micros() as u64
    }
}

/// Busy-wait until `micros` have elapsed on `clock`.
///
/// Sleeping would hand the thread to the scheduler for far longer than the
/// requested window, so this spins.
pub fn spin_wait_micros(clock: &dyn Clock, micros: u64) {
    let start = clock.now_micros();
    while clock.now_micros().saturating_sub(start) < micros {
        std::hint::spin_loop();
    }
}

pub mod mock;

// Platform implementations
#[cfg(feature = "raspberry-pi")]
pub mod raspberry_pi;

pub use mock::{BusEvent, MockHal};

#[cfg(feature = "raspberry-pi")]
pub use raspberry_pi::{RaspberryPiHal, RaspberryPiHalBuilder};
