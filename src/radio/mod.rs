//! # SX127x Radio Stack
//!
//! Layered from the bus up: [`hal`] moves bytes and toggles pins,
//! [`registers`] names them, [`mode`] owns the operating mode, [`calib`],
//! [`modulation`], [`fec`] and [`quality`] hold the arithmetic, [`modem`]
//! splits FSK from LoRa, [`irq`] runs completion in a worker thread and
//! [`driver`] puts it together as [`Sx127x`].

pub mod calib;
pub mod driver;
pub mod fec;
pub mod hal;
pub mod irq;
pub mod mode;
pub mod modem;
pub mod modulation;
pub mod quality;
pub mod registers;

pub use driver::{Sx127x, Sx127xBuilder};
pub use fec::{FecCodec, FecError, Hamming84};
pub use hal::{Hal, HalError, MockHal};
pub use irq::{CompletionReason, CompletionStatus, DeviceId};
pub use mode::{Activity, PhyKind};
pub use modulation::{CodingRate, HeaderMode, LoRaBandwidth, SpreadingFactor};
pub use quality::SignalQuality;
