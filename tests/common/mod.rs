// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};
use sx127x_rs::{MockHal, RadioConfig, ResetTiming, Sx127x};

pub fn fast_config() -> RadioConfig {
    RadioConfig {
        reset: ResetTiming {
            low_ms: 0,
            settle_ms: 0,
        },
        ..RadioConfig::default()
    }
}

/// Device on a fresh simulated chip that raises DIO0 on every TX/RX
pub fn radio() -> (Sx127x<MockHal>, MockHal) {
    let config = fast_config();
    let hal = MockHal::new();
    hal.set_auto_interrupt(Some(config.pins.dio0));
    let radio = Sx127x::init(hal.clone(), config).expect("init");
    (radio, hal)
}

pub fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}
