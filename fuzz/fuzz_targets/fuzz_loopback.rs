#![no_main]

use libfuzzer_sys::fuzz_target;
use sx127x_rs::{MockHal, PhyKind, RadioConfig, ResetTiming, Sx127x};

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let config = RadioConfig {
        reset: ResetTiming {
            low_ms: 0,
            settle_ms: 0,
        },
        ..RadioConfig::default()
    };
    let hal = MockHal::new();
    let mut radio = Sx127x::init(hal.clone(), config).unwrap();
    if selector & 1 == 1 {
        radio.set_physical_layer(PhyKind::LoRa).unwrap();
    }

    if payload.len() > radio.max_payload_len() {
        assert!(radio.send(payload).is_err());
        return;
    }
    radio.send(payload).unwrap();
    let frame = hal.take_transmitted().pop().unwrap();
    radio.enable_continuous_rx().unwrap();
    hal.inject_rx(&frame);
    assert_eq!(radio.read(payload.len()).unwrap(), payload);
});
