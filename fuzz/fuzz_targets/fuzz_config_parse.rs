#![no_main]

use libfuzzer_sys::fuzz_target;
use sx127x_rs::RadioConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = RadioConfig::from_json(json) {
        // Accepted configs survive a save/load cycle
        let again = serde_json::to_string(&config).unwrap();
        assert_eq!(RadioConfig::from_json(&again).unwrap(), config);
    }
});
