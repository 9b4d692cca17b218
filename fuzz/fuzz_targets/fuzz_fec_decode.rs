#![no_main]

use libfuzzer_sys::fuzz_target;
use sx127x_rs::radio::fec::{FecCodec, Hamming84};

fuzz_target!(|data: &[u8]| {
    let codec = Hamming84::new();

    // Arbitrary FIFO contents, including odd lengths
    let _ = codec.decode(data, data.len());

    // Whatever decodes lies within one flipped bit per byte of its encoding
    if let Ok(payload) = codec.decode(data, data.len() / 2) {
        let encoded = codec.encode(&payload);
        for (sent, got) in encoded.iter().zip(data) {
            assert!((sent ^ got).count_ones() <= 1);
        }
    }
});
