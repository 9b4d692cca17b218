mod common;

use common::{fast_config, radio, wait_until};
use sx127x_rs::radio::calib::{fsk_frequency, lora_frequency};
use sx127x_rs::radio::hal::BusEvent;
use sx127x_rs::radio::registers::*;
use sx127x_rs::{
    DriverError, HeaderMode, LoRaBandwidth, MockHal, OutputStage, PhyKind, RadioConfig, Sx127x,
};

fn frf(hal: &MockHal) -> u32 {
    (hal.register(REG_FRF_MSB) as u32) << 16
        | (hal.register(REG_FRF_MID) as u32) << 8
        | hal.register(REG_FRF_LSB) as u32
}

fn lora_radio() -> (Sx127x<MockHal>, MockHal) {
    let (mut radio, hal) = radio();
    radio.set_physical_layer(PhyKind::LoRa).unwrap();
    hal.clear_log();
    (radio, hal)
}

#[test]
fn test_physical_layer_switch_goes_through_sleep() {
    let (mut radio, hal) = radio();
    hal.clear_log();

    radio.set_physical_layer(PhyKind::LoRa).unwrap();
    assert_eq!(hal.writes_to(REG_OP_MODE), vec![0x00, 0x80]);
    assert_eq!(radio.physical_layer(), PhyKind::LoRa);

    hal.clear_log();
    radio.set_physical_layer(PhyKind::LoRa).unwrap();
    assert_eq!(hal.transactions(), 0);

    radio.set_physical_layer(PhyKind::Fsk).unwrap();
    assert_eq!(hal.writes_to(REG_OP_MODE), vec![0x00]);
    assert_eq!(hal.fsk_register(REG_FSK_PACKET_CONFIG_1), FSK_PACKET_CONFIG_1_BASELINE);
    assert_eq!(
        [0x28, 0x29, 0x2A, 0x2B].map(|r| hal.fsk_register(r)),
        FSK_SYNC_WORD
    );
}

#[test]
fn test_sleep_and_idle() {
    let (mut radio, hal) = radio();
    radio.sleep().unwrap();
    assert_eq!(hal.register(REG_OP_MODE) & MODE_MASK, MODE_SLEEP);
    radio.idle().unwrap();
    assert_eq!(hal.register(REG_OP_MODE) & MODE_MASK, MODE_STANDBY);
}

#[test]
fn test_frequency_reconstructs_within_one_step() {
    let (mut radio, hal) = radio();
    for (target, error) in [(433_920_000u32, 0i32), (868_950_000, 2_500), (915_000_000, -7_000)] {
        radio.set_frequency(target, error).unwrap();
        let wanted = (target as i64 - error as i64) as u32;
        let programmed = fsk_frequency(frf(&hal));
        assert!(wanted.abs_diff(programmed) <= 62, "FSK {wanted} -> {programmed}");
    }

    radio.set_physical_layer(PhyKind::LoRa).unwrap();
    for (target, error) in [(433_175_000u32, 1_000i32), (868_100_000, 0), (923_300_000, -3_000)] {
        radio.set_frequency(target, error).unwrap();
        let wanted = (target as i64 - error as i64) as u32;
        let programmed = lora_frequency(frf(&hal));
        assert!(wanted.abs_diff(programmed) <= 62, "LoRa {wanted} -> {programmed}");
    }
}

#[test]
fn test_frequency_write_suppression() {
    let (mut radio, hal) = lora_radio();
    radio.set_frequency(868_000_000, 0).unwrap();
    radio.set_frequency(868_000_000, 0).unwrap();
    assert_eq!(hal.writes_to(REG_FRF_MSB).len(), 1);
    assert_eq!(hal.writes_to(REG_LORA_PPM_CORRECTION).len(), 1);
    assert_eq!(hal.writes_to(REG_LORA_DETECTION_BW500_OPTIMIZE_1).len(), 1);

    // Same carrier reached through a different error still skips FRF
    radio.set_frequency(868_001_000, 1_000).unwrap();
    assert_eq!(hal.writes_to(REG_FRF_MSB).len(), 1);
}

#[test]
fn test_ppm_correction() {
    let (mut radio, hal) = lora_radio();
    radio.set_frequency(868_000_000, 4_340).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_PPM_CORRECTION), 5);

    radio.set_frequency(868_000_000, -4_340).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_PPM_CORRECTION) as i8, -5);
    assert_eq!(radio.lora().ppm_correction(), Some(-5));
}

#[test]
fn test_bw500_errata_follows_bandwidth_and_band() {
    let (mut radio, hal) = lora_radio();
    radio.set_frequency(915_000_000, 0).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_BW500_OPTIMIZE_1), 0x03);

    radio.set_signal_bandwidth(LoRaBandwidth::Bw500).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_BW500_OPTIMIZE_1), 0x02);
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_BW500_OPTIMIZE_2), 0x64);

    radio.set_frequency(433_000_000, 0).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_BW500_OPTIMIZE_2), 0x7F);

    radio.set_signal_bandwidth(LoRaBandwidth::Bw125).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_BW500_OPTIMIZE_1), 0x03);
    // Left to the chip once the workaround is off
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_BW500_OPTIMIZE_2), 0x7F);

    hal.clear_log();
    radio.set_signal_bandwidth(LoRaBandwidth::Bw250).unwrap();
    assert!(hal.writes_to(REG_LORA_DETECTION_BW500_OPTIMIZE_1).is_empty());
}

#[test]
fn test_lora_carrier_survives_fsk_detour() {
    let (mut radio, hal) = lora_radio();
    radio.set_frequency(868_000_000, 0).unwrap();
    radio.set_signal_bandwidth(LoRaBandwidth::Bw500).unwrap();
    hal.set_lora_register(REG_LORA_PKT_SNR_VALUE, 8);
    hal.set_lora_register(REG_LORA_PKT_RSSI_VALUE, 60);
    assert_eq!(radio.rssi().unwrap().rssi_dbm, -93);

    // FSK retunes the shared synthesizer
    radio.set_physical_layer(PhyKind::Fsk).unwrap();
    radio.set_frequency(433_920_000, 0).unwrap();
    let fsk_frf = frf(&hal);

    radio.set_physical_layer(PhyKind::LoRa).unwrap();
    assert_eq!(radio.frequency(), Some(868_000_000));
    assert!(868_000_000u32.abs_diff(lora_frequency(frf(&hal))) <= 62);
    assert_eq!(radio.rssi().unwrap().rssi_dbm, -93);

    // Errata still tracks the high band
    hal.clear_log();
    radio.set_signal_bandwidth(LoRaBandwidth::Bw500).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_BW500_OPTIMIZE_1), 0x02);
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_BW500_OPTIMIZE_2), 0x64);
    assert!(hal.writes_to(REG_LORA_DETECTION_BW500_OPTIMIZE_1).is_empty());

    // Same carrier again is still suppressed
    radio.set_frequency(868_000_000, 0).unwrap();
    assert!(hal.writes_to(REG_FRF_MSB).is_empty());

    // And FSK gets its own carrier back
    radio.set_physical_layer(PhyKind::Fsk).unwrap();
    assert_eq!(frf(&hal), fsk_frf);
    assert_eq!(radio.frequency(), Some(433_920_000));
}

#[test]
fn test_bandwidth_code_is_clamped() {
    let (mut radio, hal) = lora_radio();
    radio.set_signal_bandwidth_code(12).unwrap();
    assert_eq!(radio.lora().bandwidth(), LoRaBandwidth::Bw500);
    assert_eq!(hal.lora_register(REG_LORA_MODEM_CONFIG_1) >> 4, 9);
}

#[test]
fn test_sync_word_remap() {
    let (mut radio, hal) = lora_radio();
    for (input, stored) in [(0u8, 1u8), (0x34, 0x35), (0x20, 0x20), (0x12, 0x12)] {
        assert_eq!(radio.set_sync_word(input).unwrap(), stored);
        assert_eq!(hal.lora_register(REG_LORA_SYNC_WORD), stored);
    }
}

#[test]
fn test_spreading_factor_clamp() {
    let (mut radio, hal) = lora_radio();
    radio.set_header_mode(HeaderMode::Implicit).unwrap();

    radio.set_spreading_factor(3).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_MODEM_CONFIG_2) >> 4, 6);
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_OPTIMIZE), 0xC5);
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_THRESHOLD), 0x0C);

    radio.set_spreading_factor(20).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_MODEM_CONFIG_2) >> 4, 12);
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_OPTIMIZE), 0xC3);
    assert_eq!(hal.lora_register(REG_LORA_DETECTION_THRESHOLD), 0x0A);
}

#[test]
fn test_low_data_rate_optimize_tracks_symbol_time() {
    let (mut radio, hal) = lora_radio();
    radio.set_spreading_factor(12).unwrap();
    assert_ne!(hal.lora_register(REG_LORA_MODEM_CONFIG_3) & LORA_LOW_DATA_RATE_OPTIMIZE, 0);

    radio.set_spreading_factor(7).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_MODEM_CONFIG_3) & LORA_LOW_DATA_RATE_OPTIMIZE, 0);
    // AGC stays on
    assert_ne!(hal.lora_register(REG_LORA_MODEM_CONFIG_3) & LORA_AGC_AUTO_ON, 0);
}

#[test]
fn test_lora_field_setters() {
    let (mut radio, hal) = lora_radio();
    radio.set_coding_rate(9).unwrap();
    assert_eq!((hal.lora_register(REG_LORA_MODEM_CONFIG_1) >> 1) & 0x07, 4);
    radio.set_coding_rate(-1).unwrap();
    assert_eq!((hal.lora_register(REG_LORA_MODEM_CONFIG_1) >> 1) & 0x07, 1);

    radio.set_header_mode(HeaderMode::Implicit).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_MODEM_CONFIG_1) & 0x01, 1);
    radio.set_header_mode(HeaderMode::Explicit).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_MODEM_CONFIG_1) & 0x01, 0);

    radio.set_crc(true).unwrap();
    assert_ne!(hal.lora_register(REG_LORA_MODEM_CONFIG_2) & LORA_RX_PAYLOAD_CRC_ON, 0);
    radio.set_crc(false).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_MODEM_CONFIG_2) & LORA_RX_PAYLOAD_CRC_ON, 0);

    radio.set_preamble_length(0x0123).unwrap();
    assert_eq!(hal.lora_register(REG_LORA_PREAMBLE_MSB), 0x01);
    assert_eq!(hal.lora_register(REG_LORA_PREAMBLE_LSB), 0x23);
}

#[test]
fn test_fsk_setters() {
    let (mut radio, hal) = radio();
    radio.set_fsk_bitrate(4_800).unwrap();
    // 32 MHz / 4800 = 6666.7
    assert_eq!(hal.fsk_register(REG_FSK_BITRATE_MSB), 0x1A);
    assert_eq!(hal.fsk_register(REG_FSK_BITRATE_LSB), 0x0B);

    radio.set_fsk_deviation(5_000).unwrap();
    // 5000 / 61.035 = 81.9
    assert_eq!(hal.fsk_register(REG_FSK_FDEV_LSB), 82);

    radio.set_fsk_rx_bandwidth(125_000).unwrap();
    assert_eq!(hal.fsk_register(REG_FSK_RX_BW), 0x02);
    radio.set_fsk_afc_bandwidth(60_000).unwrap();
    assert_eq!(hal.fsk_register(REG_FSK_AFC_BW), 0x0B);

    radio.set_fsk_preamble_length(8).unwrap();
    assert_eq!(hal.fsk_register(REG_FSK_PREAMBLE_LSB), 8);
}

#[test]
fn test_fsk_bandwidth_out_of_table() {
    let (mut radio, _hal) = radio();
    for hz in [1_000, 300_000, 500_000] {
        assert!(matches!(
            radio.set_fsk_rx_bandwidth(hz),
            Err(DriverError::InvalidBandwidth(bad)) if bad == hz
        ));
    }
}

#[test]
fn test_phy_specific_setters_check_phy() {
    let (mut radio, hal) = lora_radio();
    assert!(matches!(
        radio.set_fsk_bitrate(9_600),
        Err(DriverError::WrongPhy {
            expected: PhyKind::Fsk,
            actual: PhyKind::LoRa
        })
    ));
    assert!(radio.set_fsk_preamble_length(4).is_err());
    assert_eq!(hal.transactions(), 0);
}

#[test]
fn test_payload_size() {
    let (mut radio, hal) = radio();
    radio.set_payload_size(10).unwrap();
    // FEC doubles the on-air length
    assert_eq!(hal.fsk_register(REG_FSK_PAYLOAD_LENGTH), 20);
    assert_eq!(radio.max_payload_len(), 31);
    assert!(matches!(
        radio.set_payload_size(32),
        Err(DriverError::PayloadTooLarge { len: 32, max: 31 })
    ));

    radio.set_physical_layer(PhyKind::LoRa).unwrap();
    hal.clear_log();
    radio.set_payload_size(10).unwrap();
    radio.set_payload_size(10).unwrap();
    assert_eq!(hal.writes_to(REG_LORA_PAYLOAD_LENGTH), vec![10]);
    assert_eq!(radio.max_payload_len(), 255);
}

#[test]
fn test_tx_power_is_clamped_per_output_stage() {
    let (mut radio, hal) = radio();
    radio.set_tx_power(20).unwrap();
    assert_eq!(hal.register(REG_PA_CONFIG), PA_BOOST | 15);
    assert_eq!(hal.register(REG_PA_DAC), PA_DAC_HIGH_POWER);
    assert_eq!(radio.tx_power(), 20);

    radio.set_tx_power(-10).unwrap();
    assert_eq!(hal.register(REG_PA_CONFIG), PA_BOOST);
    assert_eq!(radio.tx_power(), 2);

    let hal = MockHal::new();
    let config = RadioConfig {
        output: OutputStage::Rfo,
        ..fast_config()
    };
    let mut radio = Sx127x::init(hal.clone(), config).unwrap();
    radio.set_tx_power(20).unwrap();
    assert_eq!(hal.register(REG_PA_CONFIG), PA_RFO_MAX_POWER | 14);
    assert_eq!(hal.register(REG_PA_DAC), PA_DAC_DEFAULT);
    assert_eq!(radio.tx_power(), 14);
}

#[test]
fn test_fsk_round_trip_every_length() {
    let (mut radio, hal) = radio();
    radio.set_frequency(868_950_000, 0).unwrap();

    for len in 0..=radio.max_payload_len() {
        let payload: Vec<u8> = (0..len).map(|i| (i * 37 + len) as u8).collect();
        radio.send(&payload).unwrap();
        assert!(wait_until(|| radio.is_tx_done()), "TX {len}");

        let frame = hal.take_transmitted().pop().unwrap();
        assert_eq!(frame.len(), len * 2);

        radio.enable_continuous_rx().unwrap();
        assert!(!radio.is_rx_done());
        hal.inject_rx(&frame);
        assert!(wait_until(|| radio.is_rx_done()), "RX {len}");
        assert_eq!(radio.read(len).unwrap(), payload);
        assert!(!radio.is_rx_done());
    }
}

#[test]
fn test_fsk_send_sequence() {
    let (mut radio, hal) = radio();
    radio.idle().unwrap();
    hal.clear_log();
    radio.send(&[0xA5]).unwrap();

    // Sleep first, then the FIFO, then TX
    let writes = hal.writes();
    assert_eq!(writes.first(), Some(&(REG_OP_MODE, 0x00)));
    assert_eq!(writes.last(), Some(&(REG_OP_MODE, 0x03)));
    assert!(writes.contains(&(REG_FSK_FIFO_THRESH, FSK_TX_START_FIFO_NOT_EMPTY)));
    assert!(writes.contains(&(REG_DIO_MAPPING_1, DIO0_FSK_PACKET_SENT)));
    assert_eq!(hal.burst_writes().len(), 1);
    assert_eq!(hal.burst_writes()[0].0, REG_FIFO);
}

fn is_mode_ready(event: &BusEvent) -> bool {
    matches!(event, BusEvent::Read(REG_FSK_IRQ_FLAGS_1, flags)
        if FskIrq1::from_bits_truncate(*flags).contains(FskIrq1::MODE_READY))
}

fn mode_ready_polls(events: &[BusEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, BusEvent::Read(REG_FSK_IRQ_FLAGS_1, _)))
        .count()
}

#[test]
fn test_fsk_fifo_access_waits_for_mode_ready() {
    let (mut radio, hal) = radio();
    hal.set_mode_ready_delay(3);
    hal.clear_log();

    radio.send(b"wait").unwrap();
    let events = hal.events();
    let ready = events.iter().position(is_mode_ready).unwrap();
    assert_eq!(mode_ready_polls(&events[..ready]), 3);
    let fifo = events
        .iter()
        .position(|e| matches!(e, BusEvent::BurstWrite(REG_FIFO, _)))
        .unwrap();
    assert!(fifo > ready);

    hal.clear_log();
    radio.enable_continuous_rx().unwrap();
    let events = hal.events();
    let ready = events.iter().position(is_mode_ready).unwrap();
    assert_eq!(mode_ready_polls(&events[..ready]), 3);
    let threshold = events
        .iter()
        .position(|e| matches!(e, BusEvent::Write(REG_FSK_FIFO_THRESH, _)))
        .unwrap();
    let dio = events
        .iter()
        .position(|e| matches!(e, BusEvent::Write(REG_DIO_MAPPING_1, _)))
        .unwrap();
    assert!(threshold > ready);
    assert!(dio > ready);
    assert_eq!(hal.register(REG_OP_MODE) & MODE_MASK, MODE_RX_CONTINUOUS);
}

#[test]
fn test_fsk_rx_threshold_uses_payload_length() {
    let (mut radio, hal) = radio();
    radio.set_payload_size(12).unwrap();
    radio.enable_continuous_rx().unwrap();
    assert_eq!(
        hal.fsk_register(REG_FSK_FIFO_THRESH),
        FSK_TX_START_FIFO_NOT_EMPTY | 24
    );
    assert_eq!(hal.register(REG_OP_MODE) & MODE_MASK, MODE_RX_CONTINUOUS);
}

#[test]
fn test_fsk_uncorrectable_frame() {
    let (mut radio, hal) = radio();
    radio.enable_continuous_rx().unwrap();
    hal.inject_rx(&[0x03, 0x00]);
    assert!(wait_until(|| radio.is_rx_done()));
    assert!(matches!(radio.read(1), Err(DriverError::Fec(_))));
}

#[test]
fn test_lora_round_trip() {
    let (mut radio, hal) = lora_radio();
    radio.set_frequency(868_100_000, 0).unwrap();
    let payload: Vec<u8> = (0..=254).collect();

    radio.send(&payload).unwrap();
    assert!(wait_until(|| radio.is_tx_done()));
    let frame = hal.take_transmitted().pop().unwrap();
    assert_eq!(frame, payload);
    assert_eq!(hal.lora_register(REG_LORA_IRQ_FLAGS) & LoRaIrq::TX_DONE.bits(), LoRaIrq::TX_DONE.bits());

    radio.enable_continuous_rx().unwrap();
    assert_eq!(hal.register(REG_DIO_MAPPING_1), DIO0_LORA_RX_DONE);
    hal.inject_rx(&frame);
    assert!(wait_until(|| radio.is_rx_done()));
    assert_eq!(radio.read(payload.len()).unwrap(), payload);
    assert!(!radio.last_crc_error());
    assert_eq!(hal.lora_register(REG_LORA_IRQ_FLAGS) & LoRaIrq::RX_DONE.bits(), 0);

    assert!(matches!(
        radio.send(&[0u8; 256]),
        Err(DriverError::PayloadTooLarge { len: 256, max: 255 })
    ));
}

#[test]
fn test_lora_crc_error_is_reported() {
    let (mut radio, hal) = lora_radio();
    radio.enable_continuous_rx().unwrap();
    hal.inject_rx_with_crc_error(b"bad");
    assert!(wait_until(|| radio.is_rx_done()));
    assert_eq!(radio.read(3).unwrap(), b"bad");
    assert!(radio.last_crc_error());
}

#[test]
fn test_lora_rssi_reads_snr_and_rssi_together() {
    let (mut radio, hal) = lora_radio();
    radio.set_frequency(868_000_000, 0).unwrap();
    hal.set_lora_register(REG_LORA_PKT_SNR_VALUE, 8);
    hal.set_lora_register(REG_LORA_PKT_RSSI_VALUE, 60);
    hal.clear_log();

    let quality = radio.rssi().unwrap();
    assert_eq!(quality.rssi_dbm, -93);
    assert_eq!(quality.snr, 8);
    assert_eq!(radio.rx_sensitivity(), -120);
    assert_eq!(quality.link_quality, 35);
    assert_eq!(hal.burst_reads(), vec![(REG_LORA_PKT_SNR_VALUE, 2)]);

    // Negative SNR, low band
    radio.set_frequency(433_000_000, 0).unwrap();
    hal.set_lora_register(REG_LORA_PKT_SNR_VALUE, (-10i8) as u8);
    hal.set_lora_register(REG_LORA_PKT_RSSI_VALUE, 40);
    let quality = radio.rssi().unwrap();
    assert_eq!(quality.rssi_dbm, -126);
    assert_eq!(quality.snr, -10);
}

#[test]
fn test_fsk_rssi_estimates_snr() {
    let (mut radio, hal) = radio();
    hal.set_fsk_register(REG_FSK_RSSI_VALUE, 180);
    let quality = radio.rssi().unwrap();
    assert_eq!(quality.rssi_dbm, -90);
    assert_eq!(quality.snr, 20);
    assert_eq!(quality.link_quality, 9);
    assert_eq!(radio.rx_sensitivity(), -95);
}

#[test]
fn test_frequency_error() {
    let (mut radio, hal) = radio();
    assert_eq!(radio.frequency_error().unwrap(), 0);

    radio.set_physical_layer(PhyKind::LoRa).unwrap();
    hal.set_lora_register(REG_LORA_FEI_MSB, 0x00);
    hal.set_lora_register(REG_LORA_FEI_MID, 0x03);
    hal.set_lora_register(REG_LORA_FEI_LSB, 0xE8);
    assert_eq!(radio.frequency_error().unwrap(), 131);

    hal.set_lora_register(REG_LORA_FEI_MSB, 0x0F);
    hal.set_lora_register(REG_LORA_FEI_MID, 0xFC);
    hal.set_lora_register(REG_LORA_FEI_LSB, 0x18);
    assert_eq!(radio.frequency_error().unwrap(), -131);
}

#[test]
fn test_bus_failure_is_reported() {
    let (mut radio, hal) = lora_radio();
    hal.set_bus_failure(true);
    assert!(matches!(
        radio.set_frequency(915_000_000, 0),
        Err(DriverError::Hal(_))
    ));
    hal.set_bus_failure(false);
}
