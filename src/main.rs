use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use serde_json::json;
use std::sync::mpsc;
use std::time::Duration;
use sx127x_rs::radio::calib::Bw500Errata;
use sx127x_rs::radio::quality::link_quality;
use sx127x_rs::{
    init_logger_with_level, CompletionReason, LoRaBandwidth, MockHal, PhyKind, RadioConfig,
    Sx127x,
};

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "sx127x-cli")]
#[command(about = "Exercise the SX127x driver against the simulated chip")]
struct Cli {
    /// Board configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Phy {
    Fsk,
    Lora,
}

impl From<Phy> for PhyKind {
    fn from(phy: Phy) -> Self {
        match phy {
            Phy::Fsk => PhyKind::Fsk,
            Phy::Lora => PhyKind::LoRa,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Send a payload, feed the transmitted frame back and receive it
    Loopback {
        #[arg(long, value_enum, default_value = "lora")]
        phy: Phy,
        /// Payload as hex
        #[arg(long)]
        payload: String,
        #[arg(long, default_value = "868100000")]
        freq: u32,
    },
    /// Show the 500 kHz errata registers for a bandwidth code and carrier
    Errata {
        /// LoRa bandwidth register code (0..=9)
        #[arg(long)]
        bandwidth: i32,
        #[arg(long)]
        freq: u32,
    },
    /// Map a received power to the 0..=100 link quality scale
    LinkQuality {
        #[arg(long, allow_hyphen_values = true)]
        min: i32,
        #[arg(long, allow_hyphen_values = true)]
        max: i32,
        #[arg(long, allow_hyphen_values = true)]
        dbm: i32,
    },
}

fn load_config(path: Option<&str>) -> Result<RadioConfig> {
    match path {
        Some(path) => RadioConfig::from_file(path)
            .with_context(|| format!("loading configuration from {path}")),
        None => Ok(RadioConfig::default()),
    }
}

fn wait_for(rx: &mpsc::Receiver<CompletionReason>, wanted: CompletionReason) -> Result<()> {
    match rx.recv_timeout(COMPLETION_TIMEOUT) {
        Ok(reason) if reason == wanted => Ok(()),
        Ok(reason) => bail!("expected {wanted:?}, got {reason:?}"),
        Err(_) => bail!("no {wanted:?} within {COMPLETION_TIMEOUT:?}"),
    }
}

fn loopback(config: RadioConfig, phy: PhyKind, payload: &[u8], freq: u32) -> Result<()> {
    let hal = MockHal::new();
    hal.set_auto_interrupt(Some(config.pins.dio0));
    let mut radio = Sx127x::init(hal.clone(), config)?;

    let (tx, rx) = mpsc::channel();
    radio.set_callback(move |_status, reason| {
        let _ = tx.send(reason);
    });

    radio.set_physical_layer(phy)?;
    radio.set_frequency(freq, 0)?;

    radio.send(payload)?;
    wait_for(&rx, CompletionReason::TxDone)?;
    let frame = hal
        .take_transmitted()
        .pop()
        .ok_or_else(|| anyhow!("nothing was transmitted"))?;

    radio.enable_continuous_rx()?;
    hal.inject_rx(&frame);
    wait_for(&rx, CompletionReason::RxDone)?;
    let received = radio.read(payload.len())?;
    let signal = radio.rssi()?;
    radio.shutdown()?;

    let report = json!({
        "device": radio.device_id().to_string(),
        "phy": phy.to_string(),
        "frequency_hz": freq,
        "sent": hex::encode(payload),
        "on_air": hex::encode(&frame),
        "received": hex::encode(&received),
        "intact": received == payload,
        "signal": signal,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger_with_level(match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    });

    match cli.command {
        Commands::Loopback { phy, payload, freq } => {
            let payload = hex::decode(payload.trim()).context("payload is not valid hex")?;
            let config = load_config(cli.config.as_deref())?;
            loopback(config, phy.into(), &payload, freq)?;
        }
        Commands::Errata { bandwidth, freq } => {
            let bandwidth = LoRaBandwidth::from_code_clamped(bandwidth);
            let errata = Bw500Errata::select(bandwidth, freq);
            let (opt1, opt2) = errata.registers();
            let report = json!({
                "bandwidth_khz": bandwidth.khz(),
                "frequency_hz": freq,
                "state": format!("{errata:?}"),
                "reg_0x36": format!("0x{opt1:02X}"),
                "reg_0x3a": opt2.map(|v| format!("0x{v:02X}")),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::LinkQuality { min, max, dbm } => {
            println!("{}", link_quality(min, max, dbm));
        }
    }

    Ok(())
}
