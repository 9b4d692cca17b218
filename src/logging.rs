use log::LevelFilter;

/// Initializes the logger with the `env_logger` crate.
///
/// The level comes from `RUST_LOG`; nothing is printed if it is unset.
pub fn init_logger() {
    env_logger::init();
}

/// Initializes `env_logger` with a fixed default level.
///
/// `RUST_LOG` still overrides individual modules. Safe to call more than
/// once, which tests rely on; later calls are ignored.
///
/// # Examples
/// ```rust
/// use sx127x_rs::logging::init_logger_with_level;
///
/// init_logger_with_level(log::LevelFilter::Debug);
/// log::debug!("radio up");
/// ```
pub fn init_logger_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
