//! Process-level setup shared by the binary: logging.

/// Default filter for a `-v` count: warn, info, debug, trace.
pub fn default_log_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize console logging. `RUST_LOG` overrides the verbosity default.
pub fn init_logger(verbosity: u8) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_level(verbosity)),
    )
    .filter_module("egui", log::LevelFilter::Info) // egui DEBUG spam
    .filter_module("eframe", log::LevelFilter::Info)
    .format_timestamp_millis()
    .init();
}
