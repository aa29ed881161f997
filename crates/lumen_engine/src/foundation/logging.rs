//! Logging utilities
//!
//! The engine logs through the `log` facade. Applications call [`init`] once
//! at startup to install `env_logger` as the backend.

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Initialize the logging system with `info` as the default filter.
///
/// `RUST_LOG` still overrides the default when set.
pub fn init() {
    init_with_level(LevelFilter::Info);
}

/// Initialize the logging system with an explicit default filter
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
