//! Logging setup plus conditional macros gated on a module-level
//! `ENABLE_LOGS` flag, so chatty per-item loops can be silenced without
//! touching the global filter.
//!
//! Each module using the macros defines:
//! ```rust
//! const ENABLE_LOGS: bool = true;
//! ```
//! and imports them from the crate root (`use crate::{log_info, log_warn};`).

/// Initialize env_logger for a host process. Reads `RUST_LOG`, defaults to
/// `info`. Call once, from the embedding application.
pub fn init() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
