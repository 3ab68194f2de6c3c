//! Logging switches for the hot paths.
//!
//! The sampler ticks ten times a second, so its modules carry a local
//! `ENABLE_LOGS` constant that can silence them without touching `RUST_LOG`
//! for the rest of the engine:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_debug, log_warn};
//!
//! log_debug!("captured frame {}", sequence);
//! ```

/// `log::info!` gated on the caller's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::warn!` gated on the caller's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// `log::error!` gated on the caller's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// `log::debug!` gated on the caller's `ENABLE_LOGS`. Per-tick detail goes here.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}
