//! FILENAME: core/engine/src/logging.rs
// PURPOSE: Category-tagged log macros used throughout the engine.
//
// Every message carries a short category ("GRAPH", "RECALC", "EVAL", ...) so a
// single log stream can be filtered per subsystem. The macros only forward to
// the `log` facade; installing a logger is the host's business.

macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        ::log::debug!("[{}] {}", $cat, format_args!($($arg)*))
    };
}

macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        ::log::info!("[{}] {}", $cat, format_args!($($arg)*))
    };
}

macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        ::log::warn!("[{}] {}", $cat, format_args!($($arg)*))
    };
}

// ENTER/EXIT macros for function tracing

macro_rules! log_enter {
    ($cat:expr, $func:expr) => {
        ::log::trace!("[{}] >> {}", $cat, $func)
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        ::log::trace!("[{}] >> {} {}", $cat, $func, format_args!($($arg)*))
    };
}

macro_rules! log_exit {
    ($cat:expr, $func:expr) => {
        ::log::trace!("[{}] << {}", $cat, $func)
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        ::log::trace!("[{}] << {} {}", $cat, $func, format_args!($($arg)*))
    };
}
