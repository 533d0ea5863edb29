//! Structured tagged logging for the swap engine
//!
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-module debug control via --debug-<tag> flags
//! - Dual output: colored console + file persistence
//!
//! ## Usage
//!
//! ```rust
//! use swapengine::logger::{self, LogTag};
//!
//! logger::info(LogTag::Swap, "Swap submitted");
//! logger::warning(LogTag::Router, "Quote timed out");
//! logger::debug(LogTag::Gas, "Gas price 5 gwei"); // Only if --debug-gas
//! logger::verbose(LogTag::Rpc, "Raw response: ..."); // Only if --verbose
//! ```
//!
//! Call `logger::init()` once at startup, after `paths::ensure_all_directories()`.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{
    get_logger_config, init_from_args, is_debug_enabled_for_tag, set_logger_config, LoggerConfig,
};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger: read debug flags from the command line and open the log file.
pub fn init() {
    config::init_from_args();
    if config::get_logger_config().file_enabled {
        file::init_file_logging();
    }
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level
///
/// Only shown when `--debug-<tag>` (or `--debug-all`) was passed.
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level
///
/// Only shown with `--verbose` or `--verbose-<tag>`.
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Flush pending file writes. Call during shutdown.
pub fn flush() {
    file::flush_file_logging();
}
