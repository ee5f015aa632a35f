//! Structured logging for the pool cache
//!
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-tag debug control via `--debug-<tag>` flags
//! - Dual output: colored console + optional file persistence
//!
//! ## Usage
//!
//! ```ignore
//! use poolcache::logger::{self, LogTag};
//!
//! logger::warning(LogTag::Remote, "Remote cache returned HTTP 502");
//! logger::debug(LogTag::Cache, "Selected RemoteCacheHit for 58oQChx4..."); // Only if --debug-cache
//! ```
//!
//! Call [`init`] once at startup (tools and services). Libraries embedding the
//! cache may skip it; logging then uses the default configuration and the
//! console only.

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, init_from_args, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize logging from command-line arguments and open the log file
pub fn init() {
    config::init_from_args();
    file::init_file_logging();
}

/// Initialize logging from an explicit configuration (tools with their own CLI)
pub fn init_with(config: LoggerConfig) {
    config::set_logger_config(config);
    file::init_file_logging();
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

/// Log at DEBUG level, only shown with `--debug-<tag>`
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level, only shown with `--verbose`
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Flush pending file writes
pub fn flush() {
    file::flush_file_logging();
}
