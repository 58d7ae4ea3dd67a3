//! Structured console logging for feewatch
//!
//! Tagged, level-filtered colored output:
//! - `log(tag, action, message)` for standard operational messages
//! - `debug(tag, action, message)` shown only with --debug-<module>
//! - `verbose(tag, action, message)` shown only with --verbose
//!
//! Call `logger::init` once at startup with the parsed command-line flags.

mod format;
mod levels;
mod tags;

pub use levels::LogLevel;
pub use tags::LogTag;

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::RwLock;

/// Runtime logger configuration, set once from command-line arguments
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub debug_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> = Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Initialize the logger from parsed command-line flags
///
/// `--verbose` lowers the threshold to Verbose, `--quiet` raises it to
/// Warning, and each `--debug <module>` enables Debug output for that tag.
pub fn init(verbose: bool, quiet: bool, debug_modules: &[String]) {
    let mut config = LoggerConfig::default();

    if verbose {
        config.min_level = LogLevel::Verbose;
    } else if quiet {
        config.min_level = LogLevel::Warning;
    }
    for module in debug_modules {
        config.debug_tags.insert(module.to_lowercase());
    }

    if let Ok(mut guard) = LOGGER_CONFIG.write() {
        *guard = config;
    }
}

/// Check whether a message should be shown
fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    let config = match LOGGER_CONFIG.read() {
        Ok(guard) => guard.clone(),
        Err(_) => return true,
    };

    // Errors always log
    if level == LogLevel::Error {
        return true;
    }

    // Debug requires the per-module flag
    if level == LogLevel::Debug {
        return config.min_level >= LogLevel::Verbose
            || config.debug_tags.contains(tag.to_debug_key());
    }

    level <= config.min_level
}

/// Log at INFO level - standard operational messages
pub fn log(tag: LogTag, action: &str, message: &str) {
    if should_log(&tag, LogLevel::Info) {
        format::format_and_log(tag, action, message);
    }
}

/// Log at ERROR level - always shown
pub fn error(tag: LogTag, action: &str, message: &str) {
    if should_log(&tag, LogLevel::Error) {
        format::format_and_log(tag, action, message);
    }
}

/// Log at WARNING level
pub fn warning(tag: LogTag, action: &str, message: &str) {
    if should_log(&tag, LogLevel::Warning) {
        format::format_and_log(tag, action, message);
    }
}

/// Log at DEBUG level - only with --debug-<module>
pub fn debug(tag: LogTag, action: &str, message: &str) {
    if should_log(&tag, LogLevel::Debug) {
        format::format_and_log(tag, action, message);
    }
}

/// Log at VERBOSE level - only with --verbose
pub fn verbose(tag: LogTag, action: &str, message: &str) {
    if should_log(&tag, LogLevel::Verbose) {
        format::format_and_log(tag, action, message);
    }
}
