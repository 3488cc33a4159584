//! Process-wide default logger and the logging macros

use crate::engine::FlushReport;
use crate::{BufferedLogger, Error, Fields, Level, Result};
use std::fmt;
use std::sync::OnceLock;

static DEFAULT_LOGGER: OnceLock<BufferedLogger> = OnceLock::new();

/// Install the default logger used by the macros. Only the first call succeeds.
pub fn init(logger: BufferedLogger) -> Result<()> {
    DEFAULT_LOGGER
        .set(logger)
        .map_err(|_| Error::Configuration("default logger already initialized".to_string()))
}

/// The default logger, if one was installed
pub fn default_logger() -> Option<&'static BufferedLogger> {
    DEFAULT_LOGGER.get()
}

/// Log through the default logger; a no-op before [`init`]
#[track_caller]
pub fn log(level: Level, message: impl fmt::Display) {
    if let Some(logger) = default_logger() {
        logger.log(level, message, Fields::new());
    }
}

/// Log with fields through the default logger; a no-op before [`init`]
#[track_caller]
pub fn log_with_fields(level: Level, message: impl fmt::Display, fields: Fields) {
    if let Some(logger) = default_logger() {
        logger.log(level, message, fields);
    }
}

/// Flush every level of the default logger
pub async fn flush_all() -> Result<FlushReport> {
    match default_logger() {
        Some(logger) => logger.flush_all().await,
        None => Ok(FlushReport::default()),
    }
}

/// Log at trace level through the default logger
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => {
        $crate::facade::log($crate::Level::Trace, ::std::format_args!($($arg)+))
    };
}

/// Log at debug level through the default logger
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => {
        $crate::facade::log($crate::Level::Debug, ::std::format_args!($($arg)+))
    };
}

/// Log at info level through the default logger
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => {
        $crate::facade::log($crate::Level::Info, ::std::format_args!($($arg)+))
    };
}

/// Log at warn level through the default logger
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => {
        $crate::facade::log($crate::Level::Warn, ::std::format_args!($($arg)+))
    };
}

/// Log at error level through the default logger
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => {
        $crate::facade::log($crate::Level::Error, ::std::format_args!($($arg)+))
    };
}

/// Log at fatal level through the default logger. Does not abort.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {
        $crate::facade::log($crate::Level::Fatal, ::std::format_args!($($arg)+))
    };
}
