//! Leveled, buffered logging front-end
//!
//! Call sites format a line, tag it with a cached source location and hand it
//! to a bounded channel. A single flush engine owns one buffer per level and
//! writes a buffer to its [`Sink`] when:
//! - the buffer reaches the configured size threshold
//! - the force-flush controller finds the level stale
//! - a caller asks for [`BufferedLogger::flush_all`] or shuts the logger down
//!
//! The controller is a periodic task that is replaced, never duplicated, when
//! its check interval changes.

#![warn(missing_docs, unreachable_pub)]
#![forbid(unsafe_code)]

mod buffer;
mod config;
mod controller;
mod engine;
mod error;
mod format;
mod level;
mod location;
mod logger;
mod policy;
mod record;
mod stats;

#[cfg(feature = "tracing-bridge")]
mod bridge;
pub mod facade;
pub mod sink;

#[cfg(feature = "tracing-bridge")]
pub use bridge::BufferedLayer;
pub use config::{BufferedLoggerConfig, BufferedLoggerConfigBuilder, DEFAULT_CHANNEL_CAPACITY};
pub use controller::ControllerState;
pub use engine::{FORCE_FLUSH_PAUSE, FlushReport, LevelFlush};
pub use error::{Error, Result};
pub use facade::{default_logger, init};
pub use format::{
    ClockZone, DEFAULT_TIMESTAMP_FORMAT, Formatter, JsonFormatter, LogFormatter,
    MessageFormatter, TextFormatter,
};
pub use level::{Level, ParseLevelError};
pub use location::{CallSite, LocationResolver};
pub use logger::BufferedLogger;
pub use policy::{DEFAULT_CHECK_INTERVAL, DEFAULT_FORCE_FIRE_LIMIT, FlushPolicy};
pub use record::{Entry, Fields, LogRecord};
pub use sink::{FileSink, MemorySink, Sink, SinkWrite, WriterSink};
pub use stats::{FlushCause, StatsSnapshot};
