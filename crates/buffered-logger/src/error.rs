//! Error types for the buffered logger

use crate::Level;
use std::io;
use std::path::PathBuf;

/// Result type for buffered logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while buffering and flushing logs
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error occurred in a sink
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to create log directory
    #[error("Failed to create log directory at {path}: {source}")]
    CreateDirectory {
        /// The path that failed to be created
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// The call site could not be resolved from the stack
    #[error("Call site resolution unavailable: {0}")]
    ResolutionUnavailable(String),

    /// The flush engine is no longer running
    #[error("Failed to send log record: channel closed")]
    ChannelClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Failed to serialize log: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A sink rejected the contents of a level buffer
    #[error("Sink write failed for {level} buffer: {message}")]
    Sink {
        /// Level whose buffer was being written
        level: Level,
        /// The error reported by the sink
        message: String,
    },
}
