//! Destinations for flushed level buffers
//!
//! A sink receives the whole contents of one level buffer per flush. Writes are
//! treated as append-only and a failed write is never retried by the engine.

mod file;
mod memory;
mod writer;

pub use file::FileSink;
pub use memory::{MemorySink, SinkWrite};
pub use writer::WriterSink;

use crate::{Level, Result};
use async_trait::async_trait;

/// Byte-oriented destination for flushed buffers
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Append `bytes` for `level`, returning how many bytes were accepted
    async fn write(&self, level: Level, bytes: &[u8]) -> Result<usize>;

    /// Flush anything the sink itself buffers
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
