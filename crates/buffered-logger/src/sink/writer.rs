//! Sink over any blocking `std::io::Write`

use super::Sink;
use crate::{Level, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;

/// Writes every flush to a `std::io::Write`, regardless of level
///
/// The writer is locked for the duration of one flush so concurrent loggers
/// sharing it never interleave within a buffer.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the sink and return the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<std::io::Stderr> {
    /// Sink that echoes to standard error
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

#[async_trait]
impl<W: Write + Send + 'static> Sink for WriterSink<W> {
    async fn write(&self, _level: Level, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }

        let mut writer = self.writer.lock();
        writer.write_all(bytes)?;
        Ok(bytes.len())
    }

    async fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}
