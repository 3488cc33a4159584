//! Per-level byte accumulators, owned by the flush engine

use crate::sink::Sink;
use crate::{Level, Result};
use tokio::time::Instant;

/// Pending output for one level
#[derive(Debug)]
pub(crate) struct LevelBuffer {
    level: Level,
    bytes: Vec<u8>,
    last_flush: Instant,
}

impl LevelBuffer {
    fn new(level: Level, created: Instant) -> Self {
        Self {
            level,
            bytes: Vec::new(),
            last_flush: created,
        }
    }

    /// Append a formatted record and return the new length
    pub(crate) fn append(&mut self, payload: &[u8]) -> usize {
        self.bytes.extend_from_slice(payload);
        self.bytes.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn last_flush(&self) -> Instant {
        self.last_flush
    }

    /// Write the whole buffer in one sink call, then clear it.
    ///
    /// The buffer is cleared and the flush time advanced even when the sink
    /// fails. Empty buffers are written too, as a zero-length write.
    pub(crate) async fn flush_to(&mut self, sink: &dyn Sink) -> Result<usize> {
        let result = sink.write(self.level, &self.bytes).await;
        self.bytes.clear();
        self.last_flush = self.last_flush.max(Instant::now());
        result
    }
}

/// Exactly one buffer per level
#[derive(Debug)]
pub(crate) struct LevelBuffers {
    buffers: [LevelBuffer; Level::COUNT],
}

impl LevelBuffers {
    pub(crate) fn new(created: Instant) -> Self {
        Self {
            buffers: Level::ALL.map(|level| LevelBuffer::new(level, created)),
        }
    }

    pub(crate) fn get_mut(&mut self, level: Level) -> &mut LevelBuffer {
        &mut self.buffers[level.index()]
    }

    pub(crate) fn lengths(&self) -> [usize; Level::COUNT] {
        std::array::from_fn(|i| self.buffers[i].len())
    }
}
