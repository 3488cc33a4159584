//! In-memory sink that records every write

use super::Sink;
use crate::{Level, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

/// A single write received by a [`MemorySink`]
#[derive(Debug, Clone)]
pub struct SinkWrite {
    /// Level of the flushed buffer
    pub level: Level,
    /// The flushed bytes
    pub bytes: Vec<u8>,
    /// When the write happened
    pub at: Instant,
}

/// A sink that keeps all writes in memory, for tests and diagnostics
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    writes: Arc<Mutex<Vec<SinkWrite>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write so far, in arrival order
    pub fn writes(&self) -> Vec<SinkWrite> {
        self.writes.lock().clone()
    }

    /// Writes for one level, in arrival order
    pub fn writes_for(&self, level: Level) -> Vec<SinkWrite> {
        self.writes
            .lock()
            .iter()
            .filter(|write| write.level == level)
            .cloned()
            .collect()
    }

    /// All bytes written for `level`, concatenated
    pub fn contents(&self, level: Level) -> String {
        let writes = self.writes.lock();
        let bytes: Vec<u8> = writes
            .iter()
            .filter(|write| write.level == level)
            .flat_map(|write| write.bytes.iter().copied())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Total bytes received across all levels
    pub fn total_bytes(&self) -> usize {
        self.writes.lock().iter().map(|write| write.bytes.len()).sum()
    }

    /// Check if any level's output contains `text`
    pub fn contains(&self, text: &str) -> bool {
        Level::ALL
            .iter()
            .any(|level| self.contents(*level).contains(text))
    }

    /// Forget all writes
    pub fn clear(&self) {
        self.writes.lock().clear();
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&self, level: Level, bytes: &[u8]) -> Result<usize> {
        self.writes.lock().push(SinkWrite {
            level,
            bytes: bytes.to_vec(),
            at: Instant::now(),
        });
        Ok(bytes.len())
    }
}
