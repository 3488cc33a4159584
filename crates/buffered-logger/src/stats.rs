//! Pipeline counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Why a level buffer was flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushCause {
    /// The buffer reached the size threshold
    Size,
    /// The force-flush controller found the level stale
    Forced,
    /// An explicit flush of every level
    Manual,
    /// The final flush while shutting down
    Shutdown,
}

/// Point-in-time copy of the pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Records appended to level buffers
    pub records: u64,
    /// Bytes accepted by the sink
    pub bytes_written: u64,
    /// Flushes triggered by the size threshold
    pub size_flushes: u64,
    /// Flushes requested by the controller
    pub forced_flushes: u64,
    /// Flushes from flush-all requests and shutdown
    pub manual_flushes: u64,
    /// Sink writes that returned an error
    pub write_failures: u64,
    /// Controller tasks currently alive
    pub live_controllers: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Stats {
    records: AtomicU64,
    bytes_written: AtomicU64,
    size_flushes: AtomicU64,
    forced_flushes: AtomicU64,
    manual_flushes: AtomicU64,
    write_failures: AtomicU64,
    pub(crate) live_controllers: AtomicUsize,
}

impl Stats {
    pub(crate) fn record_received(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn flushed(&self, cause: FlushCause, written: Option<usize>) {
        let counter = match cause {
            FlushCause::Size => &self.size_flushes,
            FlushCause::Forced => &self.forced_flushes,
            FlushCause::Manual | FlushCause::Shutdown => &self.manual_flushes,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        match written {
            Some(bytes) => {
                self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
            }
            None => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records: self.records.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            size_flushes: self.size_flushes.load(Ordering::Relaxed),
            forced_flushes: self.forced_flushes.load(Ordering::Relaxed),
            manual_flushes: self.manual_flushes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            live_controllers: self.live_controllers.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flushes_counted_by_cause() {
        let stats = Stats::default();

        stats.record_received();
        stats.flushed(FlushCause::Size, Some(1024));
        stats.flushed(FlushCause::Forced, Some(0));
        stats.flushed(FlushCause::Shutdown, Some(10));
        stats.flushed(FlushCause::Manual, None);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records, 1);
        assert_eq!(snapshot.bytes_written, 1034);
        assert_eq!(snapshot.size_flushes, 1);
        assert_eq!(snapshot.forced_flushes, 1);
        assert_eq!(snapshot.manual_flushes, 2);
        assert_eq!(snapshot.write_failures, 1);
    }
}
