//! Flush policy and the per-level flush clock shared with the controller

use crate::Level;
use crate::stats::Stats;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Check interval used when the controller starts without one
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Staleness after which a level is force-flushed, unless configured
pub const DEFAULT_FORCE_FIRE_LIMIT: Duration = Duration::from_secs(60);

/// When level buffers are flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushPolicy {
    /// A buffer is flushed once it holds at least this many bytes
    pub cache_size: usize,
    /// A level that has not been flushed for this long is force-flushed
    pub force_fire_limit: Duration,
    /// How often the controller checks for stale levels
    pub check_interval: Option<Duration>,
    /// Incarnation of the controller task; bumped every time one is retired
    pub generation: u64,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            cache_size: 0,
            force_fire_limit: DEFAULT_FORCE_FIRE_LIMIT,
            check_interval: None,
            generation: 0,
        }
    }
}

/// New policy values; zero values are ignored rather than treated as errors
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PolicyUpdate {
    pub(crate) cache_size: usize,
    pub(crate) force_fire_limit: Duration,
    pub(crate) check_interval: Duration,
}

impl PolicyUpdate {
    pub(crate) fn interval(&self) -> Option<Duration> {
        Some(self.check_interval).filter(|interval| !interval.is_zero())
    }
}

impl FlushPolicy {
    pub(crate) fn apply(&mut self, update: &PolicyUpdate) {
        if update.cache_size > 0 {
            self.cache_size = update.cache_size;
        }
        if !update.force_fire_limit.is_zero() {
            self.force_fire_limit = update.force_fire_limit;
        }
        if let Some(interval) = update.interval() {
            self.check_interval = Some(interval);
        }
    }
}

/// Last-flush times per level plus outstanding force requests.
///
/// Only the flush engine records flushes; the controller reads the times and
/// claims a level before signalling it so one stale window yields one signal.
#[derive(Debug)]
pub(crate) struct FlushClock {
    epoch: Instant,
    last_flush: [AtomicU64; Level::COUNT],
    pending: [AtomicBool; Level::COUNT],
}

impl FlushClock {
    pub(crate) fn new(epoch: Instant) -> Self {
        Self {
            epoch,
            last_flush: std::array::from_fn(|_| AtomicU64::new(0)),
            pending: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    pub(crate) fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Publish a flush of `level` at `at`. Never moves the clock backwards.
    pub(crate) fn record_flush(&self, level: Level, at: Instant) {
        let nanos = at.saturating_duration_since(self.epoch).as_nanos();
        let nanos = u64::try_from(nanos).unwrap_or(u64::MAX);
        self.last_flush[level.index()].fetch_max(nanos, Ordering::AcqRel);
    }

    pub(crate) fn last_flush(&self, level: Level) -> Instant {
        let nanos = self.last_flush[level.index()].load(Ordering::Acquire);
        self.epoch + Duration::from_nanos(nanos)
    }

    pub(crate) fn since_last_flush(&self, level: Level, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_flush(level))
    }

    /// Claim a forced flush for `level`; false if one is already outstanding
    pub(crate) fn request_force(&self, level: Level) -> bool {
        self.pending[level.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn force_handled(&self, level: Level) {
        self.pending[level.index()].store(false, Ordering::Release);
    }
}

/// State shared by the logger handle, the flush engine and the controller
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) policy: RwLock<FlushPolicy>,
    pub(crate) clock: FlushClock,
    pub(crate) stats: Stats,
}

impl Shared {
    pub(crate) fn new(policy: FlushPolicy, epoch: Instant) -> Self {
        Self {
            policy: RwLock::new(policy),
            clock: FlushClock::new(epoch),
            stats: Stats::default(),
        }
    }
}
