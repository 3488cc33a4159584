//! Logger configuration

use crate::format::{ClockZone, Formatter};
use crate::policy::{DEFAULT_FORCE_FIRE_LIMIT, FlushPolicy};
use crate::{Error, Level, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity of the record channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Configuration for a [`BufferedLogger`](crate::BufferedLogger)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferedLoggerConfig {
    /// Records below this level are dropped at the call site
    pub min_level: Level,
    /// Capacity of the record channel; producers wait when it is full
    pub channel_capacity: usize,
    /// Size threshold in bytes per level buffer. Zero flushes every record and
    /// leaves the force-flush controller stopped.
    pub cache_size: usize,
    /// Maximum time a level may go without a flush once the controller runs
    pub force_fire_limit: Duration,
    /// How often the controller looks for stale levels
    pub check_interval: Option<Duration>,
    /// Line format
    pub formatter: Formatter,
    /// Clock used for timestamps in formatted lines
    pub clock_zone: ClockZone,
}

impl Default for BufferedLoggerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::Info,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            cache_size: 0,
            force_fire_limit: DEFAULT_FORCE_FIRE_LIMIT,
            check_interval: None,
            formatter: Formatter::default(),
            clock_zone: ClockZone::default(),
        }
    }
}

impl BufferedLoggerConfig {
    /// Start building a configuration from the defaults
    pub fn builder() -> BufferedLoggerConfigBuilder {
        BufferedLoggerConfigBuilder::default()
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::Configuration(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            cache_size: self.cache_size,
            force_fire_limit: if self.force_fire_limit.is_zero() {
                DEFAULT_FORCE_FIRE_LIMIT
            } else {
                self.force_fire_limit
            },
            check_interval: self.check_interval.filter(|interval| !interval.is_zero()),
            generation: 0,
        }
    }
}

/// Builder for [`BufferedLoggerConfig`]
#[derive(Debug, Clone, Default)]
pub struct BufferedLoggerConfigBuilder {
    config: BufferedLoggerConfig,
}

impl BufferedLoggerConfigBuilder {
    /// Set the minimum level that is emitted
    pub fn min_level(mut self, level: Level) -> Self {
        self.config.min_level = level;
        self
    }

    /// Set the record channel capacity
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the per-level size threshold in bytes
    pub fn cache_size(mut self, bytes: usize) -> Self {
        self.config.cache_size = bytes;
        self
    }

    /// Set the maximum time between flushes of a level
    pub fn force_fire_limit(mut self, limit: Duration) -> Self {
        self.config.force_fire_limit = limit;
        self
    }

    /// Set how often stale levels are checked for
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.config.check_interval = Some(interval);
        self
    }

    /// Set the line format
    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.config.formatter = formatter;
        self
    }

    /// Set the timestamp clock
    pub fn clock_zone(mut self, zone: ClockZone) -> Self {
        self.config.clock_zone = zone;
        self
    }

    /// Finish building
    pub fn build(self) -> BufferedLoggerConfig {
        self.config
    }
}
