//! The logger handle handed to call sites

use crate::config::BufferedLoggerConfig;
use crate::controller::{ControllerState, ForceFlushController};
use crate::engine::{self, Command, FlushEngine, FlushReport};
use crate::format::{ClockZone, Formatter, LogFormatter};
use crate::policy::{FlushPolicy, PolicyUpdate, Shared};
use crate::record::Entry;
use crate::sink::Sink;
use crate::stats::StatsSnapshot;
use crate::{CallSite, Error, Fields, Level, LocationResolver, LogRecord, Result};
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::error;

/// Leveled, buffered logger.
///
/// Cloning is cheap and every clone feeds the same flush engine. Records are
/// formatted on the calling thread, queued on a bounded channel and appended
/// to per-level buffers by a single background task, which writes a buffer to
/// the sink once it reaches the size threshold or once the force-flush
/// controller finds it stale.
///
/// The synchronous logging methods block the calling thread while the record
/// channel is full. On a runtime thread prefer [`BufferedLogger::submit`], or
/// size `channel_capacity` for the expected burst.
#[derive(Clone)]
pub struct BufferedLogger {
    inner: Arc<Inner>,
}

struct Inner {
    commands: flume::Sender<Command>,
    shared: Arc<Shared>,
    controller: Mutex<ForceFlushController>,
    resolver: Arc<LocationResolver>,
    formatter: Formatter,
    min_level: AtomicU8,
    clock_zone: AtomicU8,
    engine: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

macro_rules! level_methods {
    ($($level:ident => $plain:ident, $with_fields:ident;)+) => {
        $(
            #[doc = concat!("Log a message at [`Level::", stringify!($level), "`]")]
            #[track_caller]
            pub fn $plain(&self, message: impl fmt::Display) {
                self.log(Level::$level, message, Fields::new());
            }

            #[doc = concat!("Log a message with fields at [`Level::", stringify!($level), "`]")]
            #[track_caller]
            pub fn $with_fields(&self, message: impl fmt::Display, fields: Fields) {
                self.log(Level::$level, message, fields);
            }
        )+
    };
}

impl BufferedLogger {
    /// Start the flush engine (and the controller, when a cache size is set)
    pub async fn new(config: BufferedLoggerConfig, sink: impl Sink) -> Result<Self> {
        Self::with_resolver(config, sink, Arc::new(LocationResolver::new())).await
    }

    /// Like [`BufferedLogger::new`] but sharing an existing call-site cache
    pub async fn with_resolver(
        config: BufferedLoggerConfig,
        sink: impl Sink,
        resolver: Arc<LocationResolver>,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared::new(config.flush_policy(), Instant::now()));
        let (commands, receiver) = flume::bounded(config.channel_capacity);
        // Room for one signal per level; the controller never has more outstanding
        let (signals, signal_receiver) = mpsc::channel(Level::COUNT);

        let sink: Arc<dyn Sink> = Arc::new(sink);
        let engine = FlushEngine::new(sink, shared.clone());
        let handle = engine::spawn(engine, receiver, signal_receiver);

        let mut controller = ForceFlushController::new(shared.clone(), signals);
        controller.reconfigure(PolicyUpdate::default()).await;

        Ok(Self {
            inner: Arc::new(Inner {
                commands,
                shared,
                controller: Mutex::new(controller),
                resolver,
                formatter: config.formatter,
                min_level: AtomicU8::new(config.min_level.index() as u8),
                clock_zone: AtomicU8::new(config.clock_zone.as_u8()),
                engine: parking_lot::Mutex::new(Some(handle)),
            }),
        })
    }

    /// Minimum level that is emitted
    pub fn level(&self) -> Level {
        let index = self.inner.min_level.load(Ordering::Relaxed) as usize;
        Level::from_index(index).unwrap_or(Level::Info)
    }

    /// Change the minimum level; takes effect for the next log call
    pub fn set_level(&self, level: Level) {
        self.inner
            .min_level
            .store(level.index() as u8, Ordering::Relaxed);
    }

    /// Check if a level is emitted
    #[inline]
    pub fn is_enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    /// Clock used for timestamps in formatted lines
    pub fn clock_zone(&self) -> ClockZone {
        ClockZone::from_u8(self.inner.clock_zone.load(Ordering::Relaxed))
    }

    /// Change the timestamp clock; takes effect for the next log call
    pub fn set_clock_zone(&self, zone: ClockZone) {
        self.inner.clock_zone.store(zone.as_u8(), Ordering::Relaxed);
    }

    /// The call-site cache used by this logger
    pub fn resolver(&self) -> &Arc<LocationResolver> {
        &self.inner.resolver
    }

    /// Resolve the caller of this method, skipping `skip` further frames
    #[inline(never)]
    pub fn resolve(&self, skip: usize) -> Result<Arc<CallSite>> {
        self.inner.resolver.resolve(skip + 1)
    }

    /// Log `message` with `fields` at `level`, blocking while the channel is full
    #[track_caller]
    pub fn log(&self, level: Level, message: impl fmt::Display, fields: Fields) {
        if let Some(record) = self.prepare(level, message, fields, Location::caller()) {
            // The only failure is a stopped engine; there is nowhere left to log to
            let _ = self.submit_record_blocking(record);
        }
    }

    level_methods! {
        Trace => trace, trace_with_fields;
        Debug => debug, debug_with_fields;
        Info => info, info_with_fields;
        Warn => warn, warn_with_fields;
        Error => error, error_with_fields;
        Fatal => fatal, fatal_with_fields;
        Panic => panic, panic_with_fields;
    }

    /// Log without blocking the runtime thread while the channel is full.
    ///
    /// The call site is captured when this is called, not when it is awaited.
    #[track_caller]
    pub fn submit(
        &self,
        level: Level,
        message: impl fmt::Display,
        fields: Fields,
    ) -> impl Future<Output = Result<()>> + '_ {
        let record = self.prepare(level, message, fields, Location::caller());
        async move {
            match record {
                Some(record) => self.submit_record(record).await,
                None => Ok(()),
            }
        }
    }

    /// Queue an already formatted record, waiting for channel capacity
    pub async fn submit_record(&self, record: LogRecord) -> Result<()> {
        self.inner
            .commands
            .send_async(Command::Record(record))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Queue an already formatted record, blocking the thread for capacity
    pub fn submit_record_blocking(&self, record: LogRecord) -> Result<()> {
        self.inner
            .commands
            .send(Command::Record(record))
            .map_err(|_| Error::ChannelClosed)
    }

    /// Format a record with this logger's formatter and clock
    pub fn format_record(
        &self,
        level: Level,
        message: &str,
        fields: Fields,
        call_site: Option<Arc<CallSite>>,
    ) -> LogRecord {
        let created = Utc::now();
        let mut payload = Vec::with_capacity(message.len() + 48);
        let entry = Entry {
            level,
            message,
            created,
            call_site: call_site.as_deref(),
            fields: &fields,
        };

        if self
            .inner
            .formatter
            .format(&entry, self.clock_zone(), &mut payload)
            .is_err()
        {
            payload.clear();
            payload.extend_from_slice(message.as_bytes());
            payload.push(b'\n');
        }

        let record = LogRecord::new(level, payload)
            .with_created(created)
            .with_fields(fields);
        match call_site {
            Some(site) => record.with_call_site(site),
            None => record,
        }
    }

    fn prepare(
        &self,
        level: Level,
        message: impl fmt::Display,
        fields: Fields,
        location: &'static Location<'static>,
    ) -> Option<LogRecord> {
        if !self.is_enabled(level) {
            return None;
        }

        let site = self.inner.resolver.resolve_location(location);
        Some(self.format_record(level, &message.to_string(), fields, Some(site)))
    }

    /// Set the per-level size threshold; zero leaves it unchanged.
    ///
    /// The first positive threshold starts the force-flush controller.
    pub async fn set_cache_size(&self, bytes: usize) -> ControllerState {
        self.reconfigure(PolicyUpdate {
            cache_size: bytes,
            ..Default::default()
        })
        .await
    }

    /// Set the maximum time between flushes of a level; zero leaves it unchanged
    pub async fn set_force_fire_limit(&self, limit: Duration) -> ControllerState {
        self.reconfigure(PolicyUpdate {
            force_fire_limit: limit,
            ..Default::default()
        })
        .await
    }

    /// Set how often stale levels are checked for; zero leaves it unchanged.
    ///
    /// A running controller is retired and replaced by one with the new interval.
    pub async fn set_check_interval(&self, interval: Duration) -> ControllerState {
        self.reconfigure(PolicyUpdate {
            check_interval: interval,
            ..Default::default()
        })
        .await
    }

    async fn reconfigure(&self, update: PolicyUpdate) -> ControllerState {
        self.inner.controller.lock().await.reconfigure(update).await
    }

    /// Whether the force-flush controller is running
    pub async fn controller_state(&self) -> ControllerState {
        self.inner.controller.lock().await.state()
    }

    /// Current flush policy
    pub fn flush_policy(&self) -> FlushPolicy {
        *self.inner.shared.policy.read()
    }

    /// Pipeline counters
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.shared.stats.snapshot()
    }

    /// Flush every level buffer now.
    ///
    /// Runs on the flush engine after everything this caller queued before it.
    pub async fn flush_all(&self) -> Result<FlushReport> {
        self.request(Command::FlushAll).await
    }

    /// Bytes currently buffered per level, indexed by [`Level::index`]
    pub async fn buffered_lengths(&self) -> Result<[usize; Level::COUNT]> {
        self.request(Command::Inspect).await
    }

    /// Bytes currently buffered for `level`
    pub async fn buffered_len(&self, level: Level) -> Result<usize> {
        Ok(self.buffered_lengths().await?[level.index()])
    }

    /// Stop the controller, drain queued records, flush everything and stop the engine
    pub async fn shutdown(&self) -> Result<FlushReport> {
        self.inner.controller.lock().await.stop().await;

        let report = self.request(Command::Shutdown).await?;

        let handle = self.inner.engine.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Flush engine ended abnormally: {}", e);
            }
        }

        Ok(report)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.inner
            .commands
            .send_async(command(reply))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        response.await.map_err(|_| Error::ChannelClosed)
    }
}

impl fmt::Debug for BufferedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedLogger")
            .field("level", &self.level())
            .field("policy", &self.flush_policy())
            .finish_non_exhaustive()
    }
}
