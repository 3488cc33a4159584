//! The single consumer that owns every level buffer
//!
//! Producers hand records over the bounded record channel; the force-flush
//! controller hands levels over a small signal channel. Flush-all and shutdown
//! requests travel on the record channel so they are ordered after everything
//! the requesting producer submitted before them.

use crate::buffer::LevelBuffers;
use crate::policy::Shared;
use crate::sink::Sink;
use crate::stats::FlushCause;
use crate::{Error, Level, LogRecord, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Pause after each forced flush so a burst of signals cannot spin the engine
pub const FORCE_FLUSH_PAUSE: Duration = Duration::from_millis(200);

/// Messages carried by the record channel
pub(crate) enum Command {
    Record(LogRecord),
    FlushAll(oneshot::Sender<FlushReport>),
    Inspect(oneshot::Sender<[usize; Level::COUNT]>),
    Shutdown(oneshot::Sender<FlushReport>),
}

/// Outcome of flushing one level buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelFlush {
    /// The level that was flushed
    pub level: Level,
    /// Bytes accepted by the sink
    pub bytes: usize,
    /// Sink error, if the write failed; the buffer was discarded regardless
    pub error: Option<String>,
}

/// Outcome of a flush of every level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// One entry per level, in ascending severity
    pub levels: Vec<LevelFlush>,
}

impl FlushReport {
    /// Total bytes accepted by the sink
    pub fn total_bytes(&self) -> usize {
        self.levels.iter().map(|flush| flush.bytes).sum()
    }

    /// Levels whose write failed
    pub fn failures(&self) -> impl Iterator<Item = &LevelFlush> {
        self.levels.iter().filter(|flush| flush.error.is_some())
    }

    /// Turn the first failure into an error, otherwise return the total bytes
    pub fn into_result(self) -> Result<usize> {
        if let Some(failed) = self.levels.iter().find(|flush| flush.error.is_some()) {
            return Err(Error::Sink {
                level: failed.level,
                message: failed.error.clone().unwrap_or_default(),
            });
        }
        Ok(self.total_bytes())
    }
}

pub(crate) struct FlushEngine {
    buffers: LevelBuffers,
    sink: Arc<dyn Sink>,
    shared: Arc<Shared>,
}

impl FlushEngine {
    pub(crate) fn new(sink: Arc<dyn Sink>, shared: Arc<Shared>) -> Self {
        Self {
            buffers: LevelBuffers::new(shared.clock.epoch()),
            sink,
            shared,
        }
    }

    /// Consume records and force-flush signals until shut down.
    ///
    /// Dropping every record sender also ends the loop, after a final flush.
    pub(crate) async fn run(
        mut self,
        commands: flume::Receiver<Command>,
        mut signals: mpsc::Receiver<Level>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv_async() => match command {
                    Ok(Command::Shutdown(reply)) => {
                        while let Ok(pending) = commands.try_recv() {
                            self.handle(pending).await;
                        }
                        let report = self.flush_all(FlushCause::Shutdown).await;
                        let _ = reply.send(report);
                        break;
                    }
                    Ok(command) => self.handle(command).await,
                    Err(_) => {
                        debug!("Record channel closed, flushing remaining buffers");
                        self.flush_all(FlushCause::Shutdown).await;
                        break;
                    }
                },

                Some(level) = signals.recv() => {
                    self.force_flush(level).await;
                    tokio::time::sleep(FORCE_FLUSH_PAUSE).await;
                }
            }
        }

        if let Err(e) = self.sink.flush().await {
            warn!("Failed to flush sink on shutdown: {}", e);
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Record(record) => self.ingest(record).await,
            Command::FlushAll(reply) => {
                let report = self.flush_all(FlushCause::Manual).await;
                let _ = reply.send(report);
            }
            Command::Inspect(reply) => {
                let _ = reply.send(self.buffers.lengths());
            }
            // A second shutdown while draining; the outer loop is already exiting
            Command::Shutdown(reply) => {
                let _ = reply.send(FlushReport::default());
            }
        }
    }

    async fn ingest(&mut self, record: LogRecord) {
        self.shared.stats.record_received();

        let level = record.level();
        let len = self.buffers.get_mut(level).append(record.payload());
        let cache_size = self.shared.policy.read().cache_size;

        if len >= cache_size {
            self.flush_level(level, FlushCause::Size).await;
        }
    }

    async fn force_flush(&mut self, level: Level) {
        self.flush_level(level, FlushCause::Forced).await;
        self.shared.clock.force_handled(level);
    }

    async fn flush_all(&mut self, cause: FlushCause) -> FlushReport {
        let mut report = FlushReport::default();
        for level in Level::ALL {
            report.levels.push(self.flush_level(level, cause).await);
        }
        report
    }

    async fn flush_level(&mut self, level: Level, cause: FlushCause) -> LevelFlush {
        let buffer = self.buffers.get_mut(level);
        let pending = buffer.len();
        let result = buffer.flush_to(self.sink.as_ref()).await;
        self.shared.clock.record_flush(level, buffer.last_flush());

        match result {
            Ok(bytes) => {
                self.shared.stats.flushed(cause, Some(bytes));
                if bytes > 0 {
                    debug!("Flushed {} bytes of {} logs ({:?})", bytes, level, cause);
                }
                LevelFlush {
                    level,
                    bytes,
                    error: None,
                }
            }
            Err(e) => {
                self.shared.stats.flushed(cause, None);
                warn!(
                    "Discarding {} bytes of {} logs after failed write: {}",
                    pending, level, e
                );
                LevelFlush {
                    level,
                    bytes: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

pub(crate) fn spawn(
    engine: FlushEngine,
    commands: flume::Receiver<Command>,
    signals: mpsc::Receiver<Level>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(engine.run(commands, signals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FlushPolicy;
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use tokio::time::Instant;
    use tracing_test::traced_test;

    struct Harness {
        commands: flume::Sender<Command>,
        signals: mpsc::Sender<Level>,
        shared: Arc<Shared>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn start(sink: impl Sink, cache_size: usize) -> Harness {
        let policy = FlushPolicy {
            cache_size,
            ..Default::default()
        };
        let shared = Arc::new(Shared::new(policy, Instant::now()));
        let (commands, receiver) = flume::bounded(64);
        let (signals, signal_receiver) = mpsc::channel(Level::COUNT);
        let engine = FlushEngine::new(Arc::new(sink), shared.clone());
        let handle = spawn(engine, receiver, signal_receiver);

        Harness {
            commands,
            signals,
            shared,
            handle,
        }
    }

    fn record(level: Level, text: &str) -> Command {
        Command::Record(LogRecord::new(level, text.as_bytes().to_vec()))
    }

    async fn lengths(commands: &flume::Sender<Command>) -> [usize; Level::COUNT] {
        let (reply, response) = oneshot::channel();
        commands.send_async(Command::Inspect(reply)).await.unwrap();
        response.await.unwrap()
    }

    async fn flush_all(commands: &flume::Sender<Command>) -> FlushReport {
        let (reply, response) = oneshot::channel();
        commands.send_async(Command::FlushAll(reply)).await.unwrap();
        response.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_flush_clears_pending_flag() {
        let sink = MemorySink::new();
        let harness = start(sink.clone(), 1 << 20);

        harness.commands.send_async(record(Level::Warn, "w\n")).await.unwrap();
        assert_eq!(lengths(&harness.commands).await[Level::Warn.index()], 2);

        assert!(harness.shared.clock.request_force(Level::Warn));
        harness.signals.send(Level::Warn).await.unwrap();
        tokio::time::sleep(FORCE_FLUSH_PAUSE * 2).await;

        assert_eq!(sink.contents(Level::Warn), "w\n");
        assert!(harness.shared.clock.request_force(Level::Warn));
        assert_eq!(harness.shared.stats.snapshot().forced_flushes, 1);
        assert_eq!(
            harness.shared.clock.last_flush(Level::Warn),
            sink.writes()[0].at
        );
    }

    #[tokio::test]
    async fn test_dropping_senders_flushes_and_exits() {
        let sink = MemorySink::new();
        let harness = start(sink.clone(), 1 << 20);

        harness.commands.send_async(record(Level::Info, "last\n")).await.unwrap();
        drop(harness.commands);
        harness.handle.await.unwrap();

        assert_eq!(sink.contents(Level::Info), "last\n");
    }

    #[tokio::test]
    async fn test_shutdown_drains_before_replying() {
        let sink = MemorySink::new();
        let harness = start(sink.clone(), 1 << 20);

        let (reply, response) = oneshot::channel();
        harness.commands.send_async(record(Level::Error, "a\n")).await.unwrap();
        harness.commands.send_async(Command::Shutdown(reply)).await.unwrap();

        let report = response.await.unwrap();
        assert_eq!(report.total_bytes(), 2);
        harness.handle.await.unwrap();
        assert!(harness.commands.send_async(record(Level::Error, "b\n")).await.is_err());
    }

    struct RejectingSink;

    #[async_trait]
    impl Sink for RejectingSink {
        async fn write(&self, _level: Level, _bytes: &[u8]) -> Result<usize> {
            Err(Error::Io(std::io::Error::other("rejected")))
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn test_failed_write_is_reported_and_logged() {
        let harness = start(RejectingSink, 1 << 20);

        harness.commands.send_async(record(Level::Debug, "x\n")).await.unwrap();
        let report = flush_all(&harness.commands).await;

        assert_eq!(report.failures().count(), Level::COUNT);
        assert_eq!(harness.shared.stats.snapshot().write_failures, Level::COUNT as u64);
        assert!(logs_contain("Discarding 2 bytes of DEBUG logs"));
    }

    #[test]
    fn test_report_into_result() {
        let ok = FlushReport {
            levels: vec![LevelFlush {
                level: Level::Info,
                bytes: 10,
                error: None,
            }],
        };
        assert_eq!(ok.into_result().unwrap(), 10);

        let failed = FlushReport {
            levels: vec![LevelFlush {
                level: Level::Fatal,
                bytes: 0,
                error: Some("broken pipe".to_string()),
            }],
        };
        match failed.into_result() {
            Err(Error::Sink { level, message }) => {
                assert_eq!(level, Level::Fatal);
                assert_eq!(message, "broken pipe");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
