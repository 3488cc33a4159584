//! Periodic task that force-flushes stale levels
//!
//! At most one controller task is alive at a time. Replacing it follows a
//! generation handshake: the running task is told to retire with its own
//! generation id, the handle waits for it to exit, and only then is a task
//! started under the next id. Every task hears every retirement message and
//! ignores the ones addressed to other generations.

use crate::Level;
use crate::policy::{DEFAULT_CHECK_INTERVAL, PolicyUpdate, Shared};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error};

/// Whether a controller task is running, and which incarnation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ControllerState {
    /// No periodic checks are happening
    NotRunning,
    /// A task is checking every `interval`
    Running {
        /// Generation id of the live task
        generation: u64,
        /// Check interval of the live task
        interval: Duration,
    },
}

struct ActiveTask {
    generation: u64,
    interval: Duration,
    handle: JoinHandle<()>,
}

pub(crate) struct ForceFlushController {
    shared: Arc<Shared>,
    signals: mpsc::Sender<Level>,
    retire: broadcast::Sender<u64>,
    active: Option<ActiveTask>,
    shut_down: bool,
}

impl ForceFlushController {
    pub(crate) fn new(shared: Arc<Shared>, signals: mpsc::Sender<Level>) -> Self {
        let (retire, _) = broadcast::channel(16);
        Self {
            shared,
            signals,
            retire,
            active: None,
            shut_down: false,
        }
    }

    pub(crate) fn state(&self) -> ControllerState {
        match &self.active {
            Some(task) => ControllerState::Running {
                generation: task.generation,
                interval: task.interval,
            },
            None => ControllerState::NotRunning,
        }
    }

    /// Apply new policy values and start or replace the task as needed.
    ///
    /// After [`stop`](Self::stop) the values are still recorded but no task
    /// is ever started again.
    pub(crate) async fn reconfigure(&mut self, update: PolicyUpdate) -> ControllerState {
        let (cache_size, interval) = {
            let mut policy = self.shared.policy.write();
            policy.apply(&update);
            (policy.cache_size, policy.check_interval)
        };

        if self.shut_down {
            return self.state();
        }

        match (self.active.is_some(), update.interval()) {
            (false, _) if cache_size > 0 => {
                self.start(interval.unwrap_or(DEFAULT_CHECK_INTERVAL));
            }
            (true, Some(new_interval)) => {
                self.retire_active().await;
                self.start(new_interval);
            }
            _ => {}
        }

        self.state()
    }

    /// Retire the running task, if any, and wait for it to exit. Terminal.
    pub(crate) async fn stop(&mut self) {
        self.shut_down = true;
        self.retire_active().await;
    }

    fn start(&mut self, interval: Duration) {
        let generation = self.shared.policy.read().generation;

        // Counted before spawning so the new task is visible as soon as this returns
        self.shared.stats.live_controllers.fetch_add(1, Ordering::AcqRel);
        let task = ControllerTask {
            generation,
            interval,
            shared: self.shared.clone(),
            signals: self.signals.clone(),
            retire: self.retire.subscribe(),
        };
        let handle = tokio::spawn(task.run());

        debug!(
            "Started force-flush controller generation {} every {:?}",
            generation, interval
        );
        self.active = Some(ActiveTask {
            generation,
            interval,
            handle,
        });
    }

    async fn retire_active(&mut self) {
        let Some(task) = self.active.take() else {
            return;
        };

        self.shared.policy.write().generation = task.generation + 1;
        let _ = self.retire.send(task.generation);
        if let Err(e) = task.handle.await {
            error!(
                "Force-flush controller generation {} ended abnormally: {}",
                task.generation, e
            );
        }
    }
}

impl Drop for ForceFlushController {
    fn drop(&mut self) {
        if let Some(task) = self.active.take() {
            let _ = self.retire.send(task.generation);
        }
    }
}

struct ControllerTask {
    generation: u64,
    interval: Duration,
    shared: Arc<Shared>,
    signals: mpsc::Sender<Level>,
    retire: broadcast::Receiver<u64>,
}

impl ControllerTask {
    async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                message = self.retire.recv() => match message {
                    Ok(id) if id == self.generation => break,
                    // Addressed to another generation
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => {
                        if self.shared.policy.read().generation != self.generation {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },

                _ = ticker.tick() => self.check_stale_levels(),
            }
        }

        self.shared
            .stats
            .live_controllers
            .fetch_sub(1, Ordering::AcqRel);
        debug!("Force-flush controller generation {} retired", self.generation);
    }

    fn check_stale_levels(&self) {
        let limit = self.shared.policy.read().force_fire_limit;
        let now = Instant::now();

        for level in Level::ALL {
            if self.shared.clock.since_last_flush(level, now) < limit {
                continue;
            }
            if !self.shared.clock.request_force(level) {
                // Already signalled and not yet handled
                continue;
            }
            if self.signals.try_send(level).is_err() {
                self.shared.clock.force_handled(level);
            }
        }
    }
}
