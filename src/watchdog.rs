//! Auto-reset watchdog
//!
//! Periodically checks how long ago the last external write arrived and
//! forces the record back to STOP once it is older than the configured limit.
//! The check is level-triggered: every tick re-evaluates the record, and a
//! record already in STOP is left alone, so one stale period produces exactly
//! one reset.

use crate::config::WatchdogConfig;
use crate::state::{ResetOutcome, StateStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Staleness watchdog over a [`StateStore`]
pub struct Watchdog {
    store: Arc<StateStore>,
    poll_interval: Duration,
    auto_reset_after: Duration,
    /// Number of forced resets performed
    reset_count: AtomicU64,
}

impl Watchdog {
    pub fn new(store: Arc<StateStore>, config: &WatchdogConfig) -> Self {
        Self {
            store,
            poll_interval: config.poll_interval(),
            auto_reset_after: config.auto_reset_after(),
            reset_count: AtomicU64::new(0),
        }
    }

    /// Run one inspection
    ///
    /// Exposed so tests can drive the watchdog without waiting on the timer.
    pub fn tick(&self) -> ResetOutcome {
        let outcome = self.store.reset_if_stale(self.auto_reset_after);
        match outcome {
            ResetOutcome::Reset { elapsed } => {
                self.reset_count.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "No updates for {:.1}s, setting motors to STOP",
                    elapsed.as_secs_f64()
                );
            }
            ResetOutcome::Fresh { elapsed } => {
                trace!("Last update {:?} ago, still fresh", elapsed);
            }
            ResetOutcome::Idle | ResetOutcome::NeverUpdated => {}
        }
        outcome
    }

    pub fn reset_count(&self) -> u64 {
        self.reset_count.load(Ordering::Relaxed)
    }

    /// Start the polling loop as a tokio task
    pub fn spawn(self) -> WatchdogHandle {
        let watchdog = Arc::new(self);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(watchdog.clone().run(shutdown_rx));

        WatchdogHandle {
            watchdog,
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) {
        info!(
            "Auto-reset watchdog started (interval: {:?}, reset after: {:.1}s)",
            self.poll_interval,
            self.auto_reset_after.as_secs_f64()
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = &mut shutdown_rx => {
                    break;
                }
            }
        }

        info!(
            "Auto-reset watchdog stopped (total resets: {})",
            self.reset_count()
        );
    }
}

/// Handle to a running watchdog task
///
/// Dropping the handle also stops the loop.
pub struct WatchdogHandle {
    watchdog: Arc<Watchdog>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WatchdogHandle {
    pub fn reset_count(&self) -> u64 {
        self.watchdog.reset_count()
    }

    /// Stop the loop and wait for the task to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            // Best-effort send, the task may already be gone
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            warn!("Watchdog task ended abnormally: {}", e);
        }
        debug!("Watchdog shut down");
    }
}
