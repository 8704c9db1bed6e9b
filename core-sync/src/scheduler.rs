//! # Background Sync Scheduler
//!
//! Runs a fixed list of [`SyncTarget`]s on an interval until stopped.
//! `trigger_now` runs a round immediately without waiting for the next tick.

use crate::coordinator::{SyncCoordinator, SyncOutcome};
use crate::domain::SyncTarget;
use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct SyncScheduler {
    coordinator: SyncCoordinator,
    targets: Arc<Vec<SyncTarget>>,
    interval: Duration,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(coordinator: SyncCoordinator, targets: Vec<SyncTarget>, interval: Duration) -> Self {
        Self {
            coordinator,
            targets: Arc::new(targets),
            interval,
            trigger: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn targets(&self) -> &[SyncTarget] {
        &self.targets
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the background loop. The first round runs immediately.
    ///
    /// Calling `start` on a running or stopped scheduler does nothing.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() || self.cancel.is_cancelled() {
            return;
        }

        let coordinator = self.coordinator.clone();
        let targets = Arc::clone(&self.targets);
        let trigger = Arc::clone(&self.trigger);
        let cancel = self.cancel.clone();
        let period = self.interval;

        info!(
            interval_secs = period.as_secs(),
            targets = targets.len(),
            "Starting sync scheduler"
        );

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => debug!("Scheduled sync round"),
                    _ = trigger.notified() => debug!("Triggered sync round"),
                }

                run_round(&coordinator, &targets).await;
            }

            debug!("Sync scheduler loop exited");
        }));
    }

    /// Run a round as soon as the background loop is free.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    /// Run one round on the caller's task.
    pub async fn run_once(&self) -> Vec<(SyncTarget, Result<SyncOutcome>)> {
        run_round(&self.coordinator, &self.targets).await
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the loop and wait for the current round to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Sync scheduler task ended abnormally");
            }
        }
        info!("Sync scheduler stopped");
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_round(
    coordinator: &SyncCoordinator,
    targets: &[SyncTarget],
) -> Vec<(SyncTarget, Result<SyncOutcome>)> {
    let results = coordinator.sync_all(targets).await;
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        warn!(failed, total = results.len(), "Sync round finished with failures");
    } else {
        debug!(total = results.len(), "Sync round finished");
    }
    results
}
