//! Turns app lifecycle events into sync cycles.
//!
//! The scheduler is a single tokio task. It owns the interval timer (ticking
//! only while foregrounded), tracks connectivity and the background grace
//! period, and starts cycles on the engine. Each cycle runs in its own task
//! so a slow cycle never blocks event handling; the engine's per-tenant
//! guard turns overlapping triggers into skips.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::engine::SyncEngine;
use super::types::{SkipReason, SyncReport, Trigger};
use crate::error::{Error, Result};

/// Something the host app reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Foreground,
    Background,
    Online,
    Offline,
    /// User asked for a sync now
    Manual,
    Shutdown,
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    events: mpsc::UnboundedSender<LifecycleEvent>,
    reports: mpsc::UnboundedReceiver<SyncReport>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Report a lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler has stopped.
    pub fn notify(&self, event: LifecycleEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| Error::Other("sync scheduler has stopped".into()))
    }

    /// Next finished (or skipped) cycle. `None` once the scheduler stopped
    /// and every report was consumed.
    pub async fn next_report(&mut self) -> Option<SyncReport> {
        self.reports.recv().await
    }

    /// Stop the scheduler, cancelling cycles in flight.
    pub async fn shutdown(self) {
        // An already-stopped scheduler has nothing to shut down
        if self.events.send(LifecycleEvent::Shutdown).is_ok() {
            if let Err(e) = self.task.await {
                debug!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }
}

struct Scheduler {
    engine: Arc<SyncEngine>,
    reports: mpsc::UnboundedSender<SyncReport>,
    online: bool,
    foreground: bool,
}

impl Scheduler {
    fn trigger(&self, trigger: Trigger) {
        if !self.online {
            debug!(?trigger, "Offline, not syncing");
            self.publish(SyncReport::skipped(SkipReason::Offline));
            return;
        }

        let engine = Arc::clone(&self.engine);
        let reports = self.reports.clone();
        tokio::spawn(async move {
            let report = engine.run_cycle(trigger).await;
            if reports.send(report).is_err() {
                debug!("No listener for sync report");
            }
        });
    }

    fn publish(&self, report: SyncReport) {
        if self.reports.send(report).is_err() {
            debug!("No listener for sync report");
        }
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<LifecycleEvent>) {
        let options = self.engine.options().clone();

        let mut ticker = tokio::time::interval_at(Instant::now() + options.interval, options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let grace = tokio::time::sleep(options.background_grace);
        tokio::pin!(grace);
        let mut grace_armed = false;

        info!(interval_ms = options.interval.as_millis(), "Sync scheduler started");
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    debug!(?event, "Lifecycle event");
                    match event {
                        LifecycleEvent::Foreground => {
                            self.foreground = true;
                            grace_armed = false;
                            ticker.reset();
                            self.trigger(Trigger::Foreground);
                        }
                        LifecycleEvent::Background => {
                            self.foreground = false;
                            grace.as_mut().reset(Instant::now() + options.background_grace);
                            grace_armed = true;
                        }
                        LifecycleEvent::Online => {
                            self.online = true;
                            self.trigger(Trigger::ConnectivityRegained);
                        }
                        LifecycleEvent::Offline => self.online = false,
                        LifecycleEvent::Manual => self.trigger(Trigger::Manual),
                        LifecycleEvent::Shutdown => break,
                    }
                }
                _ = ticker.tick(), if self.foreground => self.trigger(Trigger::Timer),
                () = &mut grace, if grace_armed => {
                    grace_armed = false;
                    info!("Background grace period over, cancelling sync");
                    self.engine.cancel();
                }
            }
        }

        self.engine.cancel();
        info!("Sync scheduler stopped");
    }
}

/// Start a scheduler for `engine`, initially foregrounded.
#[must_use]
pub fn spawn(engine: Arc<SyncEngine>, online: bool) -> SchedulerHandle {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler {
        engine,
        reports: report_tx,
        online,
        foreground: true,
    };
    let task = tokio::spawn(scheduler.run(event_rx));
    SchedulerHandle {
        events: event_tx,
        reports: report_rx,
        task,
    }
}
