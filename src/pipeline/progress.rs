//! Interval-polling progress monitors for the pipeline stages.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Poll a completion counter until the stage flips its done flag, reporting
/// through tracing at each tick.
pub(crate) fn spawn_monitor(
    stage: &'static str,
    interval: Duration,
    completed: Arc<AtomicUsize>,
    total: usize,
    mut done: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so the opening log line
        // comes from the stage itself.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    info!(
                        stage,
                        completed = completed.load(Ordering::Relaxed),
                        total,
                        "in progress"
                    );
                }
                changed = done.changed() => {
                    if changed.is_err() || *done.borrow() {
                        info!(
                            stage,
                            completed = completed.load(Ordering::Relaxed),
                            total,
                            "stage finished"
                        );
                        break;
                    }
                }
            }
        }
    })
}
