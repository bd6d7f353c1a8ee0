//! Learning stage: drain the ready queue and submit classification jobs.

use crate::classify::{EvaluationOptions, Oracle};
use crate::dataset::Fragment;
use crate::error::{Error, Result};
use crate::partition::dictionary::worker_count;
use crate::partition::ordered::Partition;
use crate::pipeline::{progress, AbortHandle, MONITOR_INTERVAL};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

/// How long one queue poll waits before re-checking the partitioning flag.
const POLL_TIMEOUT: Duration = Duration::from_millis(2500);

/// One submitted classification job, in submission order.
pub(crate) struct SubmittedJob {
    pub sequence: u64,
    pub partition: Partition,
    pub handle: JoinHandle<Result<crate::classify::Evaluation>>,
}

/// Spawn the single request thread: poll the ready queue, wrap each fragment
/// with the oracle, and submit to the bounded learning pool. Job handles go
/// to the collector in submission order.
#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn_stage(
    mut ready_rx: mpsc::Receiver<Fragment>,
    oracle: Arc<dyn Oracle>,
    options: EvaluationOptions,
    partitioning_done: watch::Receiver<bool>,
    jobs_tx: mpsc::UnboundedSender<SubmittedJob>,
    first_sequence: u64,
    total: usize,
    abort: AbortHandle,
) -> JoinHandle<Result<u64>> {
    tokio::spawn(async move {
        let semaphore = Arc::new(Semaphore::new(worker_count()));
        let submitted = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = watch::channel(false);
        let monitor = progress::spawn_monitor(
            "learning",
            MONITOR_INTERVAL,
            Arc::clone(&submitted),
            total,
            done_rx,
        );

        let mut sequence = first_sequence;
        let result = loop {
            if abort.is_aborted() {
                break Err(Error::Aborted);
            }
            match tokio::time::timeout(POLL_TIMEOUT, ready_rx.recv()).await {
                Ok(Some(fragment)) => {
                    let permit = semaphore
                        .clone()
                        .acquire_owned()
                        .await
                        .expect("learning pool closed");
                    let oracle = Arc::clone(&oracle);
                    let partition = fragment.partition.clone();
                    let handle = tokio::spawn(async move {
                        let _permit = permit;
                        oracle.evaluate(fragment, options).await
                    });
                    let job = SubmittedJob {
                        sequence,
                        partition,
                        handle,
                    };
                    sequence += 1;
                    submitted.fetch_add(1, Ordering::Relaxed);
                    if jobs_tx.send(job).is_err() {
                        break Err(Error::Interrupted("stats collector gone".into()));
                    }
                }
                // Queue closed and fully drained.
                Ok(None) => break Ok(()),
                Err(_elapsed) => {
                    if *partitioning_done.borrow() && ready_rx.is_empty() {
                        break Ok(());
                    }
                }
            }
        };

        let _ = done_tx.send(true);
        let _ = monitor.await;
        let count = sequence - first_sequence;
        debug!(submitted = count, "learning stage closed for submissions");
        result.map(|()| count)
    })
}
