//! Partitioning stage: build dataset fragments into the bounded ready queue.

use crate::dataset::{Fragment, FragmentBuilder};
use crate::error::{Error, Result};
use crate::partition::dictionary::worker_count;
use crate::partition::ordered::Partition;
use crate::pipeline::{progress, AbortHandle, MONITOR_INTERVAL};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

/// Spawn the producer pool: one task per partition, each building a fragment
/// and pushing it onto the ready queue. A full queue blocks the producer,
/// which caps memory use when partitions are numerous and the dataset large.
pub(crate) fn spawn_stage(
    partitions: Vec<Partition>,
    builder: Arc<FragmentBuilder>,
    ready_tx: mpsc::Sender<Fragment>,
    done_tx: watch::Sender<bool>,
    abort: AbortHandle,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let total = partitions.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let monitor = progress::spawn_monitor(
            "partitioning",
            MONITOR_INTERVAL,
            Arc::clone(&completed),
            total,
            done_tx.subscribe(),
        );

        let semaphore = Arc::new(Semaphore::new(worker_count()));
        let mut tasks = FuturesUnordered::new();
        let mut failure: Option<Error> = None;

        for partition in partitions {
            if abort.is_aborted() {
                failure.get_or_insert(Error::Aborted);
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("partitioning pool closed");
            let builder = Arc::clone(&builder);
            let tx = ready_tx.clone();
            let completed = Arc::clone(&completed);
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let fragment = builder.build(&partition)?;
                tx.send(fragment)
                    .await
                    .map_err(|_| Error::Interrupted("ready queue closed".into()))?;
                completed.fetch_add(1, Ordering::Relaxed);
                Ok::<(), Error>(())
            }));
        }

        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if failure.is_none() {
                        abort.abort();
                        failure = Some(e);
                    }
                }
                Err(e) => {
                    if failure.is_none() {
                        abort.abort();
                        failure = Some(Error::Interrupted(format!("partitioning worker: {e}")));
                    }
                }
            }
        }

        // Closing the queue and flipping the flag lets the learning stage
        // finish its drain loop.
        drop(ready_tx);
        let _ = done_tx.send(true);
        let _ = monitor.await;
        debug!(
            built = completed.load(Ordering::Relaxed),
            total, "partitioning stage exhausted"
        );

        match failure {
            None => Ok(()),
            Some(e) => Err(e),
        }
    })
}
