//! Stats collector: drain completed jobs strictly in submission order and
//! checkpoint each result as soon as it is available.

use crate::error::{Error, Result};
use crate::pipeline::learning::SubmittedJob;
use crate::pipeline::AbortHandle;
use crate::recovery::RecoveryWriter;
use crate::stats::Stats;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const COLLECT_INTERVAL: Duration = Duration::from_millis(500);

/// Spawn the collector. While jobs are still being submitted it polls every
/// 500ms and drains the completed prefix; once submission ends it drains the
/// remainder synchronously, blocking on each job in order.
pub(crate) fn spawn_stage(
    mut jobs_rx: mpsc::UnboundedReceiver<SubmittedJob>,
    mut checkpoint: Option<RecoveryWriter>,
    abort: AbortHandle,
) -> JoinHandle<Result<Vec<Stats>>> {
    tokio::spawn(async move {
        let mut pending: VecDeque<SubmittedJob> = VecDeque::new();
        let mut collected: Vec<Stats> = Vec::new();

        // Polling phase: runs until the submission side closes the channel.
        loop {
            if abort.is_aborted() {
                abandon(pending);
                return Err(Error::Aborted);
            }
            let mut all_submitted = false;
            loop {
                match jobs_rx.try_recv() {
                    Ok(job) => pending.push_back(job),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        all_submitted = true;
                        break;
                    }
                }
            }
            if all_submitted {
                break;
            }
            while pending
                .front()
                .map_or(false, |job| job.handle.is_finished())
            {
                let job = pending.pop_front().expect("checked front");
                if let Err(e) = collect_one(job, &mut checkpoint, &mut collected).await {
                    abort.abort();
                    abandon(pending);
                    return Err(e);
                }
            }
            tokio::time::sleep(COLLECT_INTERVAL).await;
        }

        // Submission is complete; drain the remainder in order, blocking on
        // each job.
        while let Some(job) = pending.pop_front() {
            if abort.is_aborted() {
                abandon(pending);
                return Err(Error::Aborted);
            }
            if let Err(e) = collect_one(job, &mut checkpoint, &mut collected).await {
                abort.abort();
                abandon(pending);
                return Err(e);
            }
        }

        debug!(collected = collected.len(), "stats collection complete");
        Ok(collected)
    })
}

async fn collect_one(
    job: SubmittedJob,
    checkpoint: &mut Option<RecoveryWriter>,
    collected: &mut Vec<Stats>,
) -> Result<()> {
    let SubmittedJob {
        sequence,
        partition,
        handle,
    } = job;
    let evaluation = handle
        .await
        .map_err(|e| Error::Interrupted(format!("learning job for {partition}: {e}")))??;
    let stats = Stats {
        partition,
        sequence,
        evaluation,
    };
    if let Some(writer) = checkpoint.as_mut() {
        if let Err(e) = writer.write_stats(&stats).await {
            warn!("checkpoint append failed; resumability lost for this run: {e}");
            *checkpoint = None;
        }
    }
    collected.push(stats);
    Ok(())
}

fn abandon(pending: VecDeque<SubmittedJob>) {
    for job in pending {
        job.handle.abort();
    }
}
