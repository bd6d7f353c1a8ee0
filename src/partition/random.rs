//! Randomized combination sampling.
//!
//! Draws distinct k-subsets of `{1..=n}` without enumerating the space. All
//! generation state (shared result set, stop flag, progress checkpoint) lives
//! in one session object scoped to a single `generate` call, so independent
//! sessions can run concurrently without contaminating each other.

use crate::error::Result;
use crate::partition::dictionary::{processing_units, worker_count};
use crate::partition::ordered::{ExceptionSet, Partition};
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Generation is declared stalled when the result set has not grown for this
/// long. Guards against the birthday-paradox slowdown once the requested
/// count approaches the number of valid combinations.
pub const STALL_TIMEOUT: Duration = Duration::from_secs(60);

const STALL_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Draws per worker in one dispatched batch.
const DRAWS_PER_UNIT: usize = 100;

/// State shared between the controller, the stall monitor, and draw workers.
struct SessionState {
    n: u32,
    k: u32,
    target: usize,
    privacy: ExceptionSet,
    generated: Mutex<BTreeSet<Partition>>,
    stopped: AtomicBool,
}

impl SessionState {
    /// Draw one candidate; returns true when it was new and admissible.
    fn draw_one(&self) -> bool {
        let mut rng = rand::rng();
        let mut attrs: Vec<u32> = Vec::with_capacity(self.k as usize);
        while attrs.len() < self.k as usize {
            let candidate = rng.random_range(1..=self.n);
            if !attrs.contains(&candidate) {
                attrs.push(candidate);
            }
        }
        attrs.sort_unstable();
        let candidate = Partition::from_sorted(attrs);
        if self.privacy.matches(&candidate) {
            return false;
        }
        self.generated.lock().expect("poisoned").insert(candidate)
    }

    fn size(&self) -> usize {
        self.generated.lock().expect("poisoned").len()
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// One randomized generation session.
pub struct RandomSession {
    state: Arc<SessionState>,
}

impl RandomSession {
    pub fn new(n: u32, k: u32, target: usize, privacy: ExceptionSet) -> Self {
        debug_assert!(k >= 1 && k <= n);
        Self {
            state: Arc::new(SessionState {
                n,
                k,
                target,
                privacy,
                generated: Mutex::new(BTreeSet::new()),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Seed the session with already-generated partitions (checkpoint
    /// recovery tops up from here).
    pub fn with_seed(self, seed: BTreeSet<Partition>) -> Self {
        *self.state.generated.lock().expect("seed before workers start") = seed;
        self
    }

    /// Produce up to `target` distinct, exception-respecting partitions.
    ///
    /// Returns fewer than `target` only when generation stalled; the caller
    /// decides whether a partial set is acceptable.
    pub async fn generate(self) -> Result<BTreeSet<Partition>> {
        if self.state.size() >= self.state.target {
            return Ok(self.finish());
        }
        if processing_units() > 2 {
            self.generate_batched().await
        } else {
            self.generate_serial()
        }
    }

    fn generate_serial(self) -> Result<BTreeSet<Partition>> {
        let needed = self.state.target - self.state.size();
        for _ in 0..needed {
            while !self.state.draw_one() {}
        }
        Ok(self.finish())
    }

    async fn generate_batched(self) -> Result<BTreeSet<Partition>> {
        let workers = worker_count();
        let monitor = self.spawn_stall_monitor();

        while self.state.size() < self.state.target && !self.state.is_stopped() {
            // One batch is ~100x the unit count, split across the pool;
            // progress is re-checked before committing to another batch.
            let mut batch = Vec::with_capacity(workers);
            for _ in 0..workers {
                let state = Arc::clone(&self.state);
                batch.push(tokio::task::spawn_blocking(move || {
                    for _ in 0..DRAWS_PER_UNIT {
                        if state.is_stopped() || state.size() >= state.target {
                            break;
                        }
                        state.draw_one();
                    }
                }));
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    warn!("random draw worker failed: {e}");
                    self.state.stopped.store(true, Ordering::SeqCst);
                }
            }
        }

        self.state.stopped.store(true, Ordering::SeqCst);
        monitor.abort();

        let produced = self.state.size();
        if produced < self.state.target {
            warn!(
                produced,
                requested = self.state.target,
                "random generation stalled; returning partial set"
            );
        }
        Ok(self.finish())
    }

    /// Watch the result-set size; flip the stop flag once it has not grown
    /// for `STALL_TIMEOUT`.
    fn spawn_stall_monitor(&self) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut checkpoint = state.size();
            let mut stagnant = Duration::ZERO;
            loop {
                tokio::time::sleep(STALL_POLL_INTERVAL).await;
                if state.is_stopped() {
                    break;
                }
                let size = state.size();
                if size >= state.target {
                    break;
                }
                if size > checkpoint {
                    checkpoint = size;
                    stagnant = Duration::ZERO;
                } else {
                    stagnant += STALL_POLL_INTERVAL;
                    if stagnant >= STALL_TIMEOUT {
                        info!(
                            size,
                            target = state.target,
                            "no progress for {STALL_TIMEOUT:?}; aborting generation"
                        );
                        state.stopped.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            }
        })
    }

    /// Take the result set, removing arbitrary excess entries when batch
    /// overcommit pushed it past the target.
    fn finish(self) -> BTreeSet<Partition> {
        let mut set = std::mem::take(&mut *self.state.generated.lock().expect("poisoned"));
        while set.len() > self.state.target {
            set.pop_last();
        }
        debug!(
            generated = set.len(),
            target = self.state.target,
            "random session finished"
        );
        set
    }
}
