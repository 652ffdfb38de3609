//! Periodic refresh of the net-worth snapshot

use crate::core::error::FetchFailure;
use crate::core::snapshot::{FetchOutcome, SnapshotBuilder};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Outcome of one submitted cycle; every clone resolves to the same value.
type CycleHandle = Shared<BoxFuture<'static, FetchOutcome>>;

struct CycleJob {
    id: u64,
    reply: oneshot::Sender<FetchOutcome>,
}

struct Submitter {
    jobs: mpsc::UnboundedSender<CycleJob>,
    latest: Mutex<CycleHandle>,
    next_id: AtomicU64,
    submitted: watch::Sender<u64>,
}

impl Submitter {
    fn new_cycle(&self) -> (CycleJob, CycleHandle) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        cycle(id)
    }

    fn latest(&self) -> MutexGuard<'_, CycleHandle> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn submit(&self, reason: &str) {
        let mut latest = self.latest();
        let (job, handle) = self.new_cycle();
        debug!(cycle = job.id, reason, "Submitting refresh cycle");

        *latest = handle;
        self.submitted.send_replace(job.id);
        // Sent under the lock so queue order matches handle order. A closed
        // queue drops the reply and the handle resolves as abandoned.
        if self.jobs.send(job).is_err() {
            debug!("Refresh worker has stopped");
        }
    }
}

fn cycle(id: u64) -> (CycleJob, CycleHandle) {
    let (reply, outcome) = oneshot::channel();
    let handle = outcome
        .map(|received| received.unwrap_or_else(|_| Err(FetchFailure::abandoned())))
        .boxed()
        .shared();
    (CycleJob { id, reply }, handle)
}

/// Runs refresh cycles one at a time on a dedicated worker task and keeps a
/// handle to the most recently submitted one.
pub struct RefreshScheduler {
    submitter: Arc<Submitter>,
    worker: JoinHandle<()>,
    timer: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Submits the first cycle right away, then one per `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(builder: Arc<SnapshotBuilder>, interval: Duration) -> Self {
        let (jobs, mut queue) = mpsc::unbounded_channel::<CycleJob>();

        let (first, first_handle) = cycle(0);
        // The receiver is alive here, so this cannot fail.
        let _ = jobs.send(first);

        let submitter = Arc::new(Submitter {
            jobs,
            latest: Mutex::new(first_handle),
            next_id: AtomicU64::new(1),
            submitted: watch::Sender::new(0),
        });

        let worker = tokio::spawn(async move {
            while let Some(job) = queue.recv().await {
                // Superseded and nobody holds its handle, so no one can see the result.
                if job.reply.is_closed() {
                    debug!(cycle = job.id, "Skipping superseded refresh cycle");
                    continue;
                }
                debug!(cycle = job.id, "Refresh cycle started");
                let outcome = builder.run_cycle().await;
                // Nobody waiting on a superseded cycle is fine.
                let _ = job.reply.send(outcome);
            }
        });

        let timer = {
            let submitter = Arc::clone(&submitter);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    submitter.submit("scheduled");
                }
            })
        };

        info!(interval_secs = interval.as_secs(), "Refresh scheduler started");
        RefreshScheduler {
            submitter,
            worker,
            timer,
        }
    }

    /// Submits a cycle outside the regular schedule. Never blocks; the cycle
    /// queues behind any cycle still running. Queued cycles that are superseded
    /// before they start, and that no caller is waiting on, are skipped.
    pub fn trigger_now(&self) {
        self.submitter.submit("manual");
    }

    /// Receives the id of every newly submitted cycle. The first cycle has id 0.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.submitter.submitted.subscribe()
    }

    /// Handle to the most recently submitted cycle, detached from `self`.
    pub fn outcome_handle(&self) -> impl Future<Output = FetchOutcome> + Send + use<> {
        self.submitter.latest().clone()
    }

    /// Waits for the most recently submitted cycle to finish.
    pub async fn current_outcome(&self) -> FetchOutcome {
        self.outcome_handle().await
    }

    /// Blocking variant of [`current_outcome`](Self::current_outcome) for
    /// callers outside the async runtime.
    pub fn current_outcome_blocking(&self) -> FetchOutcome {
        futures::executor::block_on(self.outcome_handle())
    }

    /// Stops scheduling and abandons the running cycle without waiting for it.
    pub fn shutdown(self) {
        info!("Refresh scheduler shutting down");
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.timer.abort();
        self.worker.abort();
    }
}
