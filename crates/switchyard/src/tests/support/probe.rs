//! Concurrency probe for scheduler tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::errors::JobError;
use crate::scheduler::{ProcessType, Scheduler};

/// Tracks how many jobs overlap and the order in which they finish.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
    completed: Mutex<Vec<usize>>,
}

/// Marks a job as active until dropped.
pub struct Occupancy<'a>(&'a ConcurrencyProbe);

impl Drop for Occupancy<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyProbe {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Marks a job as active.
    pub fn enter(&self) -> Occupancy<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Occupancy(self)
    }

    /// Records that `job` finished.
    pub fn finish(&self, job: usize) {
        self.completed.lock().push(job);
    }

    /// Highest number of jobs observed running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Job indices in completion order.
    pub fn completed(&self) -> Vec<usize> {
        self.completed.lock().clone()
    }
}

/// Submits `count` jobs that each occupy `probe` for `duration`.
pub fn submit_jobs(
    scheduler: &Scheduler,
    probe: &Arc<ConcurrencyProbe>,
    process_type: ProcessType,
    count: usize,
    duration: Duration,
) {
    for job in 0..count {
        let job_probe = Arc::clone(probe);
        let submitted = scheduler.add(process_type, format!("{process_type}-{job}"), move || {
            async move {
                {
                    let _occupied = job_probe.enter();
                    tokio::time::sleep(duration).await;
                }
                job_probe.finish(job);
                Ok::<(), JobError>(())
            }
        });
        assert!(submitted.is_ok(), "scheduler rejected job {job}: {submitted:?}");
    }
}

/// Polls until the scheduler reports no incomplete jobs or `limit` passes.
pub async fn wait_until_idle(scheduler: &Scheduler, limit: Duration) -> bool {
    wait_until(limit, || scheduler.incomplete_jobs() == 0).await
}

/// Polls `condition` every few milliseconds until it holds or `limit`
/// passes.
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
