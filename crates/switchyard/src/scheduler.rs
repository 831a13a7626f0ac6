//! Two-lane job scheduler.
//!
//! Jobs run either on the serial lane, a single worker task that drains a FIFO
//! queue and awaits each job before starting the next, or on the parallel
//! lane, where every job is spawned as its own task. Disposal never waits for
//! outstanding work: the serial worker finishes the job it is running and
//! drops the rest of its queue, while parallel jobs already spawned run to
//! completion in the background.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::errors::{JobError, SchedulerError};

/// Tracing target for scheduler operations.
pub(crate) const SCHEDULER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::scheduler");

/// Lane a job runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProcessType {
    /// Mutually exclusive, started in submission order.
    Serial,
    /// Concurrent with every other job.
    #[default]
    Parallel,
}

impl fmt::Display for ProcessType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
        })
    }
}

/// Observable lifecycle state of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed; lanes are not running yet.
    Created,
    /// Lanes are accepting and running jobs.
    Started,
    /// Lanes have been released.
    Disposed,
}

type JobFuture = BoxFuture<'static, Result<(), JobError>>;
type JobFactory = Box<dyn FnOnce() -> JobFuture + Send>;

struct Job {
    name: String,
    factory: JobFactory,
    ticket: JobTicket,
}

/// Keeps a job counted as incomplete until it finishes or is dropped.
struct JobTicket(Arc<AtomicUsize>);

impl JobTicket {
    fn issue(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for JobTicket {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Lifecycle {
    Created,
    Started {
        runtime: Handle,
        serial: mpsc::UnboundedSender<Job>,
        shutdown: CancellationToken,
    },
    Disposed,
}

/// Runs named jobs on a serial or a parallel lane.
pub struct Scheduler {
    lifecycle: Mutex<Lifecycle>,
    incomplete: Arc<AtomicUsize>,
}

impl Scheduler {
    /// Creates a scheduler in the [`SchedulerState::Created`] state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle::Created),
            incomplete: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Starts the lanes on the current tokio runtime.
    ///
    /// Starting an already started scheduler is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoRuntime`] outside a tokio runtime and
    /// [`SchedulerError::Disposed`] once the scheduler has been disposed.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut lifecycle = self.lifecycle.lock();
        match &*lifecycle {
            Lifecycle::Started { .. } => return Ok(()),
            Lifecycle::Disposed => return Err(SchedulerError::Disposed),
            Lifecycle::Created => {}
        }

        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        let (serial, queue) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        runtime.spawn(run_serial_lane(queue, shutdown.clone()));
        *lifecycle = Lifecycle::Started {
            runtime,
            serial,
            shutdown,
        };
        info!(target: SCHEDULER_TARGET, "scheduler started");
        Ok(())
    }

    /// Submits a job. Fire-and-forget: results travel through whatever the
    /// job captures.
    ///
    /// The factory runs when the job reaches the front of its lane. A
    /// factory or future that panics, and a future that resolves to an
    /// error, are logged and never disturb the lane or sibling jobs.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotStarted`] before [`Self::start`] and
    /// [`SchedulerError::Disposed`] after [`Self::dispose`].
    pub fn add<F, Fut>(
        &self,
        process_type: ProcessType,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let lifecycle = self.lifecycle.lock();
        let (runtime, serial) = match &*lifecycle {
            Lifecycle::Started {
                runtime, serial, ..
            } => (runtime, serial),
            Lifecycle::Created => return Err(SchedulerError::NotStarted),
            Lifecycle::Disposed => return Err(SchedulerError::Disposed),
        };

        let job = Job {
            name: name.into(),
            factory: Box::new(move || factory().boxed()),
            ticket: JobTicket::issue(&self.incomplete),
        };
        trace!(
            target: SCHEDULER_TARGET,
            job = %job.name,
            lane = %process_type,
            "job queued"
        );

        match process_type {
            ProcessType::Serial => serial
                .send(job)
                .map_err(|_| SchedulerError::Disposed),
            ProcessType::Parallel => {
                runtime.spawn(run_job(job, ProcessType::Parallel));
                Ok(())
            }
        }
    }

    /// Releases the lanes without waiting for outstanding jobs.
    ///
    /// Idempotent. Jobs already running are left to finish; serial jobs that
    /// have not started yet are abandoned.
    pub fn dispose(&self) {
        let previous = mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Disposed);
        if let Lifecycle::Started { shutdown, .. } = previous {
            shutdown.cancel();
            info!(
                target: SCHEDULER_TARGET,
                incomplete = self.incomplete_jobs(),
                "scheduler disposed"
            );
        }
    }

    /// Number of submitted jobs that have neither completed nor been
    /// abandoned.
    #[must_use]
    pub fn incomplete_jobs(&self) -> usize {
        self.incomplete.load(Ordering::SeqCst)
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        match &*self.lifecycle.lock() {
            Lifecycle::Created => SchedulerState::Created,
            Lifecycle::Started { .. } => SchedulerState::Started,
            Lifecycle::Disposed => SchedulerState::Disposed,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Scheduler")
            .field("state", &self.state())
            .field("incomplete_jobs", &self.incomplete_jobs())
            .finish()
    }
}

async fn run_serial_lane(mut queue: mpsc::UnboundedReceiver<Job>, shutdown: CancellationToken) {
    loop {
        let job = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            next = queue.recv() => match next {
                Some(job) => job,
                None => break,
            },
        };
        run_job(job, ProcessType::Serial).await;
    }

    queue.close();
    let mut abandoned = 0_usize;
    while let Ok(job) = queue.try_recv() {
        trace!(target: SCHEDULER_TARGET, job = %job.name, "serial job abandoned");
        abandoned += 1;
    }
    debug!(target: SCHEDULER_TARGET, abandoned, "serial lane stopped");
}

async fn run_job(job: Job, lane: ProcessType) {
    let Job {
        name,
        factory,
        ticket,
    } = job;

    let future = match panic::catch_unwind(AssertUnwindSafe(factory)) {
        Ok(future) => future,
        Err(payload) => {
            warn!(
                target: SCHEDULER_TARGET,
                job = %name,
                %lane,
                panic = %panic_message(payload.as_ref()),
                "job factory panicked"
            );
            drop(ticket);
            return;
        }
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => trace!(target: SCHEDULER_TARGET, job = %name, %lane, "job completed"),
        Ok(Err(failure)) => warn!(
            target: SCHEDULER_TARGET,
            job = %name,
            %lane,
            error = %failure,
            "job failed"
        ),
        Err(payload) => error!(
            target: SCHEDULER_TARGET,
            job = %name,
            %lane,
            panic = %panic_message(payload.as_ref()),
            "job panicked"
        ),
    }
    drop(ticket);
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}
