// src/sched/scheduler.rs

//! The async shell around [`SchedulerState`]: polling loop, concurrent
//! dispatch, the execution wrapper, and graceful stop.
//!
//! Concurrency model: one polling loop plus one spawned worker per
//! dispatched task. Tasks run minutes-to-hours apart, so there is no
//! bounded pool; each dispatch gets its own Tokio task. The shared state
//! sits behind a single mutex held only for map reads/writes — never across
//! a task's `run()` — which makes registry mutation, eligibility checks and
//! result recording linearizable while execution itself stays unsynchronized.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::sched::state::{Completion, Dispatch, SchedulerState};
use crate::sched::status::TaskStatus;
use crate::task::{RetryPolicy, Task, TaskId, TaskResult};

/// Tunables for a [`Scheduler`] instance.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// How often the polling loop wakes to look for due tasks.
    pub check_interval: Duration,
    /// How long `stop()` waits for in-flight tasks before giving up.
    pub shutdown_grace: Duration,
    /// Retry policy for tasks that don't carry their own.
    pub default_retry: RetryPolicy,
    /// Advisory per-task timeout. Documented and surfaced in status
    /// snapshots, but not enforced by the loop; tasks needing a hard
    /// deadline must build it into `run`.
    pub task_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(30),
            default_retry: RetryPolicy::default(),
            task_timeout: Duration::from_secs(1800),
        }
    }
}

/// Dependency-aware, retrying, concurrent scheduler for recurring tasks.
///
/// All scheduler state is in-memory and lost on process restart; callers
/// needing durability re-register and re-schedule at startup.
///
/// The scheduler performs exactly one kind of automatic rescheduling: a
/// failed attempt with remaining retry budget is rescheduled after its
/// retry delay. Recurring (non-retry) scheduling is the caller's job — see
/// [`Timetable`](crate::timetable::Timetable) for the wrapper the `tickdag`
/// binary uses.
pub struct Scheduler<P> {
    state: Arc<Mutex<SchedulerState<P>>>,
    settings: SchedulerSettings,
    stop: CancellationToken,
}

impl<P> fmt::Debug for Scheduler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Lock the shared state, recovering from poisoning.
///
/// Critical sections are plain map updates; a panic inside one can only
/// come from a panicking allocator, so the state behind a poisoned lock is
/// still coherent.
fn lock_state<P>(state: &Mutex<SchedulerState<P>>) -> MutexGuard<'_, SchedulerState<P>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P: Send + 'static> Scheduler<P> {
    pub fn new(settings: SchedulerSettings) -> Self {
        info!(
            check_interval_secs = settings.check_interval.as_secs_f64(),
            "scheduler initialized"
        );
        Self {
            state: Arc::new(Mutex::new(SchedulerState::new(
                settings.default_retry,
                settings.task_timeout,
            ))),
            settings,
            stop: CancellationToken::new(),
        }
    }

    /// Register a task together with the ids of tasks that must have last
    /// succeeded before it may run.
    ///
    /// Re-registering an id replaces the previous task (logged as a
    /// warning). Unknown dependency ids are warnings, not errors.
    pub fn register(&self, task: Arc<dyn Task<Payload = P>>, dependencies: &[&str]) {
        lock_state(&self.state).register(task, dependencies);
    }

    /// Remove a task. No-op (with a warning) while the task is running;
    /// on success the id is stripped from every other dependency set.
    pub fn unregister(&self, task_id: &str) -> bool {
        lock_state(&self.state).unregister(task_id)
    }

    /// Set the task's next run time. This is the only way `next_run`
    /// becomes non-empty again after dispatch clears it.
    pub fn schedule(&self, task_id: &str, next_run: DateTime<Utc>) -> bool {
        lock_state(&self.state).schedule(task_id, next_run)
    }

    /// Token cancelled when the scheduler is asked to stop. The binary
    /// wires Ctrl-C to this; library callers can use it the same way.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Run the polling loop until [`stop`](Self::stop) (or the stop token)
    /// fires.
    ///
    /// The sleep between cycles is interruptible by the stop signal, so
    /// shutdown latency is bounded by in-flight work, not `check_interval`.
    pub async fn start(&self) {
        info!("starting scheduler");

        while !self.stop.is_cancelled() {
            self.poll_once(Utc::now());

            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(self.settings.check_interval) => {}
            }
        }

        info!("scheduler loop stopped");
    }

    /// Signal the loop to exit, then wait up to the shutdown grace period
    /// for running tasks to drain.
    ///
    /// In-flight work is never force-terminated; if tasks outlive the grace
    /// period this logs a warning and returns anyway.
    pub async fn stop(&self) {
        info!("stopping scheduler");
        self.stop.cancel();

        info!("waiting for running tasks to complete");
        let deadline = tokio::time::Instant::now() + self.settings.shutdown_grace;

        loop {
            let remaining = lock_state(&self.state).running_count();
            if remaining == 0 {
                info!("scheduler stopped");
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    still_running = remaining,
                    "shutdown grace period elapsed with tasks still running"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Owned status snapshot for one task; `None` for unknown ids.
    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        lock_state(&self.state).status_of(task_id)
    }

    /// Owned status snapshots for every registered task.
    pub fn all_statuses(&self) -> std::collections::BTreeMap<TaskId, TaskStatus> {
        lock_state(&self.state).all_statuses()
    }

    /// One polling cycle: collect due + eligible tasks and dispatch each on
    /// its own worker. Never blocks on the dispatched work.
    fn poll_once(&self, now: DateTime<Utc>) {
        let due = lock_state(&self.state).collect_due(now);

        if !due.is_empty() {
            debug!(count = due.len(), "dispatching due tasks");
        }

        for dispatch in due {
            let state = Arc::clone(&self.state);
            let cancel = self.stop.child_token();
            tokio::spawn(execute(state, dispatch, cancel));
        }
    }
}

/// The execution wrapper: runs one attempt and records its result.
///
/// Every error from `run` is contained here and converted into a failed
/// [`TaskResult`]; nothing propagates to the polling loop or other tasks.
async fn execute<P: Send + 'static>(
    state: Arc<Mutex<SchedulerState<P>>>,
    dispatch: Dispatch<P>,
    cancel: CancellationToken,
) {
    let Dispatch { task_id, task } = dispatch;

    let start_time = Utc::now();
    lock_state(&state).mark_started(&task_id, start_time);
    info!(task = %task_id, "executing task");

    // No lock is held while the task runs; this may block on I/O for as
    // long as the task likes. The attempt runs on its own worker so that
    // a panicking `run` still reaches `record_completion` below;
    // otherwise the id would never leave the running set.
    let attempt = tokio::spawn(async move { task.run(cancel).await });
    let outcome = match attempt.await {
        Ok(outcome) => outcome,
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(anyhow!("task panicked: {msg}"))
        }
        Err(join_err) => Err(anyhow!(join_err).context("task worker failed")),
    };
    let end_time = Utc::now();

    let result = match outcome {
        Ok(data) => TaskResult::succeeded(&task_id, start_time, end_time, data),
        Err(err) => {
            error!(task = %task_id, error = format!("{err:#}"), "task failed");
            TaskResult::failed(&task_id, start_time, end_time, err)
        }
    };

    info!(
        task = %task_id,
        success = result.success,
        duration_secs = result.duration().as_secs_f64(),
        "task completed"
    );

    match lock_state(&state).record_completion(result, end_time) {
        Completion::Succeeded => {}
        Completion::RetryScheduled(retry_at) => {
            info!(task = %task_id, retry_at = %retry_at, "scheduling retry");
        }
        Completion::RetriesExhausted => {
            warn!(task = %task_id, "retries exhausted; task will not be rescheduled");
        }
        Completion::Unregistered => {
            warn!(task = %task_id, "task disappeared from registry; dropping result");
        }
    }
}
