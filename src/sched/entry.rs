// src/sched/entry.rs

//! Registry record for one registered task.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::task::{RetryPolicy, Task};

/// A registered task plus its mutable scheduling state.
///
/// The task implementation itself stays immutable behind an `Arc`; all
/// bookkeeping the scheduler needs (last/next run, retry counter) lives
/// here, inside the lock-guarded state.
pub(crate) struct TaskEntry<P> {
    pub task: Arc<dyn Task<Payload = P>>,
    /// Retry policy resolved at registration time (task override or
    /// scheduler default).
    pub policy: RetryPolicy,
    pub last_run: Option<DateTime<Utc>>,
    /// `None` means "not currently scheduled". Cleared at dispatch so a
    /// single due time triggers at most one execution.
    pub next_run: Option<DateTime<Utc>>,
    /// Reset to 0 on any success.
    pub retries_attempted: u32,
}

impl<P: Send + 'static> TaskEntry<P> {
    pub fn new(task: Arc<dyn Task<Payload = P>>, default_policy: RetryPolicy) -> Self {
        let policy = task.retry_policy().unwrap_or(default_policy);
        Self {
            task,
            policy,
            last_run: None,
            next_run: None,
            retries_attempted: 0,
        }
    }

    /// Whether another automatic retry may be scheduled after a failure.
    ///
    /// Pure check; the counter is only advanced when a retry is actually
    /// scheduled, so after exhaustion it stays at `max_retries`.
    pub fn should_retry(&self) -> bool {
        self.retries_attempted < self.policy.max_retries
    }
}

impl<P: Send + 'static> std::fmt::Debug for TaskEntry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEntry")
            .field("task_id", &self.task.task_id())
            .field("policy", &self.policy)
            .field("last_run", &self.last_run)
            .field("next_run", &self.next_run)
            .field("retries_attempted", &self.retries_attempted)
            .finish_non_exhaustive()
    }
}
