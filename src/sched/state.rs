// src/sched/state.rs

//! Lock-guarded scheduler state: registry, dependency sets, results and the
//! running set.
//!
//! Everything here is synchronous and deterministic so the registry and
//! eligibility semantics can be unit tested without Tokio, clocks or real
//! tasks. The async shell in [`scheduler`](crate::sched::scheduler) holds
//! this behind a single mutex and calls in only for map reads/writes, never
//! across a task's `run()`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::sched::entry::TaskEntry;
use crate::sched::status::{ResultSummary, TaskStatus};
use crate::task::{RetryPolicy, Task, TaskId, TaskResult};

/// A task pulled out of the registry for dispatch.
///
/// Carries the `Arc`'d task handle so the worker never has to touch the
/// registry again to run it.
pub(crate) struct Dispatch<P> {
    pub task_id: TaskId,
    pub task: Arc<dyn Task<Payload = P>>,
}

/// What `record_completion` decided, for the worker to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Succeeded,
    /// Failed; a retry was scheduled for the contained time.
    RetryScheduled(DateTime<Utc>),
    /// Failed with no retry budget left.
    RetriesExhausted,
    /// The task vanished from the registry while running.
    Unregistered,
}

pub(crate) struct SchedulerState<P> {
    tasks: BTreeMap<TaskId, TaskEntry<P>>,
    deps: BTreeMap<TaskId, BTreeSet<TaskId>>,
    results: BTreeMap<TaskId, TaskResult<P>>,
    running: BTreeSet<TaskId>,
    default_policy: RetryPolicy,
    /// Advisory only; surfaced in status snapshots.
    task_timeout: Duration,
}

impl<P: Send + 'static> std::fmt::Debug for SchedulerState<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerState")
            .field("tasks", &self.tasks)
            .field("deps", &self.deps)
            .field("running", &self.running)
            .field("results", &self.results.keys())
            .field("default_policy", &self.default_policy)
            .finish_non_exhaustive()
    }
}

impl<P: Send + 'static> SchedulerState<P> {
    pub fn new(default_policy: RetryPolicy, task_timeout: Duration) -> Self {
        Self {
            tasks: BTreeMap::new(),
            deps: BTreeMap::new(),
            results: BTreeMap::new(),
            running: BTreeSet::new(),
            default_policy,
            task_timeout,
        }
    }

    /// Insert (or replace) a task and record its dependency set.
    ///
    /// Unknown dependency ids are a warning, not an error: a misconfigured
    /// dependency should block that one dependent, not stop the whole
    /// scheduler at startup.
    pub fn register(&mut self, task: Arc<dyn Task<Payload = P>>, dependencies: &[&str]) {
        let task_id = task.task_id().to_string();

        if self.tasks.contains_key(&task_id) {
            warn!(task = %task_id, "task already registered, replacing");
        }

        for dep_id in dependencies {
            if !self.tasks.contains_key(*dep_id) {
                warn!(
                    task = %task_id,
                    dep = %dep_id,
                    "dependency is not registered"
                );
            }
        }

        let dep_set: BTreeSet<TaskId> = dependencies.iter().map(|d| d.to_string()).collect();
        info!(task = %task_id, dependencies = ?dep_set, "task registered");

        self.tasks
            .insert(task_id.clone(), TaskEntry::new(task, self.default_policy));
        self.deps.insert(task_id, dep_set);
    }

    /// Remove a task from the registry.
    ///
    /// Refuses (with a warning) while the task is running. On success the
    /// id is also stripped from every other task's dependency set, so a
    /// removed task can no longer block anyone.
    pub fn unregister(&mut self, task_id: &str) -> bool {
        if self.running.contains(task_id) {
            warn!(task = %task_id, "cannot unregister task while it is running");
            return false;
        }

        if self.tasks.remove(task_id).is_none() {
            warn!(task = %task_id, "task not found in registry");
            return false;
        }

        self.deps.remove(task_id);
        for dep_set in self.deps.values_mut() {
            dep_set.remove(task_id);
        }

        info!(task = %task_id, "task unregistered");
        true
    }

    /// Set a task's next run time. Returns `false` for unknown ids.
    pub fn schedule(&mut self, task_id: &str, next_run: DateTime<Utc>) -> bool {
        match self.tasks.get_mut(task_id) {
            Some(entry) => {
                debug!(task = %task_id, next_run = %next_run, "task scheduled");
                entry.next_run = Some(next_run);
                true
            }
            None => {
                warn!(task = %task_id, "cannot schedule unknown task");
                false
            }
        }
    }

    /// Whether a task's dependencies currently permit execution.
    ///
    /// Re-evaluated on every polling cycle; never cached, so a dependency
    /// that later succeeds unblocks its dependents on the very next cycle.
    pub fn can_run(&self, task_id: &str) -> bool {
        let Some(dep_set) = self.deps.get(task_id) else {
            return true;
        };

        for dep_id in dep_set {
            if !self.tasks.contains_key(dep_id) {
                warn!(task = %task_id, dep = %dep_id, "task has unknown dependency");
                return false;
            }

            if self.running.contains(dep_id) {
                debug!(task = %task_id, dep = %dep_id, "waiting for dependency to complete");
                return false;
            }

            match self.results.get(dep_id) {
                None => {
                    debug!(task = %task_id, dep = %dep_id, "waiting for dependency to run");
                    return false;
                }
                Some(result) if !result.success => {
                    warn!(task = %task_id, dep = %dep_id, "blocked: dependency failed");
                    return false;
                }
                Some(_) => {}
            }
        }

        debug!(task = %task_id, "all dependencies satisfied");
        true
    }

    /// Collect every due, eligible task and transition it to running.
    ///
    /// Clearing `next_run` and inserting into `running` happen here, in the
    /// same critical section as the eligibility check, which is what makes
    /// dispatch at-most-once per task id. Due-but-ineligible tasks keep
    /// their `next_run` and are rechecked next cycle.
    pub fn collect_due(&mut self, now: DateTime<Utc>) -> Vec<Dispatch<P>> {
        let candidates: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|(id, entry)| {
                !self.running.contains(*id)
                    && entry.next_run.is_some_and(|next| next <= now)
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut due = Vec::new();
        for task_id in candidates {
            if !self.can_run(&task_id) {
                info!(task = %task_id, "task is due but dependencies not met");
                continue;
            }

            let Some(entry) = self.tasks.get_mut(&task_id) else {
                continue;
            };

            info!(task = %task_id, "task is due to run");
            entry.next_run = None;
            self.running.insert(task_id.clone());
            due.push(Dispatch {
                task_id,
                task: Arc::clone(&entry.task),
            });
        }

        due
    }

    /// Record that a dispatched task has started.
    pub fn mark_started(&mut self, task_id: &str, start_time: DateTime<Utc>) {
        if let Some(entry) = self.tasks.get_mut(task_id) {
            entry.last_run = Some(start_time);
        }
    }

    /// Record an attempt's result and leave the running set.
    ///
    /// The result is stored before the task leaves `running`, so there is
    /// never an instant where a task is neither running nor has its attempt
    /// recorded. On failure with remaining budget the retry is scheduled
    /// here, under the same lock hold.
    pub fn record_completion(&mut self, result: TaskResult<P>, now: DateTime<Utc>) -> Completion {
        let task_id = result.task_id.clone();
        let success = result.success;

        let completion = match self.tasks.get_mut(&task_id) {
            Some(entry) => {
                if success {
                    entry.retries_attempted = 0;
                    Completion::Succeeded
                } else if entry.should_retry() {
                    entry.retries_attempted += 1;
                    let retry_at = now
                        + chrono::Duration::from_std(entry.policy.retry_delay)
                            .unwrap_or_else(|_| chrono::Duration::zero());
                    entry.next_run = Some(retry_at);
                    Completion::RetryScheduled(retry_at)
                } else {
                    Completion::RetriesExhausted
                }
            }
            None => Completion::Unregistered,
        };

        if !matches!(completion, Completion::Unregistered) {
            self.results.insert(task_id.clone(), result);
        }
        self.running.remove(&task_id);

        completion
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Owned snapshot for one task; `None` for unknown ids.
    pub fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        let entry = self.tasks.get(task_id)?;

        Some(TaskStatus {
            task_id: task_id.to_string(),
            description: entry.task.description().to_string(),
            is_running: self.running.contains(task_id),
            last_run: entry.last_run,
            next_run: entry.next_run,
            dependencies: self
                .deps
                .get(task_id)
                .map(|d| d.iter().cloned().collect())
                .unwrap_or_default(),
            retries_attempted: entry.retries_attempted,
            max_retries: entry.policy.max_retries,
            task_timeout_secs: self.task_timeout.as_secs(),
            last_result: self.results.get(task_id).map(ResultSummary::from_result),
        })
    }

    /// Snapshots for every registered task, keyed by id.
    pub fn all_statuses(&self) -> BTreeMap<TaskId, TaskStatus> {
        self.tasks
            .keys()
            .filter_map(|id| self.status_of(id).map(|s| (id.clone(), s)))
            .collect()
    }
}
