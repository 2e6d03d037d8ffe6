// src/task/mod.rs

//! The unit of work the scheduler runs.
//!
//! Concrete tasks (data pulls, analyses, shell commands, ...) implement the
//! [`Task`] trait; the scheduler owns everything else (scheduling state,
//! retry counters, results). There is no inheritance hierarchy: identity and
//! retry policy are plain trait methods, and the payload type is an
//! associated type so callers get a typed result instead of an untyped map.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub mod result;

pub use result::TaskResult;

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// How often and how quickly a failing task is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of automatic retries after a failed attempt.
    pub max_retries: u32,
    /// Delay between a failed attempt and its retry.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(300),
        }
    }
}

/// A named, retryable, schedulable unit of work.
///
/// `run` receives a [`CancellationToken`] that is cancelled when the
/// scheduler is asked to stop. The scheduler never force-terminates a
/// running task; honouring the token (or not) is up to the implementation.
/// Long-running tasks that want cooperative shutdown should select on it.
#[async_trait]
pub trait Task: Send + Sync {
    /// Typed result payload produced by a successful run.
    type Payload: Send + 'static;

    /// Unique (per scheduler) identifier for this task.
    fn task_id(&self) -> &str;

    /// Human-readable description, surfaced in status snapshots.
    fn description(&self) -> &str {
        ""
    }

    /// Task-specific retry policy; `None` means "use the scheduler default".
    fn retry_policy(&self) -> Option<RetryPolicy> {
        None
    }

    /// Execute the task once.
    ///
    /// Returning `Err` marks the attempt as failed; the error never escapes
    /// the scheduler's execution wrapper.
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<Self::Payload>;
}
