// src/task/result.rs

//! Immutable outcome record for one execution attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::task::TaskId;

/// The outcome of a single execution attempt.
///
/// Created exactly once per attempt and never mutated; the next attempt's
/// result replaces it wholesale in the scheduler's result map.
#[derive(Debug, Clone)]
pub struct TaskResult<P> {
    pub task_id: TaskId,
    pub success: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Human-readable outcome summary.
    pub message: String,
    /// Typed payload from a successful run.
    pub data: Option<P>,
    /// The error that failed the attempt, if any.
    ///
    /// Shared via `Arc` so results stay cheaply cloneable for snapshots.
    pub error: Option<Arc<anyhow::Error>>,
}

impl<P> TaskResult<P> {
    pub fn succeeded(
        task_id: impl Into<TaskId>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        data: P,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            start_time,
            end_time,
            message: "Task completed successfully".to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(
        task_id: impl Into<TaskId>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        error: anyhow::Error,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            start_time,
            end_time,
            message: format!("Task failed: {error:#}"),
            data: None,
            error: Some(Arc::new(error)),
        }
    }

    /// Wall-clock duration of the attempt.
    pub fn duration(&self) -> Duration {
        (self.end_time - self.start_time).to_std().unwrap_or_default()
    }
}

impl<P> fmt::Display for TaskResult<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "SUCCESS" } else { "FAILURE" };
        write!(
            f,
            "Task {} - {}: {} (Duration: {:.2}s)",
            self.task_id,
            status,
            self.message,
            self.duration().as_secs_f64()
        )
    }
}
