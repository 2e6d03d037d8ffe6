// src/sched/status.rs

//! Read-only status snapshots.
//!
//! These are owned values, never live references into scheduler state, so a
//! caller can never observe a partially-updated registry.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::task::{TaskId, TaskResult};

/// Snapshot of one registered task's state at the time of the query.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub description: String,
    pub is_running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    /// Dependency ids, sorted for stable output.
    pub dependencies: Vec<TaskId>,
    pub retries_attempted: u32,
    pub max_retries: u32,
    /// Advisory per-task timeout from config; documented but not enforced
    /// by the scheduler loop.
    pub task_timeout_secs: u64,
    pub last_result: Option<ResultSummary>,
}

/// Payload-free summary of the most recent [`TaskResult`].
#[derive(Debug, Clone, Serialize)]
pub struct ResultSummary {
    pub success: bool,
    pub message: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: f64,
    pub error: Option<String>,
}

impl ResultSummary {
    pub(crate) fn from_result<P>(result: &TaskResult<P>) -> Self {
        Self {
            success: result.success,
            message: result.message.clone(),
            start_time: result.start_time,
            end_time: result.end_time,
            duration_secs: result.duration().as_secs_f64(),
            error: result.error.as_ref().map(|e| format!("{e:#}")),
        }
    }
}
