// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::sched::SchedulerSettings;
use crate::task::RetryPolicy;
use crate::timetable::Timetable;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [scheduler]
/// check_interval_secs = 60
/// retry_delay_secs = 300
///
/// [task.mixpanel_pull]
/// cmd = "python pull_events.py"
/// daily_at = "04:00"
///
/// [task.trend_analysis]
/// cmd = "python analyze_trends.py"
/// daily_at = "04:30"
/// after = ["mixpanel_pull"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global scheduler tunables from `[scheduler]`.
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// All tasks from `[task.<name>]`, keyed by task id.
    #[serde(default)]
    pub task: BTreeMap<String, RawTaskConfig>,
}

/// `[scheduler]` section. All durations are integer seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// How often the polling loop checks for due tasks.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Advisory per-task timeout, surfaced in status output only.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Default maximum retry attempts for tasks without an override.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Default delay between a failure and its retry.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// How long `stop()` waits for in-flight tasks.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_task_timeout_secs() -> u64 {
    1800
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    300
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            task_timeout_secs: default_task_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl SchedulerSection {
    /// Convert into the scheduler's runtime settings.
    pub fn to_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            check_interval: Duration::from_secs(self.check_interval_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            default_retry: RetryPolicy {
                max_retries: self.max_retries,
                retry_delay: Duration::from_secs(self.retry_delay_secs),
            },
            task_timeout: Duration::from_secs(self.task_timeout_secs),
        }
    }
}

/// `[task.<name>]` section, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTaskConfig {
    /// The shell command to execute.
    pub cmd: String,

    /// Human-readable description for status output.
    #[serde(default)]
    pub description: String,

    /// Ids of tasks that must have last succeeded before this one runs.
    #[serde(default)]
    pub after: Vec<String>,

    /// Run every day at this time, e.g. `"04:30"` (UTC).
    #[serde(default)]
    pub daily_at: Option<String>,

    /// Run once a week, e.g. `"mon 08:00"` (UTC).
    #[serde(default)]
    pub weekly_at: Option<String>,

    /// Per-task retry override.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Per-task retry delay override, in seconds.
    #[serde(default)]
    pub retry_delay_secs: Option<u64>,
}

/// A validated task entry: timetable parsed, references checked.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub cmd: String,
    pub description: String,
    pub after: Vec<String>,
    pub timetable: Timetable,
    pub retry_override: Option<RetryPolicy>,
}

/// Validated top-level configuration.
///
/// Constructed via `ConfigFile::try_from(raw)`; see `config::validate`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    /// Assemble a config from already-validated parts.
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self { scheduler, task }
    }
}
