// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, RawTaskConfig, TaskConfig};
use crate::errors::{Result, TickdagError};
use crate::task::RetryPolicy;
use crate::timetable::Timetable;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = TickdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;

        let mut tasks = BTreeMap::new();
        for (name, task) in &raw.task {
            tasks.insert(name.clone(), build_task(name, task, &raw)?);
        }

        Ok(ConfigFile::new_unchecked(raw.scheduler, tasks))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_scheduler_section(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(TickdagError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.check_interval_secs == 0 {
        return Err(TickdagError::ConfigError(
            "[scheduler].check_interval_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(TickdagError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(TickdagError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task, so a toposort failure names a task on
    // the cycle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(TickdagError::DagCycle(format!(
                "cycle detected in task dependencies involving task '{}'",
                node
            )))
        }
    }
}

fn build_task(name: &str, raw: &RawTaskConfig, cfg: &RawConfigFile) -> Result<TaskConfig> {
    let timetable = match (&raw.daily_at, &raw.weekly_at) {
        (Some(daily), None) => Timetable::parse_daily(daily)?,
        (None, Some(weekly)) => Timetable::parse_weekly(weekly)?,
        (Some(_), Some(_)) => {
            return Err(TickdagError::ConfigError(format!(
                "task '{}' sets both daily_at and weekly_at; pick one",
                name
            )));
        }
        (None, None) => {
            return Err(TickdagError::ConfigError(format!(
                "task '{}' needs a schedule: set daily_at or weekly_at",
                name
            )));
        }
    };

    // Partial overrides fall back to the [scheduler] defaults per field,
    // so `max_retries = 0` alone still gets the default delay.
    let retry_override = if raw.max_retries.is_some() || raw.retry_delay_secs.is_some() {
        Some(RetryPolicy {
            max_retries: raw.max_retries.unwrap_or(cfg.scheduler.max_retries),
            retry_delay: Duration::from_secs(
                raw.retry_delay_secs.unwrap_or(cfg.scheduler.retry_delay_secs),
            ),
        })
    } else {
        None
    };

    Ok(TaskConfig {
        cmd: raw.cmd.clone(),
        description: raw.description.clone(),
        after: raw.after.clone(),
        timetable,
        retry_override,
    })
}
