// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod sched;
pub mod task;
pub mod timetable;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::exec::{CommandOutput, CommandTask};
use crate::task::TaskId;
use crate::timetable::Timetable;

pub use crate::sched::{ResultSummary, Scheduler, SchedulerSettings, TaskStatus};
pub use crate::task::{RetryPolicy, Task, TaskResult};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the scheduler with one `CommandTask` per config entry
/// - initial schedules from each task's timetable
/// - the recurrence loop that re-schedules tasks after terminal results
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let settings = cfg.scheduler.to_settings();
    let scheduler: Arc<Scheduler<CommandOutput>> = Arc::new(Scheduler::new(settings));

    for (name, task_cfg) in cfg.task.iter() {
        let mut task =
            CommandTask::new(name, &task_cfg.cmd).with_description(&task_cfg.description);
        if let Some(policy) = task_cfg.retry_override {
            task = task.with_retry_policy(policy);
        }

        let deps: Vec<&str> = task_cfg.after.iter().map(String::as_str).collect();
        scheduler.register(Arc::new(task), &deps);
    }

    // Seed each task's first occurrence.
    let now = Utc::now();
    for (name, task_cfg) in cfg.task.iter() {
        let first = task_cfg.timetable.next_occurrence(now);
        info!(task = %name, next_run = %first, "initial schedule");
        scheduler.schedule(name, first);
    }

    // Ctrl-C → graceful shutdown.
    {
        let stop = scheduler.stop_token();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("received Ctrl+C, stopping scheduler");
            stop.cancel();
        });
    }

    // The core only reschedules retries; recurring schedules are the
    // caller's job, and for the binary that caller is this loop.
    let plan: Vec<(TaskId, Timetable)> = cfg
        .task
        .iter()
        .map(|(name, task_cfg)| (name.clone(), task_cfg.timetable))
        .collect();
    let recurrence = {
        let scheduler = Arc::clone(&scheduler);
        let stop = scheduler.stop_token();
        let interval = settings.check_interval;
        tokio::spawn(async move { recurrence_loop(&scheduler, &plan, interval, stop).await })
    };

    scheduler.start().await;
    scheduler.stop().await;
    let _ = recurrence.await;

    Ok(())
}

/// Re-schedule each task for its next timetable occurrence once it has a
/// terminal result and nothing else pending.
///
/// "Terminal" here means: not running, no `next_run` (so no pending retry),
/// and at least one recorded result. Tasks that are still due-but-blocked
/// keep their `next_run` and are left alone.
async fn recurrence_loop<P: Send + 'static>(
    scheduler: &Scheduler<P>,
    plan: &[(TaskId, Timetable)],
    interval: Duration,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let now = Utc::now();
        for (task_id, timetable) in plan {
            let Some(status) = scheduler.status(task_id) else {
                continue;
            };
            if status.is_running || status.next_run.is_some() || status.last_result.is_none() {
                continue;
            }

            let next = timetable.next_occurrence(now);
            debug!(task = %task_id, next_run = %next, "rescheduling recurring task");
            scheduler.schedule(task_id, next);
        }
    }
}

/// Simple dry-run output: print scheduler settings and the task plan.
fn print_dry_run(cfg: &ConfigFile) {
    println!("tickdag dry-run");
    println!(
        "  scheduler.check_interval_secs = {}",
        cfg.scheduler.check_interval_secs
    );
    println!(
        "  scheduler.max_retries = {} (retry_delay_secs = {})",
        cfg.scheduler.max_retries, cfg.scheduler.retry_delay_secs
    );
    println!(
        "  scheduler.task_timeout_secs = {} (advisory, not enforced)",
        cfg.scheduler.task_timeout_secs
    );
    println!(
        "  scheduler.shutdown_grace_secs = {}",
        cfg.scheduler.shutdown_grace_secs
    );
    println!();

    let now = Utc::now();
    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.description.is_empty() {
            println!("      description: {}", task.description);
        }
        println!("      schedule: {}", task.timetable);
        println!("      first run: {}", task.timetable.next_occurrence(now));
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(policy) = task.retry_override {
            println!(
                "      retries: {} every {}s",
                policy.max_retries,
                policy.retry_delay.as_secs()
            );
        }
    }

    debug!("dry-run complete (no execution)");
}
