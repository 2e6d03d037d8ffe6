// tests/dependency_gating.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tickdag::sched::Scheduler;
use tickdag::task::RetryPolicy;
use tickdag_test_utils::scripted::ScriptedTask;
use tickdag_test_utils::{fast_settings, init_tracing, start_scheduler, wait_until};

#[tokio::test]
async fn dependent_waits_for_running_dependency() {
    init_tracing();

    let scheduler: Arc<Scheduler<u32>> = Arc::new(Scheduler::new(fast_settings()));

    let upstream = ScriptedTask::new("extract").takes(Duration::from_millis(150));
    let upstream_probe = upstream.probe();
    let downstream = ScriptedTask::new("transform");
    let downstream_probe = downstream.probe();

    scheduler.register(Arc::new(upstream), &[]);
    scheduler.register(Arc::new(downstream), &["extract"]);

    // Both are due immediately; 'transform' must be skipped (not consumed)
    // until 'extract' has a successful result.
    let now = Utc::now();
    scheduler.schedule("extract", now);
    scheduler.schedule("transform", now);

    let runner = start_scheduler(&scheduler);

    wait_until(
        || downstream_probe.attempts() == 1,
        Duration::from_secs(3),
        "'transform' to run after 'extract'",
    )
    .await;

    let upstream_start = upstream_probe.attempt_times()[0];
    let downstream_start = downstream_probe.attempt_times()[0];
    assert!(
        downstream_start - upstream_start >= chrono::Duration::milliseconds(140),
        "'transform' started before 'extract' finished"
    );

    // A skipped task keeps its due time; it was dispatched from the original
    // schedule, not a fresh one.
    assert!(scheduler.status("transform").unwrap().next_run.is_none());

    scheduler.stop().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn failed_dependency_blocks_dependent() {
    init_tracing();

    let scheduler: Arc<Scheduler<u32>> = Arc::new(Scheduler::new(fast_settings()));

    let upstream = ScriptedTask::new("extract").always_fails();
    let upstream_probe = upstream.probe();
    let downstream = ScriptedTask::new("transform");
    let downstream_probe = downstream.probe();

    scheduler.register(Arc::new(upstream), &[]);
    scheduler.register(Arc::new(downstream), &["extract"]);
    let now = Utc::now();
    scheduler.schedule("extract", now);
    scheduler.schedule("transform", now);

    let runner = start_scheduler(&scheduler);

    wait_until(
        || upstream_probe.attempts() == 1,
        Duration::from_secs(3),
        "'extract' to fail once",
    )
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(downstream_probe.attempts(), 0);
    let status = scheduler.status("transform").unwrap();
    assert!(status.next_run.is_some(), "blocked task stays scheduled");

    scheduler.stop().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn dependent_unblocks_once_retry_succeeds() {
    init_tracing();

    let scheduler: Arc<Scheduler<u32>> = Arc::new(Scheduler::new(fast_settings()));

    let upstream = ScriptedTask::new("extract").fails_first(1).with_retry(RetryPolicy {
        max_retries: 2,
        retry_delay: Duration::from_millis(50),
    });
    let upstream_probe = upstream.probe();
    let downstream = ScriptedTask::new("transform");
    let downstream_probe = downstream.probe();

    scheduler.register(Arc::new(upstream), &[]);
    scheduler.register(Arc::new(downstream), &["extract"]);
    let now = Utc::now();
    scheduler.schedule("extract", now);
    scheduler.schedule("transform", now);

    let runner = start_scheduler(&scheduler);

    wait_until(
        || downstream_probe.attempts() == 1,
        Duration::from_secs(3),
        "'transform' to run after the retry of 'extract' succeeds",
    )
    .await;

    assert_eq!(upstream_probe.attempts(), 2);
    let second_upstream_start = upstream_probe.attempt_times()[1];
    assert!(downstream_probe.attempt_times()[0] >= second_upstream_start);

    scheduler.stop().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn unknown_dependency_never_becomes_eligible() {
    init_tracing();

    let scheduler: Arc<Scheduler<u32>> = Arc::new(Scheduler::new(fast_settings()));

    let task = ScriptedTask::new("orphan");
    let probe = task.probe();

    scheduler.register(Arc::new(task), &["ghost"]);
    scheduler.schedule("orphan", Utc::now());

    let runner = start_scheduler(&scheduler);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(probe.attempts(), 0);
    assert!(scheduler.status("orphan").unwrap().next_run.is_some());

    scheduler.stop().await;
    runner.await.unwrap();
}
