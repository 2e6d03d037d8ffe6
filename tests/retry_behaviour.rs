// tests/retry_behaviour.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tickdag::sched::Scheduler;
use tickdag::task::RetryPolicy;
use tickdag_test_utils::scripted::ScriptedTask;
use tickdag_test_utils::{fast_settings, init_tracing, start_scheduler, wait_until};

#[tokio::test]
async fn failing_task_retries_until_budget_exhausted() {
    init_tracing();

    let scheduler: Arc<Scheduler<u32>> = Arc::new(Scheduler::new(fast_settings()));

    let task = ScriptedTask::new("pull").always_fails().with_retry(RetryPolicy {
        max_retries: 2,
        retry_delay: Duration::from_millis(100),
    });
    let probe = task.probe();

    let dependent = ScriptedTask::new("report");
    let dependent_probe = dependent.probe();

    scheduler.register(Arc::new(task), &[]);
    scheduler.register(Arc::new(dependent), &["pull"]);
    scheduler.schedule("pull", Utc::now());
    scheduler.schedule("report", Utc::now());

    let runner = start_scheduler(&scheduler);

    // One initial attempt plus max_retries = 2 automatic retries.
    wait_until(
        || probe.attempts() == 3,
        Duration::from_secs(3),
        "three attempts of 'pull'",
    )
    .await;

    // Give the loop several more cycles: no fourth attempt happens.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(probe.attempts(), 3);

    let status = scheduler.status("pull").unwrap();
    assert_eq!(status.retries_attempted, 2);
    assert!(status.next_run.is_none(), "exhausted task must not be rescheduled");
    let last = status.last_result.unwrap();
    assert!(!last.success);
    assert!(last.error.is_some());

    // 'report' gates on 'pull' succeeding, which never happened.
    assert_eq!(dependent_probe.attempts(), 0);
    assert!(scheduler.status("report").unwrap().next_run.is_some());

    scheduler.stop().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn retry_attempts_are_spaced_by_at_least_the_retry_delay() {
    init_tracing();

    let scheduler: Arc<Scheduler<u32>> = Arc::new(Scheduler::new(fast_settings()));

    let delay = Duration::from_millis(100);
    let task = ScriptedTask::new("flaky").always_fails().with_retry(RetryPolicy {
        max_retries: 2,
        retry_delay: delay,
    });
    let probe = task.probe();

    scheduler.register(Arc::new(task), &[]);
    scheduler.schedule("flaky", Utc::now());

    let runner = start_scheduler(&scheduler);

    wait_until(
        || probe.attempts() == 3,
        Duration::from_secs(3),
        "three attempts of 'flaky'",
    )
    .await;

    scheduler.stop().await;
    runner.await.unwrap();

    let times = probe.attempt_times();
    assert_eq!(times.len(), 3);
    let min_gap = chrono::Duration::from_std(delay).unwrap();
    for pair in times.windows(2) {
        assert!(
            pair[1] - pair[0] >= min_gap,
            "retry fired early: gap {} < {}",
            pair[1] - pair[0],
            min_gap
        );
    }
}

#[tokio::test]
async fn success_resets_the_retry_counter() {
    init_tracing();

    let scheduler: Arc<Scheduler<u32>> = Arc::new(Scheduler::new(fast_settings()));

    let task = ScriptedTask::new("sync").fails_first(1).with_retry(RetryPolicy {
        max_retries: 3,
        retry_delay: Duration::from_millis(50),
    });
    let probe = task.probe();

    scheduler.register(Arc::new(task), &[]);
    scheduler.schedule("sync", Utc::now());

    let runner = start_scheduler(&scheduler);

    wait_until(
        || probe.attempts() == 2,
        Duration::from_secs(3),
        "second attempt of 'sync'",
    )
    .await;
    wait_until(
        || {
            scheduler
                .status("sync")
                .and_then(|s| s.last_result)
                .is_some_and(|r| r.success)
        },
        Duration::from_secs(3),
        "successful result for 'sync'",
    )
    .await;

    let status = scheduler.status("sync").unwrap();
    assert_eq!(status.retries_attempted, 0);
    assert!(status.last_run.is_some());
    assert!(status.next_run.is_none());

    scheduler.stop().await;
    runner.await.unwrap();
}

#[tokio::test]
async fn task_without_retry_budget_fails_once() {
    init_tracing();

    // fast_settings gives max_retries = 0 as the scheduler default.
    let scheduler: Arc<Scheduler<u32>> = Arc::new(Scheduler::new(fast_settings()));

    let task = ScriptedTask::new("oneshot").always_fails();
    let probe = task.probe();

    scheduler.register(Arc::new(task), &[]);
    scheduler.schedule("oneshot", Utc::now());

    let runner = start_scheduler(&scheduler);

    wait_until(
        || probe.attempts() == 1,
        Duration::from_secs(3),
        "single attempt of 'oneshot'",
    )
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(probe.attempts(), 1);
    assert_eq!(scheduler.status("oneshot").unwrap().retries_attempted, 0);

    scheduler.stop().await;
    runner.await.unwrap();
}
