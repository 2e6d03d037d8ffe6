pub mod scripted;

use std::future::Future;
use std::sync::{Arc, Once};
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use tickdag::sched::{Scheduler, SchedulerSettings};
use tickdag::task::RetryPolicy;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `cond` every 10ms until it holds, panicking after `timeout`.
pub async fn wait_until<C>(mut cond: C, timeout: Duration, what: &str)
where
    C: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out after {timeout:?} waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Scheduler settings tuned for tests: fast polling, short retry delays.
///
/// The default retry policy here is "no retries"; tests that exercise the
/// retry path attach their own policy per task.
pub fn fast_settings() -> SchedulerSettings {
    SchedulerSettings {
        check_interval: Duration::from_millis(20),
        shutdown_grace: Duration::from_secs(2),
        default_retry: RetryPolicy {
            max_retries: 0,
            retry_delay: Duration::from_millis(50),
        },
        task_timeout: Duration::from_secs(1800),
    }
}

/// Run the scheduler's polling loop on a background tokio task.
///
/// The loop exits once `scheduler.stop()` is called.
pub fn start_scheduler<P: Send + 'static>(
    scheduler: &Arc<Scheduler<P>>,
) -> tokio::task::JoinHandle<()> {
    let scheduler = Arc::clone(scheduler);
    tokio::spawn(async move { scheduler.start().await })
}
