//! Scripted in-memory tasks for scheduler tests.
//!
//! A [`ScriptedTask`] succeeds or fails on a fixed script, optionally takes
//! a while per attempt, and exposes a [`Probe`] so the test can observe
//! attempt counts, attempt timestamps, and how many attempts overlapped.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use tickdag::task::{RetryPolicy, Task};

/// Observer handle onto a [`ScriptedTask`]'s execution history.
#[derive(Clone)]
pub struct Probe {
    attempts: Arc<AtomicU32>,
    attempt_times: Arc<Mutex<Vec<DateTime<Utc>>>>,
    max_in_flight: Arc<AtomicU32>,
}

impl Probe {
    /// Total number of attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Start timestamps of every attempt, in order.
    pub fn attempt_times(&self) -> Vec<DateTime<Utc>> {
        self.attempt_times.lock().unwrap().clone()
    }

    /// Highest number of concurrently running attempts observed.
    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// A task whose outcomes follow a script.
pub struct ScriptedTask {
    id: String,
    policy: Option<RetryPolicy>,
    run_delay: Duration,
    /// Attempts `1..=fail_first` fail, later ones succeed.
    fail_first: u32,
    always_fail: bool,
    panic_on_run: bool,
    attempts: Arc<AtomicU32>,
    attempt_times: Arc<Mutex<Vec<DateTime<Utc>>>>,
    in_flight: Arc<AtomicU32>,
    max_in_flight: Arc<AtomicU32>,
}

impl ScriptedTask {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            policy: None,
            run_delay: Duration::ZERO,
            fail_first: 0,
            always_fail: false,
            panic_on_run: false,
            attempts: Arc::new(AtomicU32::new(0)),
            attempt_times: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicU32::new(0)),
            max_in_flight: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail the first `n` attempts, then succeed.
    pub fn fails_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    /// Fail every attempt.
    pub fn always_fails(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// Panic on every attempt, after recording it.
    pub fn panics(mut self) -> Self {
        self.panic_on_run = true;
        self
    }

    /// Make each attempt take this long.
    pub fn takes(mut self, delay: Duration) -> Self {
        self.run_delay = delay;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn probe(&self) -> Probe {
        Probe {
            attempts: Arc::clone(&self.attempts),
            attempt_times: Arc::clone(&self.attempt_times),
            max_in_flight: Arc::clone(&self.max_in_flight),
        }
    }
}

#[async_trait]
impl Task for ScriptedTask {
    type Payload = u32;

    fn task_id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "scripted test task"
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        self.policy
    }

    async fn run(&self, _cancel: CancellationToken) -> anyhow::Result<u32> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.attempt_times.lock().unwrap().push(Utc::now());

        if self.panic_on_run {
            // Unwinds before the in-flight bookkeeping so later attempts
            // still see a clean counter.
            panic!("scripted panic on attempt {attempt}");
        }

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if !self.run_delay.is_zero() {
            tokio::time::sleep(self.run_delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.always_fail || attempt <= self.fail_first {
            anyhow::bail!("scripted failure on attempt {attempt}");
        }
        Ok(attempt)
    }
}
