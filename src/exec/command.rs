// src/exec/command.rs

//! Shell-command task implementation.
//!
//! This is the concrete [`Task`] the `tickdag` binary registers for each
//! `[task.<name>]` config entry: run the configured command through the
//! platform shell, stream its output into the log, and report the exit
//! status as the attempt's outcome.

use std::process::Stdio;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::task::{RetryPolicy, Task};

/// Typed payload of a successful command run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
}

/// A [`Task`] that runs a shell command.
#[derive(Debug, Clone)]
pub struct CommandTask {
    task_id: String,
    description: String,
    cmd: String,
    retry_override: Option<RetryPolicy>,
}

impl CommandTask {
    pub fn new(task_id: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            description: String::new(),
            cmd: cmd.into(),
            retry_override: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_override = Some(policy);
        self
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

#[async_trait]
impl Task for CommandTask {
    type Payload = CommandOutput;

    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry_override
    }

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<CommandOutput> {
        info!(task = %self.task_id, cmd = %self.cmd, "starting task process");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", self.task_id))?;

        // Consume both pipes so buffers don't fill; log at debug.
        if let Some(stdout) = child.stdout.take() {
            let task_id = self.task_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %task_id, "stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let task_id = self.task_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %task_id, "stderr: {}", line);
                }
            });
        }

        // Either the process exits on its own (normal case), or the stop
        // token fires and we kill the child and report failure.
        tokio::select! {
            status_res = child.wait() => {
                let status = status_res.with_context(|| {
                    format!("waiting for process of task '{}'", self.task_id)
                })?;

                let code = status.code().unwrap_or(-1);
                info!(
                    task = %self.task_id,
                    exit_code = code,
                    success = status.success(),
                    "task process exited"
                );

                if status.success() {
                    Ok(CommandOutput { exit_code: code })
                } else {
                    bail!("command exited with status {code}");
                }
            }
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                bail!("cancelled while running");
            }
        }
    }
}
