// src/sched/mod.rs

//! The scheduler subsystem.
//!
//! - [`state`] holds the lock-guarded registry, dependency sets, results
//!   and running set — pure and synchronous, tested without Tokio.
//! - [`scheduler`] is the async shell: polling loop, dispatch, execution
//!   wrapper, graceful stop.
//! - [`entry`] is the per-task registry record.
//! - [`status`] defines the owned snapshot types returned to callers.

pub(crate) mod entry;
pub mod scheduler;
pub(crate) mod state;
pub mod status;

pub use scheduler::{Scheduler, SchedulerSettings};
pub use status::{ResultSummary, TaskStatus};
