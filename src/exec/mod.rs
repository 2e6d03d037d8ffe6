// src/exec/mod.rs

//! Concrete task implementations.
//!
//! The scheduler itself only knows the [`Task`](crate::task::Task) trait;
//! this module holds the implementation the binary uses:
//!
//! - [`command`] runs shell commands via `tokio::process::Command`.

pub mod command;

pub use command::{CommandOutput, CommandTask};
