//! Error types shared by the runtime and its clients
//!
//! Failures raised inside a coroutine body travel as [`Exception`] values so
//! that catch regions can inspect them by kind with `downcast_ref`. Misuse of
//! the frame protocol itself (resuming a finished frame, an unknown suspension
//! index, a local destroyed twice) is a programming error and panics.

use std::fmt::Display;

use thiserror::Error;

/// A captured failure propagating out of a coroutine body
pub type Exception = anyhow::Error;

/// Failures reported by [`crate::clients::Task`] result access
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    #[error("task has not completed yet")]
    Pending,

    #[error("task result was already taken")]
    Taken,
}

/// Configuration rejected after loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("runtime.transfer_budget must be greater than zero")]
    ZeroTransferBudget,
}

/// Abort on a broken frame protocol contract
#[cold]
#[track_caller]
pub(crate) fn protocol_violation(what: impl Display) -> ! {
    panic!("coroutine protocol violation: {what}")
}
