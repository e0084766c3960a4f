//! Error types for check composition and registration
//!
//! Probe failures never show up here: checkers fold them into critical results. These errors are
//! raised while wiring checks together, before anything runs.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while composing a check from decorators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// Retry needs at least one attempt
    #[error("retry attempts must be at least 1, got {0}")]
    InvalidRetryAttempts(u32),
}

/// Errors raised while registering a binding with the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A binding cannot tick on a zero period
    #[error("period for {host}/{service} must be greater than zero")]
    InvalidPeriod { host: String, service: String },

    /// The initial delay overflows the clock
    #[error("initial delay for {host}/{service} is out of range")]
    InvalidInitialDelay { host: String, service: String },

    /// Registration happened outside a tokio runtime
    #[error("no tokio runtime available to schedule {host}/{service}")]
    NoRuntime { host: String, service: String },
}

/// Probe-level failures inside concrete checkers, rendered into a result description
#[derive(Error, Debug)]
pub(crate) enum ProbeError {
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
