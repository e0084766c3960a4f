//! Composable health checks
//!
//! - [`check`]: the [`Check`] contract, the [`CheckResult`] model and the decorators (tags,
//!   attributes, ttl, retry)
//! - [`checkers`]: ping, TCP, HTTP, SNMP, RabbitMQ, MySQL and generic metric checks
//! - [`engine`]: the periodic [`CheckEngine`] and the [`Sink`]s it reports to

pub mod check;
pub mod checkers;
pub mod engine;
pub mod error;

#[cfg(test)]
mod test_logs;

pub use check::{Check, CheckExt, CheckResult, SharedCheck, State};
pub use engine::{Binding, ChannelSink, CheckEngine, LogSink, Sink};
pub use error::{CheckError, EngineError};
