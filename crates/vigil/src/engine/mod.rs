//! Periodic execution of checks
//!
//! The [`CheckEngine`] turns each [`Binding`] into a background task ticking on the binding's
//! period and hands every result to a [`Sink`].

pub mod scheduler;
pub mod sink;

pub use scheduler::{Binding, CheckEngine};
pub use sink::{ChannelSink, LogSink, Sink};
