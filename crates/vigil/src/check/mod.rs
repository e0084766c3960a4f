//! The check contract and its decorators
//!
//! A [`Check`] is a self-contained probe: everything it needs (target address, thresholds,
//! credentials, host and service names) is captured when it is built, and every call to
//! [`Check::execute`] yields exactly one [`CheckResult`]. Probe failures are reported as
//! [`State::Critical`] results, never as errors, so the engine and the decorators treat every
//! check the same way.
//!
//! Decorators wrap a check and are checks themselves, so they nest freely:
//!
//! ```rust
//! use std::time::Duration;
//! use vigil::check::CheckExt;
//! use vigil::checkers::TcpPortCheck;
//!
//! # fn build() -> Result<(), vigil::CheckError> {
//! let check = TcpPortCheck::new("web1", "ssh", "10.0.0.5", 22, Duration::from_secs(1))
//!     .retry(3, Duration::from_millis(500))?
//!     .tags(["network", "ssh"])
//!     .ttl(60.0);
//! # Ok(())
//! # }
//! ```
//!
//! Outer decorators see the result already shaped by inner ones, and the last one applied to a
//! field wins.

pub mod decorators;
pub mod types;

pub use decorators::{Attributes, Retry, Tags, Ttl};
pub use types::{CheckResult, State};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CheckError;

/// A probe that produces one result per invocation
#[async_trait]
pub trait Check: Send + Sync {
    /// Run the probe once.
    ///
    /// Implementations bound all I/O with a timeout and map every failure to a critical result.
    async fn execute(&self) -> CheckResult;
}

#[async_trait]
impl<C: Check + ?Sized> Check for Box<C> {
    async fn execute(&self) -> CheckResult {
        (**self).execute().await
    }
}

#[async_trait]
impl<C: Check + ?Sized> Check for Arc<C> {
    async fn execute(&self) -> CheckResult {
        (**self).execute().await
    }
}

/// Type-erased check that can be handed to the engine
pub type SharedCheck = Arc<dyn Check>;

/// Decorator combinators available on every check
pub trait CheckExt: Check + Sized {
    /// Overwrite the result tags
    fn tags<I, S>(self, tags: I) -> Tags<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Tags::new(self, tags)
    }

    /// Overwrite the result attributes
    fn attributes<I, K, V>(self, attributes: I) -> Attributes<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Attributes::new(self, attributes)
    }

    /// Overwrite the result ttl
    fn ttl(self, ttl: f32) -> Ttl<Self> {
        Ttl::new(self, ttl)
    }

    /// Retry until the check reports ok, at most `times` attempts with `sleep` in between
    fn retry(self, times: u32, sleep: Duration) -> Result<Retry<Self>, CheckError> {
        Retry::new(self, times, sleep)
    }

    /// Erase the concrete type
    fn shared(self) -> SharedCheck
    where
        Self: 'static,
    {
        Arc::new(self)
    }
}

impl<C: Check> CheckExt for C {}
