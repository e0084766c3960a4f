use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::check::{CheckResult, State};

/// Receives every completed check result
///
/// Called once per execution from the binding's own task. Implementations must return promptly;
/// a slow sink delays the next tick of that binding only.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn report(&self, result: CheckResult);
}

/// Writes each result as a structured log event
///
/// Ok results are logged at `info`, critical ones at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    async fn report(&self, result: CheckResult) {
        match result.state {
            State::Ok => info!(
                host = %result.host,
                service = %result.service,
                state = %result.state,
                metric = result.metric,
                tags = ?result.tags,
                ttl = result.ttl,
                "Check result"
            ),
            State::Critical => warn!(
                host = %result.host,
                service = %result.service,
                state = %result.state,
                metric = result.metric,
                description = %result.description,
                tags = ?result.tags,
                ttl = result.ttl,
                "Check result"
            ),
        }
    }
}

/// Forwards results into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    result_tx: mpsc::UnboundedSender<CheckResult>,
}

impl ChannelSink {
    pub fn new(result_tx: mpsc::UnboundedSender<CheckResult>) -> Self {
        Self { result_tx }
    }

    /// Create a sink together with the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CheckResult>) {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        (Self::new(result_tx), result_rx)
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn report(&self, result: CheckResult) {
        if let Err(e) = self.result_tx.send(result) {
            let result = e.0;
            error!(
                host = %result.host,
                service = %result.service,
                state = %result.state,
                "Failed to send check result: receiver dropped"
            );
        }
    }
}
