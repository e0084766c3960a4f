use async_trait::async_trait;
use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::check::{Check, CheckResult, State};
use crate::error::ProbeError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// RabbitMQ queue depth checker
///
/// Inspects the queue with a passive declare, so a missing queue is reported instead of created.
/// The metric is the number of ready messages; the check is ok while it is at most `max`.
#[derive(Debug, Clone)]
pub struct RabbitMqQueueCheck {
    host: String,
    service: String,
    amqp_uri: String,
    queue: String,
    max: u32,
    timeout: Duration,
}

impl RabbitMqQueueCheck {
    pub fn new(
        host: impl Into<String>,
        service: impl Into<String>,
        amqp_uri: impl Into<String>,
        queue: impl Into<String>,
        max: u32,
    ) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            amqp_uri: amqp_uri.into(),
            queue: queue.into(),
            max,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn queue_depth(&self) -> Result<u32, ProbeError> {
        let connection = Connection::connect(
            &self.amqp_uri,
            ConnectionProperties::default().with_connection_name("vigil-queue-check".into()),
        )
        .await
        .map_err(|e| ProbeError::Other(format!("RabbitMQ connection failed: {}", e)))?;

        let depth = Self::inspect(&connection, &self.queue).await;

        if let Err(e) = connection.close(200, "OK").await {
            debug!("Failed to close RabbitMQ connection: {}", e);
        }
        depth
    }

    async fn inspect(connection: &Connection, queue: &str) -> Result<u32, ProbeError> {
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| ProbeError::Other(format!("RabbitMQ channel creation failed: {}", e)))?;

        let declared = channel
            .queue_declare(
                queue,
                QueueDeclareOptions { passive: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ProbeError::Other(format!("Queue {} inspection failed: {}", queue, e)))?;

        // The broker closes the channel itself after a failed passive declare
        if let Err(e) = channel.close(200, "OK").await {
            debug!("Failed to close RabbitMQ channel: {}", e);
        }
        Ok(declared.message_count())
    }
}

#[async_trait]
impl Check for RabbitMqQueueCheck {
    async fn execute(&self) -> CheckResult {
        let result = CheckResult::new(&self.host, &self.service);

        let depth = match timeout(self.timeout, self.queue_depth()).await {
            Ok(depth) => depth,
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        };

        match depth {
            Ok(messages) => {
                debug!("Queue {} holds {} messages", self.queue, messages);
                let state = if messages <= self.max { State::Ok } else { State::Critical };
                let result = result.with_state(state).with_metric(f64::from(messages));
                if state.is_ok() {
                    result
                } else {
                    result.with_description(format!("{} messages queued, maximum {}", messages, self.max))
                }
            }
            Err(e) => result.critical(e.to_string()),
        }
    }
}
