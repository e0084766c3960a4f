use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Health verdict of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Ok,
    #[default]
    Critical,
}

impl State {
    pub fn is_ok(self) -> bool {
        matches!(self, State::Ok)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Ok => "ok",
            State::Critical => "critical",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check execution
///
/// Results are plain values: every `with_*` method consumes the result and returns a new one, so a
/// result handed to a sink is never changed behind its back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Monitored entity
    pub host: String,

    /// Check or metric on that entity
    pub service: String,

    /// Health verdict
    pub state: State,

    /// Measurement attached to the check (latency in ms, queue depth, temperature...)
    pub metric: f64,

    /// Failure cause or informational detail
    pub description: String,

    /// Classification labels
    pub tags: Vec<String>,

    /// Free-form metadata
    pub attributes: BTreeMap<String, String>,

    /// Seconds downstream consumers should consider this result valid, 0 for none
    pub ttl: f32,

    /// When the result was produced
    pub timestamp: SystemTime,
}

impl CheckResult {
    /// Create a critical result with no metric or description
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            state: State::Critical,
            metric: 0.0,
            description: String::new(),
            tags: Vec::new(),
            attributes: BTreeMap::new(),
            ttl: 0.0,
            timestamp: SystemTime::now(),
        }
    }

    /// Mark the check as healthy with its measurement
    pub fn ok(mut self, metric: f64) -> Self {
        self.state = State::Ok;
        self.metric = metric;
        self
    }

    /// Mark the check as failed with its cause
    pub fn critical(mut self, description: impl Into<String>) -> Self {
        self.state = State::Critical;
        self.description = description.into();
        self
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    pub fn with_metric(mut self, metric: f64) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_ttl(mut self, ttl: f32) -> Self {
        self.ttl = ttl;
        self
    }
}
