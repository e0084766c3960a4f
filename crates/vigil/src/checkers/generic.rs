use async_trait::async_trait;

use crate::check::{Check, CheckResult, State};

/// Check built from two functions: one obtains a metric, the other judges it
pub struct GenericCheck<M, S> {
    host: String,
    service: String,
    metric_fn: M,
    state_fn: S,
}

impl<M, S> GenericCheck<M, S>
where
    M: Fn() -> f64 + Send + Sync,
    S: Fn(f64) -> State + Send + Sync,
{
    pub fn new(host: impl Into<String>, service: impl Into<String>, metric_fn: M, state_fn: S) -> Self {
        Self { host: host.into(), service: service.into(), metric_fn, state_fn }
    }
}

impl<M, S> std::fmt::Debug for GenericCheck<M, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericCheck")
            .field("host", &self.host)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<M, S> Check for GenericCheck<M, S>
where
    M: Fn() -> f64 + Send + Sync,
    S: Fn(f64) -> State + Send + Sync,
{
    async fn execute(&self) -> CheckResult {
        let value = (self.metric_fn)();
        CheckResult::new(&self.host, &self.service).with_state((self.state_fn)(value)).with_metric(value)
    }
}

/// State function that is ok while the metric stays strictly below `limit`
pub fn below(limit: f64) -> impl Fn(f64) -> State + Send + Sync + Clone {
    move |value| if value < limit { State::Ok } else { State::Critical }
}
