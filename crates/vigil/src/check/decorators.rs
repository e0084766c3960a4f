use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::{Check, CheckResult};
use crate::error::CheckError;

/// Replaces the tags of the wrapped check's result
#[derive(Debug, Clone)]
pub struct Tags<C> {
    inner: C,
    tags: Vec<String>,
}

impl<C: Check> Tags<C> {
    pub fn new<I, S>(inner: C, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { inner, tags: tags.into_iter().map(Into::into).collect() }
    }
}

#[async_trait]
impl<C: Check> Check for Tags<C> {
    async fn execute(&self) -> CheckResult {
        self.inner.execute().await.with_tags(self.tags.clone())
    }
}

/// Replaces the attributes of the wrapped check's result
#[derive(Debug, Clone)]
pub struct Attributes<C> {
    inner: C,
    attributes: BTreeMap<String, String>,
}

impl<C: Check> Attributes<C> {
    pub fn new<I, K, V>(inner: C, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let attributes = attributes.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { inner, attributes }
    }
}

#[async_trait]
impl<C: Check> Check for Attributes<C> {
    async fn execute(&self) -> CheckResult {
        self.inner.execute().await.with_attributes(self.attributes.clone())
    }
}

/// Replaces the ttl of the wrapped check's result
#[derive(Debug, Clone)]
pub struct Ttl<C> {
    inner: C,
    ttl: f32,
}

impl<C: Check> Ttl<C> {
    pub fn new(inner: C, ttl: f32) -> Self {
        Self { inner, ttl }
    }
}

#[async_trait]
impl<C: Check> Check for Ttl<C> {
    async fn execute(&self) -> CheckResult {
        self.inner.execute().await.with_ttl(self.ttl)
    }
}

/// Re-runs the wrapped check until it reports ok
///
/// All attempts happen inside a single `execute` call: the caller waits for the retries, and the
/// sleep between attempts suspends only the task running this check. When every attempt fails,
/// the result of the last attempt is returned.
#[derive(Debug, Clone)]
pub struct Retry<C> {
    inner: C,
    times: u32,
    sleep: Duration,
}

impl<C: Check> Retry<C> {
    /// Wrap `inner`, allowing up to `times` attempts
    ///
    /// Returns [`CheckError::InvalidRetryAttempts`] when `times` is zero, since a check that never
    /// runs has no result to report.
    pub fn new(inner: C, times: u32, sleep: Duration) -> Result<Self, CheckError> {
        if times == 0 {
            return Err(CheckError::InvalidRetryAttempts(times));
        }
        Ok(Self { inner, times, sleep })
    }

    pub fn times(&self) -> u32 {
        self.times
    }

    pub fn sleep(&self) -> Duration {
        self.sleep
    }
}

#[async_trait]
impl<C: Check> Check for Retry<C> {
    async fn execute(&self) -> CheckResult {
        let mut attempt = 1;
        loop {
            let result = self.inner.execute().await;
            if result.state.is_ok() || attempt >= self.times {
                return result;
            }

            debug!(
                host = %result.host,
                service = %result.service,
                attempt,
                max_attempts = self.times,
                "Check failed, retrying in {:?}",
                self.sleep
            );
            tokio::time::sleep(self.sleep).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckExt, State};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back a fixed sequence of states, repeating the last one once exhausted
    #[derive(Debug)]
    struct ScriptedCheck {
        states: Vec<State>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedCheck {
        fn new(states: Vec<State>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (Self { states, calls: calls.clone() }, calls)
        }
    }

    #[async_trait]
    impl Check for ScriptedCheck {
        async fn execute(&self) -> CheckResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let state = self.states[call.min(self.states.len() - 1)];
            CheckResult::new("host1", "svc1")
                .with_state(state)
                .with_metric(call as f64 + 1.0)
                .with_description(format!("attempt {}", call + 1))
        }
    }

    #[tokio::test]
    async fn test_metadata_decorators_only_touch_their_field() {
        let (check, _) = ScriptedCheck::new(vec![State::Ok]);
        let result = check
            .tags(["net", "core"])
            .attributes([("site", "mad1")])
            .ttl(30.0)
            .execute()
            .await;

        assert_eq!(result.host, "host1");
        assert_eq!(result.service, "svc1");
        assert_eq!(result.state, State::Ok);
        assert_eq!(result.metric, 1.0);
        assert_eq!(result.tags, vec!["net".to_string(), "core".to_string()]);
        assert_eq!(result.attributes.get("site").map(String::as_str), Some("mad1"));
        assert_eq!(result.ttl, 30.0);
    }

    #[tokio::test]
    async fn test_last_applied_tags_win() {
        let (check, _) = ScriptedCheck::new(vec![State::Ok]);
        let result = check.tags(["a"]).tags(["a"]).execute().await;
        assert_eq!(result.tags, vec!["a".to_string()]);

        let (check, _) = ScriptedCheck::new(vec![State::Ok]);
        let result = check.tags(["inner"]).tags(["outer"]).execute().await;
        assert_eq!(result.tags, vec!["outer".to_string()]);
    }

    #[tokio::test]
    async fn test_ttl_overwrites_previous_value() {
        let (check, _) = ScriptedCheck::new(vec![State::Critical]);
        let result = check.ttl(10.0).ttl(5.0).execute().await;
        assert_eq!(result.ttl, 5.0);
        assert_eq!(result.state, State::Critical);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_on_first_ok() {
        let (check, calls) = ScriptedCheck::new(vec![State::Critical, State::Critical, State::Ok]);
        let retry = check.retry(5, Duration::from_millis(100)).unwrap();

        let result = retry.execute().await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.state, State::Ok);
        assert_eq!(result.description, "attempt 3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_returns_last_attempt_when_exhausted() {
        let (check, calls) = ScriptedCheck::new(vec![State::Critical]);
        let retry = check.retry(3, Duration::from_millis(100)).unwrap();

        let result = retry.execute().await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.state, State::Critical);
        assert_eq!(result.description, "attempt 3");
        assert_eq!(result.metric, 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_sleeps_only_between_attempts() {
        let (check, _) = ScriptedCheck::new(vec![State::Critical]);
        let retry = check.retry(3, Duration::from_secs(2)).unwrap();

        let start = tokio::time::Instant::now();
        retry.execute().await;

        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_single_attempt_retry_runs_once() {
        let (check, calls) = ScriptedCheck::new(vec![State::Critical]);
        let result = check.retry(1, Duration::ZERO).unwrap().execute().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.state, State::Critical);
    }

    #[test]
    fn test_retry_rejects_zero_attempts() {
        let (check, _) = ScriptedCheck::new(vec![State::Ok]);
        let err = check.retry(0, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, CheckError::InvalidRetryAttempts(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tags_outside_retry_apply_to_final_attempt() {
        let (check, calls) = ScriptedCheck::new(vec![State::Critical, State::Ok]);
        let result = check
            .tags(["inner"])
            .retry(4, Duration::from_millis(10))
            .unwrap()
            .tags(["outer"])
            .execute()
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.state, State::Ok);
        assert_eq!(result.tags, vec!["outer".to_string()]);
    }
}
