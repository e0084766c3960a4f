use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::check::{Check, CheckResult, State};

/// What an HTTP response must look like to be healthy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpExpectation {
    /// Exact status code
    Status(u16),
    /// Status 200 and a body of at least this many bytes
    MinBodyBytes(usize),
    /// Any 2xx status and a body containing this text
    BodyContains(String),
}

impl HttpExpectation {
    fn needs_body(&self) -> bool {
        !matches!(self, HttpExpectation::Status(_))
    }

    /// Judge a response, returning the state and a description for failures
    pub fn evaluate(&self, status: u16, body: &[u8]) -> (State, String) {
        match self {
            HttpExpectation::Status(expected) => {
                if status == *expected {
                    (State::Ok, String::new())
                } else {
                    (State::Critical, format!("Response {}", status))
                }
            }
            HttpExpectation::MinBodyBytes(min_length) => {
                if status != 200 {
                    (State::Critical, format!("Response {}", status))
                } else if body.len() < *min_length {
                    (
                        State::Critical,
                        format!("Obtained {} bytes, expected more than {}", body.len(), min_length),
                    )
                } else {
                    (State::Ok, String::new())
                }
            }
            HttpExpectation::BodyContains(needle) => {
                if !(200..300).contains(&status) {
                    (State::Critical, format!("Response {}", status))
                } else if String::from_utf8_lossy(body).contains(needle.as_str()) {
                    (State::Ok, String::new())
                } else {
                    (State::Critical, format!("Body does not contain {:?}", needle))
                }
            }
        }
    }
}

/// HTTP GET checker
///
/// The metric is the time until the response headers arrived, in milliseconds.
#[derive(Debug, Clone)]
pub struct HttpCheck {
    host: String,
    service: String,
    url: String,
    expectation: HttpExpectation,
    timeout: Duration,
    // A client that failed to build is reported on every execution
    client: Result<reqwest::Client, String>,
}

impl HttpCheck {
    pub fn new(
        host: impl Into<String>,
        service: impl Into<String>,
        url: impl Into<String>,
        expectation: HttpExpectation,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e));

        Self {
            host: host.into(),
            service: service.into(),
            url: url.into(),
            expectation,
            timeout,
            client,
        }
    }

    /// Expect an exact status code
    pub fn status(
        host: impl Into<String>,
        service: impl Into<String>,
        url: impl Into<String>,
        expected_status: u16,
        timeout: Duration,
    ) -> Self {
        Self::new(host, service, url, HttpExpectation::Status(expected_status), timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn expectation(&self) -> &HttpExpectation {
        &self.expectation
    }
}

#[async_trait]
impl Check for HttpCheck {
    async fn execute(&self) -> CheckResult {
        let result = CheckResult::new(&self.host, &self.service);
        let client = match &self.client {
            Ok(client) => client,
            Err(e) => return result.critical(e.clone()),
        };
        debug!("HTTP check requesting {}", self.url);

        let start = Instant::now();
        let response = client.get(&self.url).timeout(self.timeout).send().await;
        let latency = start.elapsed().as_millis() as f64;
        let result = result.with_metric(latency);

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                debug!("HTTP request to {} failed: {}", self.url, e);
                return result.critical(format!("HTTP request failed: {}", e));
            }
        };

        let status = response.status().as_u16();
        debug!("HTTP check to {} returned status {}", self.url, status);

        let body = if self.expectation.needs_body() {
            match response.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(e) => return result.critical(format!("Error getting body: {}", e)),
            }
        } else {
            Vec::new()
        };

        let (state, description) = self.expectation.evaluate(status, &body);
        result.with_state(state).with_description(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_expectation() {
        let expect = HttpExpectation::Status(200);
        assert_eq!(expect.evaluate(200, b""), (State::Ok, String::new()));
        assert_eq!(expect.evaluate(503, b""), (State::Critical, "Response 503".to_string()));
    }

    #[test]
    fn test_min_body_bytes_expectation() {
        let expect = HttpExpectation::MinBodyBytes(5);
        assert_eq!(expect.evaluate(200, b"healthy").0, State::Ok);

        let (state, description) = expect.evaluate(200, b"ok");
        assert_eq!(state, State::Critical);
        assert_eq!(description, "Obtained 2 bytes, expected more than 5");

        // Exactly the minimum is enough
        assert_eq!(expect.evaluate(200, b"12345").0, State::Ok);
        assert_eq!(expect.evaluate(200, b"1234").0, State::Critical);
        assert_eq!(expect.evaluate(500, b"a long error page").1, "Response 500");
    }

    #[test]
    fn test_body_contains_expectation() {
        let expect = HttpExpectation::BodyContains("alive".to_string());
        assert_eq!(expect.evaluate(204, b"i am alive").0, State::Ok);
        assert_eq!(expect.evaluate(200, b"dead").0, State::Critical);
        assert_eq!(expect.evaluate(404, b"alive").1, "Response 404");
    }

    #[tokio::test]
    async fn test_client_build_failure_is_critical() {
        let check = HttpCheck {
            client: Err("Failed to build HTTP client: no TLS backend".to_string()),
            ..HttpCheck::status("web", "http", "https://web.example.com/", 200, Duration::from_secs(1))
        };
        let result = check.execute().await;

        assert_eq!(result.state, State::Critical);
        assert_eq!(result.description, "Failed to build HTTP client: no TLS backend");
    }

    #[tokio::test]
    async fn test_connection_refused_is_critical() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let check = HttpCheck::status(
            "web",
            "http",
            format!("http://127.0.0.1:{}/", port),
            200,
            Duration::from_secs(1),
        );
        let result = check.execute().await;

        assert_eq!(result.state, State::Critical);
        assert!(result.description.starts_with("HTTP request failed"));
    }

    #[tokio::test]
    async fn test_malformed_url_is_critical() {
        let check = HttpCheck::status("web", "http", "not a url", 200, Duration::from_secs(1));
        let result = check.execute().await;
        assert_eq!(result.state, State::Critical);
    }
}
