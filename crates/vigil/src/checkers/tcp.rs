use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::check::{Check, CheckResult};

/// TCP port checker
///
/// Opens a connection to `ip:port` and closes it straight away. The metric is the connect time in
/// milliseconds.
#[derive(Debug, Clone)]
pub struct TcpPortCheck {
    host: String,
    service: String,
    ip: String,
    port: u16,
    timeout: Duration,
}

impl TcpPortCheck {
    pub fn new(
        host: impl Into<String>,
        service: impl Into<String>,
        ip: impl Into<String>,
        port: u16,
        timeout: Duration,
    ) -> Self {
        Self { host: host.into(), service: service.into(), ip: ip.into(), port, timeout }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

#[async_trait]
impl Check for TcpPortCheck {
    async fn execute(&self) -> CheckResult {
        let result = CheckResult::new(&self.host, &self.service);
        let address = self.address();
        let start = Instant::now();

        match timeout(self.timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => {
                let latency = start.elapsed().as_millis() as f64;
                drop(stream);
                debug!("TCP connection to {} succeeded in {}ms", address, latency);
                result.ok(latency)
            }
            Ok(Err(e)) => {
                debug!("TCP connection to {} failed: {}", address, e);
                result.critical(format!("TCP connection to {} failed: {}", address, e))
            }
            Err(_) => {
                debug!("TCP connection to {} timed out after {:?}", address, self.timeout);
                result.critical(format!("TCP connection to {} timed out after {:?}", address, self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::State;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_port_is_ok() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((_socket, _)) = listener.accept().await {}
        });

        let check = TcpPortCheck::new("local", "tcp", "127.0.0.1", port, Duration::from_secs(1));
        let result = check.execute().await;

        assert_eq!(result.state, State::Ok);
        assert_eq!(result.host, "local");
        assert_eq!(result.service, "tcp");
    }

    #[tokio::test]
    async fn test_closed_port_is_critical_within_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let check = TcpPortCheck::new("local", "tcp", "127.0.0.1", port, Duration::from_secs(1));
        let start = Instant::now();
        let result = check.execute().await;

        assert!(start.elapsed() <= Duration::from_millis(1100));
        assert_eq!(result.state, State::Critical);
        assert!(result.description.contains(&port.to_string()));
    }

    #[tokio::test]
    async fn test_unresolvable_address_is_critical() {
        let check = TcpPortCheck::new("local", "tcp", "not a host", 80, Duration::from_secs(1));
        let result = check.execute().await;
        assert_eq!(result.state, State::Critical);
        assert!(!result.description.is_empty());
    }
}
