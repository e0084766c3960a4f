use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tracing::debug;

use crate::check::{Check, CheckResult};
use crate::error::ProbeError;

/// Longest wait for an echo reply
pub const MAX_PING_TIME: Duration = Duration::from_secs(4);

const PAYLOAD: [u8; 56] = [0; 56];

/// ICMP echo checker
///
/// Sends a single echo request and reports the round trip time in milliseconds. Raw ICMP sockets
/// need elevated privileges (or `net.ipv4.ping_group_range` on Linux); without them every
/// execution is critical with the socket error as description.
#[derive(Debug, Clone)]
pub struct PingCheck {
    host: String,
    service: String,
    target: String,
    timeout: Duration,
}

impl PingCheck {
    /// `target` is an IP address or a hostname resolved on every execution
    pub fn new(host: impl Into<String>, service: impl Into<String>, target: impl Into<String>) -> Self {
        Self { host: host.into(), service: service.into(), target: target.into(), timeout: MAX_PING_TIME }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn resolve(&self) -> Result<IpAddr, ProbeError> {
        if let Ok(ip) = self.target.parse::<IpAddr>() {
            return Ok(ip);
        }

        let lookup = tokio::net::lookup_host((self.target.as_str(), 0));
        let mut addrs = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        addrs
            .find(|addr| addr.is_ipv4())
            .map(|addr| addr.ip())
            .ok_or_else(|| ProbeError::Other(format!("no IPv4 address found for {}", self.target)))
    }

    async fn ping(&self, ip: IpAddr) -> Result<Duration, ProbeError> {
        let config = match ip {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = Client::new(&config)?;

        let mut pinger = client.pinger(ip, PingIdentifier(std::process::id() as u16)).await;
        pinger.timeout(self.timeout);

        let (_packet, rtt) = pinger
            .ping(PingSequence(0), &PAYLOAD)
            .await
            .map_err(|e| ProbeError::Other(e.to_string()))?;
        Ok(rtt)
    }
}

#[async_trait]
impl Check for PingCheck {
    async fn execute(&self) -> CheckResult {
        let result = CheckResult::new(&self.host, &self.service);

        let ip = match self.resolve().await {
            Ok(ip) => ip,
            Err(e) => {
                debug!("Failed to resolve {}: {}", self.target, e);
                return result.critical(e.to_string());
            }
        };

        match self.ping(ip).await {
            Ok(rtt) => {
                debug!("Echo reply from {} in {:?}", ip, rtt);
                result.ok(rtt.as_secs_f64() * 1000.0)
            }
            Err(e) => {
                debug!("Ping to {} failed: {}", ip, e);
                result.critical(e.to_string())
            }
        }
    }
}
