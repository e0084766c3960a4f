//! SNMPv2c checkers
//!
//! The `snmp` crate exposes a blocking session, so every request runs on the blocking thread pool.
//! Blocking jobs cannot be cancelled from the async side, so each job carries its own bound: a GET
//! sends at most `retries + 1` requests and a walk stops at its deadline. The session socket is
//! dropped before `execute()` returns.

use async_trait::async_trait;
use snmp::{SyncSession, Value};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::check::{Check, CheckResult, State};
use crate::error::ProbeError;

/// `SNMPv2-MIB::sysName.0`
pub const SYS_NAME_OID: &str = "1.3.6.1.2.1.1.5.0";

/// Casa C4 CMTS temperature table
pub const C4_CMTS_TEMPERATURE_OID: &str = "1.3.6.1.4.1.4998.1.1.10.1.4.2.1.29";

/// Juniper `jnxOperatingTemp`
pub const JUNIPER_TEMPERATURE_OID: &str = "1.3.6.1.4.1.2636.3.1.13.1.7";

/// Juniper `jnxOperatingCPU`
pub const JUNIPER_CPU_OID: &str = "1.3.6.1.4.1.2636.3.1.13.1.8";

/// Placeholder the C4 reports for sensors that are not fitted
pub const C4_ABSENT_SENSOR: i64 = 999;

const SNMP_PORT: u16 = 161;
const WALK_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_WALK_ROWS: usize = 10_000;
const WALK_BUDGET_REQUESTS: u32 = 8;

/// Parse a dotted OID such as `1.3.6.1.2.1.1.5.0`
pub fn parse_oid(oid: &str) -> Result<Vec<u32>, String> {
    let trimmed = oid.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return Err("empty OID".to_string());
    }
    trimmed
        .split('.')
        .map(|part| part.parse::<u32>().map_err(|_| format!("invalid OID {:?}", oid)))
        .collect()
}

/// Session parameters shared by the SNMP checkers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpCheckConf {
    pub retries: u32,
    pub timeout: Duration,
    pub oid: String,
}

impl Default for SnmpCheckConf {
    fn default() -> Self {
        Self { retries: 1, timeout: Duration::from_secs(1), oid: SYS_NAME_OID.to_string() }
    }
}

fn agent_address(ip: &str) -> String {
    if ip.contains(':') && ip.parse::<std::net::Ipv6Addr>().is_err() {
        ip.to_string()
    } else if ip.contains(':') {
        format!("[{}]:{}", ip, SNMP_PORT)
    } else {
        format!("{}:{}", ip, SNMP_PORT)
    }
}

fn numeric(value: &Value<'_>) -> Option<i64> {
    match value {
        Value::Integer(v) => Some(*v),
        Value::Counter32(v) | Value::Unsigned32(v) | Value::Timeticks(v) => Some(i64::from(*v)),
        Value::Counter64(v) => i64::try_from(*v).ok(),
        _ => None,
    }
}

fn open_session(address: &str, community: &[u8], timeout: Duration) -> Result<SyncSession, ProbeError> {
    Ok(SyncSession::new(address, community, Some(timeout), 0)?)
}

/// Fetch one scalar, returning its textual value when the agent sends a string
fn snmp_get(
    address: &str,
    community: &[u8],
    oid: &[u32],
    timeout: Duration,
    retries: u32,
) -> Result<Option<String>, ProbeError> {
    let mut session = open_session(address, community, timeout)?;
    let mut last_error = ProbeError::Timeout(timeout);

    for _ in 0..=retries {
        match session.get(oid) {
            Ok(mut response) => {
                return match response.varbinds.next() {
                    Some((_, Value::OctetString(bytes))) => {
                        Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
                    }
                    Some(_) => Ok(None),
                    // Exception values (noSuchObject and friends) are skipped by the varbind reader
                    None => Err(ProbeError::Other("no such object".to_string())),
                };
            }
            Err(e) => last_error = ProbeError::Other(format!("SNMP get failed: {:?}", e)),
        }
    }

    Err(last_error)
}

/// Walk a subtree with GETNEXT and return its numeric values
///
/// No request is sent once `budget` has elapsed, so the walk ends at most one request after it.
fn snmp_walk(
    address: &str,
    community: &[u8],
    base: &[u32],
    timeout: Duration,
    retries: u32,
    budget: Duration,
) -> Result<Vec<i64>, ProbeError> {
    let deadline = Instant::now().checked_add(budget);
    let mut session = open_session(address, community, timeout)?;
    let mut values = Vec::new();
    let mut cursor = base.to_vec();
    let mut rows = 0;

    while rows < MAX_WALK_ROWS {
        let mut attempt = 0;
        let next = loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(ProbeError::Timeout(budget));
            }
            match session.getnext(&cursor) {
                Ok(mut response) => {
                    let mut buf = [0u32; 128];
                    break match response.varbinds.next() {
                        Some((oid, value)) => {
                            let name = oid
                                .read_name(&mut buf)
                                .map_err(|e| ProbeError::Other(format!("bad OID in response: {:?}", e)))?;
                            if !name.starts_with(base) {
                                None
                            } else {
                                Some((name.to_vec(), numeric(&value)))
                            }
                        }
                        None => None,
                    };
                }
                Err(e) if attempt < retries => {
                    debug!("SNMP getnext to {} failed, retrying: {:?}", address, e);
                    attempt += 1;
                }
                Err(e) => return Err(ProbeError::Other(format!("SNMP walk failed: {:?}", e))),
            }
        };

        match next {
            Some((name, value)) => {
                if name <= cursor {
                    return Err(ProbeError::Other("agent returned OIDs out of order".to_string()));
                }
                rows += 1;
                values.extend(value);
                cursor = name;
            }
            None => break,
        }
    }

    Ok(values)
}

/// Run a self-bounded blocking job and wait for it to finish
async fn run_blocking<T, F>(job: F) -> Result<T, ProbeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .unwrap_or_else(|join_error| Err(ProbeError::Other(format!("SNMP task failed: {}", join_error))))
}

/// Time allowed for one request including its retries
fn budget(timeout: Duration, retries: u32) -> Duration {
    timeout
        .saturating_mul(retries.saturating_add(1))
        .saturating_add(Duration::from_millis(100))
}

/// Checks that an agent answers a GET for one OID (by default `sysName.0`)
#[derive(Debug, Clone)]
pub struct SnmpGetCheck {
    host: String,
    service: String,
    ip: String,
    community: String,
    conf: SnmpCheckConf,
}

impl SnmpGetCheck {
    pub fn new(
        host: impl Into<String>,
        service: impl Into<String>,
        ip: impl Into<String>,
        community: impl Into<String>,
        conf: SnmpCheckConf,
    ) -> Self {
        Self { host: host.into(), service: service.into(), ip: ip.into(), community: community.into(), conf }
    }
}

#[async_trait]
impl Check for SnmpGetCheck {
    async fn execute(&self) -> CheckResult {
        let result = CheckResult::new(&self.host, &self.service);
        let oid = match parse_oid(&self.conf.oid) {
            Ok(oid) => oid,
            Err(e) => return result.critical(e),
        };

        let address = agent_address(&self.ip);
        let community = self.community.clone().into_bytes();
        let (timeout, retries) = (self.conf.timeout, self.conf.retries);

        let outcome = run_blocking(move || snmp_get(&address, &community, &oid, timeout, retries)).await;

        match outcome {
            Ok(value) => result.ok(0.0).with_description(value.unwrap_or_default()),
            Err(e) => {
                debug!("SNMP get {} on {} failed: {}", self.conf.oid, self.ip, e);
                result.critical(e.to_string())
            }
        }
    }
}

/// Walks a table and compares its highest value against a threshold
///
/// The metric is the highest numeric value found; the check is ok when it is strictly below
/// `max_allowed`.
#[derive(Debug, Clone)]
pub struct SnmpTableThresholdCheck {
    host: String,
    service: String,
    ip: String,
    community: String,
    oid: String,
    max_allowed: i64,
    ignore_value: Option<i64>,
    timeout: Duration,
    retries: u32,
}

impl SnmpTableThresholdCheck {
    pub fn new(
        host: impl Into<String>,
        service: impl Into<String>,
        ip: impl Into<String>,
        community: impl Into<String>,
        oid: impl Into<String>,
        max_allowed: i64,
    ) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            ip: ip.into(),
            community: community.into(),
            oid: oid.into(),
            max_allowed,
            ignore_value: None,
            timeout: WALK_TIMEOUT,
            retries: 1,
        }
    }

    /// Highest sensor temperature of a Casa C4 CMTS
    pub fn c4_cmts_temperature(
        host: impl Into<String>,
        service: impl Into<String>,
        ip: impl Into<String>,
        community: impl Into<String>,
        max_allowed: i64,
    ) -> Self {
        Self::new(host, service, ip, community, C4_CMTS_TEMPERATURE_OID, max_allowed)
            .ignoring(C4_ABSENT_SENSOR)
    }

    /// Highest component temperature of a Juniper device
    pub fn juniper_temperature(
        host: impl Into<String>,
        service: impl Into<String>,
        ip: impl Into<String>,
        community: impl Into<String>,
        max_allowed: i64,
    ) -> Self {
        Self::new(host, service, ip, community, JUNIPER_TEMPERATURE_OID, max_allowed)
    }

    /// Highest component CPU usage of a Juniper device
    pub fn juniper_cpu(
        host: impl Into<String>,
        service: impl Into<String>,
        ip: impl Into<String>,
        community: impl Into<String>,
        max_allowed: i64,
    ) -> Self {
        Self::new(host, service, ip, community, JUNIPER_CPU_OID, max_allowed)
    }

    /// Skip rows holding this value when looking for the maximum
    pub fn ignoring(mut self, value: i64) -> Self {
        self.ignore_value = Some(value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration, retries: u32) -> Self {
        self.timeout = timeout;
        self.retries = retries;
        self
    }

    fn evaluate(&self, values: &[i64]) -> (State, i64) {
        let max = values
            .iter()
            .copied()
            .filter(|v| Some(*v) != self.ignore_value)
            .fold(0, i64::max);
        let state = if max < self.max_allowed { State::Ok } else { State::Critical };
        (state, max)
    }
}

#[async_trait]
impl Check for SnmpTableThresholdCheck {
    async fn execute(&self) -> CheckResult {
        let result = CheckResult::new(&self.host, &self.service);
        let base = match parse_oid(&self.oid) {
            Ok(oid) => oid,
            Err(e) => return result.critical(e),
        };

        let address = agent_address(&self.ip);
        let community = self.community.clone().into_bytes();
        let (timeout, retries) = (self.timeout, self.retries);

        // A walk issues one request per row, so the budget scales with the rows we accept
        let walk_budget = budget(timeout, retries).saturating_mul(WALK_BUDGET_REQUESTS);
        let outcome = run_blocking(move || {
            snmp_walk(&address, &community, &base, timeout, retries, walk_budget)
        })
        .await;

        match outcome {
            Ok(values) => {
                let (state, max) = self.evaluate(&values);
                debug!("SNMP walk {} on {}: max {} over {} rows", self.oid, self.ip, max, values.len());
                let result = result.with_state(state).with_metric(max as f64);
                if state.is_ok() {
                    result
                } else {
                    result.with_description(format!("{} is not below {}", max, self.max_allowed))
                }
            }
            Err(e) => {
                debug!("SNMP walk {} on {} failed: {}", self.oid, self.ip, e);
                result.critical(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_parse_oid() {
        assert_eq!(parse_oid(SYS_NAME_OID).unwrap(), vec![1, 3, 6, 1, 2, 1, 1, 5, 0]);
        assert_eq!(parse_oid(".1.3.6").unwrap(), vec![1, 3, 6]);
        assert!(parse_oid("").is_err());
        assert!(parse_oid("1.3.x").is_err());
    }

    #[test]
    fn test_agent_address() {
        assert_eq!(agent_address("10.0.0.1"), "10.0.0.1:161");
        assert_eq!(agent_address("10.0.0.1:1161"), "10.0.0.1:1161");
        assert_eq!(agent_address("::1"), "[::1]:161");
    }

    #[test]
    fn test_threshold_is_strict_and_skips_sentinel() {
        let check = SnmpTableThresholdCheck::c4_cmts_temperature("cmts1", "temp", "10.0.0.1", "public", 60);
        assert_eq!(check.evaluate(&[41, 999, 55]), (State::Ok, 55));
        assert_eq!(check.evaluate(&[41, 60]), (State::Critical, 60));
        assert_eq!(check.evaluate(&[]), (State::Ok, 0));

        let check = SnmpTableThresholdCheck::juniper_cpu("mx1", "cpu", "10.0.0.2", "public", 90);
        assert_eq!(check.evaluate(&[12, 999]), (State::Critical, 999));
    }

    #[tokio::test]
    async fn test_silent_agent_is_critical() {
        // Nothing answers on this socket's port once it is dropped
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let address = socket.local_addr().unwrap().to_string();
        drop(socket);

        let conf = SnmpCheckConf { retries: 0, timeout: Duration::from_millis(200), ..Default::default() };
        let check = SnmpGetCheck::new("sw1", "snmp", address, "public", conf);
        let result = check.execute().await;

        assert_eq!(result.state, State::Critical);
        assert!(!result.description.is_empty());
    }

    /// Answers every GETNEXT with the next row of an endless integer table, counting requests
    fn endless_table_agent(
        base: Vec<u32>,
        row_delay: Duration,
    ) -> (String, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let address = socket.local_addr().unwrap().to_string();
        let requests = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let (counter, stopped) = (requests.clone(), stop.clone());
        std::thread::spawn(move || {
            let mut request = [0u8; 4096];
            let mut row = 0u32;
            while !stopped.load(Ordering::SeqCst) {
                let Ok((len, peer)) = socket.recv_from(&mut request) else { continue };
                let Ok(pdu) = snmp::SnmpPdu::from_bytes(&request[..len]) else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(row_delay);

                row += 1;
                let mut name = base.clone();
                name.push(row);
                let mut response = snmp::pdu::Buf::default();
                snmp::pdu::build_set(b"public", pdu.req_id, &[(name.as_slice(), Value::Integer(40))], &mut response);

                // Reuse the SET encoder and retag the PDU as a response
                let mut bytes = response.to_vec();
                let header = if bytes[1] < 0x80 { 2 } else { 2 + usize::from(bytes[1] & 0x7f) };
                let tag = header + 3 + 2 + b"public".len();
                assert_eq!(bytes[tag], snmp::snmp::MSG_SET);
                bytes[tag] = snmp::snmp::MSG_RESPONSE;
                let _ = socket.send_to(&bytes, peer);
            }
        });

        (address, requests, stop)
    }

    #[tokio::test]
    async fn test_walk_stops_at_its_deadline() {
        let base = parse_oid(JUNIPER_TEMPERATURE_OID).unwrap();
        let (address, requests, stop) = endless_table_agent(base, Duration::from_millis(50));

        let check = SnmpTableThresholdCheck::new("mx1", "temp", address, "public", JUNIPER_TEMPERATURE_OID, 60)
            .with_timeout(Duration::from_millis(100), 0);
        let walk_budget = budget(Duration::from_millis(100), 0) * WALK_BUDGET_REQUESTS;

        let started = Instant::now();
        let result = check.execute().await;
        let elapsed = started.elapsed();

        assert_eq!(result.state, State::Critical);
        assert!(result.description.contains("timeout"), "{}", result.description);
        assert!(elapsed >= walk_budget);
        assert!(elapsed < walk_budget + Duration::from_millis(500), "took {:?}", elapsed);

        // Nothing keeps walking in the background once the check has returned
        let served = requests.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(requests.load(Ordering::SeqCst), served);

        stop.store(true, Ordering::SeqCst);
    }

    #[test]
    fn test_budget_saturates() {
        assert_eq!(budget(Duration::from_secs(1), 1), Duration::from_millis(2_100));
        assert_eq!(budget(Duration::MAX, u32::MAX), Duration::MAX);
    }

    #[tokio::test]
    async fn test_invalid_oid_is_critical() {
        let conf = SnmpCheckConf { oid: "sysName".to_string(), ..Default::default() };
        let check = SnmpGetCheck::new("sw1", "snmp", "127.0.0.1", "public", conf);
        let result = check.execute().await;

        assert_eq!(result.state, State::Critical);
        assert!(result.description.contains("invalid OID"));
    }
}
