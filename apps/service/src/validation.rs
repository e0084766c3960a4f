//! Sanity limits for configured checks.
//!
//! Everything here runs at startup so a bad entry aborts the service instead of leaving a silent
//! gap in monitoring.

use anyhow::{Result, anyhow};
use url::Url;

const MIN_INTERVAL: u64 = 1;
const MAX_INTERVAL: u64 = 86_400; // 24 hours

const MIN_TIMEOUT_MS: u64 = 1;
const MAX_TIMEOUT_MS: u64 = 300_000; // 5 minutes

const MAX_RETRY_SLEEP_MS: u64 = 300_000;

/// Validate the period between two executions of a check
pub fn validate_check_interval(interval_seconds: u64) -> Result<()> {
    if interval_seconds < MIN_INTERVAL {
        return Err(anyhow!(
            "Check interval too short: {} seconds (minimum: {})",
            interval_seconds,
            MIN_INTERVAL
        ));
    }

    if interval_seconds > MAX_INTERVAL {
        return Err(anyhow!(
            "Check interval too long: {} seconds (maximum: {})",
            interval_seconds,
            MAX_INTERVAL
        ));
    }

    Ok(())
}

/// Validate the wait before the first execution of a check
pub fn validate_initial_delay(delay_seconds: u64) -> Result<()> {
    if delay_seconds > MAX_INTERVAL {
        return Err(anyhow!(
            "Initial delay too long: {} seconds (maximum: {})",
            delay_seconds,
            MAX_INTERVAL
        ));
    }

    Ok(())
}

/// Validate a probe timeout
pub fn validate_timeout_ms(timeout_ms: u64) -> Result<()> {
    if timeout_ms < MIN_TIMEOUT_MS {
        return Err(anyhow!("Timeout too short: {} ms (minimum: {})", timeout_ms, MIN_TIMEOUT_MS));
    }

    if timeout_ms > MAX_TIMEOUT_MS {
        return Err(anyhow!("Timeout too long: {} ms (maximum: {})", timeout_ms, MAX_TIMEOUT_MS));
    }

    Ok(())
}

/// Validate port is in valid range
pub fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("Port 0 is not valid"));
    }
    Ok(())
}

/// Validate an HTTP/HTTPS target
pub fn validate_http_url(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL {}: {}", target, e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme for HTTP check: {}", other)),
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL {} has no host", target));
    }

    if let Some(port) = url.port() {
        validate_port(port)?;
    }

    Ok(())
}

/// Validate a broker or database URI has the expected scheme
pub fn validate_uri_scheme(target: &str, schemes: &[&str]) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URI: {}", e))?;

    if !schemes.contains(&url.scheme()) {
        return Err(anyhow!("Invalid scheme {}, expected one of {:?}", url.scheme(), schemes));
    }

    Ok(())
}

/// Validate retry settings
pub fn validate_retry(times: u32, sleep_ms: u64) -> Result<()> {
    if times == 0 {
        return Err(anyhow!("Retry needs at least 1 attempt"));
    }

    if sleep_ms > MAX_RETRY_SLEEP_MS {
        return Err(anyhow!(
            "Retry sleep too long: {} ms (maximum: {})",
            sleep_ms,
            MAX_RETRY_SLEEP_MS
        ));
    }

    Ok(())
}

/// Reject values that are empty or only whitespace
pub fn validate_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} must not be empty", field));
    }
    Ok(())
}
