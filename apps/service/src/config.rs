use std::collections::{BTreeMap, HashSet};
use std::{env, fmt, fs, path};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use vigil::checkers::snmp::{
    C4_CMTS_TEMPERATURE_OID, JUNIPER_CPU_OID, JUNIPER_TEMPERATURE_OID, SYS_NAME_OID,
};

use crate::validation::{
    validate_check_interval, validate_http_url, validate_initial_delay, validate_non_empty, validate_port,
    validate_retry, validate_timeout_ms, validate_uri_scheme,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {}", .0.display(), .1)]
    ReadFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to write {}: {}", .0.display(), .1)]
    WriteFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to parse {}: {}", .0.display(), .1)]
    ParseFailed(path::PathBuf, #[source] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,
}

/// Service configuration: the list of checks to run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckConfig>,
}

/// One scheduled check and the decorators applied to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub host: String,
    pub service: String,
    pub period_seconds: u64,
    #[serde(default)]
    pub initial_delay_seconds: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub times: u32,
    #[serde(default)]
    pub sleep_ms: u64,
}

/// Well-known SNMP tables with a max-value threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnmpTablePreset {
    C4CmtsTemperature,
    JuniperTemperature,
    JuniperCpu,
}

impl SnmpTablePreset {
    pub fn oid(self) -> &'static str {
        match self {
            SnmpTablePreset::C4CmtsTemperature => C4_CMTS_TEMPERATURE_OID,
            SnmpTablePreset::JuniperTemperature => JUNIPER_TEMPERATURE_OID,
            SnmpTablePreset::JuniperCpu => JUNIPER_CPU_OID,
        }
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_ping_timeout_ms() -> u64 {
    4_000
}

fn default_tcp_timeout_ms() -> u64 {
    1_000
}

fn default_snmp_timeout_ms() -> u64 {
    1_000
}

fn default_snmp_table_timeout_ms() -> u64 {
    2_000
}

fn default_snmp_retries() -> u32 {
    1
}

fn default_snmp_oid() -> String {
    SYS_NAME_OID.to_string()
}

/// What a check probes, selected by the `type` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeConfig {
    Ping {
        target: String,
        #[serde(default = "default_ping_timeout_ms")]
        timeout_ms: u64,
    },
    Tcp {
        ip: String,
        port: u16,
        #[serde(default = "default_tcp_timeout_ms")]
        timeout_ms: u64,
    },
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect_status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_body_bytes: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body_contains: Option<String>,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    Snmp {
        ip: String,
        community: String,
        #[serde(default = "default_snmp_oid")]
        oid: String,
        #[serde(default = "default_snmp_timeout_ms")]
        timeout_ms: u64,
        #[serde(default = "default_snmp_retries")]
        retries: u32,
    },
    SnmpTable {
        ip: String,
        community: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preset: Option<SnmpTablePreset>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        oid: Option<String>,
        max: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ignore_value: Option<i64>,
        #[serde(default = "default_snmp_table_timeout_ms")]
        timeout_ms: u64,
        #[serde(default = "default_snmp_retries")]
        retries: u32,
    },
    Rabbitmq {
        uri: String,
        queue: String,
        max: u32,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    Mysql {
        uri: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

impl ProbeConfig {
    fn validate(&self) -> Result<()> {
        match self {
            ProbeConfig::Ping { target, timeout_ms } => {
                validate_non_empty("ping target", target)?;
                validate_timeout_ms(*timeout_ms)
            }
            ProbeConfig::Tcp { ip, port, timeout_ms } => {
                validate_non_empty("tcp ip", ip)?;
                validate_port(*port)?;
                validate_timeout_ms(*timeout_ms)
            }
            ProbeConfig::Http { url, expect_status, min_body_bytes, body_contains, timeout_ms } => {
                validate_http_url(url)?;
                let expectations = [expect_status.is_some(), min_body_bytes.is_some(), body_contains.is_some()];
                if expectations.iter().filter(|set| **set).count() > 1 {
                    return Err(anyhow!(
                        "Only one of expect_status, min_body_bytes or body_contains may be set"
                    ));
                }
                validate_timeout_ms(*timeout_ms)
            }
            ProbeConfig::Snmp { ip, community, oid, timeout_ms, .. } => {
                validate_non_empty("snmp ip", ip)?;
                validate_non_empty("snmp community", community)?;
                vigil::checkers::snmp::parse_oid(oid).map_err(|e| anyhow!(e))?;
                validate_timeout_ms(*timeout_ms)
            }
            ProbeConfig::SnmpTable { ip, community, preset, oid, timeout_ms, .. } => {
                validate_non_empty("snmp ip", ip)?;
                validate_non_empty("snmp community", community)?;
                match (preset, oid) {
                    (Some(_), None) => {}
                    (None, Some(oid)) => {
                        vigil::checkers::snmp::parse_oid(oid).map_err(|e| anyhow!(e))?;
                    }
                    _ => return Err(anyhow!("snmp_table needs exactly one of preset or oid")),
                }
                validate_timeout_ms(*timeout_ms)
            }
            ProbeConfig::Rabbitmq { uri, queue, timeout_ms, .. } => {
                validate_uri_scheme(uri, &["amqp", "amqps"])?;
                validate_non_empty("rabbitmq queue", queue)?;
                validate_timeout_ms(*timeout_ms)
            }
            ProbeConfig::Mysql { uri, timeout_ms } => {
                validate_uri_scheme(uri, &["mysql"])?;
                validate_timeout_ms(*timeout_ms)
            }
        }
    }
}

impl fmt::Display for ProbeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeConfig::Ping { target, .. } => write!(f, "ping {}", target),
            ProbeConfig::Tcp { ip, port, .. } => write!(f, "tcp {}:{}", ip, port),
            ProbeConfig::Http { url, .. } => write!(f, "http {}", url),
            ProbeConfig::Snmp { ip, oid, .. } => write!(f, "snmp get {} on {}", oid, ip),
            ProbeConfig::SnmpTable { ip, preset, oid, max, .. } => {
                let table = preset.map(SnmpTablePreset::oid).or(oid.as_deref()).unwrap_or("?");
                write!(f, "snmp walk {} on {} (max {})", table, ip, max)
            }
            ProbeConfig::Rabbitmq { queue, max, .. } => write!(f, "rabbitmq queue {} (max {})", queue, max),
            // The URI may carry credentials
            ProbeConfig::Mysql { .. } => write!(f, "mysql round trip"),
        }
    }
}

impl CheckConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty("host", &self.host)?;
        validate_non_empty("service", &self.service)?;
        validate_check_interval(self.period_seconds)?;
        validate_initial_delay(self.initial_delay_seconds)?;
        if let Some(retry) = self.retry {
            validate_retry(retry.times, retry.sleep_ms)?;
        }
        if let Some(ttl) = self.ttl {
            if !ttl.is_finite() || ttl < 0.0 {
                return Err(anyhow!("ttl must be a non-negative number, got {}", ttl));
            }
        }
        self.probe.validate()
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/vigil/checks.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("vigil/checks.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Configured checks: {}", self.checks.len())?;
        for check in &self.checks {
            write_title_1(f, &format!("{}/{}", check.host, check.service))?;
            write_1(f, "Probe", &check.probe)?;
            write_1(f, "Period", &format_args!("{}s", check.period_seconds))?;
            if check.initial_delay_seconds > 0 {
                write_1(f, "Initial delay", &format_args!("{}s", check.initial_delay_seconds))?;
            }
            if let Some(retry) = check.retry {
                write_1(f, "Retry", &format_args!("{} attempts, {}ms apart", retry.times, retry.sleep_ms))?;
            }
            if !check.tags.is_empty() {
                write_1(f, "Tags", &check.tags.join(", "))?;
            }
            if !check.attributes.is_empty() {
                let attributes: Vec<String> =
                    check.attributes.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write_1(f, "Attributes", &attributes.join(", "))?;
            }
            if let Some(ttl) = check.ttl {
                write_1(f, "TTL", &format_args!("{}s", ttl))?;
            }
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates an empty config in ~/.config/vigil/checks.toml
    ///  or the specified path if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            toml::from_str(raw_string.as_str()).map_err(|err| Error::ParseFailed(config_path, err))
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(parent.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }

    /// Check every entry, reporting the first invalid one
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for check in &self.checks {
            check
                .validate()
                .with_context(|| format!("invalid check {}/{}", check.host, check.service))?;
            if !seen.insert((check.host.as_str(), check.service.as_str())) {
                return Err(anyhow!("duplicate check {}/{}", check.host, check.service));
            }
        }
        Ok(())
    }
}
