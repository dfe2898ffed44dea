//! Environment-sourced configuration.
//!
//! Every value has a default matching the reference deployment (a simulated
//! router on `127.0.0.1:16100` and a local InfluxDB), so an empty environment
//! yields a runnable config. [`MonitorConfig::from_lookup`] takes the variable
//! lookup as a function so tests never touch the process environment.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{MonitorError, Result};

/// SNMP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpVersion {
    V2c,
    V3,
}

/// USM authentication protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    Md5,
    Sha1,
    Sha256,
}

/// USM privacy cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    Des,
    Aes128,
    Aes256,
}

impl FromStr for SnmpVersion {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2c" | "v2c" | "2" => Ok(Self::V2c),
            "3" | "v3" => Ok(Self::V3),
            other => Err(MonitorError::config(format!("unknown SNMP version '{other}'"))),
        }
    }
}

impl FromStr for AuthProtocol {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha" | "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(MonitorError::config(format!(
                "unknown auth protocol '{other}'"
            ))),
        }
    }
}

impl FromStr for PrivProtocol {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "des" => Ok(Self::Des),
            "aes" | "aes128" => Ok(Self::Aes128),
            "aes256" => Ok(Self::Aes256),
            other => Err(MonitorError::config(format!(
                "unknown privacy protocol '{other}'"
            ))),
        }
    }
}

/// Agent address, credentials and query bounds.
#[derive(Debug, Clone)]
pub struct SnmpSettings {
    pub host: String,
    pub port: u16,
    pub version: SnmpVersion,
    /// v2c community string.
    pub community: String,
    /// v3 USM user.
    pub username: String,
    pub auth_password: String,
    pub auth_protocol: AuthProtocol,
    pub priv_password: String,
    pub priv_protocol: PrivProtocol,
    /// v3 context name. Only the default (empty) context can be sent.
    pub context_name: String,
    /// Per-attempt reply timeout.
    pub timeout: Duration,
    /// Extra attempts after a timeout.
    pub retries: u32,
}

impl Default for SnmpSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 16100,
            version: SnmpVersion::V3,
            community: "public".to_string(),
            username: "simulator".to_string(),
            auth_password: "snmpauth123".to_string(),
            auth_protocol: AuthProtocol::Md5,
            priv_password: "snmppriv123".to_string(),
            priv_protocol: PrivProtocol::Des,
            context_name: String::new(),
            timeout: Duration::from_millis(1000),
            retries: 1,
        }
    }
}

impl SnmpSettings {
    /// Reject settings the v3 transport cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.version == SnmpVersion::V3 && !self.context_name.is_empty() {
            return Err(MonitorError::config(format!(
                "SNMP_CONTEXT_NAME={:?}: only the default context is supported",
                self.context_name
            )));
        }
        Ok(())
    }
}

/// InfluxDB connection.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    /// Bound on every write and range query.
    pub timeout: Duration,
}

impl StoreSettings {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8086,
            database: "snmp_data".to_string(),
            timeout: Duration::from_millis(5000),
        }
    }
}

/// Polling cadence and registry retention.
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub interval: Duration,
    pub startup_delay: Duration,
    pub device_timeout: Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            startup_delay: Duration::from_secs(5),
            device_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    pub snmp: SnmpSettings,
    pub store: StoreSettings,
    pub schedule: ScheduleSettings,
}

impl MonitorConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset or blank variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let d = Self::default();

        let snmp = SnmpSettings {
            host: get("SNMP_HOST").unwrap_or(d.snmp.host),
            port: parse_or(&get, "SNMP_PORT", d.snmp.port)?,
            version: parse_or(&get, "SNMP_VERSION", d.snmp.version)?,
            community: get("SNMP_COMMUNITY").unwrap_or(d.snmp.community),
            username: get("SNMP_USERNAME").unwrap_or(d.snmp.username),
            auth_password: get("SNMP_AUTH_PASSWORD").unwrap_or(d.snmp.auth_password),
            auth_protocol: parse_or(&get, "SNMP_AUTH_PROTOCOL", d.snmp.auth_protocol)?,
            priv_password: get("SNMP_PRIV_PASSWORD").unwrap_or(d.snmp.priv_password),
            priv_protocol: parse_or(&get, "SNMP_PRIV_PROTOCOL", d.snmp.priv_protocol)?,
            context_name: get("SNMP_CONTEXT_NAME").unwrap_or(d.snmp.context_name),
            timeout: Duration::from_millis(parse_or(
                &get,
                "SNMP_TIMEOUT_MS",
                d.snmp.timeout.as_millis() as u64,
            )?),
            retries: parse_or(&get, "SNMP_RETRIES", d.snmp.retries)?,
        };

        let store = StoreSettings {
            host: get("INFLUX_HOST").unwrap_or(d.store.host),
            port: parse_or(&get, "INFLUX_PORT", d.store.port)?,
            database: get("INFLUX_DB").unwrap_or(d.store.database),
            timeout: Duration::from_millis(parse_or(
                &get,
                "INFLUX_TIMEOUT_MS",
                d.store.timeout.as_millis() as u64,
            )?),
        };

        let schedule = ScheduleSettings {
            interval: Duration::from_secs(parse_or(
                &get,
                "POLL_INTERVAL_SECS",
                d.schedule.interval.as_secs(),
            )?),
            startup_delay: Duration::from_secs(parse_or(
                &get,
                "POLL_STARTUP_DELAY_SECS",
                d.schedule.startup_delay.as_secs(),
            )?),
            device_timeout: Duration::from_secs(
                parse_or(
                    &get,
                    "DEVICE_TIMEOUT_MINUTES",
                    d.schedule.device_timeout.as_secs() / 60,
                )?
                .checked_mul(60)
                .ok_or_else(|| MonitorError::config("DEVICE_TIMEOUT_MINUTES is out of range"))?,
            ),
        };

        snmp.validate()?;
        if snmp.timeout.is_zero() {
            return Err(MonitorError::config("SNMP_TIMEOUT_MS must be positive"));
        }
        if schedule.interval.is_zero() {
            return Err(MonitorError::config("POLL_INTERVAL_SECS must be positive"));
        }

        Ok(Self {
            snmp,
            store,
            schedule,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| MonitorError::config(format!("{key}={raw:?}: {e}"))),
    }
}
