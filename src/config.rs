//! Runtime configuration.
//!
//! Loaded once from `ZKSYNC_*` environment variables (nested keys use `__`,
//! e.g. `ZKSYNC_DEVICE__IP`, `ZKSYNC_SERVER__RETRY_ATTEMPTS`) and handed to
//! each component's constructor.

use std::time::Duration;

use chrono::NaiveTime;
use config::{Config, Environment};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Log filter directive (trace, debug, info, warn, error)
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Device connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_device_timeout")]
    pub timeout_secs: u64,
    /// Numeric communication key, when the device has one set
    #[serde(default)]
    pub comm_key: Option<u32>,
}

/// Remote import endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_server_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Skip TLS certificate verification (self-signed internal servers)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// Scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// `HH:MM`, local time
    #[serde(default = "default_window_start")]
    pub window_start: String,
    /// `HH:MM`, local time, inclusive
    #[serde(default = "default_window_end")]
    pub window_end: String,
}

fn default_device_ip() -> String {
    "192.168.1.201".to_string()
}

fn default_port() -> u16 {
    4370
}

fn default_device_timeout() -> u64 {
    5
}

fn default_server_url() -> String {
    "http://localhost:8000/api/attendance/device-import".to_string()
}

fn default_server_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5
}

fn default_interval() -> u64 {
    3600
}

fn default_window_start() -> String {
    "00:00".to_string()
}

fn default_window_end() -> String {
    "23:59".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ip: default_device_ip(),
            port: default_port(),
            timeout_secs: default_device_timeout(),
            comm_key: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            token: String::new(),
            timeout_secs: default_server_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
            accept_invalid_certs: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            window_start: default_window_start(),
            window_end: default_window_end(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> SyncResult<Self> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("ZKSYNC")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Reject values no component could work with
    pub fn validate(&self) -> SyncResult<()> {
        self.device.validate()?;
        self.server.validate()?;
        self.sync.validate()?;
        Ok(())
    }
}

impl DeviceConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> SyncResult<()> {
        validate_ip(&self.ip)?;
        if self.port == 0 {
            return Err(SyncError::Config("Port cannot be 0".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(SyncError::Config("Device timeout cannot be 0".to_string()));
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn validate(&self) -> SyncResult<()> {
        reqwest::Url::parse(&self.url)
            .map_err(|e| SyncError::Config(format!("Invalid server URL {}: {}", self.url, e)))?;
        if self.retry_attempts == 0 {
            return Err(SyncError::Config("Retry attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Parsed `(start, end)` of the daily sync window
    pub fn window(&self) -> SyncResult<(NaiveTime, NaiveTime)> {
        Ok((parse_hhmm(&self.window_start)?, parse_hhmm(&self.window_end)?))
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.interval_secs == 0 {
            return Err(SyncError::Config("Sync interval cannot be 0".to_string()));
        }
        self.window().map(|_| ())
    }
}

fn parse_hhmm(value: &str) -> SyncResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| SyncError::Config(format!("Invalid time of day (expected HH:MM): {}", value)))
}

/// Basic IPv4 check
fn validate_ip(ip: &str) -> SyncResult<()> {
    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 || octets.iter().any(|o| o.parse::<u8>().is_err()) {
        return Err(SyncError::Config(format!("Invalid IP address: {}", ip)));
    }
    Ok(())
}
