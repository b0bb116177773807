//! Session and logging configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for one connection session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Deadline for the discovery handshake, in milliseconds.
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
    /// When set, overrides every period-characteristic write. One byte in
    /// 10 ms units (0x0A = 0.1 s, 0x64 = 1 s, 0xC8 = 2 s).
    #[serde(default)]
    pub sample_period: Option<u8>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: default_discovery_timeout_ms(),
            sample_period: None,
        }
    }
}

impl SessionConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }
}

fn default_discovery_timeout_ms() -> u64 {
    5_000
}

/// Logging configuration for [`crate::infrastructure::logging::init_logger`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// "trace", "debug", "info", "warn" or "error".
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: false,
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "sensortag".to_string()
}
