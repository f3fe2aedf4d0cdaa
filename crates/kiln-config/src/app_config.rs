//! Application configuration structures.

use kiln_core::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Scheduler loop configuration.
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Event bus configuration.
    #[serde(default)]
    pub events: EventsConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Devices registered at startup.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "kiln".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Scheduler loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Start the background loop at boot.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sleep between ticks, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on a single device state poll, in milliseconds.
    #[serde(default = "default_device_poll_timeout_ms")]
    pub device_poll_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_device_poll_timeout_ms() -> u64 {
    10_000
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
            device_poll_timeout_ms: default_device_poll_timeout_ms(),
        }
    }
}

impl SchedulerSettings {
    /// Returns the poll interval as a Duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the device poll timeout as a Duration.
    #[must_use]
    pub const fn device_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.device_poll_timeout_ms)
    }
}

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast channel capacity.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,

    /// Number of recent events retained for polling.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

fn default_event_capacity() -> usize {
    kiln_core::DEFAULT_EVENT_CAPACITY
}

fn default_history_size() -> usize {
    kiln_core::DEFAULT_HISTORY_SIZE
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
            history_size: default_history_size(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing filter directive.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Emit JSON log lines.
    #[serde(default)]
    pub json_logs: bool,
    /// Record metrics through the `metrics` facade.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_filter() -> String {
    kiln_core::logging::DEFAULT_LOG_FILTER.to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl ObservabilityConfig {
    /// Builds the logging setup for this configuration.
    #[must_use]
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            filter: self.log_filter.clone(),
            json: self.json_logs,
        }
    }
}

/// A device registered at startup.
///
/// `protocol` selects the adapter constructor; the remaining fields are
/// protocol-specific connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique logical name.
    pub name: String,
    /// Adapter protocol, e.g. `octoprint`, `moonraker`, `simulated`.
    pub protocol: String,
    /// Base URL or host of the device.
    #[serde(default)]
    pub host: Option<String>,
    /// API key, when the protocol needs one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Device serial number, for vendor protocols.
    #[serde(default)]
    pub serial: Option<String>,
    /// Free-form protocol options.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl DeviceConfig {
    /// Creates a device entry with only a name and protocol.
    pub fn new(name: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            host: None,
            api_key: None,
            serial: None,
            options: HashMap::new(),
        }
    }

    /// Sets the host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Adds a protocol option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Returns a protocol option.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.app.name, "kiln");
        assert_eq!(config.scheduler.poll_interval_ms, 5000);
        assert!(config.scheduler.enabled);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_durations() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.device_poll_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_devices_from_toml() {
        let raw = r#"
            [scheduler]
            poll_interval_ms = 2000

            [[devices]]
            name = "voron"
            protocol = "moonraker"
            host = "http://voron.local:7125"

            [[devices]]
            name = "mk4"
            protocol = "octoprint"
            host = "http://mk4.local"
            api_key = "secret"
            options = { timeout_secs = "5" }
        "#;

        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.scheduler.poll_interval_ms, 2000);
        assert_eq!(config.scheduler.device_poll_timeout_ms, 10_000);
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[1].api_key.as_deref(), Some("secret"));
        assert_eq!(config.devices[1].option("timeout_secs"), Some("5"));
    }

    #[test]
    fn test_observability_logging() {
        let observability = ObservabilityConfig {
            log_filter: "warn".to_string(),
            json_logs: true,
            metrics_enabled: false,
        };
        let logging = observability.logging();
        assert_eq!(logging.filter, "warn");
        assert!(logging.json);
    }
}
