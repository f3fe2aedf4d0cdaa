//! Configuration validation module.
//!
//! Collects every problem in one pass so startup fails with the full list
//! instead of the first error.

use crate::AppConfig;
use std::collections::HashSet;
use std::fmt;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// A `[[devices]]` entry has an empty name.
    EmptyDeviceName { index: usize },
    /// Two `[[devices]]` entries share a name.
    DuplicateDeviceName { name: String },
    /// A device entry has no protocol.
    EmptyProtocol { device: String },
    /// Interval or timeout value must be positive.
    NonPositiveTimeout { name: String, value: u64 },
    /// Event channel capacity must be positive.
    ZeroEventCapacity,
    /// Log filter is empty.
    EmptyLogFilter,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDeviceName { index } => {
                write!(f, "Device #{} has an empty name", index)
            }
            Self::DuplicateDeviceName { name } => {
                write!(f, "Device name '{}' is configured more than once", name)
            }
            Self::EmptyProtocol { device } => {
                write!(f, "Device '{}' has no protocol", device)
            }
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "Timeout '{}' must be positive, got {}", name, value)
            }
            Self::ZeroEventCapacity => {
                write!(f, "Event bus capacity must be at least 1")
            }
            Self::EmptyLogFilter => {
                write!(f, "Log filter cannot be empty")
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of configuration validation containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ConfigValidationError>,
}

impl ValidationResult {
    fn add_error(&mut self, error: ConfigValidationError) {
        self.errors.push(error);
    }

    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the validation errors.
    pub fn errors(&self) -> &[ConfigValidationError] {
        &self.errors
    }

    /// Converts to Result, returning Err with all errors if any exist.
    pub fn into_result(self) -> Result<(), Vec<ConfigValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut result = ValidationResult::default();

        Self::validate_scheduler(&config.scheduler, &mut result);
        Self::validate_events(&config.events, &mut result);
        Self::validate_observability(&config.observability, &mut result);
        Self::validate_devices(&config.devices, &mut result);

        result.into_result()
    }

    fn validate_scheduler(config: &crate::SchedulerSettings, result: &mut ValidationResult) {
        if config.poll_interval_ms == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "scheduler.poll_interval_ms".to_string(),
                value: 0,
            });
        }
        if config.device_poll_timeout_ms == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "scheduler.device_poll_timeout_ms".to_string(),
                value: 0,
            });
        }
    }

    fn validate_events(config: &crate::EventsConfig, result: &mut ValidationResult) {
        if config.capacity == 0 {
            result.add_error(ConfigValidationError::ZeroEventCapacity);
        }
    }

    fn validate_observability(config: &crate::ObservabilityConfig, result: &mut ValidationResult) {
        if config.log_filter.trim().is_empty() {
            result.add_error(ConfigValidationError::EmptyLogFilter);
        }
    }

    /// Device names must be unique and non-empty; protocols are resolved
    /// later by the adapter factory.
    fn validate_devices(devices: &[crate::DeviceConfig], result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (index, device) in devices.iter().enumerate() {
            let name = device.name.trim();
            if name.is_empty() {
                result.add_error(ConfigValidationError::EmptyDeviceName { index });
                continue;
            }
            if !seen.insert(name) {
                result.add_error(ConfigValidationError::DuplicateDeviceName {
                    name: name.to_string(),
                });
            }
            if device.protocol.trim().is_empty() {
                result.add_error(ConfigValidationError::EmptyProtocol {
                    device: name.to_string(),
                });
            }
        }
    }
}

/// Formats validation errors into a human-readable string.
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let mut output = String::from("Configuration validation failed:\n");
    for (i, error) in errors.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, error));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceConfig;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.devices = vec![
            DeviceConfig::new("voron", "moonraker").with_host("http://voron.local"),
            DeviceConfig::new("sim", "simulated"),
        ];
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(ConfigValidator::validate(&valid_config()).is_ok());
        assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_poll_interval() {
        let mut config = valid_config();
        config.scheduler.poll_interval_ms = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigValidationError::NonPositiveTimeout { name, .. } if name == "scheduler.poll_interval_ms"
        )));
    }

    #[test]
    fn test_duplicate_device_name() {
        let mut config = valid_config();
        config
            .devices
            .push(DeviceConfig::new("voron", "octoprint").with_host("http://other"));

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigValidationError::DuplicateDeviceName {
                name: "voron".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_device_name() {
        let mut config = valid_config();
        config.devices.push(DeviceConfig::new("  ", "simulated"));

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::EmptyDeviceName { index: 2 })));
    }

    #[test]
    fn test_empty_protocol() {
        let mut config = valid_config();
        config.devices.push(DeviceConfig::new("mystery", ""));

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::EmptyProtocol { device } if device == "mystery")));
    }

    #[test]
    fn test_multiple_errors() {
        let mut config = valid_config();
        config.scheduler.poll_interval_ms = 0;
        config.events.capacity = 0;
        config.observability.log_filter = String::new();

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_format_validation_errors() {
        let errors = vec![
            ConfigValidationError::ZeroEventCapacity,
            ConfigValidationError::DuplicateDeviceName {
                name: "voron".to_string(),
            },
        ];

        let output = format_validation_errors(&errors);
        assert!(output.contains("1. Event bus capacity"));
        assert!(output.contains("2. Device name 'voron'"));
    }
}
