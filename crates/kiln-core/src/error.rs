//! Unified error type for the Kiln control plane.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type surfaced at the boundary of every Kiln crate.
///
/// Crate-local errors (`JobError`, `DeviceError`) convert into this type so
/// the process entry point and any outer tool layer see one taxonomy.
#[derive(Error, Debug)]
pub enum KilnError {
    // ============ Caller Errors ============
    /// Unknown job or device identifier.
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Operation is not allowed in the resource's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    // ============ Infrastructure Errors ============
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A physical device could not be reached or refused a command.
    #[error("Device error: {device} - {message}")]
    Device { device: String, message: String },

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KilnError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Device { .. } => "DEVICE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state<T: Into<String>>(message: T) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a device error.
    #[must_use]
    pub fn device<D: Into<String>, M: Into<String>>(device: D, message: M) -> Self {
        Self::Device {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true for errors caused by the caller rather than the system.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::InvalidState(_) | Self::Validation(_)
        )
    }
}

impl From<serde_json::Error> for KilnError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(KilnError::not_found("Job", "abc").error_code(), "NOT_FOUND");
        assert_eq!(KilnError::invalid_state("terminal").error_code(), "INVALID_STATE");
        assert_eq!(KilnError::validation("bad").error_code(), "VALIDATION_ERROR");
        assert_eq!(KilnError::device("printer", "offline").error_code(), "DEVICE_ERROR");
        assert_eq!(KilnError::internal("oops").error_code(), "INTERNAL_ERROR");
        assert_eq!(KilnError::Timeout("poll".into()).error_code(), "TIMEOUT");
    }

    #[test]
    fn test_caller_errors() {
        assert!(KilnError::not_found("Device", "x1").is_caller_error());
        assert!(KilnError::invalid_state("done").is_caller_error());
        assert!(!KilnError::internal("bug").is_caller_error());
    }

    #[test]
    fn test_error_display() {
        let err = KilnError::not_found("Job", "job-42");
        let msg = err.to_string();
        assert!(msg.contains("Job") && msg.contains("job-42"));

        let err = KilnError::device("prusa-mk4", "HTTP 409 printer busy");
        assert!(err.to_string().contains("prusa-mk4"));
        assert!(err.to_string().contains("printer busy"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = KilnError::from(json_err);
        assert!(matches!(err, KilnError::Internal(msg) if msg.contains("JSON")));
    }
}
