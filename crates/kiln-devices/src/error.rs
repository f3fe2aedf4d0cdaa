//! Device error taxonomy.

use kiln_core::KilnError;
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Result type returned by every adapter call.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Why a device call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    /// The device could not be reached (connection refused, DNS, reset).
    Unreachable,
    /// The device did not answer in time.
    Timeout,
    /// The device answered and declined the command (busy, bad file).
    Rejected,
    /// The device answered with something we could not interpret.
    Protocol,
    /// The adapter does not implement this operation.
    Unsupported,
}

impl DeviceErrorKind {
    /// Returns the lowercase name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::Timeout => "timeout",
            Self::Rejected => "rejected",
            Self::Protocol => "protocol",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed device call.
///
/// For [`DeviceErrorKind::Rejected`], `message` is the device's own text,
/// unmodified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{device} ({kind}): {message}")]
pub struct DeviceError {
    /// Failure classification.
    pub kind: DeviceErrorKind,
    /// Adapter name.
    pub device: String,
    /// Human-readable detail.
    pub message: String,
}

impl DeviceError {
    /// Creates a device error.
    #[must_use]
    pub fn new(kind: DeviceErrorKind, device: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            device: device.into(),
            message: message.into(),
        }
    }

    /// Creates an unreachable error.
    #[must_use]
    pub fn unreachable(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DeviceErrorKind::Unreachable, device, message)
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DeviceErrorKind::Timeout, device, message)
    }

    /// Creates a rejection carrying the device's message.
    #[must_use]
    pub fn rejected(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DeviceErrorKind::Rejected, device, message)
    }

    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DeviceErrorKind::Protocol, device, message)
    }

    /// Creates an unsupported-operation error.
    #[must_use]
    pub fn unsupported(device: impl Into<String>, operation: &str) -> Self {
        Self::new(
            DeviceErrorKind::Unsupported,
            device,
            format!("{} is not supported by this device", operation),
        )
    }

    /// Creates a protocol error for an adapter call that panicked.
    #[must_use]
    pub fn panicked(device: impl Into<String>, panic: &(dyn Any + Send)) -> Self {
        Self::protocol(device, format!("Adapter panicked: {}", panic_message(panic)))
    }

    /// True for failures that may clear up on their own (worth polling again).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            DeviceErrorKind::Unreachable | DeviceErrorKind::Timeout
        )
    }

    /// True when the device itself declined the request.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self.kind, DeviceErrorKind::Rejected)
    }
}

/// Text carried by a panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl From<DeviceError> for KilnError {
    fn from(err: DeviceError) -> Self {
        match err.kind {
            DeviceErrorKind::Timeout => {
                KilnError::Timeout(format!("{}: {}", err.device, err.message))
            }
            _ => KilnError::Device {
                device: err.device,
                message: err.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_preserves_message() {
        let err = DeviceError::rejected("voron", "Printer is busy");
        assert_eq!(err.message, "Printer is busy");
        assert!(err.is_rejection());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "voron (rejected): Printer is busy");
    }

    #[test]
    fn test_transient_kinds() {
        assert!(DeviceError::unreachable("a", "refused").is_transient());
        assert!(DeviceError::timeout("a", "5s").is_transient());
        assert!(!DeviceError::protocol("a", "bad json").is_transient());
        assert!(!DeviceError::unsupported("a", "pause_print").is_transient());
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_panicked_is_protocol() {
        let boxed: Box<dyn Any + Send> = Box::new("firmware exploded");
        let err = DeviceError::panicked("mk4", boxed.as_ref());
        assert_eq!(err.kind, DeviceErrorKind::Protocol);
        assert_eq!(err.message, "Adapter panicked: firmware exploded");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_into_kiln_error() {
        let err: KilnError = DeviceError::timeout("mk4", "no answer").into();
        assert!(matches!(err, KilnError::Timeout(_)));

        let err: KilnError = DeviceError::rejected("mk4", "file not found").into();
        assert!(
            matches!(err, KilnError::Device { device, message } if device == "mk4" && message == "file not found")
        );
    }
}
