//! Value types shared by every adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operational phase reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterPhase {
    Idle,
    Printing,
    Paused,
    Error,
    Offline,
    Unknown,
}

impl PrinterPhase {
    /// Returns the lowercase name of this phase.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Printing => "printing",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PrinterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live state obtained from a single poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub connected: bool,
    pub phase: PrinterPhase,
    pub tool_temp: Option<f64>,
    pub tool_target: Option<f64>,
    pub bed_temp: Option<f64>,
    pub bed_target: Option<f64>,
    /// Device-reported error text, when `phase` is `Error`.
    pub error_message: Option<String>,
}

impl DeviceState {
    /// A connected device in the given phase with no temperature data.
    #[must_use]
    pub fn with_phase(phase: PrinterPhase) -> Self {
        Self {
            connected: true,
            phase,
            tool_temp: None,
            tool_target: None,
            bed_temp: None,
            bed_target: None,
            error_message: None,
        }
    }

    /// A device that answered but is not connected to its printer.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            connected: false,
            ..Self::with_phase(PrinterPhase::Offline)
        }
    }

    /// True when the device can accept a new job.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.connected && self.phase == PrinterPhase::Idle
    }
}

/// Progress of whatever the device is currently printing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub file_name: Option<String>,
    /// Completion percentage in `0.0..=100.0`.
    pub progress: Option<f64>,
    pub print_time_secs: Option<u64>,
    pub time_left_secs: Option<u64>,
}

/// Acknowledgement of an accepted command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub message: String,
}

impl CommandAck {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Printable volume in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildVolume {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Static description of what an adapter can do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub protocol: String,
    pub can_upload: bool,
    pub can_send_gcode: bool,
    pub can_pause: bool,
    pub can_stream_camera: bool,
    pub build_volume: Option<BuildVolume>,
}

impl DeviceCapabilities {
    /// Capabilities of a full-featured networked printer.
    pub fn full(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            can_upload: true,
            can_send_gcode: true,
            can_pause: true,
            can_stream_camera: false,
            build_volume: None,
        }
    }

    #[must_use]
    pub fn with_build_volume(mut self, x: f64, y: f64, z: f64) -> Self {
        self.build_volume = Some(BuildVolume { x, y, z });
        self
    }
}
