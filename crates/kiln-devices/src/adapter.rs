//! The uniform device capability surface.

use crate::error::{DeviceError, DeviceResult};
use crate::types::{CommandAck, DeviceCapabilities, DeviceState, JobProgress};
use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;

/// Every device protocol client implements this trait.
///
/// # Contract
///
/// * Calls perform live I/O; adapters do not cache state between calls.
/// * A command the device declines comes back as
///   [`DeviceErrorKind::Rejected`](crate::DeviceErrorKind::Rejected) with the
///   device's message untouched. Transport problems are `Unreachable`,
///   `Timeout`, or `Protocol`.
/// * Optional operations default to `Unsupported`; adapters override what
///   their [`DeviceCapabilities`] advertise.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    /// Adapter name used in errors and logs.
    fn name(&self) -> &str;

    /// Static capability descriptor.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Polls connectivity, phase, and temperatures.
    async fn get_state(&self) -> DeviceResult<DeviceState>;

    /// Polls progress of the active print.
    async fn get_job(&self) -> DeviceResult<JobProgress>;

    /// Starts printing a file already present on the device.
    async fn start_print(&self, file_name: &str) -> DeviceResult<CommandAck>;

    /// Cancels the active print.
    async fn cancel_print(&self) -> DeviceResult<CommandAck>;

    async fn pause_print(&self) -> DeviceResult<CommandAck> {
        Err(DeviceError::unsupported(self.name(), "pause_print"))
    }

    async fn resume_print(&self) -> DeviceResult<CommandAck> {
        Err(DeviceError::unsupported(self.name(), "resume_print"))
    }

    /// Sets the hotend target in degrees Celsius.
    async fn set_tool_temp(&self, _target: f64) -> DeviceResult<CommandAck> {
        Err(DeviceError::unsupported(self.name(), "set_tool_temp"))
    }

    /// Sets the bed target in degrees Celsius.
    async fn set_bed_temp(&self, _target: f64) -> DeviceResult<CommandAck> {
        Err(DeviceError::unsupported(self.name(), "set_bed_temp"))
    }

    /// Sends raw G-code lines.
    async fn send_gcode(&self, _commands: &[String]) -> DeviceResult<CommandAck> {
        Err(DeviceError::unsupported(self.name(), "send_gcode"))
    }

    /// Uploads a local file to the device's storage.
    async fn upload_file(&self, _local_path: &Path) -> DeviceResult<CommandAck> {
        Err(DeviceError::unsupported(self.name(), "upload_file"))
    }

    /// Deletes a file from the device's storage.
    async fn delete_file(&self, _file_name: &str) -> DeviceResult<CommandAck> {
        Err(DeviceError::unsupported(self.name(), "delete_file"))
    }

    /// Halts the device immediately.
    async fn emergency_stop(&self) -> DeviceResult<CommandAck>;
}

/// Awaits one adapter call, turning a panic inside it into a
/// [`DeviceErrorKind::Protocol`](crate::DeviceErrorKind::Protocol) error
/// attributed to `device`.
pub async fn guarded_call<T, F>(device: &str, call: F) -> DeviceResult<T>
where
    F: Future<Output = DeviceResult<T>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(DeviceError::panicked(device, panic.as_ref())),
    }
}
