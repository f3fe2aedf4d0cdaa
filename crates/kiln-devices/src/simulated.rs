//! In-memory printer for tests and dry runs.
//!
//! Every aspect of its behaviour is scriptable: phase, progress,
//! reachability, and the outcome and timing of the next `start_print`.

use crate::adapter::DeviceAdapter;
use crate::error::{DeviceError, DeviceResult};
use crate::types::{CommandAck, DeviceCapabilities, DeviceState, JobProgress, PrinterPhase};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;

/// Protocol name used in configuration.
pub const PROTOCOL: &str = "simulated";

#[derive(Debug)]
struct SimState {
    phase: PrinterPhase,
    progress: Option<f64>,
    current_file: Option<String>,
    tool_target: f64,
    bed_target: f64,
    reachable: bool,
    start_failures: VecDeque<DeviceError>,
    start_hold: Option<Arc<StartHold>>,
    started_files: Vec<String>,
    files: Vec<String>,
    gcode_log: Vec<String>,
}

/// Pauses one `start_print` call between entry and its effect.
#[derive(Debug, Default)]
pub struct StartHold {
    entered: Notify,
    released: Notify,
}

impl StartHold {
    /// Resolves once the held `start_print` has been entered.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the held `start_print` carry on.
    pub fn release(&self) {
        self.released.notify_one();
    }
}

/// Scriptable simulated printer.
#[derive(Debug)]
pub struct SimulatedPrinter {
    name: String,
    state: Mutex<SimState>,
}

impl SimulatedPrinter {
    /// Creates an idle, reachable printer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(SimState {
                phase: PrinterPhase::Idle,
                progress: None,
                current_file: None,
                tool_target: 0.0,
                bed_target: 0.0,
                reachable: true,
                start_failures: VecDeque::new(),
                start_hold: None,
                started_files: Vec::new(),
                files: Vec::new(),
                gcode_log: Vec::new(),
            }),
        }
    }

    /// Forces the reported phase.
    pub fn set_phase(&self, phase: PrinterPhase) {
        self.state.lock().phase = phase;
    }

    /// Returns the current phase.
    pub fn phase(&self) -> PrinterPhase {
        self.state.lock().phase
    }

    /// Sets the reported completion percentage.
    pub fn set_progress(&self, progress: f64) {
        self.state.lock().progress = Some(progress);
    }

    /// Simulates the active print finishing: back to Idle at 100%.
    pub fn finish_print(&self) {
        let mut state = self.state.lock();
        state.phase = PrinterPhase::Idle;
        state.progress = Some(100.0);
    }

    /// Makes every call fail as unreachable until re-enabled.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().reachable = reachable;
    }

    /// Makes the next `start_print` decline with `message`.
    pub fn reject_next_start(&self, message: impl Into<String>) {
        let err = DeviceError::rejected(&self.name, message);
        self.state.lock().start_failures.push_back(err);
    }

    /// Makes the next `start_print` fail with an arbitrary error.
    pub fn fail_next_start(&self, err: DeviceError) {
        self.state.lock().start_failures.push_back(err);
    }

    /// Makes the next `start_print` wait for [`StartHold::release`]
    /// before touching the printer.
    pub fn hold_next_start(&self) -> Arc<StartHold> {
        let hold = Arc::new(StartHold::default());
        self.state.lock().start_hold = Some(Arc::clone(&hold));
        hold
    }

    /// Files passed to successful `start_print` calls, in order.
    pub fn started_files(&self) -> Vec<String> {
        self.state.lock().started_files.clone()
    }

    /// Raw G-code received so far.
    pub fn gcode_log(&self) -> Vec<String> {
        self.state.lock().gcode_log.clone()
    }

    /// Files currently stored on the device.
    pub fn files(&self) -> Vec<String> {
        self.state.lock().files.clone()
    }

    fn check_reachable(&self) -> DeviceResult<()> {
        if self.state.lock().reachable {
            Ok(())
        } else {
            Err(DeviceError::unreachable(&self.name, "simulated connection refused"))
        }
    }
}

#[async_trait]
impl DeviceAdapter for SimulatedPrinter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities::full(PROTOCOL).with_build_volume(250.0, 210.0, 220.0)
    }

    async fn get_state(&self) -> DeviceResult<DeviceState> {
        self.check_reachable()?;
        let state = self.state.lock();
        let printing = state.phase == PrinterPhase::Printing;

        Ok(DeviceState {
            connected: state.phase != PrinterPhase::Offline,
            phase: state.phase,
            tool_temp: Some(if printing { state.tool_target } else { 25.0 }),
            tool_target: Some(state.tool_target),
            bed_temp: Some(if printing { state.bed_target } else { 25.0 }),
            bed_target: Some(state.bed_target),
            error_message: (state.phase == PrinterPhase::Error)
                .then(|| "simulated fault".to_string()),
        })
    }

    async fn get_job(&self) -> DeviceResult<JobProgress> {
        self.check_reachable()?;
        let state = self.state.lock();
        Ok(JobProgress {
            file_name: state.current_file.clone(),
            progress: state.progress,
            print_time_secs: None,
            time_left_secs: None,
        })
    }

    async fn start_print(&self, file_name: &str) -> DeviceResult<CommandAck> {
        self.check_reachable()?;
        let hold = self.state.lock().start_hold.take();
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.released.notified().await;
        }
        let mut state = self.state.lock();

        if let Some(err) = state.start_failures.pop_front() {
            return Err(err);
        }
        if state.phase != PrinterPhase::Idle {
            return Err(DeviceError::rejected(
                &self.name,
                format!("Printer is {}", state.phase),
            ));
        }

        state.phase = PrinterPhase::Printing;
        state.progress = Some(0.0);
        state.current_file = Some(file_name.to_string());
        state.started_files.push(file_name.to_string());
        Ok(CommandAck::new(format!("Started printing {}", file_name)))
    }

    async fn cancel_print(&self) -> DeviceResult<CommandAck> {
        self.check_reachable()?;
        let mut state = self.state.lock();
        state.phase = PrinterPhase::Idle;
        state.progress = None;
        state.current_file = None;
        Ok(CommandAck::new("Print cancelled"))
    }

    async fn pause_print(&self) -> DeviceResult<CommandAck> {
        self.check_reachable()?;
        let mut state = self.state.lock();
        if state.phase != PrinterPhase::Printing {
            return Err(DeviceError::rejected(&self.name, "Not printing"));
        }
        state.phase = PrinterPhase::Paused;
        Ok(CommandAck::new("Print paused"))
    }

    async fn resume_print(&self) -> DeviceResult<CommandAck> {
        self.check_reachable()?;
        let mut state = self.state.lock();
        if state.phase != PrinterPhase::Paused {
            return Err(DeviceError::rejected(&self.name, "Not paused"));
        }
        state.phase = PrinterPhase::Printing;
        Ok(CommandAck::new("Print resumed"))
    }

    async fn set_tool_temp(&self, target: f64) -> DeviceResult<CommandAck> {
        self.check_reachable()?;
        self.state.lock().tool_target = target;
        Ok(CommandAck::new(format!("Tool target set to {}", target)))
    }

    async fn set_bed_temp(&self, target: f64) -> DeviceResult<CommandAck> {
        self.check_reachable()?;
        self.state.lock().bed_target = target;
        Ok(CommandAck::new(format!("Bed target set to {}", target)))
    }

    async fn send_gcode(&self, commands: &[String]) -> DeviceResult<CommandAck> {
        self.check_reachable()?;
        self.state.lock().gcode_log.extend(commands.iter().cloned());
        Ok(CommandAck::new(format!("Sent {} command(s)", commands.len())))
    }

    async fn upload_file(&self, local_path: &Path) -> DeviceResult<CommandAck> {
        self.check_reachable()?;
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DeviceError::protocol(&self.name, format!("Invalid file path: {}", local_path.display()))
            })?
            .to_string();
        self.state.lock().files.push(file_name.clone());
        Ok(CommandAck::new(format!("Uploaded {}", file_name)))
    }

    async fn delete_file(&self, file_name: &str) -> DeviceResult<CommandAck> {
        self.check_reachable()?;
        let mut state = self.state.lock();
        let before = state.files.len();
        state.files.retain(|f| f != file_name);
        if state.files.len() == before {
            return Err(DeviceError::rejected(
                &self.name,
                format!("File not found: {}", file_name),
            ));
        }
        Ok(CommandAck::new(format!("Deleted {}", file_name)))
    }

    async fn emergency_stop(&self) -> DeviceResult<CommandAck> {
        self.check_reachable()?;
        let mut state = self.state.lock();
        state.phase = PrinterPhase::Error;
        state.tool_target = 0.0;
        state.bed_target = 0.0;
        Ok(CommandAck::new("Emergency stop sent"))
    }
}
