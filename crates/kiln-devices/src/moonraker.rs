//! Moonraker (Klipper) REST client.

use crate::adapter::DeviceAdapter;
use crate::error::{DeviceError, DeviceResult};
use crate::http::{
    build_client, expect_success, file_url, normalize_base_url, read_json, transport_error,
    DEFAULT_REQUEST_TIMEOUT,
};
use crate::types::{CommandAck, DeviceCapabilities, DeviceState, JobProgress, PrinterPhase};
use async_trait::async_trait;
use kiln_config::DeviceConfig;
use kiln_core::{KilnError, KilnResult};
use reqwest::{Client, IntoUrl, Method, RequestBuilder};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Protocol name used in configuration.
pub const PROTOCOL: &str = "moonraker";

const STATUS_QUERY: &str = "/printer/objects/query?print_stats&extruder&heater_bed&virtual_sdcard";

/// Moonraker device client.
pub struct MoonrakerClient {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MoonrakerClient {
    /// Creates a client for the Moonraker instance at `base_url`.
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> KilnResult<Self> {
        Ok(Self {
            name: name.into(),
            client: build_client(timeout)?,
            base_url: normalize_base_url(base_url),
            api_key,
        })
    }

    /// Builds a client from a `[[devices]]` entry.
    pub fn from_config(config: &DeviceConfig) -> KilnResult<Self> {
        let host = config.host.as_deref().ok_or_else(|| {
            KilnError::Configuration(format!("Device '{}' requires a host", config.name))
        })?;
        let timeout = config
            .option("timeout_secs")
            .and_then(|v| v.parse().ok())
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);

        Self::new(&config.name, host, config.api_key.clone(), timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_to(method, self.url(path))
    }

    fn request_to(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("X-Api-Key", key),
            None => builder,
        }
    }

    async fn post(&self, path: &str, query: &[(&str, &str)]) -> DeviceResult<()> {
        let response = self
            .request(Method::POST, path)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        expect_success(&self.name, response).await.map(|_| ())
    }

    async fn gcode_script(&self, script: &str) -> DeviceResult<()> {
        debug!(device = %self.name, script = %script, "Sending G-code script");
        self.post("/printer/gcode/script", &[("script", script)]).await
    }

    async fn query_status(&self) -> DeviceResult<PrinterStatus> {
        let response = self
            .request(Method::GET, STATUS_QUERY)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        let envelope: QueryEnvelope = read_json(&self.name, response).await?;
        Ok(envelope.result.status)
    }
}

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    status: PrinterStatus,
}

#[derive(Debug, Default, Deserialize)]
struct PrinterStatus {
    #[serde(default)]
    print_stats: Option<PrintStats>,
    #[serde(default)]
    extruder: Option<Heater>,
    #[serde(default)]
    heater_bed: Option<Heater>,
    #[serde(default)]
    virtual_sdcard: Option<VirtualSdcard>,
}

#[derive(Debug, Deserialize)]
struct PrintStats {
    #[serde(default)]
    state: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    print_duration: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Heater {
    temperature: Option<f64>,
    target: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct VirtualSdcard {
    progress: Option<f64>,
}

fn phase_from_state(state: &str) -> PrinterPhase {
    match state {
        "standby" | "complete" | "cancelled" => PrinterPhase::Idle,
        "printing" => PrinterPhase::Printing,
        "paused" => PrinterPhase::Paused,
        "error" => PrinterPhase::Error,
        _ => PrinterPhase::Unknown,
    }
}

#[async_trait]
impl DeviceAdapter for MoonrakerClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities::full(PROTOCOL)
    }

    async fn get_state(&self) -> DeviceResult<DeviceState> {
        let status = self.query_status().await?;
        let stats = status.print_stats.as_ref();
        let phase = stats.map_or(PrinterPhase::Unknown, |s| phase_from_state(&s.state));
        let extruder = status.extruder.as_ref();
        let bed = status.heater_bed.as_ref();

        Ok(DeviceState {
            connected: true,
            phase,
            tool_temp: extruder.and_then(|h| h.temperature),
            tool_target: extruder.and_then(|h| h.target),
            bed_temp: bed.and_then(|h| h.temperature),
            bed_target: bed.and_then(|h| h.target),
            error_message: if phase == PrinterPhase::Error {
                stats.and_then(|s| s.message.clone())
            } else {
                None
            },
        })
    }

    async fn get_job(&self) -> DeviceResult<JobProgress> {
        let status = self.query_status().await?;
        let stats = status.print_stats.as_ref();

        Ok(JobProgress {
            file_name: stats
                .and_then(|s| s.filename.clone())
                .filter(|f| !f.is_empty()),
            // Moonraker reports a 0..1 fraction.
            progress: status
                .virtual_sdcard
                .and_then(|v| v.progress)
                .map(|p| p * 100.0),
            print_time_secs: stats
                .and_then(|s| s.print_duration)
                .map(|d| d.max(0.0) as u64),
            time_left_secs: None,
        })
    }

    async fn start_print(&self, file_name: &str) -> DeviceResult<CommandAck> {
        self.post("/printer/print/start", &[("filename", file_name)])
            .await?;
        Ok(CommandAck::new(format!("Started printing {}", file_name)))
    }

    async fn cancel_print(&self) -> DeviceResult<CommandAck> {
        self.post("/printer/print/cancel", &[]).await?;
        Ok(CommandAck::new("Print cancelled"))
    }

    async fn pause_print(&self) -> DeviceResult<CommandAck> {
        self.post("/printer/print/pause", &[]).await?;
        Ok(CommandAck::new("Print paused"))
    }

    async fn resume_print(&self) -> DeviceResult<CommandAck> {
        self.post("/printer/print/resume", &[]).await?;
        Ok(CommandAck::new("Print resumed"))
    }

    async fn set_tool_temp(&self, target: f64) -> DeviceResult<CommandAck> {
        self.gcode_script(&format!("M104 S{}", target)).await?;
        Ok(CommandAck::new(format!("Tool target set to {}", target)))
    }

    async fn set_bed_temp(&self, target: f64) -> DeviceResult<CommandAck> {
        self.gcode_script(&format!("M140 S{}", target)).await?;
        Ok(CommandAck::new(format!("Bed target set to {}", target)))
    }

    async fn send_gcode(&self, commands: &[String]) -> DeviceResult<CommandAck> {
        self.gcode_script(&commands.join("\n")).await?;
        Ok(CommandAck::new(format!("Sent {} command(s)", commands.len())))
    }

    async fn upload_file(&self, local_path: &Path) -> DeviceResult<CommandAck> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DeviceError::protocol(&self.name, format!("Invalid file path: {}", local_path.display()))
            })?
            .to_string();
        let bytes = tokio::fs::read(local_path).await.map_err(|e| {
            DeviceError::protocol(&self.name, format!("Cannot read {}: {}", local_path.display(), e))
        })?;

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new()
            .text("root", "gcodes")
            .part("file", part);

        let response = self
            .request(Method::POST, "/server/files/upload")
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        expect_success(&self.name, response).await?;
        Ok(CommandAck::new(format!("Uploaded {}", file_name)))
    }

    async fn delete_file(&self, file_name: &str) -> DeviceResult<CommandAck> {
        let url = file_url(&self.name, &self.base_url, "/server/files/gcodes", file_name)?;
        let response = self
            .request_to(Method::DELETE, url)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        expect_success(&self.name, response).await?;
        Ok(CommandAck::new(format!("Deleted {}", file_name)))
    }

    async fn emergency_stop(&self) -> DeviceResult<CommandAck> {
        self.post("/printer/emergency_stop", &[]).await?;
        Ok(CommandAck::new("Emergency stop sent"))
    }
}
