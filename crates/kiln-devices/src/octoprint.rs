//! OctoPrint REST client.
//!
//! Polls `/api/printer` and `/api/job`, issues commands through the job,
//! files, and printer endpoints. Authenticates with the `X-Api-Key` header.

use crate::adapter::DeviceAdapter;
use crate::error::{DeviceError, DeviceResult};
use crate::http::{
    build_client, expect_success, file_url, map_http_error, normalize_base_url, read_json,
    transport_error, DEFAULT_REQUEST_TIMEOUT,
};
use crate::types::{CommandAck, DeviceCapabilities, DeviceState, JobProgress, PrinterPhase};
use async_trait::async_trait;
use kiln_config::DeviceConfig;
use kiln_core::{KilnError, KilnResult};
use reqwest::{Client, IntoUrl, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Protocol name used in configuration.
pub const PROTOCOL: &str = "octoprint";

const FILES_PATH: &str = "/api/files/local";

/// OctoPrint device client.
pub struct OctoPrintClient {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OctoPrintClient {
    /// Creates a client for the OctoPrint instance at `base_url`.
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
    ///
    /// Requires `host`; honours the `timeout_secs` option.
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

    /// Request against one stored file, name percent-encoded.
    fn file_request(&self, method: Method, file_name: &str) -> DeviceResult<RequestBuilder> {
        let url = file_url(&self.name, &self.base_url, FILES_PATH, file_name)?;
        Ok(self.request_to(method, url))
    }

    async fn post_command(&self, path: &str, body: serde_json::Value) -> DeviceResult<()> {
        self.send_command(self.request(Method::POST, path), body).await
    }

    async fn send_command(&self, request: RequestBuilder, body: serde_json::Value) -> DeviceResult<()> {
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        expect_success(&self.name, response).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct PrinterResponse {
    state: StateBlock,
    #[serde(default)]
    temperature: Temperatures,
}

#[derive(Debug, Deserialize)]
struct StateBlock {
    #[serde(default)]
    text: String,
    #[serde(default)]
    flags: StateFlags,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateFlags {
    #[serde(default)]
    operational: bool,
    #[serde(default)]
    printing: bool,
    #[serde(default)]
    cancelling: bool,
    #[serde(default)]
    paused: bool,
    #[serde(default)]
    pausing: bool,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Temperatures {
    tool0: Option<TempReading>,
    bed: Option<TempReading>,
}

#[derive(Debug, Deserialize)]
struct TempReading {
    actual: Option<f64>,
    target: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    #[serde(default)]
    job: Option<JobBlock>,
    #[serde(default)]
    progress: Option<ProgressBlock>,
}

#[derive(Debug, Deserialize)]
struct JobBlock {
    file: Option<FileBlock>,
}

#[derive(Debug, Deserialize)]
struct FileBlock {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressBlock {
    completion: Option<f64>,
    print_time: Option<f64>,
    print_time_left: Option<f64>,
}

fn phase_from_flags(flags: &StateFlags) -> PrinterPhase {
    if flags.error {
        PrinterPhase::Error
    } else if flags.printing || flags.cancelling {
        PrinterPhase::Printing
    } else if flags.paused || flags.pausing {
        PrinterPhase::Paused
    } else if flags.operational && flags.ready {
        PrinterPhase::Idle
    } else if flags.operational {
        PrinterPhase::Unknown
    } else {
        PrinterPhase::Offline
    }
}

fn secs(value: Option<f64>) -> Option<u64> {
    value.filter(|v| *v >= 0.0).map(|v| v as u64)
}

#[async_trait]
impl DeviceAdapter for OctoPrintClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            can_stream_camera: true,
            ..DeviceCapabilities::full(PROTOCOL)
        }
    }

    async fn get_state(&self) -> DeviceResult<DeviceState> {
        let response = self
            .request(Method::GET, "/api/printer")
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        // OctoPrint answers 409 while no printer is connected.
        if response.status() == StatusCode::CONFLICT {
            debug!(device = %self.name, "OctoPrint reports printer not operational");
            return Ok(DeviceState::offline());
        }

        let printer: PrinterResponse = read_json(&self.name, response).await?;
        let phase = phase_from_flags(&printer.state.flags);
        let tool = printer.temperature.tool0.as_ref();
        let bed = printer.temperature.bed.as_ref();

        Ok(DeviceState {
            connected: phase != PrinterPhase::Offline,
            phase,
            tool_temp: tool.and_then(|t| t.actual),
            tool_target: tool.and_then(|t| t.target),
            bed_temp: bed.and_then(|t| t.actual),
            bed_target: bed.and_then(|t| t.target),
            error_message: (phase == PrinterPhase::Error).then(|| printer.state.text.clone()),
        })
    }

    async fn get_job(&self) -> DeviceResult<JobProgress> {
        let response = self
            .request(Method::GET, "/api/job")
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        let job: JobResponse = read_json(&self.name, response).await?;
        let progress = job.progress.as_ref();

        Ok(JobProgress {
            file_name: job.job.and_then(|j| j.file).and_then(|f| f.name),
            progress: progress.and_then(|p| p.completion),
            print_time_secs: secs(progress.and_then(|p| p.print_time)),
            time_left_secs: secs(progress.and_then(|p| p.print_time_left)),
        })
    }

    async fn start_print(&self, file_name: &str) -> DeviceResult<CommandAck> {
        debug!(device = %self.name, file = %file_name, "Selecting and starting file");
        let request = self.file_request(Method::POST, file_name)?;
        self.send_command(request, json!({"command": "select", "print": true}))
            .await?;
        Ok(CommandAck::new(format!("Started printing {}", file_name)))
    }

    async fn cancel_print(&self) -> DeviceResult<CommandAck> {
        self.post_command("/api/job", json!({"command": "cancel"}))
            .await?;
        Ok(CommandAck::new("Print cancelled"))
    }

    async fn pause_print(&self) -> DeviceResult<CommandAck> {
        self.post_command("/api/job", json!({"command": "pause", "action": "pause"}))
            .await?;
        Ok(CommandAck::new("Print paused"))
    }

    async fn resume_print(&self) -> DeviceResult<CommandAck> {
        self.post_command("/api/job", json!({"command": "pause", "action": "resume"}))
            .await?;
        Ok(CommandAck::new("Print resumed"))
    }

    async fn set_tool_temp(&self, target: f64) -> DeviceResult<CommandAck> {
        self.post_command(
            "/api/printer/tool",
            json!({"command": "target", "targets": {"tool0": target}}),
        )
        .await?;
        Ok(CommandAck::new(format!("Tool target set to {}", target)))
    }

    async fn set_bed_temp(&self, target: f64) -> DeviceResult<CommandAck> {
        self.post_command(
            "/api/printer/bed",
            json!({"command": "target", "target": target}),
        )
        .await?;
        Ok(CommandAck::new(format!("Bed target set to {}", target)))
    }

    async fn send_gcode(&self, commands: &[String]) -> DeviceResult<CommandAck> {
        self.post_command("/api/printer/command", json!({"commands": commands}))
            .await?;
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
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .request(Method::POST, FILES_PATH)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        expect_success(&self.name, response).await?;
        Ok(CommandAck::new(format!("Uploaded {}", file_name)))
    }

    async fn delete_file(&self, file_name: &str) -> DeviceResult<CommandAck> {
        let response = self
            .file_request(Method::DELETE, file_name)?
            .send()
            .await
            .map_err(|e| transport_error(&self.name, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(&self.name, status, &body));
        }
        Ok(CommandAck::new(format!("Deleted {}", file_name)))
    }

    async fn emergency_stop(&self) -> DeviceResult<CommandAck> {
        self.post_command("/api/printer/command", json!({"commands": ["M112"]}))
            .await?;
        Ok(CommandAck::new("Emergency stop sent"))
    }
}
