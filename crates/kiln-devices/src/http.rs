//! HTTP plumbing shared by the REST protocol clients.

use crate::error::{DeviceError, DeviceResult};
use kiln_core::{KilnError, KilnResult};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Default timeout for a single HTTP request to a device.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_client(timeout: Duration) -> KilnResult<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| KilnError::Internal(format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Builds `{base_url}{prefix}/{file_name}` with every path segment of the
/// file name percent-encoded.
///
/// `/` in the file name separates folders; empty, `.` and `..` segments are
/// refused.
pub(crate) fn file_url(device: &str, base_url: &str, prefix: &str, file_name: &str) -> DeviceResult<Url> {
    let segments: Vec<&str> = file_name.split('/').collect();
    if segments
        .iter()
        .any(|segment| segment.is_empty() || *segment == "." || *segment == "..")
    {
        return Err(DeviceError::rejected(
            device,
            format!("Invalid file name: {}", file_name),
        ));
    }

    let mut url = Url::parse(&format!("{}{}", base_url, prefix))
        .map_err(|e| DeviceError::protocol(device, format!("Invalid device URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| DeviceError::protocol(device, "Device URL cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Classifies a transport-level failure.
pub(crate) fn transport_error(device: &str, err: &reqwest::Error) -> DeviceError {
    if err.is_timeout() {
        DeviceError::timeout(device, err.to_string())
    } else if err.is_decode() {
        DeviceError::protocol(device, format!("Invalid response body: {}", err))
    } else {
        DeviceError::unreachable(device, err.to_string())
    }
}

/// Pulls the human-readable message out of an error body.
///
/// Understands `{"error": "..."}` and `{"error": {"message": "..."}}`;
/// anything else is returned as-is.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        match json.get("error") {
            Some(Value::String(message)) => return message.clone(),
            Some(Value::Object(obj)) => {
                if let Some(Value::String(message)) = obj.get("message") {
                    return message.clone();
                }
            }
            _ => {}
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}

pub(crate) fn map_http_error(device: &str, status: StatusCode, body: &str) -> DeviceError {
    let message = error_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DeviceError::protocol(device, format!("Authentication failed: {}", message))
        }
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            DeviceError::unreachable(device, message)
        }
        s if s.is_client_error() => DeviceError::rejected(device, message),
        _ => DeviceError::protocol(device, format!("HTTP {}: {}", status, message)),
    }
}

/// Checks the status and returns the raw body.
pub(crate) async fn expect_success(device: &str, response: Response) -> DeviceResult<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(device, &e))?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(map_http_error(device, status, &body))
    }
}

/// Checks the status and decodes a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(device: &str, response: Response) -> DeviceResult<T> {
    let body = expect_success(device, response).await?;
    serde_json::from_str(&body)
        .map_err(|e| DeviceError::protocol(device, format!("JSON parse error: {}", e)))
}
