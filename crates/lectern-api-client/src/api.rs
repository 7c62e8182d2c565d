//! Upload request and response normalization for the remote media service.
//!
//! The remote body is only partially trusted: beyond an identifier and a
//! secure URL nothing is guaranteed, and optional fields may be missing or
//! carry the wrong JSON type. Normalization keeps what is well-formed and
//! drops the rest instead of failing the upload.

use crate::ApiClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lectern_core::models::{MediaFile, UploadResult};
use lectern_core::{MediaUploader, UploadError};
use serde_json::Value;

impl ApiClient {
    /// Upload a file with its upload preset as a single multipart request.
    pub async fn upload_media(
        &self,
        file: &MediaFile,
        upload_preset: &str,
    ) -> Result<Value, UploadError> {
        let bytes = file.read().await?;

        tracing::debug!(
            file = %file.name(),
            size_bytes = bytes.len(),
            upload_preset = %upload_preset,
            "Sending upload request"
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::stream(bytes).file_name(file.name().to_string()),
            )
            .text("upload_preset", upload_preset.to_string());

        self.post_multipart(form).await
    }
}

#[async_trait]
impl MediaUploader for ApiClient {
    async fn upload(&self, file: &MediaFile, upload_preset: &str) -> Result<Value, UploadError> {
        self.upload_media(file, upload_preset).await
    }
}

/// Error message reported by the service in its body, if any.
///
/// Accepts `{"error": {"message": "..."}}`, `{"error": "..."}` and any other
/// non-null `error` value.
pub fn service_error_message(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        Value::Object(error) => Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(error.clone()).to_string()),
        ),
        other => Some(other.to_string()),
    }
}

fn str_field(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Non-negative integer given as a JSON number or a numeric string
fn u64_field(body: &Value, key: &str) -> Option<u64> {
    match body.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn f64_field(body: &Value, key: &str) -> Option<f64> {
    let value = match body.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

fn dimension_field(body: &Value, key: &str) -> Option<u32> {
    u64_field(body, key)
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
}

fn timestamp_field(body: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = str_field(body, key)?;
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Narrow a remote upload response into an `UploadResult`.
///
/// Fails with `UploadError::Service` when the body carries an `error` field or
/// lacks an identifier (`public_id`, else `asset_id`) or a secure URL
/// (`secure_url`, else an `https://` `url`). Missing size and format fall back
/// to the local file.
pub fn normalize_response(body: &Value, file: &MediaFile) -> Result<UploadResult, UploadError> {
    if !body.is_object() {
        return Err(UploadError::Service(
            "Upload service returned an unexpected response".to_string(),
        ));
    }

    if let Some(message) = service_error_message(body) {
        return Err(UploadError::Service(format!(
            "Upload service rejected the file: {}",
            message
        )));
    }

    let id = str_field(body, "public_id")
        .or_else(|| str_field(body, "asset_id"))
        .ok_or_else(|| {
            UploadError::Service("Upload response is missing the media identifier".to_string())
        })?;

    let url = str_field(body, "secure_url")
        .or_else(|| str_field(body, "url").filter(|u| u.starts_with("https://")))
        .ok_or_else(|| {
            UploadError::Service("Upload response is missing a secure media URL".to_string())
        })?;

    let format = str_field(body, "format")
        .map(|f| f.to_lowercase())
        .or_else(|| {
            file.extension()
                .map(|e| e.trim_start_matches('.').to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    Ok(UploadResult {
        id,
        url,
        size: u64_field(body, "bytes").unwrap_or_else(|| file.size()),
        format,
        duration: f64_field(body, "duration"),
        width: dimension_field(body, "width"),
        height: dimension_field(body, "height"),
        original_filename: str_field(body, "original_filename"),
        created_at: timestamp_field(body, "created_at"),
    })
}
