//! HTTP client for the remote media upload endpoint.
//!
//! Provides a minimal client that posts multipart forms and returns the JSON
//! body, plus the normalization of that body into an `UploadResult`
//! (see [`api::normalize_response`]). The upload controller uses this client
//! through the `MediaUploader` trait.

pub mod api;

use anyhow::{Context, Result};
use lectern_core::{Config, UploadError};
use reqwest::Client;
use std::time::Duration;

/// Longest remote error body echoed back in an error message
const MAX_ERROR_DETAIL_LEN: usize = 200;

/// HTTP client for the remote media upload endpoint.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    upload_url: String,
}

impl ApiClient {
    /// `timeout` of `None` leaves the transfer unbounded, which large videos need.
    pub fn new(upload_url: String, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().connect_timeout(Duration::from_secs(30));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            upload_url: upload_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.upload_url.clone(), config.http_timeout())
    }

    /// Create client from environment (LECTERN_UPLOAD_URL, HTTP_TIMEOUT_SECS, ...).
    pub fn from_env() -> Result<Self> {
        let config = Config::from_env()?;
        Self::from_config(&config)
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// POST multipart form to the upload endpoint and return the JSON body.
    ///
    /// Connectivity failures and non-success statuses become
    /// `UploadError::Transport`; an unparseable body becomes `UploadError::Service`.
    pub async fn post_multipart(
        &self,
        form: reqwest::multipart::Form,
    ) -> Result<serde_json::Value, UploadError> {
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let detail = serde_json::from_str::<serde_json::Value>(&error_text)
                .ok()
                .and_then(|body| api::service_error_message(&body))
                .unwrap_or_else(|| truncate_detail(&error_text));
            return Err(UploadError::Transport(format!(
                "Upload failed with status {}: {}",
                status, detail
            )));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        let body: serde_json::Value = serde_json::from_slice(&body)?;

        Ok(body)
    }
}

fn transport_error(err: reqwest::Error) -> UploadError {
    if err.is_timeout() {
        UploadError::Transport("Upload timed out".to_string())
    } else if err.is_connect() {
        UploadError::Transport("Could not reach the upload service".to_string())
    } else {
        UploadError::Transport(format!("Upload request failed: {}", err))
    }
}

fn truncate_detail(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "no details".to_string();
    }
    match text.char_indices().nth(MAX_ERROR_DETAIL_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub use api::normalize_response;
