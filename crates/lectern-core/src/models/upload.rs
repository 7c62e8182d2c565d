use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::{ErrorMetadata, UploadError};

/// Lifecycle stage of an upload attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStage {
    #[default]
    Idle,
    Preparing,
    Uploading,
    Processing,
    Complete,
    Error,
}

impl UploadStage {
    /// Stages during which an attempt is live and may still mutate state
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            UploadStage::Preparing | UploadStage::Uploading | UploadStage::Processing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStage::Complete | UploadStage::Error)
    }

    /// Progress checkpoint reported while in this stage.
    ///
    /// Progress is stage-based: it jumps between these fixed values and does
    /// not track bytes on the wire.
    pub fn checkpoint(self) -> u8 {
        match self {
            UploadStage::Idle | UploadStage::Error => 0,
            UploadStage::Preparing => 5,
            UploadStage::Uploading => 20,
            UploadStage::Processing => 80,
            UploadStage::Complete => 100,
        }
    }
}

impl Display for UploadStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStage::Idle => write!(f, "idle"),
            UploadStage::Preparing => write!(f, "preparing"),
            UploadStage::Uploading => write!(f, "uploading"),
            UploadStage::Processing => write!(f, "processing"),
            UploadStage::Complete => write!(f, "complete"),
            UploadStage::Error => write!(f, "error"),
        }
    }
}

/// Normalized success payload of an upload.
///
/// Only `id` and `url` are guaranteed by the remote service; everything else
/// is filled from the response when present and well-formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub id: String,
    pub url: String,
    /// Size in bytes
    pub size: u64,
    /// Container format, e.g. "mp4"
    pub format: String,
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub original_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Snapshot of the controller state. Callers only ever see clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadState {
    pub stage: UploadStage,
    /// Stage checkpoint, 0-100. See [`UploadStage::checkpoint`].
    pub progress: u8,
    pub message: Option<String>,
    /// Set only in the `error` stage
    pub error: Option<String>,
    /// Set only in the `complete` stage
    pub result: Option<UploadResult>,
}

impl UploadState {
    /// Snapshot for an in-flight stage
    pub fn entering(stage: UploadStage, message: Option<String>) -> Self {
        Self {
            stage,
            progress: stage.checkpoint(),
            message,
            error: None,
            result: None,
        }
    }

    pub fn completed(result: UploadResult) -> Self {
        Self {
            stage: UploadStage::Complete,
            progress: UploadStage::Complete.checkpoint(),
            message: Some("Upload complete".to_string()),
            error: None,
            result: Some(result),
        }
    }

    pub fn failed(error: &UploadError) -> Self {
        Self {
            stage: UploadStage::Error,
            progress: UploadStage::Error.checkpoint(),
            message: Some("Upload failed".to_string()),
            error: Some(error.client_message()),
            result: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        *self == UploadState::default()
    }

    /// Exactly one of `error`/`result` is set in terminal stages, neither elsewhere.
    pub fn outcome_is_consistent(&self) -> bool {
        match self.stage {
            UploadStage::Complete => self.result.is_some() && self.error.is_none(),
            UploadStage::Error => self.error.is_some() && self.result.is_none(),
            _ => self.error.is_none() && self.result.is_none(),
        }
    }
}
