//! Transport seam between the upload controller and the remote media service
//!
//! The controller never talks HTTP itself. It hands the file and the upload
//! preset to a `MediaUploader` and receives the raw JSON body back, which it
//! then normalizes. `lectern-api-client` provides the HTTP implementation;
//! tests plug in scripted uploaders.

use async_trait::async_trait;

use crate::error::UploadError;
use crate::models::MediaFile;

#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Send the raw file bytes and the upload preset in a single request.
    ///
    /// Returns the parsed JSON body of a successful (2xx) response. Non-success
    /// statuses and connectivity failures map to `UploadError::Transport`.
    /// Dropping the returned future must abort the transfer.
    async fn upload(
        &self,
        file: &MediaFile,
        upload_preset: &str,
    ) -> Result<serde_json::Value, UploadError>;
}
