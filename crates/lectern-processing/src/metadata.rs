//! Local metadata extraction - duration and dimensions read with ffprobe

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lectern_core::models::{ExtractedMetadata, FileSource, MediaFile};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Validate that a path doesn't contain shell metacharacters or dangerous sequences
fn validate_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Path contains dangerous characters: {}", path));
    }

    if path.contains("..") {
        return Err(anyhow!("Path contains directory traversal: {}", path));
    }

    Ok(())
}

/// Reads intrinsic media metadata without uploading anything.
///
/// Implementations never fail and must resolve in bounded time: when
/// nothing can be read, they return [`ExtractedMetadata::size_only`].
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn extract(&self, file: &MediaFile) -> ExtractedMetadata;
}

pub struct MetadataExtractor {
    ffprobe_path: String,
    timeout: Duration,
}

impl MetadataExtractor {
    pub fn new(ffprobe_path: String, timeout: Duration) -> Result<Self> {
        validate_path(&ffprobe_path)
            .context("Invalid ffprobe_path: contains dangerous characters")?;

        if !ffprobe_path.chars().all(|c| {
            c.is_alphanumeric() || c == '/' || c == '-' || c == '_' || c == '.' || c == '\\'
        }) {
            return Err(anyhow!("Invalid ffprobe_path: contains unsafe characters"));
        }

        Ok(Self {
            ffprobe_path,
            timeout,
        })
    }

    /// Probe a file and fail loudly. `extract` wraps this with the fallback.
    ///
    /// The timeout bounds the whole call, including spooling an in-memory
    /// source to disk.
    pub async fn probe(&self, file: &MediaFile) -> Result<ExtractedMetadata> {
        tokio::time::timeout(self.timeout, self.probe_source(file))
            .await
            .map_err(|_| anyhow!("ffprobe timed out after {:?}", self.timeout))?
    }

    async fn probe_source(&self, file: &MediaFile) -> Result<ExtractedMetadata> {
        match file.source() {
            FileSource::Path(path) => self.probe_path(path, file.size()).await,
            FileSource::Memory(bytes) => {
                // The temp file is removed when `temp_file` drops, whatever the probe outcome.
                let suffix = file.extension().unwrap_or_default();
                let temp_file = tempfile::Builder::new()
                    .prefix("lectern-probe-")
                    .suffix(&suffix)
                    .tempfile()
                    .context("Failed to create temporary probe file")?;
                // Write through the open handle so an abandoned write can't recreate the path.
                let handle = temp_file
                    .as_file()
                    .try_clone()
                    .context("Failed to open temporary probe file")?;
                let mut handle = tokio::fs::File::from_std(handle);
                handle
                    .write_all(bytes)
                    .await
                    .context("Failed to write temporary probe file")?;
                handle
                    .flush()
                    .await
                    .context("Failed to write temporary probe file")?;

                self.probe_path(temp_file.path(), file.size()).await
            }
        }
    }

    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    async fn probe_path(&self, path: &Path, size_bytes: u64) -> Result<ExtractedMetadata> {
        let start = std::time::Instant::now();
        // An absolute path can't be mistaken for an ffprobe option, even if the name starts with '-'.
        let path = tokio::fs::canonicalize(path)
            .await
            .with_context(|| format!("Failed to resolve {}", path.display()))?;

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(&path)
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let probe_data: serde_json::Value =
            serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe output")?;

        let metadata = parse_probe_output(&probe_data, size_bytes);

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            video_duration = ?metadata.duration,
            width = ?metadata.width,
            height = ?metadata.height,
            "Video probe completed"
        );

        Ok(metadata)
    }
}

#[async_trait]
impl MetadataProbe for MetadataExtractor {
    async fn extract(&self, file: &MediaFile) -> ExtractedMetadata {
        match self.probe(file).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(
                    file = %file.name(),
                    error = %e,
                    "Metadata extraction failed, continuing without it"
                );
                ExtractedMetadata::size_only(file.size())
            }
        }
    }
}

/// Pull duration and dimensions out of `ffprobe -print_format json` output.
/// Missing or malformed fields are left empty.
fn parse_probe_output(probe_data: &serde_json::Value, size_bytes: u64) -> ExtractedMetadata {
    let stream = probe_data["streams"].get(0);
    let format = &probe_data["format"];

    let duration = format["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            stream
                .and_then(|s| s["duration"].as_str())
                .and_then(|d| d.parse::<f64>().ok())
        })
        .filter(|d| d.is_finite() && *d >= 0.0);

    let dimension = |key: &str| {
        stream
            .and_then(|s| s[key].as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
    };

    ExtractedMetadata {
        duration,
        width: dimension("width"),
        height: dimension("height"),
        ..ExtractedMetadata::size_only(size_bytes)
    }
}
