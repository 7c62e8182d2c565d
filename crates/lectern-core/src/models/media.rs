//! Selected media file, the per-attempt upload request and locally extracted metadata.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::config::UploadSettings;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Where the bytes of a selected file live
#[derive(Debug, Clone)]
pub enum FileSource {
    /// File on the local filesystem, read lazily when the upload starts
    Path(PathBuf),
    /// Bytes already held in memory (drag-and-drop buffers, tests)
    Memory(Bytes),
}

/// Handle to a file chosen for upload. Cheap to clone, never mutated.
#[derive(Debug, Clone)]
pub struct MediaFile {
    name: String,
    size: u64,
    source: FileSource,
}

impl MediaFile {
    /// Open a file on disk. Only its metadata is read here.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Invalid file name: {}", path.display()),
                )
            })?;

        Ok(Self {
            name,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn size_mb(&self) -> f64 {
        self.size as f64 / BYTES_PER_MB
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Lowercase extension with a leading dot, e.g. `.mp4`
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    /// Load the raw bytes. Memory sources are returned without copying.
    pub async fn read(&self) -> io::Result<Bytes> {
        match &self.source {
            FileSource::Path(path) => tokio::fs::read(path).await.map(Bytes::from),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Extension of a file name: text after the last `.`, lowercased and dot-prefixed.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, extension) = name.rsplit_once('.')?;
    if extension.is_empty() {
        return None;
    }
    Some(format!(".{}", extension.to_lowercase()))
}

/// Immutable input of one upload attempt: the file plus the limits it is checked against.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: MediaFile,
    pub max_size_mb: f64,
    pub accepted_extensions: Vec<String>,
}

impl UploadRequest {
    pub fn new(file: MediaFile, settings: &UploadSettings) -> Self {
        Self {
            file,
            max_size_mb: settings.max_size_mb,
            accepted_extensions: settings.accepted_extensions.clone(),
        }
    }
}

/// Metadata read locally from the file without uploading anything.
///
/// Extraction is best effort: `duration`, `width` and `height` stay `None`
/// when the probe cannot determine them. `size` is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size: String,
}

impl ExtractedMetadata {
    /// Metadata for a file the probe could not read
    pub fn size_only(size_bytes: u64) -> Self {
        Self {
            duration: None,
            width: None,
            height: None,
            size: format_size(size_bytes),
        }
    }

    pub fn has_dimensions(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }
}

/// Human-readable byte size, e.g. `50.0 MB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}
