use lectern_core::config::parse_extensions;
use lectern_core::models::{extension_of, MediaFile, UploadRequest};
use lectern_core::UploadError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Validation errors raised before any network activity
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("File size ({actual_mb:.1}MB) exceeds the maximum allowed size ({max_mb}MB)")]
    FileTooLarge { actual_mb: f64, max_mb: f64 },

    #[error("File type {extension} is not supported. Accepted formats: {}", .allowed.join(", "))]
    UnsupportedExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("File {filename} has no extension. Accepted formats: {}", .allowed.join(", "))]
    MissingExtension {
        filename: String,
        allowed: Vec<String>,
    },

    #[error("File is empty")]
    EmptyFile,
}

impl From<ValidationError> for UploadError {
    fn from(err: ValidationError) -> Self {
        UploadError::Validation(err.to_string())
    }
}

/// Upload file validator
///
/// Checks size against a ceiling and the extension against an allow-list.
/// Pure and synchronous.
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_size_mb: f64,
    accepted_extensions: Vec<String>,
}

impl FileValidator {
    /// Extensions are normalized, so `mp4`, `.MP4` and `.mp4` are equivalent.
    pub fn new(max_size_mb: f64, accepted_extensions: &[String]) -> Self {
        Self {
            max_size_mb,
            accepted_extensions: parse_extensions(&accepted_extensions.join(",")),
        }
    }

    pub fn accepted_extensions(&self) -> &[String] {
        &self.accepted_extensions
    }

    /// Validate file size
    pub fn validate_file_size(&self, size_bytes: u64) -> Result<(), ValidationError> {
        if size_bytes == 0 {
            return Err(ValidationError::EmptyFile);
        }

        let actual_mb = size_bytes as f64 / BYTES_PER_MB;
        if actual_mb > self.max_size_mb {
            return Err(ValidationError::FileTooLarge {
                actual_mb,
                max_mb: self.max_size_mb,
            });
        }

        Ok(())
    }

    /// Validate file extension
    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = extension_of(filename).ok_or_else(|| {
            ValidationError::MissingExtension {
                filename: filename.to_string(),
                allowed: self.accepted_extensions.clone(),
            }
        })?;

        if !self.accepted_extensions.contains(&extension) {
            return Err(ValidationError::UnsupportedExtension {
                extension,
                allowed: self.accepted_extensions.clone(),
            });
        }

        Ok(())
    }

    /// Size first, then extension. The first failing check is reported.
    pub fn validate(&self, file: &MediaFile) -> Result<(), ValidationError> {
        self.validate_file_size(file.size())?;
        self.validate_extension(file.name())?;
        Ok(())
    }
}

/// Validate a file by name and size against a ceiling and an allow-list
pub fn validate_file(
    filename: &str,
    size_bytes: u64,
    max_size_mb: f64,
    accepted_extensions: &[String],
) -> Result<(), ValidationError> {
    let validator = FileValidator::new(max_size_mb, accepted_extensions);
    validator.validate_file_size(size_bytes)?;
    validator.validate_extension(filename)
}

/// Validate the file of an upload attempt against the limits it carries
pub fn validate_request(request: &UploadRequest) -> Result<(), ValidationError> {
    FileValidator::new(request.max_size_mb, &request.accepted_extensions).validate(&request.file)
}
