//! Lectern Core Library
//!
//! This crate provides the domain models, error types, configuration and transport
//! seam shared by every Lectern upload component.

pub mod config;
pub mod error;
pub mod models;
pub mod transport;

// Re-export commonly used types
pub use config::{Config, UploadSettings, DEFAULT_ACCEPTED_EXTENSIONS};
pub use error::{ErrorMetadata, LogLevel, UploadError};
pub use models::{
    format_size, ExtractedMetadata, FileSource, MediaFile, UploadRequest, UploadResult,
    UploadStage, UploadState,
};
pub use transport::MediaUploader;
