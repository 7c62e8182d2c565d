//! Local file processing for the upload pipeline
//!
//! Everything here runs before (or alongside) the network upload: the
//! validator gates the file, the metadata extractor reads duration and
//! dimensions without sending a byte.

pub mod metadata;
pub mod validator;

pub use metadata::{MetadataExtractor, MetadataProbe};
pub use validator::{validate_file, validate_request, FileValidator, ValidationError};
