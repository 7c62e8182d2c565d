//! Data models for the upload pipeline
//!
//! `media` holds the input side (the selected file and what we learn about it
//! locally), `upload` holds the lifecycle snapshot and the normalized result.

mod media;
mod upload;

// Re-export all models for convenient imports
pub use media::*;
pub use upload::*;
