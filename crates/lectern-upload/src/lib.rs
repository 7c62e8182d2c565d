//! Upload lifecycle for a single media file
//!
//! `UploadController` owns the `idle -> preparing -> uploading -> processing ->
//! complete | error` state machine, the per-attempt cancellation token and the
//! status narrator. Callers observe it through snapshots and never touch the
//! network layer directly.

pub mod controller;
pub mod narrator;

pub use controller::{UploadCallbacks, UploadController};
pub use narrator::{narrate, NarratorCursor};
