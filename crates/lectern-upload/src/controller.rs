//! Upload controller - the lifecycle state machine for one media upload
//!
//! ```text
//! idle ──start──▶ preparing ──▶ uploading ──▶ processing ──▶ complete
//!   ▲                │  │            │  │           │
//!   │                │  └──cancel────┘  │           │
//!   └────────────────┘                  └───────────┴──▶ error
//! ```
//!
//! Every attempt gets a fresh generation number and cancellation token. Tasks
//! spawned for an attempt (network upload, metadata extraction, narrator)
//! carry their generation and may only write state while it is still the live
//! one; the check and the write happen under the same lock, so a stale
//! attempt can never overwrite a newer one.
//!
//! Callbacks are queued under that same lock and delivered outside it, one at
//! a time and in queue order, so subscribers see snapshots in the order they
//! were published.

use lectern_api_client::normalize_response;
use lectern_core::models::{
    ExtractedMetadata, MediaFile, UploadRequest, UploadResult, UploadStage, UploadState,
};
use lectern_core::{ErrorMetadata, LogLevel, MediaUploader, UploadError, UploadSettings};
use lectern_processing::{validate_request, MetadataProbe};
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::narrator::{self, narrate, NarratorCursor};

type CompleteCallback = Arc<dyn Fn(&UploadResult) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&UploadError) + Send + Sync>;
type StateCallback = Arc<dyn Fn(&UploadState) + Send + Sync>;

/// Caller hooks. Each is invoked outside the controller lock, so it may call
/// back into the controller.
#[derive(Clone, Default)]
pub struct UploadCallbacks {
    on_upload_complete: Option<CompleteCallback>,
    on_upload_error: Option<ErrorCallback>,
    on_state_change: Option<StateCallback>,
}

impl UploadCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked once per successful attempt
    pub fn on_upload_complete(mut self, f: impl Fn(&UploadResult) + Send + Sync + 'static) -> Self {
        self.on_upload_complete = Some(Arc::new(f));
        self
    }

    /// Invoked once per failed or cancelled attempt. Use
    /// [`UploadError::is_cancellation`] to tell the two apart.
    pub fn on_upload_error(mut self, f: impl Fn(&UploadError) + Send + Sync + 'static) -> Self {
        self.on_upload_error = Some(Arc::new(f));
        self
    }

    /// Invoked with every snapshot the controller publishes, in publish order,
    /// including the short-lived `processing` one a `watch` subscriber may
    /// never observe.
    pub fn on_state_change(mut self, f: impl Fn(&UploadState) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(Arc::new(f));
        self
    }
}

impl Debug for UploadCallbacks {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("UploadCallbacks")
            .field("on_upload_complete", &self.on_upload_complete.is_some())
            .field("on_upload_error", &self.on_upload_error.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}

type Outcome = Result<UploadResult, UploadError>;

enum Notification {
    State(UploadState),
    Complete(UploadResult),
    Error(UploadError),
}

/// Callbacks waiting to be delivered. `draining` is set while some caller is
/// delivering them.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Notification>,
    draining: bool,
}

/// Book-keeping for the live attempt
#[derive(Default)]
struct Attempt {
    generation: u64,
    token: Option<CancellationToken>,
    narrator: Option<CancellationToken>,
    file: Option<MediaFile>,
    /// Resolves `upload()` for this attempt. Dropped unsent on reset.
    outcome: Option<oneshot::Sender<Outcome>>,
}

impl Attempt {
    /// Stop everything the current attempt started and retire its generation.
    fn retire(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.stop_narrator();
        self.outcome = None;
        self.generation += 1;
    }

    fn stop_narrator(&mut self) {
        if let Some(narrator) = self.narrator.take() {
            narrator.cancel();
        }
    }

    fn resolve(&mut self, outcome: Outcome) {
        if let Some(sender) = self.outcome.take() {
            // The receiver is gone when nobody awaits `upload()`.
            let _ = sender.send(outcome);
        }
    }
}

struct Shared {
    settings: UploadSettings,
    uploader: Arc<dyn MediaUploader>,
    probe: Arc<dyn MetadataProbe>,
    callbacks: UploadCallbacks,
    attempt: Mutex<Attempt>,
    outbox: Mutex<Outbox>,
    state: watch::Sender<UploadState>,
    metadata: watch::Sender<Option<ExtractedMetadata>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Attempt> {
        self.attempt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stage(&self) -> UploadStage {
        self.state.borrow().stage
    }

    /// Publish a snapshot and queue its callback. Caller holds the attempt lock.
    fn replace_state(&self, next: UploadState) {
        self.state.send_replace(next.clone());
        self.enqueue(Notification::State(next));
    }

    fn enqueue(&self, notification: Notification) {
        self.outbox().queue.push_back(notification);
    }

    /// Deliver queued callbacks in queue order. Must be called without the
    /// attempt lock held.
    ///
    /// The first caller to find the outbox idle drains it. Concurrent and
    /// re-entrant callers leave their notifications to that drainer.
    fn flush(&self) {
        {
            let mut outbox = self.outbox();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }

        loop {
            let next = {
                let mut outbox = self.outbox();
                match outbox.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            self.deliver(&next);
        }
    }

    fn deliver(&self, notification: &Notification) {
        match notification {
            Notification::State(state) => {
                if let Some(on_state_change) = &self.callbacks.on_state_change {
                    on_state_change(state);
                }
            }
            Notification::Complete(result) => {
                if let Some(on_complete) = &self.callbacks.on_upload_complete {
                    on_complete(result);
                }
            }
            Notification::Error(err) => {
                if let Some(on_error) = &self.callbacks.on_upload_error {
                    on_error(err);
                }
            }
        }
    }

    /// Replace the snapshot if `generation` is still the live attempt.
    fn publish(&self, generation: u64, next: UploadState) -> bool {
        {
            let attempt = self.lock();
            if attempt.generation != generation {
                debug!(generation, stage = %next.stage, "Discarding stale transition");
                return false;
            }
            self.replace_state(next);
        }
        self.flush();
        true
    }

    /// One narrator interval. Returns false once the narrator should stop.
    fn narrate_tick(&self, generation: u64, cursor: &mut NarratorCursor) -> bool {
        {
            let attempt = self.lock();
            if attempt.generation != generation {
                return false;
            }
            let Some(message) = cursor.advance(self.stage()) else {
                return false;
            };
            let mut next = self.state.borrow().clone();
            next.message = Some(message.to_string());
            self.replace_state(next);
        }
        self.flush();
        true
    }

    /// Move the attempt to `complete` or `error` and fire the matching callback.
    fn settle(&self, generation: u64, outcome: Outcome) {
        {
            let mut attempt = self.lock();
            if attempt.generation != generation {
                debug!(generation, "Discarding outcome of a stale attempt");
                return;
            }
            attempt.stop_narrator();
            match &outcome {
                Ok(result) => {
                    self.replace_state(UploadState::completed(result.clone()));
                    self.enqueue(Notification::Complete(result.clone()));
                }
                Err(err) => {
                    self.replace_state(UploadState::failed(err));
                    self.enqueue(Notification::Error(err.clone()));
                }
            }
            attempt.resolve(outcome.clone());
        }

        match &outcome {
            Ok(result) => info!(
                generation,
                media_id = %result.id,
                size_bytes = result.size,
                format = %result.format,
                "Upload complete"
            ),
            Err(err) => log_failure(generation, err),
        }
        self.flush();
    }

    async fn run_attempt(self: Arc<Self>, generation: u64, file: MediaFile, token: CancellationToken) {
        let uploading = UploadState::entering(
            UploadStage::Uploading,
            narrate(UploadStage::Uploading, 0).map(str::to_string),
        );
        if !self.publish(generation, uploading) {
            return;
        }

        // Dropping the upload future on cancellation aborts the transfer.
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(generation, "Upload request aborted");
                return;
            }
            response = self.uploader.upload(&file, &self.settings.upload_preset) => response,
        };

        let body = match response {
            Ok(body) => body,
            Err(err) => {
                self.settle(generation, Err(err));
                return;
            }
        };

        let processing = UploadState::entering(
            UploadStage::Processing,
            narrate(UploadStage::Processing, 0).map(str::to_string),
        );
        if !self.publish(generation, processing) {
            return;
        }

        let outcome = normalize_response(&body, &file);
        self.settle(generation, outcome);
    }

    async fn extract_metadata(
        self: Arc<Self>,
        generation: u64,
        file: MediaFile,
        token: CancellationToken,
    ) {
        let metadata = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            metadata = self.probe.extract(&file) => metadata,
        };

        let attempt = self.lock();
        if attempt.generation != generation {
            return;
        }
        debug!(
            generation,
            duration = ?metadata.duration,
            width = ?metadata.width,
            height = ?metadata.height,
            "Metadata extracted"
        );
        self.metadata.send_replace(Some(metadata));
    }
}

fn log_failure(generation: u64, err: &UploadError) {
    match err.log_level() {
        LogLevel::Debug => debug!(
            generation,
            error_code = err.error_code(),
            error = %err,
            "Upload attempt failed"
        ),
        LogLevel::Warn => warn!(
            generation,
            error_code = err.error_code(),
            error = %err,
            "Upload attempt failed"
        ),
        LogLevel::Error => tracing::error!(
            generation,
            error_code = err.error_code(),
            error = %err,
            "Upload attempt failed"
        ),
    }
}

/// Owns the upload lifecycle of one file input.
///
/// Cheap to clone; clones share the same state. All operations are
/// non-blocking and `start` requires a Tokio runtime.
#[derive(Clone)]
pub struct UploadController {
    shared: Arc<Shared>,
}

impl Debug for UploadController {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("UploadController")
            .field("settings", &self.shared.settings)
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

impl UploadController {
    pub fn new(
        settings: UploadSettings,
        uploader: Arc<dyn MediaUploader>,
        probe: Arc<dyn MetadataProbe>,
    ) -> Self {
        Self::with_callbacks(settings, uploader, probe, UploadCallbacks::default())
    }

    pub fn with_callbacks(
        settings: UploadSettings,
        uploader: Arc<dyn MediaUploader>,
        probe: Arc<dyn MetadataProbe>,
        callbacks: UploadCallbacks,
    ) -> Self {
        // Not fatal. A zero narrator interval only disables message rotation and
        // `start` refuses to run without a preset.
        if let Err(e) = settings.validate() {
            warn!(error = %e, "Upload settings failed validation");
        }

        let (state, _) = watch::channel(UploadState::default());
        let (metadata, _) = watch::channel(None);

        Self {
            shared: Arc::new(Shared {
                settings,
                uploader,
                probe,
                callbacks,
                attempt: Mutex::new(Attempt::default()),
                outbox: Mutex::new(Outbox::default()),
                state,
                metadata,
            }),
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.shared.settings
    }

    /// Current snapshot
    pub fn state(&self) -> UploadState {
        self.shared.state.borrow().clone()
    }

    /// Receiver that always holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.shared.state.subscribe()
    }

    /// File of the current or last attempt. Cleared by `reset`.
    pub fn selected_file(&self) -> Option<MediaFile> {
        self.shared.lock().file.clone()
    }

    /// Metadata of the current attempt, once extraction has finished
    pub fn metadata(&self) -> Option<ExtractedMetadata> {
        self.shared.metadata.borrow().clone()
    }

    pub fn subscribe_metadata(&self) -> watch::Receiver<Option<ExtractedMetadata>> {
        self.shared.metadata.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.shared.stage().is_in_flight()
    }

    /// Begin an upload attempt.
    ///
    /// Returns `Err(UploadError::Busy)` without touching state while another
    /// attempt is in flight, and `Err(UploadError::Internal)` when there is no
    /// runtime or no upload preset. Every other outcome, validation failures
    /// included, is reported through the snapshot and the callbacks. Starting
    /// from `complete` or `error` discards the previous outcome.
    pub fn start(&self, file: MediaFile) -> Result<(), UploadError> {
        self.start_attempt(file).map(|_| ())
    }

    fn start_attempt(&self, file: MediaFile) -> Result<oneshot::Receiver<Outcome>, UploadError> {
        let runtime = Handle::try_current().map_err(|_| {
            UploadError::Internal("UploadController::start requires a Tokio runtime".to_string())
        })?;
        let shared = &self.shared;
        if shared.settings.upload_preset.trim().is_empty() {
            return Err(UploadError::Internal("No upload preset is configured".to_string()));
        }

        let mut attempt = shared.lock();
        if shared.stage().is_in_flight() {
            debug!(file = %file.name(), "Rejecting upload start, an attempt is in flight");
            return Err(UploadError::Busy);
        }

        // The previous attempt's metadata task may still be running.
        attempt.retire();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        attempt.outcome = Some(outcome_tx);
        attempt.file = Some(file.clone());
        let generation = attempt.generation;
        shared.metadata.send_replace(None);

        let request = UploadRequest::new(file, &shared.settings);
        if let Err(e) = validate_request(&request) {
            let err = UploadError::from(e);
            shared.replace_state(UploadState::failed(&err));
            shared.enqueue(Notification::Error(err.clone()));
            attempt.resolve(Err(err.clone()));
            drop(attempt);

            log_failure(generation, &err);
            shared.flush();
            return Ok(outcome_rx);
        }

        let token = CancellationToken::new();
        let narrator_token = CancellationToken::new();
        attempt.token = Some(token.clone());
        attempt.narrator = Some(narrator_token.clone());
        shared.replace_state(UploadState::entering(
            UploadStage::Preparing,
            narrate(UploadStage::Preparing, 0).map(str::to_string),
        ));
        drop(attempt);

        info!(
            generation,
            file = %request.file.name(),
            size_bytes = request.file.size(),
            "Upload attempt started"
        );
        shared.flush();

        runtime.spawn(Arc::clone(shared).extract_metadata(
            generation,
            request.file.clone(),
            token.clone(),
        ));

        let narrator_shared = Arc::clone(shared);
        let period = shared.settings.narrator_interval;
        runtime.spawn(async move {
            let mut cursor = NarratorCursor::default();
            narrator::drive(period, narrator_token, move || {
                narrator_shared.narrate_tick(generation, &mut cursor)
            })
            .await;
        });

        runtime.spawn(Arc::clone(shared).run_attempt(generation, request.file, token));
        Ok(outcome_rx)
    }

    /// Abort the attempt while it is `preparing` or `uploading`.
    ///
    /// Returns the controller to the idle snapshot and reports
    /// `UploadError::Cancelled` to `on_upload_error`. A no-op in any other
    /// stage, so calling it twice is the same as calling it once.
    pub fn cancel(&self) {
        let shared = &self.shared;
        let generation = {
            let mut attempt = shared.lock();
            if !matches!(
                shared.stage(),
                UploadStage::Preparing | UploadStage::Uploading
            ) {
                return;
            }
            let generation = attempt.generation;
            attempt.resolve(Err(UploadError::Cancelled));
            attempt.retire();
            shared.replace_state(UploadState::default());
            shared.enqueue(Notification::Error(UploadError::Cancelled));
            generation
        };

        info!(generation, "Upload cancelled");
        shared.flush();
    }

    /// Tear down any attempt and return to the idle snapshot. Safe in any stage.
    pub fn reset(&self) {
        let shared = &self.shared;
        {
            let mut attempt = shared.lock();
            attempt.retire();
            attempt.file = None;
            shared.metadata.send_replace(None);
            shared.replace_state(UploadState::default());
        }
        debug!("Upload controller reset");
        shared.flush();
    }

    /// Wait until the controller is no longer in flight and return that snapshot.
    pub async fn settled(&self) -> UploadState {
        let mut receiver = self.subscribe();
        let state = match receiver.wait_for(|state| !state.stage.is_in_flight()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// Start an attempt and wait for the outcome of that attempt.
    ///
    /// Resolves with `UploadError::Cancelled` when the attempt is cancelled
    /// or reset away before it settles.
    pub async fn upload(&self, file: MediaFile) -> Result<UploadResult, UploadError> {
        let outcome = self.start_attempt(file)?;
        outcome.await.unwrap_or(Err(UploadError::Cancelled))
    }
}
