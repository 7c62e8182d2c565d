use async_trait::async_trait;
use lectern_core::models::{ExtractedMetadata, MediaFile, UploadStage, UploadState};
use lectern_core::{MediaUploader, UploadError, UploadSettings};
use lectern_processing::MetadataProbe;
use lectern_upload::{UploadCallbacks, UploadController};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

pub const MB: u64 = 1024 * 1024;

/// An upload the controller has started and is waiting on
pub struct PendingCall {
    pub file_name: String,
    pub size: u64,
    pub preset: String,
    respond: oneshot::Sender<Result<Value, UploadError>>,
}

impl PendingCall {
    /// Resolve the call. Returns false if the controller already dropped it.
    pub fn respond(self, response: Result<Value, UploadError>) -> bool {
        self.respond.send(response).is_ok()
    }
}

/// Uploader whose calls are answered by the test, one at a time
pub struct ScriptedUploader {
    calls: mpsc::UnboundedSender<PendingCall>,
    count: AtomicUsize,
}

pub struct UploadScript {
    calls: mpsc::UnboundedReceiver<PendingCall>,
}

impl ScriptedUploader {
    pub fn new() -> (Arc<Self>, UploadScript) {
        let (tx, rx) = mpsc::unbounded_channel();
        let uploader = Arc::new(Self {
            calls: tx,
            count: AtomicUsize::new(0),
        });
        (uploader, UploadScript { calls: rx })
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl UploadScript {
    pub async fn next_call(&mut self) -> PendingCall {
        tokio::time::timeout(Duration::from_secs(5), self.calls.recv())
            .await
            .expect("timed out waiting for an upload call")
            .expect("uploader dropped")
    }
}

#[async_trait]
impl MediaUploader for ScriptedUploader {
    async fn upload(&self, file: &MediaFile, upload_preset: &str) -> Result<Value, UploadError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        let call = PendingCall {
            file_name: file.name().to_string(),
            size: file.size(),
            preset: upload_preset.to_string(),
            respond: tx,
        };
        if self.calls.send(call).is_err() {
            return Err(UploadError::Transport("script closed".to_string()));
        }
        rx.await
            .unwrap_or_else(|_| Err(UploadError::Transport("script dropped the call".to_string())))
    }
}

/// Probe that answers with fixed metadata after an optional delay
pub struct StubProbe {
    metadata: Option<ExtractedMetadata>,
    delay: Duration,
}

impl StubProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            metadata: None,
            delay: Duration::ZERO,
        })
    }

    pub fn returning(metadata: ExtractedMetadata, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            metadata: Some(metadata),
            delay,
        })
    }
}

#[async_trait]
impl MetadataProbe for StubProbe {
    async fn extract(&self, file: &MediaFile) -> ExtractedMetadata {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.metadata
            .clone()
            .unwrap_or_else(|| ExtractedMetadata::size_only(file.size()))
    }
}

/// Everything the callbacks saw, in order
#[derive(Default)]
pub struct Recorded {
    pub states: Mutex<Vec<UploadState>>,
    pub completed: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<UploadError>>,
}

impl Recorded {
    pub fn stages(&self) -> Vec<UploadStage> {
        let states = self.states.lock().unwrap();
        let mut stages: Vec<UploadStage> = Vec::new();
        for state in states.iter() {
            if stages.last() != Some(&state.stage) {
                stages.push(state.stage);
            }
        }
        stages
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<UploadError> {
        self.errors.lock().unwrap().clone()
    }
}

pub fn test_settings() -> UploadSettings {
    UploadSettings {
        max_size_mb: 100.0,
        accepted_extensions: vec![".mp4".to_string(), ".mov".to_string()],
        upload_preset: "course-videos".to_string(),
        narrator_interval: Duration::from_millis(2500),
        ..UploadSettings::default()
    }
}

pub fn recording_callbacks(recorded: &Arc<Recorded>) -> UploadCallbacks {
    let states = Arc::clone(recorded);
    let completed = Arc::clone(recorded);
    let errors = Arc::clone(recorded);
    UploadCallbacks::new()
        .on_state_change(move |state| states.states.lock().unwrap().push(state.clone()))
        .on_upload_complete(move |result| completed.completed.lock().unwrap().push(result.id.clone()))
        .on_upload_error(move |err| errors.errors.lock().unwrap().push(err.clone()))
}

pub struct Harness {
    pub controller: UploadController,
    pub uploader: Arc<ScriptedUploader>,
    pub script: UploadScript,
    pub recorded: Arc<Recorded>,
}

pub fn harness_with(settings: UploadSettings, probe: Arc<StubProbe>) -> Harness {
    let (uploader, script) = ScriptedUploader::new();
    let recorded = Arc::new(Recorded::default());
    let controller = UploadController::with_callbacks(
        settings,
        uploader.clone(),
        probe,
        recording_callbacks(&recorded),
    );
    Harness {
        controller,
        uploader,
        script,
        recorded,
    }
}

pub fn harness() -> Harness {
    harness_with(test_settings(), StubProbe::new())
}

/// Sparse file of `size` bytes; nothing is actually written to disk
pub async fn sparse_file(dir: &Path, name: &str, size: u64) -> MediaFile {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    file.set_len(size).unwrap();
    MediaFile::from_path(&path).await.unwrap()
}

pub fn small_video(name: &str) -> MediaFile {
    MediaFile::from_bytes(name.to_string(), vec![7u8; 2048])
}

pub fn success_body(id: &str, bytes: u64) -> Value {
    json!({
        "public_id": id,
        "secure_url": format!("https://media.example.com/video/upload/{}.mp4", id),
        "bytes": bytes,
        "format": "mp4",
        "duration": 62.4,
        "width": 1920,
        "height": 1080
    })
}

pub async fn wait_for_stage(controller: &UploadController, stage: UploadStage) -> UploadState {
    let mut receiver = controller.subscribe();
    let state = tokio::time::timeout(
        Duration::from_secs(5),
        receiver.wait_for(|state| state.stage == stage),
    )
    .await
    .expect("timed out waiting for stage")
    .expect("controller dropped")
    .clone();
    state
}

/// Let spawned tasks run until they block
pub async fn settle_tasks() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
