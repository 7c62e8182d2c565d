use lectern_core::models::{UploadStage, UploadState};
use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// One status line per snapshot, e.g. `[ 20%] uploading   Sending video data...`
pub fn render_state(state: &UploadState) -> String {
    let detail = match state.stage {
        UploadStage::Complete => state
            .result
            .as_ref()
            .map(|result| result.url.clone())
            .unwrap_or_default(),
        UploadStage::Error => state.error.clone().unwrap_or_default(),
        _ => state.message.clone().unwrap_or_default(),
    };

    format!(
        "[{:>3}%] {:<11} {}",
        state.progress,
        state.stage.to_string(),
        truncate_string(&detail, 120)
    )
    .trim_end()
    .to_string()
}

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(Format::default().compact().with_target(false))
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
