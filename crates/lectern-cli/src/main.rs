//! Lectern CLI - upload a lesson video from the command line.
//!
//! `upload` needs LECTERN_UPLOAD_URL and LECTERN_UPLOAD_PRESET (see `Config::from_env`).
//! `probe` and `validate` work offline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use lectern_api_client::ApiClient;
use lectern_cli::{init_tracing, render_state};
use lectern_core::config::parse_extensions;
use lectern_core::{Config, ErrorMetadata, MediaFile, UploadSettings};
use lectern_processing::{FileValidator, MetadataExtractor, MetadataProbe};
use lectern_upload::{UploadCallbacks, UploadController};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lectern", about = "Media upload pipeline CLI")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, probe and upload a video, printing each state change
    Upload {
        /// Path to the video file
        file: PathBuf,
        /// Upload preset (overrides LECTERN_UPLOAD_PRESET)
        #[arg(long)]
        preset: Option<String>,
        /// Maximum file size in MB (overrides MAX_UPLOAD_SIZE_MB)
        #[arg(long)]
        max_size_mb: Option<f64>,
        /// Comma-separated accepted extensions, e.g. ".mp4,.mov"
        #[arg(long)]
        accept: Option<String>,
    },
    /// Print locally extracted metadata as JSON
    Probe {
        /// Path to the video file
        file: PathBuf,
        /// ffprobe binary (defaults to FFPROBE_PATH, then "ffprobe")
        #[arg(long)]
        ffprobe: Option<String>,
    },
    /// Run the pre-upload checks only
    Validate {
        /// Path to the video file
        file: PathBuf,
        #[arg(long)]
        max_size_mb: Option<f64>,
        #[arg(long)]
        accept: Option<String>,
    },
}

#[derive(Serialize)]
struct UploadOutput {
    result: lectern_core::UploadResult,
    metadata: Option<lectern_core::ExtractedMetadata>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn apply_overrides(settings: &mut UploadSettings, max_size_mb: Option<f64>, accept: Option<String>) {
    if let Some(max_size_mb) = max_size_mb {
        settings.max_size_mb = max_size_mb;
    }
    if let Some(accept) = accept {
        settings.accepted_extensions = parse_extensions(&accept);
    }
}

async fn open_file(path: &Path) -> anyhow::Result<MediaFile> {
    MediaFile::from_path(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))
}

async fn run_upload(
    file: PathBuf,
    preset: Option<String>,
    max_size_mb: Option<f64>,
    accept: Option<String>,
) -> anyhow::Result<()> {
    let mut config = Config::from_env()
        .context("Failed to load configuration. Set LECTERN_UPLOAD_URL and LECTERN_UPLOAD_PRESET")?;
    if let Some(preset) = preset {
        config.settings.upload_preset = preset;
    }
    apply_overrides(&mut config.settings, max_size_mb, accept);
    config.settings.validate()?;

    let client = ApiClient::from_config(&config)?;
    let extractor = MetadataExtractor::new(config.ffprobe_path.clone(), config.settings.metadata_timeout)?;
    let callbacks = UploadCallbacks::new().on_state_change(|state| println!("{}", render_state(state)));
    let controller = UploadController::with_callbacks(
        config.settings.clone(),
        Arc::new(client),
        Arc::new(extractor),
        callbacks,
    );

    let media = open_file(&file).await?;
    let upload = controller.upload(media);
    tokio::pin!(upload);

    let finished = tokio::select! {
        outcome = &mut upload => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    let outcome = match finished {
        Some(outcome) => outcome,
        None => {
            tracing::info!("Interrupted, cancelling upload");
            controller.cancel();
            upload.await
        }
    };

    match outcome {
        Ok(result) => print_json(&UploadOutput {
            result,
            metadata: controller.metadata(),
        }),
        Err(err) => {
            if let Some(action) = err.suggested_action() {
                eprintln!("{}", action);
            }
            Err(anyhow::anyhow!(err.client_message()))
        }
    }
}

async fn run_probe(file: PathBuf, ffprobe: Option<String>) -> anyhow::Result<()> {
    let ffprobe = ffprobe
        .or_else(|| std::env::var("FFPROBE_PATH").ok())
        .filter(|path| !path.is_empty())
        .unwrap_or_else(|| "ffprobe".to_string());
    let extractor = MetadataExtractor::new(ffprobe, UploadSettings::default().metadata_timeout)?;

    let media = open_file(&file).await?;
    let metadata = extractor.extract(&media).await;
    print_json(&metadata)
}

async fn run_validate(file: PathBuf, max_size_mb: Option<f64>, accept: Option<String>) -> anyhow::Result<()> {
    let mut settings = UploadSettings::default();
    apply_overrides(&mut settings, max_size_mb, accept);

    let media = open_file(&file).await?;
    let validator = FileValidator::new(settings.max_size_mb, &settings.accepted_extensions);
    validator.validate(&media)?;

    println!("{} ({}) is ready to upload", media.name(), lectern_core::format_size(media.size()));
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Upload {
            file,
            preset,
            max_size_mb,
            accept,
        } => run_upload(file, preset, max_size_mb, accept).await,
        Commands::Probe { file, ffprobe } => run_probe(file, ffprobe).await,
        Commands::Validate {
            file,
            max_size_mb,
            accept,
        } => run_validate(file, max_size_mb, accept).await,
    }
}
