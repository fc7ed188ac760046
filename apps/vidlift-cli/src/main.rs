//! vidlift command-line uploader.
//!
//! Uploads one file to a resumable-upload session URL and reports progress
//! until the upload finishes.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vidlift_controller::UploadController;
use vidlift_protocol::{FileSource, UploadEvent};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Resumable-upload session URL.
    url: String,

    /// File to upload.
    file: PathBuf,

    /// Upload identifier (random when omitted).
    #[arg(long)]
    id: Option<String>,

    /// Config file (defaults to ~/.config/vidlift/upload.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured chunk size, in bytes.
    #[arg(long)]
    chunk_size: Option<u64>,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(chunk_size) = cli.chunk_size {
        config.upload.chunk_size = chunk_size;
    }
    config.upload.validate()?;

    let rt = tokio::runtime::Runtime::new()?;
    let succeeded = rt.block_on(run(cli, config))?;

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Drives one upload to a terminal event. Returns `true` on success.
async fn run(cli: Cli, config: config::Config) -> anyhow::Result<bool> {
    let id = cli.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        upload = %id,
        file = %cli.file.display(),
        chunk_size = config.upload.chunk_size,
        "starting upload"
    );

    let controller = UploadController::with_http(config.upload)?;
    let mut events = controller.subscribe();
    controller.start_upload(id.clone(), cli.url, FileSource::path(cli.file))?;

    let mut cancel_requested = false;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c(), if !cancel_requested => {
                res?;
                tracing::info!(upload = %id, "interrupt received, cancelling");
                cancel_requested = true;
                controller.cancel_upload(id.clone())?;
            }
            ev = events.recv() => match ev {
                Some(ev) if ev.id() == id => {
                    if let Some(succeeded) = report(&ev) {
                        controller.shutdown();
                        return Ok(succeeded);
                    }
                }
                Some(_) => {}
                None => anyhow::bail!("upload worker stopped unexpectedly"),
            },
        }
    }
}

/// Logs one event. Returns `Some(success)` for terminal events.
fn report(event: &UploadEvent) -> Option<bool> {
    match event {
        UploadEvent::UploadStarted { total_size, .. } => {
            tracing::info!(total_size, "upload started");
            None
        }
        UploadEvent::UploadProgress { progress, .. } => {
            tracing::info!(progress, "progress {progress}%");
            None
        }
        UploadEvent::UploadPaused { .. } | UploadEvent::UploadResumed { .. } => {
            tracing::info!(event = event.kind(), "state changed");
            None
        }
        UploadEvent::UploadSuccess { .. } => {
            tracing::info!("upload complete");
            Some(true)
        }
        UploadEvent::UploadCancelled { .. } => {
            tracing::warn!("upload cancelled");
            Some(false)
        }
        UploadEvent::UploadError { error, status, .. } => {
            tracing::error!(?status, %error, "upload failed");
            Some(false)
        }
    }
}
