use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{
    HttpRecognitionApi, OrchestratorEvent, SelectedFile, UploadOrchestrator, UploadTask,
};
use shared::domain::UploadState;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::{load_settings, Settings};

/// Upload an audio file for speech recognition and save the transcript.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Audio file to recognize (wav, mp3 or mp4 by default).
    file: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    /// Directory the transcript is written to.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    /// TOML settings file; `recognizer.toml` is read when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Stop once the result is ready instead of downloading it.
    #[arg(long)]
    no_download: bool,
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let mut settings = load_settings(self.config.as_deref())?;
        if let Some(v) = &self.server_url {
            settings.server_url = v.clone();
        }
        if let Some(v) = &self.output_dir {
            settings.output_dir = v.clone();
        }
        if let Some(v) = self.poll_interval_ms {
            settings.poll_interval_ms = v;
        }
        settings.normalize()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let settings = args.settings()?;
    init_tracing(&settings.log_level);
    info!(server_url = %settings.server_url, file = %args.file.display(), "starting recognition");

    let api = HttpRecognitionApi::new(&settings.server_url)
        .with_context(|| format!("cannot use server url '{}'", settings.server_url))?;
    let orchestrator = UploadOrchestrator::with_config(Arc::new(api), settings.orchestrator_config());
    let mut events = orchestrator.subscribe();

    let file = SelectedFile::from_path(&args.file).await?;
    orchestrator.submit_file(file).await;

    let finished = tokio::select! {
        finished = follow_progress(&mut events) => finished?,
        _ = tokio::signal::ctrl_c() => {
            println!();
            bail!("interrupted before the task finished");
        }
    };

    match finished.state {
        UploadState::Completed if args.no_download => Ok(ExitCode::SUCCESS),
        UploadState::Completed => {
            let downloaded = orchestrator.download_result().await?;
            tokio::fs::create_dir_all(&settings.output_dir)
                .await
                .with_context(|| {
                    format!(
                        "failed to create output directory '{}'",
                        settings.output_dir.display()
                    )
                })?;
            let name = Path::new(&downloaded.filename)
                .file_name()
                .with_context(|| format!("unusable result filename '{}'", downloaded.filename))?;
            let target = settings.output_dir.join(name);
            tokio::fs::write(&target, &downloaded.bytes)
                .await
                .with_context(|| format!("failed to write '{}'", target.display()))?;
            info!(url = %downloaded.url, path = %target.display(), "result saved");
            println!("Saved transcript to {}", target.display());
            Ok(ExitCode::SUCCESS)
        }
        state => {
            error!(?state, error = ?finished.last_error, "recognition did not complete");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn follow_progress(events: &mut Receiver<OrchestratorEvent>) -> Result<UploadTask> {
    let mut stdout = io::stdout();
    loop {
        match events.recv().await {
            Ok(OrchestratorEvent::ViewChanged(view)) => render::draw(&mut stdout, &view)?,
            Ok(OrchestratorEvent::Finished(task)) => {
                writeln!(stdout)?;
                return Ok(task);
            }
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "progress display lagged"),
            Err(RecvError::Closed) => bail!("orchestrator stopped without finishing"),
        }
    }
}
