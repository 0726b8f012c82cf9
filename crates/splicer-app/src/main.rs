//! Splicer - trim video clips and join them into one file
//!
//! Entry point: parses arguments, builds the timeline, and runs the export.

mod cli;
mod config;

use anyhow::{bail, Context, Result};
use clap::Parser;
use splicer_core::ExportKind;
use splicer_media::{
    DryRunEngine, Engine, ExportCancel, ExportEvent, ExportOrchestrator, ExportOutcome,
    FfmpegEngine,
};
use splicer_timeline::{EditList, MediaFile, Timeline};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Command, JobArgs};
use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Export {
            job,
            output,
            save_edit_list,
            auto_download,
        } => {
            if job.fade.is_some() {
                config.export.fade_seconds = job.fade;
            }
            config.export.validate()?;
            config.ffmpeg.auto_download |= auto_download;

            let timeline = build_timeline(&job)?;
            if let Some(path) = save_edit_list {
                EditList::from_timeline(&timeline)?.save_to_file(&path)?;
                info!(path = %path.display(), "Saved edit list");
            }

            let engine = FfmpegEngine::new(config.ffmpeg.clone());
            let orchestrator = ExportOrchestrator::new(engine, config.export.clone());
            match run_export(&orchestrator, &timeline, export_kind(&job)).await? {
                ExportOutcome::Completed(artifact) => {
                    artifact
                        .write_to(&output)
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                    println!(
                        "Wrote {} ({} bytes, {})",
                        output.display(),
                        artifact.len(),
                        artifact.mime
                    );
                }
                ExportOutcome::Cancelled => bail!("Export cancelled"),
            }
        }
        Command::Plan { job } => {
            if job.fade.is_some() {
                config.export.fade_seconds = job.fade;
            }
            config.export.validate()?;

            let timeline = build_timeline(&job)?;
            let orchestrator = ExportOrchestrator::new(DryRunEngine::new(), config.export);
            run_export(&orchestrator, &timeline, export_kind(&job)).await?;

            for command in orchestrator.session().engine().commands() {
                println!("ffmpeg {command}");
            }
            if timeline.len() > 1 {
                println!("# if stream copy fails, the concat step is re-encoded once");
            }
        }
    }

    Ok(())
}

fn export_kind(job: &JobArgs) -> ExportKind {
    if job.audio {
        ExportKind::Audio
    } else {
        ExportKind::Video
    }
}

/// Build a timeline from the edit list (if any) followed by CLIP arguments.
fn build_timeline(job: &JobArgs) -> Result<Timeline> {
    let mut timeline = match &job.edit_list {
        Some(path) => EditList::load_from_file(path)
            .and_then(|list| list.to_timeline())
            .with_context(|| format!("Failed to load edit list {}", path.display()))?,
        None => Timeline::new(),
    };

    for clip in &job.clips {
        let file = MediaFile::open(&clip.path)
            .with_context(|| format!("Failed to open {}", clip.path.display()))?;
        match timeline.add_clips([file]).first() {
            Some(&id) => timeline
                .set_trim(id, clip.start, clip.end)
                .with_context(|| format!("Bad trim window for {}", clip.path.display()))?,
            None => warn!(path = %clip.path.display(), "Skipping file that is not a video"),
        }
    }

    info!(clips = timeline.len(), "Timeline ready");
    Ok(timeline)
}

/// Run an export, logging its events and cancelling on Ctrl-C.
async fn run_export<E: Engine>(
    orchestrator: &ExportOrchestrator<E>,
    timeline: &Timeline,
    kind: ExportKind,
) -> Result<ExportOutcome> {
    let cancel = ExportCancel::new();
    let snapshot = timeline.snapshot();
    let mut events = orchestrator.subscribe_events();

    let export = orchestrator.export(&snapshot, kind, &cancel);
    tokio::pin!(export);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            result = &mut export => break result,
            event = events.recv() => match event {
                Ok(event) => report(&event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Dropped export events"),
                Err(RecvError::Closed) => {}
            },
            _ = &mut ctrl_c, if !cancel.is_cancelled() => {
                warn!("Interrupted, cancelling after the current step");
                cancel.cancel();
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        report(&event);
    }

    Ok(result?)
}

fn report(event: &ExportEvent) {
    match event {
        ExportEvent::Status(message) => info!("{message}"),
        ExportEvent::Progress(fraction) => info!("Segments: {:.0}%", fraction * 100.0),
        ExportEvent::EngineProgress(ratio) => debug!("Engine: {:.0}%", ratio * 100.0),
    }
}
