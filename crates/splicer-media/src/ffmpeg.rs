//! Native engine backed by an FFmpeg subprocess via ffmpeg-sidecar.
//!
//! The engine namespace is a private temporary directory created on load
//! and deleted when the engine is dropped. Commands run with that directory
//! as their working directory, so artifact names resolve inside it.

use async_trait::async_trait;
use ffmpeg_sidecar::command::{ffmpeg_is_installed, FfmpegCommand};
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use splicer_core::parse_timestamp;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command::EngineCommand;
use crate::engine::{Engine, EngineError, EngineResult, ProgressFn};

/// FFmpeg engine options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegOptions {
    /// Download an FFmpeg build if none is installed.
    pub auto_download: bool,
    /// Parent directory for the scratch namespace (system temp if unset).
    pub scratch_root: Option<PathBuf>,
}

/// Engine that shells out to FFmpeg.
pub struct FfmpegEngine {
    options: FfmpegOptions,
    workspace: Mutex<Option<Arc<TempDir>>>,
}

impl FfmpegEngine {
    /// Create an engine. Nothing happens until `load()`.
    pub fn new(options: FfmpegOptions) -> Self {
        Self {
            options,
            workspace: Mutex::new(None),
        }
    }

    /// Scratch directory, once loaded.
    pub fn workspace_dir(&self) -> Option<PathBuf> {
        self.workspace.lock().as_ref().map(|dir| dir.path().to_path_buf())
    }

    fn resolve(&self, name: &str) -> EngineResult<PathBuf> {
        let dir = self.workspace_dir().ok_or(EngineError::NotLoaded)?;
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(dir.join(name)),
            _ => Err(EngineError::InvalidName(name.to_string())),
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new(FfmpegOptions::default())
    }
}

async fn blocking<T, F>(f: F) -> EngineResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> EngineResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::Command(format!("engine task failed: {e}")))?
}

#[async_trait]
impl Engine for FfmpegEngine {
    async fn load(&self) -> EngineResult<()> {
        if self.workspace.lock().is_some() {
            return Ok(());
        }

        let options = self.options.clone();
        let dir = blocking(move || {
            if !ffmpeg_is_installed() {
                if !options.auto_download {
                    return Err(EngineError::Load(
                        "ffmpeg binary not found on PATH".to_string(),
                    ));
                }
                info!("FFmpeg not found, downloading a static build");
                ffmpeg_sidecar::download::auto_download()
                    .map_err(|e| EngineError::Load(format!("ffmpeg download failed: {e}")))?;
            }

            let mut builder = tempfile::Builder::new();
            builder.prefix("splicer-");
            let dir = match &options.scratch_root {
                Some(root) => builder.tempdir_in(root),
                None => builder.tempdir(),
            }
            .map_err(|e| EngineError::Load(format!("cannot create scratch directory: {e}")))?;
            Ok(dir)
        })
        .await?;

        info!(dir = %dir.path().display(), "FFmpeg engine ready");
        *self.workspace.lock() = Some(Arc::new(dir));
        Ok(())
    }

    async fn write_input(&self, name: &str, data: Arc<[u8]>) -> EngineResult<()> {
        let path = self.resolve(name)?;
        blocking(move || Ok(std::fs::write(path, &data)?)).await
    }

    async fn run_command(
        &self,
        command: &EngineCommand,
        progress: ProgressFn<'_>,
    ) -> EngineResult<()> {
        let dir = self.workspace_dir().ok_or(EngineError::NotLoaded)?;
        let args = command.args().to_vec();
        let hint = command.duration_hint();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::task::spawn_blocking(move || run_ffmpeg(&dir, &args, hint, tx));

        // The channel closes when the subprocess finishes.
        while let Some(ratio) = rx.recv().await {
            progress(ratio);
        }

        task.await
            .map_err(|e| EngineError::Command(format!("engine task failed: {e}")))?
    }

    async fn read_output(&self, name: &str) -> EngineResult<Vec<u8>> {
        let path = self.resolve(name)?;
        let name = name.to_string();
        blocking(move || match std::fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::MissingArtifact(name))
            }
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn remove(&self, name: &str) -> EngineResult<()> {
        let path = self.resolve(name)?;
        blocking(move || Ok(std::fs::remove_file(path)?)).await
    }
}

/// Run one FFmpeg invocation to completion, forwarding progress ratios.
fn run_ffmpeg(
    dir: &Path,
    args: &[String],
    duration_hint: Option<f64>,
    progress: mpsc::UnboundedSender<f64>,
) -> EngineResult<()> {
    debug!(args = ?args, "Spawning ffmpeg");

    let mut command = FfmpegCommand::new();
    command.hide_banner().overwrite().args(args);
    command.as_inner_mut().current_dir(dir);

    let mut child = command.spawn()?;
    let mut total = duration_hint;
    let mut last_error = None;

    let events = child
        .iter()
        .map_err(|e| EngineError::Command(format!("cannot read ffmpeg output: {e}")))?;
    for event in events {
        match event {
            FfmpegEvent::ParsedDuration(parsed) if total.is_none() && parsed.duration > 0.0 => {
                total = Some(parsed.duration);
            }
            FfmpegEvent::Progress(p) => {
                if let (Some(total), Some(elapsed)) = (total, parse_timestamp(&p.time)) {
                    let _ = progress.send((elapsed / total).clamp(0.0, 1.0));
                }
            }
            FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message)
            | FfmpegEvent::Error(message) => {
                debug!(message = %message, "ffmpeg reported an error");
                last_error = Some(message);
            }
            _ => {}
        }
    }

    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(EngineError::Command(match last_error {
            Some(message) => format!("ffmpeg exited with {status}: {message}"),
            None => format!("ffmpeg exited with {status}"),
        }))
    }
}
