//! Export settings, job state, and the types an export hands back.

use serde::{Deserialize, Serialize};
use splicer_core::{ExportKind, Result, SplicerError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ── Settings ────────────────────────────────────────────────────

/// What to do when an export is requested while another is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Fail immediately with `EngineBusy`.
    #[default]
    Reject,
    /// Wait for the running export to finish.
    Queue,
}

/// Export configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Video encoder for video exports.
    pub video_codec: String,
    /// Encoder speed preset.
    pub video_preset: String,
    /// Audio encoder used alongside video.
    pub audio_codec: String,
    /// Audio encoder for audio-only exports.
    pub audio_only_codec: String,
    /// Fade each segment in and out over this many seconds.
    pub fade_seconds: Option<f64>,
    /// Behaviour when the engine is already exporting.
    pub busy_policy: BusyPolicy,
    /// Buffered events per subscriber before old ones are dropped.
    pub event_capacity: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".into(),
            video_preset: "veryfast".into(),
            audio_codec: "aac".into(),
            audio_only_codec: "libmp3lame".into(),
            fade_seconds: None,
            busy_policy: BusyPolicy::Reject,
            event_capacity: 256,
        }
    }
}

impl ExportSettings {
    /// Codec profile for an export kind.
    pub fn profile(&self, kind: ExportKind) -> CodecProfile {
        match kind {
            ExportKind::Video => CodecProfile::Video {
                video_codec: self.video_codec.clone(),
                preset: self.video_preset.clone(),
                audio_codec: self.audio_codec.clone(),
            },
            ExportKind::Audio => CodecProfile::Audio {
                audio_codec: self.audio_only_codec.clone(),
            },
        }
    }

    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let settings: Self = serde_json::from_slice(data)
            .map_err(|e| SplicerError::Serialization(format!("Invalid export settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if let Some(fade) = self.fade_seconds {
            if !fade.is_finite() || fade <= 0.0 {
                return Err(SplicerError::Serialization(format!(
                    "fade_seconds must be positive, got {}",
                    fade
                )));
            }
        }
        if self.event_capacity == 0 {
            return Err(SplicerError::Serialization(
                "event_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Encoder arguments shared by segment extraction and fallback concat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecProfile {
    /// Re-encode video and audio.
    Video {
        video_codec: String,
        preset: String,
        audio_codec: String,
    },
    /// Drop video, encode audio only.
    Audio { audio_codec: String },
}

impl CodecProfile {
    /// Export kind this profile produces.
    pub fn kind(&self) -> ExportKind {
        match self {
            Self::Video { .. } => ExportKind::Video,
            Self::Audio { .. } => ExportKind::Audio,
        }
    }

    /// True if the output keeps a video stream.
    pub fn keeps_video(&self) -> bool {
        matches!(self, Self::Video { .. })
    }

    /// Encoder flags.
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Video {
                video_codec,
                preset,
                audio_codec,
            } => vec![
                "-c:v".into(),
                video_codec.clone(),
                "-preset".into(),
                preset.clone(),
                "-c:a".into(),
                audio_codec.clone(),
            ],
            Self::Audio { audio_codec } => {
                vec!["-vn".into(), "-c:a".into(), audio_codec.clone()]
            }
        }
    }
}

// ── Job state and results ────────────────────────────────────────

/// The finished export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    /// Encoded bytes.
    pub data: Arc<[u8]>,
    /// MIME type (`video/mp4` or `audio/mpeg`).
    pub mime: &'static str,
    /// Suggested download name.
    pub file_name: String,
}

impl ExportArtifact {
    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the artifact is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write the artifact to disk.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

/// How an export ended, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Completed(ExportArtifact),
    Cancelled,
}

impl ExportOutcome {
    /// The artifact, if the export completed.
    pub fn artifact(&self) -> Option<&ExportArtifact> {
        match self {
            Self::Completed(artifact) => Some(artifact),
            Self::Cancelled => None,
        }
    }
}

/// Observable state of the current export job.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum JobState {
    #[default]
    Idle,
    Segmenting {
        index: usize,
        total: usize,
    },
    Concatenating,
    Retrieving,
    Done(ExportArtifact),
    Failed(String),
    Cancelled,
}

impl JobState {
    /// True while a job is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Segmenting { .. } | Self::Concatenating | Self::Retrieving
        )
    }
}

/// Notifications published while an export runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    /// Human-readable status line.
    Status(String),
    /// Fraction of clips segmented so far.
    Progress(f64),
    /// Progress reported by the engine inside the current command.
    EngineProgress(f64),
}

/// Handle for cancelling an in-progress export.
#[derive(Debug, Clone)]
pub struct ExportCancel(Arc<AtomicBool>);

impl ExportCancel {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for ExportCancel {
    fn default() -> Self {
        Self::new()
    }
}
