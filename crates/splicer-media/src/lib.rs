//! Splicer Media - transcoder engine integration and export pipeline
//!
//! This crate handles:
//! - The narrow engine contract (load, write, run, read, remove)
//! - Engine session lifecycle with load-once semantics
//! - Typed command building for trim and concat operations
//! - The export orchestrator: segments, concatenation with fallback, retrieval
//! - An FFmpeg-backed engine and a dry-run engine

pub mod command;
pub mod dry_run;
pub mod engine;
pub mod export;
pub mod ffmpeg;
pub mod orchestrator;
pub mod session;

pub use command::{ConcatCommand, ConcatManifest, EngineCommand, SegmentCommand};
pub use dry_run::DryRunEngine;
pub use engine::{Engine, EngineError, EngineResult, ProgressFn};
pub use export::{
    BusyPolicy, CodecProfile, ExportArtifact, ExportCancel, ExportEvent, ExportOutcome,
    ExportSettings, JobState,
};
pub use ffmpeg::{FfmpegEngine, FfmpegOptions};
pub use orchestrator::ExportOrchestrator;
pub use session::{EngineSession, EngineState};
