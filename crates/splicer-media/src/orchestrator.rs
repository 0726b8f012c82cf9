//! Export orchestration.
//!
//! Turns a timeline snapshot into one output file through a fixed sequence
//! of engine commands:
//!
//! 1. one trim/encode command per clip, in timeline order
//! 2. stream-copy concatenation of the segments
//! 3. a single re-encode concatenation if the stream copy fails
//! 4. retrieval of the output
//!
//! A single clip skips concatenation; its segment is the output. Every
//! artifact the job writes into the engine namespace is removed before the
//! export returns, whatever the outcome. If the export future is dropped
//! mid-job, its artifacts are removed at the start of the next export.

use parking_lot::Mutex;
use splicer_core::{ExportKind, Result, SplicerError};
use splicer_timeline::{Clip, TimelineSnapshot};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::command::{ConcatCommand, ConcatManifest, EngineCommand, SegmentCommand, MANIFEST_NAME};
use crate::engine::{Engine, EngineResult};
use crate::export::{
    BusyPolicy, CodecProfile, ExportArtifact, ExportCancel, ExportEvent, ExportOutcome,
    ExportSettings, JobState,
};
use crate::session::{EngineSession, EngineState};

/// Engine-side name of clip `index`'s source bytes.
pub fn input_name(index: usize, clip: &Clip) -> String {
    let ext = clip.extension().unwrap_or_else(|| "mp4".to_string());
    format!("input{index}.{ext}")
}

/// Engine-side name of clip `index`'s encoded segment.
pub fn segment_name(index: usize, kind: ExportKind) -> String {
    format!("seg{index}.{}", kind.extension())
}

/// Engine-side name of the concatenated output.
pub fn output_name(kind: ExportKind) -> String {
    format!("output.{}", kind.extension())
}

/// Bookkeeping for one export run.
struct ExportJob {
    kind: ExportKind,
    total: usize,
    profile: CodecProfile,
    /// Segment names in timeline order.
    segments: Vec<String>,
    /// Every name written (or about to be written) into the engine namespace.
    scratch: Vec<String>,
}

impl ExportJob {
    fn new(kind: ExportKind, total: usize, profile: CodecProfile) -> Self {
        Self {
            kind,
            total,
            profile,
            segments: Vec::with_capacity(total),
            scratch: Vec::new(),
        }
    }

    fn track(&mut self, name: &str) {
        if !self.scratch.iter().any(|n| n == name) {
            self.scratch.push(name.to_string());
        }
    }
}

/// Owns a running job until it reaches a terminal state.
///
/// Dropped unsettled means the export future was dropped: the job is marked
/// cancelled and its scratch names are left for the next export to remove.
struct JobGuard<'a> {
    state: &'a watch::Sender<JobState>,
    orphans: &'a Mutex<Vec<String>>,
    job: ExportJob,
    settled: bool,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(
            leftover = self.job.scratch.len(),
            "Export dropped mid-job, deferring cleanup"
        );
        self.state.send_replace(JobState::Cancelled);
        self.orphans.lock().append(&mut self.job.scratch);
    }
}

/// Drives exports against a single engine session.
///
/// At most one export runs at a time; see [`BusyPolicy`].
pub struct ExportOrchestrator<E> {
    session: EngineSession<E>,
    settings: ExportSettings,
    job_lock: tokio::sync::Mutex<()>,
    state: watch::Sender<JobState>,
    events: broadcast::Sender<ExportEvent>,
    last_status: Mutex<String>,
    /// Scratch names left behind by dropped exports.
    orphans: Mutex<Vec<String>>,
}

impl<E: Engine> ExportOrchestrator<E> {
    /// Create an orchestrator owning `engine`.
    pub fn new(engine: E, settings: ExportSettings) -> Self {
        let (state, _) = watch::channel(JobState::Idle);
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        Self {
            session: EngineSession::new(engine),
            settings,
            job_lock: tokio::sync::Mutex::new(()),
            state,
            events,
            last_status: Mutex::new(String::new()),
            orphans: Mutex::new(Vec::new()),
        }
    }

    /// The engine session.
    pub fn session(&self) -> &EngineSession<E> {
        &self.session
    }

    /// Active settings.
    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Current job state.
    pub fn job_state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Watch job state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    /// Receive status and progress events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExportEvent> {
        self.events.subscribe()
    }

    /// Most recent status message.
    pub fn last_status(&self) -> String {
        self.last_status.lock().clone()
    }

    /// Names awaiting removal after a dropped export.
    pub fn pending_cleanup(&self) -> Vec<String> {
        self.orphans.lock().clone()
    }

    /// Load the engine if needed, reporting status along the way.
    ///
    /// A session stuck in `LoadFailed` fails without publishing a status;
    /// no load is attempted until `retry_load`.
    pub async fn ensure_loaded(&self) -> Result<()> {
        match self.session.state() {
            EngineState::Ready | EngineState::LoadFailed(_) => {
                return self.session.ensure_loaded().await
            }
            EngineState::Unloaded | EngineState::Loading => {}
        }
        self.status("Loading transcoding engine...");
        match self.session.ensure_loaded().await {
            Ok(()) => {
                self.status("Transcoding engine loaded");
                Ok(())
            }
            Err(e) => {
                self.status(format!("Engine failed to load: {e}"));
                Err(e)
            }
        }
    }

    /// Export a snapshot as one file.
    ///
    /// Returns `Cancelled` if `cancel` fires between stages. Fails with
    /// `EmptyTimeline`, `EngineBusy`, `EngineLoad`, `SegmentEncode`,
    /// `Concatenation` or `Retrieval`.
    ///
    /// Requests that never start a job (empty timeline, busy, queued) do
    /// not publish status, so they cannot overwrite a running job's line.
    /// Dropping the returned future mid-job sets the job state to
    /// `Cancelled`; the job's artifacts are removed once the next export
    /// takes the engine.
    pub async fn export(
        &self,
        snapshot: &TimelineSnapshot,
        kind: ExportKind,
        cancel: &ExportCancel,
    ) -> Result<ExportOutcome> {
        if snapshot.is_empty() {
            debug!("Export refused: timeline is empty");
            return Err(SplicerError::EmptyTimeline);
        }

        let _lock = match self.settings.busy_policy {
            BusyPolicy::Reject => self.job_lock.try_lock().map_err(|_| {
                warn!("Export rejected: another export is running");
                SplicerError::EngineBusy
            })?,
            BusyPolicy::Queue => {
                if self.job_state().is_active() {
                    info!("Waiting for the running export to finish");
                }
                self.job_lock.lock().await
            }
        };
        self.sweep_orphans().await;

        info!(clips = snapshot.len(), %kind, "Starting export");
        self.status(format!("Starting {kind} export..."));

        let mut guard = JobGuard {
            state: &self.state,
            orphans: &self.orphans,
            job: ExportJob::new(kind, snapshot.len(), self.settings.profile(kind)),
            settled: false,
        };
        let result = self.run_job(&mut guard.job, snapshot, cancel).await;
        self.release(&guard.job).await;
        guard.settled = true;

        match result {
            Ok(ExportOutcome::Completed(artifact)) => {
                info!(bytes = artifact.len(), mime = artifact.mime, "Export complete");
                self.state.send_replace(JobState::Done(artifact.clone()));
                self.status(format!("Export complete: {}", artifact.file_name));
                Ok(ExportOutcome::Completed(artifact))
            }
            Ok(ExportOutcome::Cancelled) => {
                info!("Export cancelled");
                self.state.send_replace(JobState::Cancelled);
                self.status("Export cancelled");
                Ok(ExportOutcome::Cancelled)
            }
            Err(e) => {
                error!(error = %e, "Export failed");
                self.state.send_replace(JobState::Failed(e.to_string()));
                self.status(format!("Export failed: {e}"));
                Err(e)
            }
        }
    }

    async fn run_job(
        &self,
        job: &mut ExportJob,
        snapshot: &TimelineSnapshot,
        cancel: &ExportCancel,
    ) -> Result<ExportOutcome> {
        self.ensure_loaded().await?;
        let engine = self.session.engine();

        for (index, clip) in snapshot.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(ExportOutcome::Cancelled);
            }
            self.state.send_replace(JobState::Segmenting {
                index,
                total: job.total,
            });
            self.status(format!("Creating segment {}/{}...", index + 1, job.total));

            let segment_failed = |message: String| SplicerError::SegmentEncode { index, message };

            let input = input_name(index, clip);
            job.track(&input);
            engine
                .write_input(&input, clip.source.shared())
                .await
                .map_err(|e| segment_failed(e.to_string()))?;

            let output = segment_name(index, job.kind);
            let command = SegmentCommand::new(&input, &output, job.profile.clone())
                .with_trim(clip.trim())
                .with_fade(self.settings.fade_seconds)
                .build()?;
            job.track(&output);
            self.run(&command)
                .await
                .map_err(|e| segment_failed(e.to_string()))?;

            debug!(index, segment = %output, "Segment created");
            job.segments.push(output);
            self.progress((index + 1) as f64 / job.total as f64);
        }

        if cancel.is_cancelled() {
            return Ok(ExportOutcome::Cancelled);
        }

        let final_name = if job.segments.len() == 1 {
            job.segments[0].clone()
        } else {
            match self.concatenate(job, cancel).await? {
                Some(name) => name,
                None => return Ok(ExportOutcome::Cancelled),
            }
        };

        if cancel.is_cancelled() {
            return Ok(ExportOutcome::Cancelled);
        }

        self.state.send_replace(JobState::Retrieving);
        self.status("Export complete, preparing download...");
        let data = engine
            .read_output(&final_name)
            .await
            .map_err(|e| SplicerError::Retrieval(e.to_string()))?;

        Ok(ExportOutcome::Completed(ExportArtifact {
            data: data.into(),
            mime: job.kind.mime(),
            file_name: job.kind.default_file_name().to_string(),
        }))
    }

    /// Join segments. Returns `None` if cancelled before the fallback.
    async fn concatenate(
        &self,
        job: &mut ExportJob,
        cancel: &ExportCancel,
    ) -> Result<Option<String>> {
        let engine = self.session.engine();
        self.state.send_replace(JobState::Concatenating);
        self.status("Concatenating segments...");

        let manifest = ConcatManifest::new(job.segments.iter().cloned());
        job.track(MANIFEST_NAME);
        engine
            .write_input(MANIFEST_NAME, manifest.to_string().into_bytes().into())
            .await
            .map_err(|e| SplicerError::Concatenation(e.to_string()))?;

        let output = output_name(job.kind);
        job.track(&output);

        let fast = ConcatCommand::stream_copy(MANIFEST_NAME, &output).build()?;
        match self.run(&fast).await {
            Ok(()) => return Ok(Some(output)),
            Err(e) => warn!(error = %e, "Stream-copy concatenation failed, falling back to re-encode"),
        }

        if cancel.is_cancelled() {
            return Ok(None);
        }

        self.status("Codec copy failed, re-encoding... This may take a while.");
        // A failed copy can leave a partial file behind.
        if let Err(e) = engine.remove(&output).await {
            debug!(error = %e, name = %output, "No partial output to remove");
        }

        let slow = ConcatCommand::re_encode(MANIFEST_NAME, &output, job.profile.clone()).build()?;
        self.run(&slow)
            .await
            .map_err(|e| SplicerError::Concatenation(e.to_string()))?;
        Ok(Some(output))
    }

    async fn run(&self, command: &EngineCommand) -> EngineResult<()> {
        debug!(command = %command, "Running engine command");
        let events = self.events.clone();
        let progress = move |ratio: f64| {
            let _ = events.send(ExportEvent::EngineProgress(ratio.clamp(0.0, 1.0)));
        };
        self.session.engine().run_command(command, &progress).await
    }

    /// Remove artifacts left by a dropped export. Caller holds `job_lock`.
    async fn sweep_orphans(&self) {
        let engine = self.session.engine();
        // Names stay queued until their removal is attempted.
        loop {
            let Some(name) = self.orphans.lock().pop() else {
                break;
            };
            debug!(name = %name, "Removing artifact of a dropped export");
            if let Err(e) = engine.remove(&name).await {
                debug!(error = %e, name = %name, "Cleanup skipped");
            }
        }
    }

    /// Best-effort removal of everything the job put in the namespace.
    async fn release(&self, job: &ExportJob) {
        let engine = self.session.engine();
        for name in job.scratch.iter().rev() {
            if let Err(e) = engine.remove(name).await {
                debug!(error = %e, name = %name, "Cleanup skipped");
            }
        }
    }

    fn status(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(status = %message);
        *self.last_status.lock() = message.clone();
        let _ = self.events.send(ExportEvent::Status(message));
    }

    fn progress(&self, fraction: f64) {
        let _ = self.events.send(ExportEvent::Progress(fraction));
    }
}
