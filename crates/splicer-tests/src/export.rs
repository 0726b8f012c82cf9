//! Integration tests for the export pipeline.
//!
//! Runs the orchestrator against a scripted in-memory engine so every
//! failure path can be forced deterministically.

use splicer_core::{ExportKind, SplicerError};
use splicer_media::{
    BusyPolicy, EngineState, ExportCancel, ExportEvent, ExportOrchestrator, ExportOutcome,
    ExportSettings, JobState,
};
use splicer_timeline::Timeline;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::support::{timeline_of, video, ScriptedEngine};

// ── Helpers ────────────────────────────────────────────────────

fn orchestrator(engine: &Arc<ScriptedEngine>) -> ExportOrchestrator<Arc<ScriptedEngine>> {
    ExportOrchestrator::new(Arc::clone(engine), ExportSettings::default())
}

fn queued(engine: &Arc<ScriptedEngine>) -> ExportOrchestrator<Arc<ScriptedEngine>> {
    let settings = ExportSettings {
        busy_policy: BusyPolicy::Queue,
        ..ExportSettings::default()
    };
    ExportOrchestrator::new(Arc::clone(engine), settings)
}

async fn export(
    orchestrator: &ExportOrchestrator<Arc<ScriptedEngine>>,
    timeline: &Timeline,
    kind: ExportKind,
) -> splicer_core::Result<ExportOutcome> {
    orchestrator
        .export(&timeline.snapshot(), kind, &ExportCancel::new())
        .await
}

fn statuses(events: &[ExportEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            ExportEvent::Status(s) => Some(s.as_str()),
            _ => None,
        })
        .collect()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<ExportEvent>) -> Vec<ExportEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── Happy paths ────────────────────────────────────────────────

#[tokio::test]
async fn three_clips_join_in_timeline_order() {
    let engine = ScriptedEngine::new();
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4", "c.mp4"]);

    let outcome = export(&orchestrator, &timeline, ExportKind::Video).await.unwrap();
    let artifact = outcome.artifact().unwrap();
    assert_eq!(&*artifact.data, b"a.mp4b.mp4c.mp4");
    assert_eq!(artifact.mime, "video/mp4");
    assert_eq!(artifact.file_name, "edited-video.mp4");

    let outputs: Vec<_> = engine.commands().iter().map(|c| c.output().to_string()).collect();
    assert_eq!(outputs, ["seg0.mp4", "seg1.mp4", "seg2.mp4", "output.mp4"]);
    assert!(engine.concat_commands()[0].has_flag("-c", "copy"));
    assert!(engine.artifacts().is_empty());
    assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_trimmed_clip_skips_concat() {
    let engine = ScriptedEngine::new();
    let orchestrator = orchestrator(&engine);
    let mut timeline = timeline_of(&["only.mp4"]);
    let id = timeline.clips()[0].id;
    timeline.set_trim(id, 2.0, Some(5.0)).unwrap();

    let outcome = export(&orchestrator, &timeline, ExportKind::Video).await.unwrap();
    assert_eq!(&*outcome.artifact().unwrap().data, b"only.mp4");

    let commands = engine.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].has_flag("-ss", "2"));
    assert!(commands[0].has_flag("-t", "3"));
    assert!(engine.concat_commands().is_empty());
    assert!(engine.artifacts().is_empty());
}

#[tokio::test]
async fn untrimmed_end_omits_duration() {
    let engine = ScriptedEngine::new();
    let orchestrator = orchestrator(&engine);
    let mut timeline = timeline_of(&["a.mp4"]);
    let id = timeline.clips()[0].id;
    timeline.set_trim(id, 1.5, None).unwrap();

    export(&orchestrator, &timeline, ExportKind::Video).await.unwrap();
    let command = &engine.commands()[0];
    assert!(command.has_flag("-ss", "1.5"));
    assert!(!command.args().iter().any(|a| a == "-t"));
}

#[tokio::test]
async fn audio_export_drops_video() {
    let engine = ScriptedEngine::new();
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4"]);

    let outcome = export(&orchestrator, &timeline, ExportKind::Audio).await.unwrap();
    let artifact = outcome.artifact().unwrap();
    assert_eq!(artifact.mime, "audio/mpeg");
    assert_eq!(artifact.file_name, "edited-audio.mp3");

    let commands = engine.commands();
    assert_eq!(commands[0].output(), "seg0.mp3");
    assert!(commands[0].args().iter().any(|a| a == "-vn"));
    assert!(commands[0].has_flag("-c:a", "libmp3lame"));
    assert_eq!(commands[2].output(), "output.mp3");
}

#[tokio::test]
async fn export_uses_snapshot_not_live_timeline() {
    let engine = ScriptedEngine::new();
    let orchestrator = orchestrator(&engine);
    let mut timeline = timeline_of(&["a.mp4", "b.mp4"]);
    let snapshot = timeline.snapshot();
    let first = timeline.clips()[0].id;
    timeline.remove_clip(first).unwrap();
    timeline.add_clips([video("late.mp4")]);

    let outcome = orchestrator
        .export(&snapshot, ExportKind::Video, &ExportCancel::new())
        .await
        .unwrap();
    assert_eq!(&*outcome.artifact().unwrap().data, b"a.mp4b.mp4");
}

// ── Failures ───────────────────────────────────────────────────

#[tokio::test]
async fn empty_timeline_never_touches_engine() {
    let engine = ScriptedEngine::new();
    let orchestrator = orchestrator(&engine);

    let err = export(&orchestrator, &Timeline::new(), ExportKind::Video)
        .await
        .unwrap_err();
    assert!(matches!(err, SplicerError::EmptyTimeline));
    assert_eq!(engine.loads.load(Ordering::SeqCst), 0);
    assert!(engine.commands().is_empty());
    assert_eq!(orchestrator.job_state(), JobState::Idle);
}

#[tokio::test]
async fn failed_stream_copy_falls_back_once() {
    let engine = ScriptedEngine::new();
    engine.fail_stream_copy.store(true, Ordering::SeqCst);
    let orchestrator = orchestrator(&engine);
    let mut events = orchestrator.subscribe_events();
    let timeline = timeline_of(&["a.mp4", "b.mp4"]);

    let outcome = export(&orchestrator, &timeline, ExportKind::Video).await.unwrap();
    assert_eq!(&*outcome.artifact().unwrap().data, b"a.mp4b.mp4");

    let concats = engine.concat_commands();
    assert_eq!(concats.len(), 2);
    assert!(concats[0].has_flag("-c", "copy"));
    assert!(concats[1].has_flag("-c:v", "libx264"));
    assert!(drain(&mut events).iter().any(
        |e| matches!(e, ExportEvent::Status(s) if s.contains("re-encoding"))
    ));
    assert!(engine.artifacts().is_empty());
}

#[tokio::test]
async fn both_concats_failing_reports_concatenation_error() {
    let engine = ScriptedEngine::new();
    engine.fail_stream_copy.store(true, Ordering::SeqCst);
    engine.fail_reencode_concat.store(true, Ordering::SeqCst);
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4", "c.mp4"]);

    let err = export(&orchestrator, &timeline, ExportKind::Video)
        .await
        .unwrap_err();
    assert!(matches!(err, SplicerError::Concatenation(_)), "{err}");
    assert_eq!(engine.concat_commands().len(), 2);
    assert!(engine.artifacts().is_empty());
    assert!(matches!(orchestrator.job_state(), JobState::Failed(_)));
}

#[tokio::test]
async fn segment_failure_names_the_clip() {
    let engine = ScriptedEngine::new();
    engine.fail_segment(1);
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4", "c.mp4"]);

    let err = export(&orchestrator, &timeline, ExportKind::Video)
        .await
        .unwrap_err();
    assert!(matches!(err, SplicerError::SegmentEncode { index: 1, .. }), "{err}");
    assert_eq!(engine.commands().len(), 2);
    assert!(engine.concat_commands().is_empty());
    assert!(engine.artifacts().is_empty());
}

#[tokio::test]
async fn input_write_failure_names_the_clip() {
    let engine = ScriptedEngine::new();
    engine.fail_write("input1.mp4");
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4", "c.mp4"]);

    let err = export(&orchestrator, &timeline, ExportKind::Video)
        .await
        .unwrap_err();
    assert!(matches!(err, SplicerError::SegmentEncode { index: 1, .. }), "{err}");
    assert_eq!(engine.commands().len(), 1);
    assert!(engine.artifacts().is_empty());
}

#[tokio::test]
async fn retrieval_failure_is_reported() {
    let engine = ScriptedEngine::new();
    engine.fail_read.store(true, Ordering::SeqCst);
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4"]);

    let err = export(&orchestrator, &timeline, ExportKind::Video)
        .await
        .unwrap_err();
    assert!(matches!(err, SplicerError::Retrieval(_)), "{err}");
    assert!(engine.artifacts().is_empty());
}

#[tokio::test]
async fn load_failure_is_sticky_until_retry() {
    let engine = ScriptedEngine::new();
    engine.fail_load.store(true, Ordering::SeqCst);
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4"]);

    for _ in 0..2 {
        let err = export(&orchestrator, &timeline, ExportKind::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, SplicerError::EngineLoad(_)), "{err}");
    }
    assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
    assert!(engine.commands().is_empty());
    assert!(matches!(
        orchestrator.session().state(),
        EngineState::LoadFailed(_)
    ));

    engine.fail_load.store(false, Ordering::SeqCst);
    orchestrator.session().retry_load().await.unwrap();
    assert!(export(&orchestrator, &timeline, ExportKind::Video).await.is_ok());
    assert_eq!(engine.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_load_does_not_announce_another_attempt() {
    let engine = ScriptedEngine::new();
    engine.fail_load.store(true, Ordering::SeqCst);
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4"]);
    assert!(export(&orchestrator, &timeline, ExportKind::Video).await.is_err());

    let mut events = orchestrator.subscribe_events();
    assert!(export(&orchestrator, &timeline, ExportKind::Video).await.is_err());
    let events = drain(&mut events);
    assert!(!statuses(&events).contains(&"Loading transcoding engine..."));
    assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
}

// ── Fades ──────────────────────────────────────────────────────

#[tokio::test]
async fn fade_setting_reaches_bounded_segments() {
    let engine = ScriptedEngine::new();
    let settings = ExportSettings {
        fade_seconds: Some(0.5),
        ..ExportSettings::default()
    };
    let orchestrator = ExportOrchestrator::new(Arc::clone(&engine), settings);
    let mut timeline = timeline_of(&["a.mp4", "b.mp4"]);
    let first = timeline.clips()[0].id;
    timeline.set_trim(first, 1.0, Some(5.0)).unwrap();

    export(&orchestrator, &timeline, ExportKind::Video).await.unwrap();
    let commands = engine.commands();
    assert!(commands[0].has_flag("-vf", "fade=t=in:st=0:d=0.5,fade=t=out:st=3.5:d=0.5"));
    assert!(commands[0].has_flag("-af", "afade=t=in:st=0:d=0.5,afade=t=out:st=3.5:d=0.5"));
    assert!(!commands[1].args().iter().any(|a| a == "-vf" || a == "-af"));
    assert!(!engine.concat_commands()[0].args().iter().any(|a| a == "-vf"));
}

// ── Cancellation ───────────────────────────────────────────────

#[tokio::test]
async fn cancel_after_first_segment_releases_everything() {
    let engine = ScriptedEngine::new();
    let cancel = ExportCancel::new();
    let trigger = cancel.clone();
    engine.on_command(move |command| {
        if command.output() == "seg0.mp4" {
            trigger.cancel();
        }
    });
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4", "c.mp4"]);

    let outcome = orchestrator
        .export(&timeline.snapshot(), ExportKind::Video, &cancel)
        .await
        .unwrap();
    assert!(matches!(outcome, ExportOutcome::Cancelled));
    assert_eq!(engine.commands().len(), 1);
    assert!(engine.artifacts().is_empty());
    assert_eq!(orchestrator.job_state(), JobState::Cancelled);
}

#[tokio::test]
async fn cancel_after_last_segment_skips_concat() {
    let engine = ScriptedEngine::new();
    engine.fail_stream_copy.store(true, Ordering::SeqCst);
    let cancel = ExportCancel::new();
    let trigger = cancel.clone();
    engine.on_command(move |command| {
        if command.output() == "seg1.mp4" {
            trigger.cancel();
        }
    });
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4"]);

    let outcome = orchestrator
        .export(&timeline.snapshot(), ExportKind::Video, &cancel)
        .await
        .unwrap();
    assert!(matches!(outcome, ExportOutcome::Cancelled));
    assert!(engine.concat_commands().is_empty());
    assert!(engine.artifacts().is_empty());
}

#[tokio::test]
async fn cancel_after_failed_stream_copy_skips_fallback() {
    let engine = ScriptedEngine::new();
    engine.fail_stream_copy.store(true, Ordering::SeqCst);
    let cancel = ExportCancel::new();
    let trigger = cancel.clone();
    engine.on_command(move |command| {
        if command.has_flag("-c", "copy") {
            trigger.cancel();
        }
    });
    let orchestrator = orchestrator(&engine);
    let mut events = orchestrator.subscribe_events();
    let timeline = timeline_of(&["a.mp4", "b.mp4"]);

    let outcome = orchestrator
        .export(&timeline.snapshot(), ExportKind::Video, &cancel)
        .await
        .unwrap();
    assert!(matches!(outcome, ExportOutcome::Cancelled));
    assert_eq!(engine.concat_commands().len(), 1);
    assert!(engine.artifacts().is_empty());
    let events = drain(&mut events);
    assert!(!statuses(&events).iter().any(|s| s.contains("re-encoding")));
}

#[tokio::test]
async fn dropped_export_is_cleaned_up_by_the_next_one() {
    let engine = ScriptedEngine::new();
    engine.set_delay(Duration::from_millis(5));
    let first_segment_done = Arc::new(Notify::new());
    let signal = Arc::clone(&first_segment_done);
    engine.on_command(move |command| {
        if command.output() == "seg0.mp4" {
            signal.notify_one();
        }
    });
    let orchestrator = queued(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4", "c.mp4"]);

    {
        let export = export(&orchestrator, &timeline, ExportKind::Video);
        tokio::pin!(export);
        tokio::select! {
            biased;
            _ = first_segment_done.notified() => {}
            _ = &mut export => panic!("export finished before it was dropped"),
        }
    }

    assert_eq!(orchestrator.job_state(), JobState::Cancelled);
    assert!(!orchestrator.job_state().is_active());
    assert!(engine.artifacts().iter().any(|name| name == "seg0.mp4"));
    let pending = orchestrator.pending_cleanup();
    for name in engine.artifacts() {
        assert!(pending.contains(&name), "{name} not queued for cleanup");
    }

    let mut events = orchestrator.subscribe_events();
    let outcome = export(&orchestrator, &timeline_of(&["d.mp4"]), ExportKind::Video)
        .await
        .unwrap();
    assert_eq!(&*outcome.artifact().unwrap().data, b"d.mp4");
    assert!(engine.artifacts().is_empty());
    assert!(orchestrator.pending_cleanup().is_empty());
    assert!(!statuses(&drain(&mut events)).iter().any(|s| s.starts_with("Waiting")));
}

// ── Concurrency ────────────────────────────────────────────────

#[tokio::test]
async fn second_export_is_rejected_while_busy() {
    let engine = ScriptedEngine::new();
    engine.set_delay(Duration::from_millis(20));
    let orchestrator = orchestrator(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4"]);

    let (first, second) = tokio::join!(
        export(&orchestrator, &timeline, ExportKind::Video),
        export(&orchestrator, &timeline, ExportKind::Audio),
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(SplicerError::EngineBusy)));
    assert_eq!(engine.commands().len(), 3);
}

#[tokio::test]
async fn queued_exports_run_one_after_another() {
    let engine = ScriptedEngine::new();
    engine.set_delay(Duration::from_millis(5));
    let orchestrator = queued(&engine);
    let timeline = timeline_of(&["a.mp4", "b.mp4"]);

    let (first, second) = tokio::join!(
        export(&orchestrator, &timeline, ExportKind::Video),
        export(&orchestrator, &timeline, ExportKind::Audio),
    );
    assert!(first.is_ok());
    assert!(second.is_ok());

    let outputs: Vec<_> = engine.commands().iter().map(|c| c.output().to_string()).collect();
    assert_eq!(
        outputs,
        ["seg0.mp4", "seg1.mp4", "output.mp4", "seg0.mp3", "seg1.mp3", "output.mp3"]
    );
    assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
    assert!(engine.artifacts().is_empty());
}

#[tokio::test]
async fn refused_requests_leave_the_running_status_alone() {
    let engine = ScriptedEngine::new();
    engine.set_delay(Duration::from_millis(5));
    let orchestrator = queued(&engine);
    let mut events = orchestrator.subscribe_events();
    let timeline = timeline_of(&["a.mp4", "b.mp4"]);
    let empty_timeline = Timeline::new();

    let (first, empty, queued) = tokio::join!(
        export(&orchestrator, &timeline, ExportKind::Video),
        export(&orchestrator, &empty_timeline, ExportKind::Video),
        export(&orchestrator, &timeline, ExportKind::Audio),
    );
    assert!(first.is_ok());
    assert!(matches!(empty, Err(SplicerError::EmptyTimeline)));
    assert!(queued.is_ok());

    let events = drain(&mut events);
    for status in statuses(&events) {
        assert!(!status.starts_with("Waiting"), "{status}");
        assert!(!status.contains("at least one clip"), "{status}");
    }
}

#[tokio::test]
async fn concurrent_loads_share_one_attempt() {
    let engine = ScriptedEngine::new();
    engine.set_delay(Duration::from_millis(10));
    let orchestrator = orchestrator(&engine);

    let (a, b, c) = tokio::join!(
        orchestrator.ensure_loaded(),
        orchestrator.ensure_loaded(),
        orchestrator.ensure_loaded(),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(engine.loads.load(Ordering::SeqCst), 1);
    assert!(orchestrator.session().is_ready());
}

// ── Events ─────────────────────────────────────────────────────

#[tokio::test]
async fn progress_and_status_follow_the_stages() {
    let engine = ScriptedEngine::new();
    let orchestrator = orchestrator(&engine);
    let mut events = orchestrator.subscribe_events();
    let timeline = timeline_of(&["a.mp4", "b.mp4"]);

    export(&orchestrator, &timeline, ExportKind::Video).await.unwrap();
    let events = drain(&mut events);

    let progress: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            ExportEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(progress, [0.5, 1.0]);

    let statuses: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ExportEvent::Status(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    for expected in [
        "Creating segment 1/2...",
        "Creating segment 2/2...",
        "Concatenating segments...",
        "Export complete: edited-video.mp4",
    ] {
        assert!(statuses.contains(&expected), "missing status {expected:?}");
    }
    assert!(events
        .iter()
        .any(|e| matches!(e, ExportEvent::EngineProgress(p) if *p == 1.0)));
}

#[tokio::test]
async fn state_watch_ends_done() {
    let engine = ScriptedEngine::new();
    let orchestrator = orchestrator(&engine);
    let state = orchestrator.subscribe_state();
    let timeline = timeline_of(&["a.mp4"]);

    export(&orchestrator, &timeline, ExportKind::Video).await.unwrap();
    let current = state.borrow().clone();
    assert!(matches!(current, JobState::Done(ref a) if a.file_name == "edited-video.mp4"));
    assert!(!orchestrator.job_state().is_active());
}
