//! Test helpers: a scripted in-memory engine and timeline builders.

use async_trait::async_trait;
use parking_lot::Mutex;
use splicer_media::{Engine, EngineCommand, EngineError, EngineResult, ProgressFn};
use splicer_timeline::{MediaFile, MediaSource, Timeline};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Hook = Box<dyn Fn(&EngineCommand) + Send + Sync>;

/// In-memory engine that simulates trimming and concatenation.
///
/// A segment command copies its input's bytes to its output. A concat
/// command joins the bytes of every file listed in the manifest, so the
/// final artifact shows the order segments were joined in.
#[derive(Default)]
pub struct ScriptedEngine {
    pub loads: AtomicUsize,
    pub fail_load: AtomicBool,
    pub fail_stream_copy: AtomicBool,
    pub fail_reencode_concat: AtomicBool,
    pub fail_read: AtomicBool,
    fail_segment: Mutex<Option<usize>>,
    fail_write: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    hook: Mutex<Option<Hook>>,
    namespace: Mutex<BTreeMap<String, Vec<u8>>>,
    commands: Mutex<Vec<EngineCommand>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the segment command for clip `index` fail.
    pub fn fail_segment(&self, index: usize) {
        *self.fail_segment.lock() = Some(index);
    }

    /// Make writing `name` into the namespace fail.
    pub fn fail_write(&self, name: &str) {
        *self.fail_write.lock() = Some(name.to_string());
    }

    /// Sleep this long inside `load` and every command.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Called after every command, whether or not it succeeded.
    pub fn on_command(&self, hook: impl Fn(&EngineCommand) + Send + Sync + 'static) {
        *self.hook.lock() = Some(Box::new(hook));
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        self.commands.lock().clone()
    }

    /// Commands that read a concat manifest.
    pub fn concat_commands(&self) -> Vec<EngineCommand> {
        self.commands()
            .into_iter()
            .filter(|c| c.has_flag("-f", "concat"))
            .collect()
    }

    pub fn artifacts(&self) -> Vec<String> {
        self.namespace.lock().keys().cloned().collect()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn input_of(command: &EngineCommand) -> EngineResult<String> {
        let args = command.args();
        args.iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .ok_or_else(|| EngineError::Command("no -i argument".into()))
    }

    fn execute(&self, command: &EngineCommand) -> EngineResult<()> {
        let input = Self::input_of(command)?;
        let mut namespace = self.namespace.lock();

        if command.has_flag("-f", "concat") {
            let copy = command.has_flag("-c", "copy");
            if copy && self.fail_stream_copy.load(Ordering::SeqCst) {
                namespace.insert(command.output().to_string(), b"partial".to_vec());
                return Err(EngineError::Command("codec parameters differ".into()));
            }
            if !copy && self.fail_reencode_concat.load(Ordering::SeqCst) {
                return Err(EngineError::Command("re-encode failed".into()));
            }

            let manifest = namespace
                .get(&input)
                .ok_or_else(|| EngineError::MissingArtifact(input.clone()))?;
            let manifest = String::from_utf8_lossy(manifest).into_owned();
            let mut joined = Vec::new();
            for line in manifest.lines() {
                let name = line
                    .trim()
                    .strip_prefix("file '")
                    .and_then(|rest| rest.strip_suffix('\''))
                    .ok_or_else(|| EngineError::Command(format!("bad manifest line: {line}")))?;
                let data = namespace
                    .get(name)
                    .ok_or_else(|| EngineError::MissingArtifact(name.to_string()))?;
                joined.extend_from_slice(data);
            }
            namespace.insert(command.output().to_string(), joined);
            return Ok(());
        }

        if let Some(index) = *self.fail_segment.lock() {
            if command.output().starts_with(&format!("seg{index}.")) {
                return Err(EngineError::Command(format!("corrupt input {input}")));
            }
        }
        let data = namespace
            .get(&input)
            .cloned()
            .ok_or_else(|| EngineError::MissingArtifact(input.clone()))?;
        namespace.insert(command.output().to_string(), data);
        Ok(())
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn load(&self) -> EngineResult<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(EngineError::Load("core module failed to initialize".into()));
        }
        Ok(())
    }

    async fn write_input(&self, name: &str, data: Arc<[u8]>) -> EngineResult<()> {
        if self.fail_write.lock().as_deref() == Some(name) {
            return Err(EngineError::Io(std::io::Error::other("disk full")));
        }
        self.namespace.lock().insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn run_command(
        &self,
        command: &EngineCommand,
        progress: ProgressFn<'_>,
    ) -> EngineResult<()> {
        self.commands.lock().push(command.clone());
        self.pause().await;
        progress(0.5);
        let result = self.execute(command);
        if result.is_ok() {
            progress(1.0);
        }
        if let Some(hook) = self.hook.lock().as_ref() {
            hook(command);
        }
        result
    }

    async fn read_output(&self, name: &str) -> EngineResult<Vec<u8>> {
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(EngineError::Io(std::io::Error::other("read failed")));
        }
        self.namespace
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::MissingArtifact(name.to_string()))
    }

    async fn remove(&self, name: &str) -> EngineResult<()> {
        self.namespace
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::MissingArtifact(name.to_string()))
    }
}

/// A video file whose bytes are its name.
pub fn video(name: &str) -> MediaFile {
    MediaFile::new(name, "video/mp4", MediaSource::from_bytes(name.as_bytes().to_vec()))
}

/// A non-video file.
pub fn document(name: &str) -> MediaFile {
    MediaFile::new(name, "application/pdf", MediaSource::from_bytes(name.as_bytes().to_vec()))
}

/// Timeline with one untrimmed clip per name.
pub fn timeline_of(names: &[&str]) -> Timeline {
    let mut timeline = Timeline::new();
    timeline.add_clips(names.iter().map(|n| video(n)));
    timeline
}
