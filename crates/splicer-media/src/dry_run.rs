//! An engine that records commands instead of running them.
//!
//! Each command "produces" its output as a small placeholder artifact, so a
//! full export can be planned and inspected without a transcoder.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::command::EngineCommand;
use crate::engine::{Engine, EngineError, EngineResult, ProgressFn};

/// Records every command it is asked to run.
#[derive(Debug, Default)]
pub struct DryRunEngine {
    commands: Mutex<Vec<EngineCommand>>,
    namespace: Mutex<BTreeMap<String, Arc<[u8]>>>,
}

impl DryRunEngine {
    /// Create an empty dry-run engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands run so far, in order.
    pub fn commands(&self) -> Vec<EngineCommand> {
        self.commands.lock().clone()
    }

    /// Names currently present in the namespace.
    pub fn artifacts(&self) -> Vec<String> {
        self.namespace.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl Engine for DryRunEngine {
    async fn load(&self) -> EngineResult<()> {
        Ok(())
    }

    async fn write_input(&self, name: &str, data: Arc<[u8]>) -> EngineResult<()> {
        self.namespace.lock().insert(name.to_string(), data);
        Ok(())
    }

    async fn run_command(
        &self,
        command: &EngineCommand,
        progress: ProgressFn<'_>,
    ) -> EngineResult<()> {
        let placeholder: Arc<[u8]> = command.to_string().into_bytes().into();
        self.namespace
            .lock()
            .insert(command.output().to_string(), placeholder);
        self.commands.lock().push(command.clone());
        progress(1.0);
        Ok(())
    }

    async fn read_output(&self, name: &str) -> EngineResult<Vec<u8>> {
        self.namespace
            .lock()
            .get(name)
            .map(|data| data.to_vec())
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
