//! The transcoder engine contract.
//!
//! An engine is an opaque command executor with a flat, private namespace
//! of named artifacts. The orchestrator is its only client.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::command::EngineCommand;

/// Errors reported by an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be initialized.
    #[error("Engine load failed: {0}")]
    Load(String),

    /// An operation was attempted before `load()` succeeded.
    #[error("Engine not loaded")]
    NotLoaded,

    /// A command ran and failed.
    #[error("Command failed: {0}")]
    Command(String),

    /// A named artifact does not exist in the namespace.
    #[error("No such artifact: {0}")]
    MissingArtifact(String),

    /// An artifact name is not a plain file name.
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Receives fractional progress (0.0 to 1.0) while a command runs.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// A transcoding engine.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Initialize the engine. Called at most once per successful session load.
    async fn load(&self) -> EngineResult<()>;

    /// Store bytes under `name` in the engine namespace.
    async fn write_input(&self, name: &str, data: Arc<[u8]>) -> EngineResult<()>;

    /// Execute one command to completion.
    async fn run_command(&self, command: &EngineCommand, progress: ProgressFn<'_>)
        -> EngineResult<()>;

    /// Read the bytes stored under `name`.
    async fn read_output(&self, name: &str) -> EngineResult<Vec<u8>>;

    /// Delete `name` from the namespace.
    async fn remove(&self, name: &str) -> EngineResult<()>;
}

#[async_trait]
impl<E: Engine + ?Sized> Engine for Arc<E> {
    async fn load(&self) -> EngineResult<()> {
        (**self).load().await
    }

    async fn write_input(&self, name: &str, data: Arc<[u8]>) -> EngineResult<()> {
        (**self).write_input(name, data).await
    }

    async fn run_command(
        &self,
        command: &EngineCommand,
        progress: ProgressFn<'_>,
    ) -> EngineResult<()> {
        (**self).run_command(command, progress).await
    }

    async fn read_output(&self, name: &str) -> EngineResult<Vec<u8>> {
        (**self).read_output(name).await
    }

    async fn remove(&self, name: &str) -> EngineResult<()> {
        (**self).remove(name).await
    }
}
