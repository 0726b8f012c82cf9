//! Engine session: owns one engine and its load lifecycle.

use splicer_core::{Result, SplicerError};
use std::fmt;
use tokio::sync::{watch, Mutex};
use tracing::{error, info};

use crate::engine::Engine;

/// Load state of an engine session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Unloaded,
    Loading,
    Ready,
    /// Load failed; stays here until `retry_load`.
    LoadFailed(String),
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => write!(f, "unloaded"),
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
            Self::LoadFailed(reason) => write!(f, "load failed: {reason}"),
        }
    }
}

/// Owns a single engine instance and loads it at most once.
///
/// Concurrent `ensure_loaded` calls share one underlying `load()`; callers
/// that arrive while a load is in flight wait for its result.
pub struct EngineSession<E> {
    engine: E,
    state: watch::Sender<EngineState>,
    load_lock: Mutex<()>,
}

impl<E: Engine> EngineSession<E> {
    /// Wrap an engine. Nothing is loaded yet.
    pub fn new(engine: E) -> Self {
        let (state, _) = watch::channel(EngineState::Unloaded);
        Self {
            engine,
            state,
            load_lock: Mutex::new(()),
        }
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Current load state.
    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    /// Watch load state changes.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// True once the engine has loaded.
    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == EngineState::Ready
    }

    /// Load the engine if it is not loaded yet.
    ///
    /// Returns `EngineLoad` if this or an earlier attempt failed. A failed
    /// session is not retried automatically; see [`retry_load`](Self::retry_load).
    pub async fn ensure_loaded(&self) -> Result<()> {
        if let Some(result) = self.settled() {
            return result;
        }

        let _guard = self.load_lock.lock().await;
        // Another caller may have finished loading while we waited.
        if let Some(result) = self.settled() {
            return result;
        }

        self.state.send_replace(EngineState::Loading);
        info!("Loading transcoding engine");

        match self.engine.load().await {
            Ok(()) => {
                self.state.send_replace(EngineState::Ready);
                info!("Transcoding engine ready");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                error!(error = %reason, "Transcoding engine failed to load");
                self.state.send_replace(EngineState::LoadFailed(reason.clone()));
                Err(SplicerError::EngineLoad(reason))
            }
        }
    }

    /// Clear a failed load and try again.
    pub async fn retry_load(&self) -> Result<()> {
        {
            let _guard = self.load_lock.lock().await;
            if matches!(*self.state.borrow(), EngineState::LoadFailed(_)) {
                info!("Retrying engine load");
                self.state.send_replace(EngineState::Unloaded);
            }
        }
        self.ensure_loaded().await
    }

    fn settled(&self) -> Option<Result<()>> {
        match &*self.state.borrow() {
            EngineState::Ready => Some(Ok(())),
            EngineState::LoadFailed(reason) => Some(Err(SplicerError::EngineLoad(reason.clone()))),
            EngineState::Unloaded | EngineState::Loading => None,
        }
    }
}
