//! Application configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use splicer_media::{ExportSettings, FfmpegOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything read from the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub export: ExportSettings,
    pub ffmpeg: FfmpegOptions,
}

impl AppConfig {
    /// Default config location: `<config dir>/splicer/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("splicer").join("config.json"))
    }

    /// Load from `path` if given, else from the default location if it
    /// exists, else fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path),
                None => {
                    debug!("No config file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_slice(&data)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.export.validate()?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}
