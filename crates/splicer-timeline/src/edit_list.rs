//! Edit-list persistence with schema versioning.
//!
//! An edit list records which files make up a timeline and how each one is
//! trimmed. Media bytes are not stored; files are re-read on load.

use serde::{Deserialize, Serialize};
use splicer_core::{Result, SplicerError};
use std::path::{Path, PathBuf};

use crate::clip::MediaFile;
use crate::timeline::Timeline;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// One clip in an edit list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditListEntry {
    /// Source file path.
    pub path: PathBuf,
    /// Display name.
    pub name: String,
    /// Trim start in seconds.
    pub start: f64,
    /// Trim end in seconds (None = to end of source).
    #[serde(default)]
    pub end: Option<f64>,
}

/// Versioned edit-list file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditList {
    /// Schema version.
    pub version: u32,
    /// Application version that wrote this file.
    pub app_version: String,
    /// Clips in timeline order.
    pub clips: Vec<EditListEntry>,
}

impl EditList {
    /// Capture a timeline. Every clip must have been loaded from a file.
    pub fn from_timeline(timeline: &Timeline) -> Result<Self> {
        let clips = timeline
            .clips()
            .iter()
            .map(|clip| {
                let path = clip.source.origin().ok_or_else(|| {
                    SplicerError::Serialization(format!(
                        "Clip '{}' was not loaded from a file",
                        clip.name
                    ))
                })?;
                Ok(EditListEntry {
                    path: path.to_path_buf(),
                    name: clip.name.clone(),
                    start: clip.start(),
                    end: clip.end(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version: CURRENT_VERSION,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            clips,
        })
    }

    /// Rebuild a timeline by reopening every source file.
    ///
    /// Entries whose file is not a video are skipped, as with any other add.
    pub fn to_timeline(&self) -> Result<Timeline> {
        let mut timeline = Timeline::new();
        for entry in &self.clips {
            let mut file = MediaFile::open(&entry.path)?;
            file.name = entry.name.clone();
            if let Some(&id) = timeline.add_clips([file]).first() {
                timeline.set_trim(id, entry.start, entry.end)?;
            }
        }
        Ok(timeline)
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| SplicerError::Serialization(format!("Failed to serialize edit list: {}", e)))
    }

    /// Deserialize from JSON bytes, rejecting files from a newer schema.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| SplicerError::Serialization(format!("Invalid JSON: {}", e)))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        if version == 0 || version > CURRENT_VERSION {
            return Err(SplicerError::Serialization(format!(
                "Unsupported edit list version {} (supported: {})",
                version, CURRENT_VERSION
            )));
        }

        serde_json::from_value(raw)
            .map_err(|e| SplicerError::Serialization(format!("Failed to parse edit list: {}", e)))
    }

    /// Save to a file path.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load from a file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}
