//! The ordered clip list and its snapshots.

use splicer_core::{Result, SplicerError, TrimRange};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::clip::{Clip, MediaFile};

/// Ordered sequence of clips. Order is export order.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    clips: Vec<Clip>,
}

impl Timeline {
    /// Create an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one clip per video file, in order.
    ///
    /// Files that are not a recognised video type are dropped without
    /// failing the batch. Returns the IDs of the clips that were added.
    pub fn add_clips<I>(&mut self, files: I) -> Vec<Uuid>
    where
        I: IntoIterator<Item = MediaFile>,
    {
        let mut added = Vec::new();
        for file in files {
            if !file.kind().is_video() {
                debug!(name = %file.name, mime = %file.mime, "Skipping non-video file");
                continue;
            }
            let clip = Clip::new(file.name, file.source);
            added.push(clip.id);
            self.clips.push(clip);
        }
        added
    }

    /// Replace a clip's trim window.
    ///
    /// Fails with `InvalidRange` for a bad window and `NotFound` for an
    /// unknown ID. On failure the clip keeps its previous bounds.
    pub fn set_trim(&mut self, id: Uuid, start: f64, end: Option<f64>) -> Result<()> {
        let trim = TrimRange::new(start, end)?;
        let clip = self.find_mut(id).ok_or(SplicerError::NotFound(id))?;
        clip.set_trim(trim);
        Ok(())
    }

    /// Remove a clip, dropping its handle on the source bytes.
    ///
    /// Fails with `NotFound` if the ID is not on the timeline.
    pub fn remove_clip(&mut self, id: Uuid) -> Result<()> {
        let index = self
            .clips
            .iter()
            .position(|c| c.id == id)
            .ok_or(SplicerError::NotFound(id))?;
        self.clips.remove(index);
        Ok(())
    }

    /// Read-only view of the clips in order.
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Find a clip by UUID.
    pub fn get(&self, id: Uuid) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    fn find_mut(&mut self, id: Uuid) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == id)
    }

    /// Number of clips.
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// True if there are no clips.
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Sum of trimmed durations, or `None` if any clip is unbounded.
    pub fn total_duration(&self) -> Option<f64> {
        self.clips.iter().map(Clip::duration).sum()
    }

    /// Take an immutable snapshot for export.
    ///
    /// Later edits to the timeline do not affect the snapshot.
    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            clips: self.clips.clone().into(),
        }
    }
}

/// Frozen copy of a timeline's clips. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TimelineSnapshot {
    clips: Arc<[Clip]>,
}

impl TimelineSnapshot {
    /// Clips in export order.
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Iterate clips in export order.
    pub fn iter(&self) -> std::slice::Iter<'_, Clip> {
        self.clips.iter()
    }

    /// Number of clips.
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// True if the snapshot has no clips.
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl Default for TimelineSnapshot {
    fn default() -> Self {
        Vec::new().into()
    }
}

impl From<Vec<Clip>> for TimelineSnapshot {
    fn from(clips: Vec<Clip>) -> Self {
        Self {
            clips: clips.into(),
        }
    }
}

impl<'a> IntoIterator for &'a TimelineSnapshot {
    type Item = &'a Clip;
    type IntoIter = std::slice::Iter<'a, Clip>;

    fn into_iter(self) -> Self::IntoIter {
        self.clips.iter()
    }
}
