//! Clip types for the timeline.

use splicer_core::{MediaKind, Result, TrimRange};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Shared, read-only media bytes.
///
/// Cloning is cheap; the bytes are released once the owning clip and every
/// snapshot referencing it are dropped.
#[derive(Clone)]
pub struct MediaSource {
    data: Arc<[u8]>,
    /// File the bytes were read from, if any.
    origin: Option<PathBuf>,
}

impl MediaSource {
    /// Wrap in-memory bytes.
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            origin: None,
        }
    }

    /// Read a media file fully into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Ok(Self {
            data: data.into(),
            origin: Some(path.to_path_buf()),
        })
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// A shared handle to the raw bytes.
    pub fn shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    /// Path the bytes were loaded from.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the source holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSource")
            .field("len", &self.data.len())
            .field("origin", &self.origin)
            .finish()
    }
}

/// A file offered to the timeline, before it is accepted as a clip.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// File name (displayed in UI)
    pub name: String,
    /// MIME type, e.g. `video/mp4`
    pub mime: String,
    /// The file's bytes
    pub source: MediaSource,
}

impl MediaFile {
    /// Create a media file from parts.
    pub fn new(name: impl Into<String>, mime: impl Into<String>, source: MediaSource) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            source,
        }
    }

    /// Open a file from disk, guessing its MIME type from the extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let mime = MediaKind::mime_for_path(path);
        Ok(Self::new(name, mime, MediaSource::open(path)?))
    }

    /// Media kind derived from the MIME type.
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime)
    }
}

/// A clip on the timeline.
#[derive(Debug, Clone)]
pub struct Clip {
    /// Unique clip ID
    pub id: Uuid,
    /// Clip name (displayed in UI)
    pub name: String,
    /// Source media
    pub source: MediaSource,
    trim: TrimRange,
}

impl Clip {
    /// Create an untrimmed clip.
    pub fn new(name: impl Into<String>, source: MediaSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source,
            trim: TrimRange::FULL,
        }
    }

    /// Current trim window.
    pub fn trim(&self) -> TrimRange {
        self.trim
    }

    /// Replace the trim window. The range is already validated.
    pub fn set_trim(&mut self, trim: TrimRange) {
        self.trim = trim;
    }

    /// Trim start in seconds.
    pub fn start(&self) -> f64 {
        self.trim.start()
    }

    /// Trim end in seconds, if bounded.
    pub fn end(&self) -> Option<f64> {
        self.trim.end()
    }

    /// Trimmed duration, or `None` for a clip that runs to the source end.
    pub fn duration(&self) -> Option<f64> {
        self.trim.duration()
    }

    /// Lower-cased extension of the clip name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
    }
}
