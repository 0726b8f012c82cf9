//! Splicer Core - Foundation types for clip trimming and export
//!
//! This crate provides the fundamental types used throughout Splicer:
//! - Error taxonomy shared by the timeline and the export pipeline
//! - Trim windows and millisecond-precise seconds formatting
//! - Media type classification for incoming files

pub mod error;
pub mod media;
pub mod time;

pub use error::{Result, SplicerError};
pub use media::{ExportKind, MediaKind};
pub use time::{format_seconds, parse_timestamp, rounds_to_zero, TrimRange};
