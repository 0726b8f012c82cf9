//! Splicer Timeline - Clip timeline data model
//!
//! Implements the ordered clip list that drives an export:
//! - Clips with shared, read-only media sources and trim windows
//! - Timeline edits (add, trim, remove) with validation
//! - Immutable snapshots handed to in-flight exports
//! - Versioned edit-list files

pub mod clip;
pub mod edit_list;
pub mod timeline;

pub use clip::{Clip, MediaFile, MediaSource};
pub use edit_list::{EditList, EditListEntry};
pub use timeline::{Timeline, TimelineSnapshot};
