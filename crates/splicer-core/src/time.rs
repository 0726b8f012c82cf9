//! Time handling for trim windows.
//!
//! All times are floating-point seconds. Values handed to the transcoder
//! are serialised with millisecond precision so adjacent segments line up.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SplicerError};

/// A trim window over a media source.
///
/// `end == None` means "play to the natural end of the source".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimRange {
    start: f64,
    end: Option<f64>,
}

impl TrimRange {
    /// The untrimmed window: from zero to the end of the source.
    pub const FULL: Self = Self {
        start: 0.0,
        end: None,
    };

    /// Create a validated trim window.
    ///
    /// Fails with `InvalidRange` if `start` is negative or not finite, or if
    /// a bounded `end` is not at least one millisecond after `start`.
    pub fn new(start: f64, end: Option<f64>) -> Result<Self> {
        let invalid = || SplicerError::InvalidRange { start, end };
        if !start.is_finite() || start < 0.0 {
            return Err(invalid());
        }
        if let Some(end) = end {
            if !end.is_finite() || end <= start || rounds_to_zero(end - start) {
                return Err(invalid());
            }
        }
        Ok(Self { start, end })
    }

    /// Start offset in seconds.
    #[inline]
    pub fn start(self) -> f64 {
        self.start
    }

    /// End offset in seconds, if bounded.
    #[inline]
    pub fn end(self) -> Option<f64> {
        self.end
    }

    /// Length of the window, or `None` when it runs to the end of the source.
    pub fn duration(self) -> Option<f64> {
        self.end.map(|end| end - self.start)
    }

    /// True if the window has an explicit end.
    #[inline]
    pub fn is_bounded(self) -> bool {
        self.end.is_some()
    }
}

impl Default for TrimRange {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for TrimRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}s → {}s", format_seconds(self.start), format_seconds(end)),
            None => write!(f, "{}s → end", format_seconds(self.start)),
        }
    }
}

/// Format seconds with millisecond precision, trimming trailing zeros.
///
/// `2.0` becomes `"2"`, `2.5` becomes `"2.5"`, `1.2345` becomes `"1.235"`.
pub fn format_seconds(seconds: f64) -> String {
    let mut s = format!("{:.3}", seconds);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

/// True if `seconds` formats as `"0"` at millisecond precision.
pub fn rounds_to_zero(seconds: f64) -> bool {
    format_seconds(seconds) == "0"
}

/// Parse a transcoder timestamp (`HH:MM:SS.ms`, `MM:SS.ms` or plain seconds).
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let (negative, body) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };

    let mut total = 0.0;
    for part in body.split(':') {
        let value: f64 = part.parse().ok()?;
        total = total * 60.0 + value;
    }

    Some(if negative { -total } else { total })
}
