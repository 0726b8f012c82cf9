//! Typed builders for engine commands.
//!
//! Builders validate their numeric arguments and serialise them to the
//! transcoder's flag grammar. Invalid values never reach the engine.

use splicer_core::{format_seconds, rounds_to_zero, Result, SplicerError, TrimRange};
use std::fmt;

use crate::export::CodecProfile;

/// Name of the concat manifest in the engine namespace.
pub const MANIFEST_NAME: &str = "concat.txt";

/// A fully serialised engine command.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineCommand {
    args: Vec<String>,
    output: String,
    /// Expected output duration, used to scale engine progress.
    duration_hint: Option<f64>,
}

impl EngineCommand {
    /// Argument vector, output name last.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Name of the artifact this command produces.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Expected duration of the output in seconds, when known.
    pub fn duration_hint(&self) -> Option<f64> {
        self.duration_hint
    }

    /// True if `flag` is immediately followed by `value`.
    pub fn has_flag(&self, flag: &str, value: &str) -> bool {
        self.args
            .windows(2)
            .any(|pair| pair[0] == flag && pair[1] == value)
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

/// Checks the value as it will be serialised, not the raw float.
fn check_seconds(what: &str, value: f64, allow_zero: bool) -> Result<()> {
    let ok = value.is_finite()
        && if allow_zero {
            value >= 0.0
        } else {
            value > 0.0 && !rounds_to_zero(value)
        };
    if ok {
        Ok(())
    } else {
        let bound = if allow_zero { "non-negative" } else { "positive" };
        Err(SplicerError::InvalidCommand(format!(
            "{what} must be a {bound} finite number, got {value}"
        )))
    }
}

// ── Segment extraction ──────────────────────────────────────────

/// Trim one input into an encoded segment.
#[derive(Debug, Clone)]
pub struct SegmentCommand {
    input: String,
    output: String,
    trim: TrimRange,
    profile: CodecProfile,
    fade: Option<f64>,
}

impl SegmentCommand {
    /// Create a segment command over the whole input.
    pub fn new(input: impl Into<String>, output: impl Into<String>, profile: CodecProfile) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            trim: TrimRange::FULL,
            profile,
            fade: None,
        }
    }

    /// Restrict to a trim window.
    pub fn with_trim(mut self, trim: TrimRange) -> Self {
        self.trim = trim;
        self
    }

    /// Fade the segment in and out over `seconds`.
    pub fn with_fade(mut self, seconds: Option<f64>) -> Self {
        self.fade = seconds;
        self
    }

    /// Validate and serialise.
    pub fn build(&self) -> Result<EngineCommand> {
        let start = self.trim.start();
        let duration = self.trim.duration();
        check_seconds("seek offset", start, true)?;
        if let Some(duration) = duration {
            check_seconds("duration", duration, false)?;
        }

        let mut args = vec![
            "-ss".to_string(),
            format_seconds(start),
            "-i".to_string(),
            self.input.clone(),
        ];
        if let Some(duration) = duration {
            args.extend_from_slice(&["-t".into(), format_seconds(duration)]);
        }

        if let Some(fade) = self.fade {
            check_seconds("fade", fade, false)?;
            // Fade-out needs a known end; very short clips are left alone.
            match duration {
                Some(duration) if duration > fade * 2.0 => {
                    let out_start = format_seconds(duration - fade);
                    let fade = format_seconds(fade);
                    if self.profile.keeps_video() {
                        args.extend_from_slice(&[
                            "-vf".into(),
                            format!("fade=t=in:st=0:d={fade},fade=t=out:st={out_start}:d={fade}"),
                        ]);
                    }
                    args.extend_from_slice(&[
                        "-af".into(),
                        format!("afade=t=in:st=0:d={fade},afade=t=out:st={out_start}:d={fade}"),
                    ]);
                }
                _ => tracing::debug!(input = %self.input, "Skipping fade for unbounded or short clip"),
            }
        }

        args.extend(self.profile.args());
        args.push(self.output.clone());

        Ok(EngineCommand {
            args,
            output: self.output.clone(),
            duration_hint: duration,
        })
    }
}

// ── Concatenation ───────────────────────────────────────────────

/// Playlist consumed by the concat demuxer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatManifest {
    entries: Vec<String>,
}

impl ConcatManifest {
    /// Build a manifest listing `segments` in order.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of listed segments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no segments are listed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ConcatManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "file '{}'", entry.replace('\'', r"'\''"))?;
        }
        Ok(())
    }
}

/// How the concat step produces its output streams.
#[derive(Debug, Clone)]
enum ConcatMode {
    StreamCopy,
    ReEncode(CodecProfile),
}

/// Join segments listed in a manifest.
#[derive(Debug, Clone)]
pub struct ConcatCommand {
    manifest: String,
    output: String,
    mode: ConcatMode,
}

impl ConcatCommand {
    /// Fast path: copy streams without re-encoding.
    pub fn stream_copy(manifest: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
            output: output.into(),
            mode: ConcatMode::StreamCopy,
        }
    }

    /// Fallback: re-encode with the segment profile.
    pub fn re_encode(
        manifest: impl Into<String>,
        output: impl Into<String>,
        profile: CodecProfile,
    ) -> Self {
        Self {
            manifest: manifest.into(),
            output: output.into(),
            mode: ConcatMode::ReEncode(profile),
        }
    }

    /// True for the stream-copy variant.
    pub fn is_stream_copy(&self) -> bool {
        matches!(self.mode, ConcatMode::StreamCopy)
    }

    /// Serialise.
    pub fn build(&self) -> Result<EngineCommand> {
        if self.manifest.is_empty() || self.output.is_empty() {
            return Err(SplicerError::InvalidCommand(
                "concat needs a manifest and an output name".into(),
            ));
        }

        let mut args: Vec<String> = ["-f", "concat", "-safe", "0", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(self.manifest.clone());
        match &self.mode {
            ConcatMode::StreamCopy => args.extend_from_slice(&["-c".into(), "copy".into()]),
            ConcatMode::ReEncode(profile) => args.extend(profile.args()),
        }
        args.push(self.output.clone());

        Ok(EngineCommand {
            args,
            output: self.output.clone(),
            duration_hint: None,
        })
    }
}
