//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Trim and join video clips into one file.
#[derive(Parser, Debug)]
#[command(name = "splicer")]
#[command(version)]
#[command(about = "Trim video clips and join them into a single file")]
#[command(long_about = "Splicer trims each clip to a window and concatenates the results \
    in order, using FFmpeg.\n\n\
    CLIP arguments take the form PATH[@START[-END]], in seconds.\n\n\
    EXAMPLES:\n    \
    splicer export -o out.mp4 intro.mp4@2-5 body.mov\n    \
    splicer export --audio -o out.mp3 talk.mp4@30.5-90\n    \
    splicer plan intro.mp4@2-5 body.mov@1")]
pub struct Cli {
    /// Config file (JSON). Defaults to <config dir>/splicer/config.json
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the export with FFmpeg
    Export {
        #[command(flatten)]
        job: JobArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Save the clip list as an edit list after building it
        #[arg(long)]
        save_edit_list: Option<PathBuf>,

        /// Download FFmpeg if it is not installed
        #[arg(long)]
        auto_download: bool,
    },
    /// Print the engine commands an export would run
    Plan {
        #[command(flatten)]
        job: JobArgs,
    },
}

/// Arguments shared by `export` and `plan`.
#[derive(Args, Debug)]
pub struct JobArgs {
    /// Clips in order, as PATH[@START[-END]]
    #[arg(value_name = "CLIP")]
    pub clips: Vec<ClipArg>,

    /// Load clips from an edit list (appended before CLIP arguments)
    #[arg(long)]
    pub edit_list: Option<PathBuf>,

    /// Export audio only (MP3)
    #[arg(long)]
    pub audio: bool,

    /// Fade each clip in and out over this many seconds
    #[arg(long, value_name = "SECS")]
    pub fade: Option<f64>,
}

/// A clip argument: a path with an optional trim window.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipArg {
    pub path: PathBuf,
    pub start: f64,
    pub end: Option<f64>,
}

impl FromStr for ClipArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, window) = match s.rsplit_once('@') {
            Some((path, window)) if !path.is_empty() => (path, Some(window)),
            _ => (s, None),
        };
        if path.is_empty() {
            return Err("clip path is empty".to_string());
        }

        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid time '{v}' in '{s}'"))
        };

        let (start, end) = match window {
            None => (0.0, None),
            Some(window) => match window.split_once('-') {
                Some((start, end)) => {
                    let start = if start.trim().is_empty() { 0.0 } else { parse(start)? };
                    let end = if end.trim().is_empty() { None } else { Some(parse(end)?) };
                    (start, end)
                }
                None => (parse(window)?, None),
            },
        };

        Ok(Self {
            path: PathBuf::from(path),
            start,
            end,
        })
    }
}
