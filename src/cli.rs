use clap::{Parser, Subcommand};
use hevcsweep::engine::OrderingPolicy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hevcsweep")]
#[command(about = "Batch HEVC transcoder with hardware encoder fallback", long_about = None)]
pub struct Cli {
    /// Root directory to transcode (defaults to current directory)
    #[arg(value_name = "DIRECTORY")]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of files encoded at once (overrides config)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Dispatch order: smallest-first, largest-first or discovery (overrides config)
    #[arg(long, value_name = "ORDER")]
    pub order: Option<OrderingPolicy>,

    /// Skip files whose output already exists
    #[arg(long)]
    pub no_overwrite: bool,

    /// Delete sources after a fully successful run without asking
    #[arg(long, conflicts_with = "keep_sources")]
    pub delete_sources: bool,

    /// Never delete sources and don't ask
    #[arg(long, conflicts_with = "delete_sources")]
    pub keep_sources: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check if ffmpeg and ffprobe are installed and list usable HEVC encoders
    CheckFfmpeg,

    /// Probe a video file for its resolution, frame rate and encoding plan
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// List eligible files in dispatch order without encoding
    Scan {
        /// Directory to scan (defaults to current directory)
        directory: Option<PathBuf>,
    },

    /// Show every ffmpeg command the cascade would try, without executing
    DryRun {
        /// Directory to scan (defaults to current directory)
        directory: Option<PathBuf>,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
