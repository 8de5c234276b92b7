//! Reelcut CLI: command-line interface for analysis and export.
//!
//! Usage:
//!   reelcut analyze <PROJECT>   Derive zoom effects from pointer telemetry
//!   reelcut export <PROJECT>    Export a project to video
//!   reelcut info <PROJECT>      Show project information
//!   reelcut check               Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "reelcut",
    about = "Screen recording editor core: zoom detection and video export",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive zoom effects from a project's pointer telemetry
    Analyze {
        /// Path to the project file (JSON)
        path: PathBuf,

        /// Pointer movement (pixels) that counts as activity
        #[arg(long)]
        threshold_px: Option<f64>,

        /// Idle gap (ms) that ends a zoom window
        #[arg(long)]
        idle_timeout_ms: Option<f64>,

        /// Discard detected windows shorter than this (ms)
        #[arg(long)]
        min_duration_ms: Option<f64>,

        /// Merge windows separated by less than this gap (ms)
        #[arg(long)]
        merge_gap_ms: Option<f64>,

        /// Magnification for generated zoom effects
        #[arg(long, default_value = "2.0")]
        scale: f64,

        /// Write the detected effects back into the project file
        #[arg(long)]
        write: bool,
    },

    /// Export a project to video
    Export {
        /// Path to the project file (JSON)
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Frames per export chunk
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Leave chunk files on disk instead of combining them
        #[arg(long)]
        no_combine: bool,

        /// Stream all frames in one pass, writing no chunk files
        #[arg(long, conflicts_with = "chunk_size")]
        single_pass: bool,

        /// Video codec: h264|h265|vp9
        #[arg(long, default_value = "h264")]
        codec: String,

        /// Video bitrate in kbps
        #[arg(long)]
        bitrate_kbps: Option<u32>,
    },

    /// Show project information
    Info {
        /// Path to the project file (JSON)
        path: PathBuf,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    reelcut_common::logging::init_logging(&reelcut_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
        file: None,
    });

    match cli.command {
        Commands::Analyze {
            path,
            threshold_px,
            idle_timeout_ms,
            min_duration_ms,
            merge_gap_ms,
            scale,
            write,
        } => commands::analyze::run(
            path,
            threshold_px,
            idle_timeout_ms,
            min_duration_ms,
            merge_gap_ms,
            scale,
            write,
        ),
        Commands::Export {
            path,
            output,
            chunk_size,
            no_combine,
            single_pass,
            codec,
            bitrate_kbps,
        } => {
            commands::export::run(
                path,
                output,
                chunk_size,
                !no_combine,
                single_pass,
                codec,
                bitrate_kbps,
            )
            .await
        }
        Commands::Info { path } => commands::info::run(path),
        Commands::Check => commands::check::run(),
    }
}
