//! Reelcut worker — command-line entry point for the rendering pipeline.
//!
//! Usage:
//!   reelcut run <REQUEST>     Run one job from a request file
//!                             (`--result <FILE>` also writes the result JSON)
//!   reelcut probe <PATH>      Probe a media file and print its metadata
//!   reelcut check             Check host capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "reelcut",
    about = "Vertical-video reframing and transcoding worker",
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
    /// Run one rendering job from a request file
    Run {
        /// Path to the JSON job request
        request: PathBuf,

        /// Also write the job result JSON to this file
        #[arg(long)]
        result: Option<PathBuf>,
    },

    /// Probe a media file and print its metadata as JSON
    Probe {
        /// Path to the media file
        path: PathBuf,
    },

    /// Check host capabilities (ffmpeg, encoders, directories)
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = reelcut_common::WorkerConfig::from_env();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    reelcut_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Run { request, result } => commands::run::run(request, result, config).await,
        Commands::Probe { path } => commands::probe::run(path).await,
        Commands::Check => commands::check::run(config).await,
    }
}
