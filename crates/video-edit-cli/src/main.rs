//! Video Edit CLI
//!
//! Runs the edit pipeline on local files without the HTTP service.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod parser;

use commands::compile::CompileCommand;
use commands::run::RunCommand;

#[derive(Parser)]
#[command(
    name = "video-edit",
    version,
    about = "Instruction-driven video editing",
    long_about = "Turn plain-language editing instructions into a validated sequence of\n\
                  operations and run them with ffmpeg.",
    after_help = "EXAMPLES:\n  \
                  # List supported operations and their parameters\n  \
                  video-edit operations\n\n  \
                  # Show what an instruction compiles to\n  \
                  video-edit compile \"trim from 0 to 10 seconds and rotate 90 degrees\"\n  \
                  video-edit compile --input clip.mp4 \"crop to 16:9\"\n\n  \
                  # Edit a file\n  \
                  video-edit run clip.mp4 --instruction \"denoise then stabilize\"\n  \
                  video-edit run clip.mp4 --ops \"trim:start_time=0,end_time=10;rotate:angle=90\"\n\n\
                  For more details on a specific command:\n  \
                  video-edit <COMMAND> --help"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file (ffmpeg paths, encoder settings, interpreter);
    /// defaults to $VIDEO_EDIT_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported operations
    Operations,

    /// Compile an instruction into operations without running them
    Compile(CompileCommand),

    /// Apply an instruction or explicit operations to a file
    Run(RunCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match &cli.command {
        Commands::Operations => Level::WARN,
        _ => {
            if cli.verbose {
                Level::DEBUG
            } else {
                Level::INFO
            }
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config_path = cli
        .config
        .or_else(|| std::env::var_os("VIDEO_EDIT_CONFIG").map(PathBuf::from));

    match cli.command {
        Commands::Operations => commands::operations::list_operations(),
        Commands::Compile(cmd) => cmd.execute(config_path.as_deref()).await,
        Commands::Run(cmd) => cmd.execute(config_path.as_deref()).await,
    }
}
