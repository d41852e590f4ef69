use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "castbridge")]
#[command(author, version, about = "Stream local media to cast receivers over HTTP")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve one or more media files as cast-ready streams
    Cast {
        /// Files to play, in order
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Clockwise rotation in degrees (0, 90, 180 or 270)
        #[arg(long, default_value = "0")]
        rotation: u32,

        /// Subtitle file to burn into the video
        #[arg(long)]
        subtitle: Option<PathBuf>,

        /// Start offset in seconds for the first file
        #[arg(long, default_value = "0")]
        offset: f64,

        /// Disable the remote-control web page
        #[arg(long)]
        no_remote: bool,
    },

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
