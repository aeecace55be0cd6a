use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "batchforge")]
#[command(author, version, about = "Batch ffmpeg conversions with live progress")]
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
    /// Run every job in a batch file
    Run {
        /// TOML file with one [[job]] table per conversion
        #[arg(required = true)]
        batch: PathBuf,
    },

    /// Convert input files into an output directory
    Convert {
        /// Files to convert, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for converted files
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Extension of the converted files
        #[arg(long, default_value = "mp4")]
        ext: String,

        /// Replace existing outputs instead of picking a free name
        #[arg(long)]
        overwrite: bool,

        /// Arguments passed to ffmpeg between the input and the output
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print the duration ffprobe reports for a file
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
