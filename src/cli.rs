use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "convertkit")]
#[command(author, version, about = "Convert and compress media files")]
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
    /// Run one conversion job on a local file
    Convert {
        /// Operation kind, e.g. compress-video or raster-convert
        #[arg(required = true)]
        operation: String,

        /// Input file to convert
        #[arg(required = true)]
        input: PathBuf,

        /// Directory for the converted file (defaults to the current one)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Operation option as key=value (repeatable)
        #[arg(short = 'O', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,

        /// Print the result metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the supported operation kinds and their source formats
    Operations,

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
