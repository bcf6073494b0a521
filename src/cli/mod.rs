//! CLI module for Shopwright.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Shopwright - woodworking shop assistant
///
/// Answers woodworking questions from a library of video transcripts and
/// links the products featured in those videos.
#[derive(Parser, Debug)]
#[command(name = "shopwright")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the chat and shop HTTP API
    Serve {
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question and print the streamed answer
    Ask {
        /// The question to ask
        question: String,
    },

    /// Check API key, database connectivity and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file if none exists
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
