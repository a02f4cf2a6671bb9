//! CLI argument definitions using clap
//!
//! Commands:
//! - metamodel check --config <path>
//! - metamodel describe --config <path> --class <name>
//! - metamodel validate --config <path> --class <name> [--update]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// metamodel - compile class definitions and validate records against them
#[derive(Parser, Debug)]
#[command(name = "metamodel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and compile every definition set, then report the hierarchy
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./metamodel.json")]
        config: PathBuf,
    },

    /// Print the compiled model of one class
    Describe {
        /// Path to configuration file
        #[arg(long, default_value = "./metamodel.json")]
        config: PathBuf,

        /// Class name
        #[arg(long)]
        class: String,
    },

    /// Validate one JSON record read from stdin
    Validate {
        /// Path to configuration file
        #[arg(long, default_value = "./metamodel.json")]
        config: PathBuf,

        /// Class name
        #[arg(long)]
        class: String,

        /// Treat the record as a mutation of an existing one
        #[arg(long)]
        update: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
