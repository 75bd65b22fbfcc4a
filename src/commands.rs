//! CLI command definitions
//!
//! Defines the clap commands for the matrix-shell CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Descriptor filter shared by every command
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Only keep scripts whose descriptor matches this regular expression
    #[arg(long, short)]
    pub filter: Option<String>,

    /// Treat --filter as a plain substring instead of a regular expression
    #[arg(long)]
    pub substring: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the descriptor of every script in a matrix
    #[command(alias = "ls")]
    List {
        /// Path to the matrix document
        file: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the rendered scripts, or write them to a directory
    Render {
        /// Path to the matrix document
        file: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Override a parameter in every script (KEY=VALUE, repeatable)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,

        /// Write each script to DIR/<descriptor>.sh instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Run every script of a matrix
    Run {
        /// Path to the matrix document
        file: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Override a parameter in every script (KEY=VALUE, repeatable)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,

        /// Show what would run without executing anything
        #[arg(long)]
        dry_run: bool,

        /// Stop after the first failing script
        #[arg(long)]
        fail_fast: bool,

        /// Per-script timeout in seconds (0 disables)
        #[arg(long)]
        timeout: Option<u64>,

        /// Interpreter used to run scripts (default: bash)
        #[arg(long)]
        interpreter: Option<String>,
    },
}
