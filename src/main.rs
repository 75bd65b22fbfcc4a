//! matrix-shell - expand one shell test template into a matrix of scripts
//!
//! Lists, renders and runs every combination of the parameters declared in a
//! matrix document.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use matrix_shell::common::config::Config;
use matrix_shell::{cli, commands, common};

#[derive(Parser)]
#[command(name = "matrix-shell", about = "Parameterized shell test matrices")]
#[command(version, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    common::logging::init_cli(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let result = match config {
        Ok(config) => cli::dispatch(cli.command, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
