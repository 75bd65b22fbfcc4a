//! CLI command handling
//!
//! Dispatches CLI commands to the compiler and runner and formats output.

use std::collections::HashSet;
use std::io::Write;

use serde::Serialize;

use crate::commands::{Commands, FilterArgs};
use crate::common::config::Config;
use crate::common::Result;
use crate::matrix::{MatrixCompiler, ParameterBinding, Pattern};
use crate::testing::{unique_script_file_name, ScriptRunner};

/// Dispatch a CLI command
///
/// Returns `Ok(false)` when the command ran but some script failed.
pub async fn dispatch(command: Commands, config: Config) -> Result<bool> {
    if !config.output.color {
        colored::control::set_override(false);
    }

    match command {
        Commands::List { file, filter, json } => {
            let matrix = MatrixCompiler::open(&file)?;
            let pattern = build_pattern(&filter)?;

            if json {
                let entries: Vec<ListEntry> = matrix
                    .iter_matching(pattern.as_ref())
                    .map(|script| ListEntry {
                        descriptor: script.descriptor(),
                        params: script.binding().clone(),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for script in matrix.iter_matching(pattern.as_ref()) {
                    println!("{}", script.descriptor());
                }
            }

            Ok(true)
        }

        Commands::Render {
            file,
            filter,
            params,
            output,
        } => {
            let matrix = MatrixCompiler::open(&file)?;
            let pattern = build_pattern(&filter)?;

            if let Some(dir) = &output {
                std::fs::create_dir_all(dir)?;
            }

            let mut written = HashSet::new();
            let mut stdout = std::io::stdout().lock();
            for mut script in matrix.iter_matching(pattern.as_ref()) {
                script.append_overrides(&params)?;
                match &output {
                    Some(dir) => {
                        let path =
                            unique_script_file_name(dir, &script.descriptor(), &mut written);
                        script.save(&path)?;
                        writeln!(stdout, "{}", path.display())?;
                    }
                    None => {
                        writeln!(stdout, "# ==> {}", script.descriptor())?;
                        stdout.write_all(script.as_bytes())?;
                        writeln!(stdout)?;
                    }
                }
            }

            Ok(true)
        }

        Commands::Run {
            file,
            filter,
            params,
            dry_run,
            fail_fast,
            timeout,
            interpreter,
        } => {
            let mut runner_config = config.runner;
            if let Some(secs) = timeout {
                runner_config.timeout_secs = secs;
            }
            if let Some(interpreter) = interpreter {
                runner_config.interpreter = interpreter;
            }

            let matrix = MatrixCompiler::open(&file)?;
            let pattern = build_pattern(&filter)?;
            let runner = ScriptRunner::new(runner_config, dry_run)?;

            let summary = runner
                .run_matrix(&matrix, pattern.as_ref(), &params, fail_fast)
                .await?;
            Ok(summary.success())
        }
    }
}

/// One line of `list --json`
#[derive(Debug, Serialize)]
struct ListEntry {
    descriptor: String,
    params: ParameterBinding,
}

fn build_pattern(args: &FilterArgs) -> Result<Option<Pattern>> {
    args.filter
        .as_deref()
        .map(|p| Pattern::new(p, args.substring))
        .transpose()
}
