//! Test runner implementation
//!
//! Persists each compiled script and hands it to the configured interpreter.
//! The interpreter's exit status is the only pass/fail signal.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use colored::Colorize;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::common::config::RunnerConfig;
use crate::common::{Error, Result};
use crate::matrix::{DescriptorMatcher, MatrixCompiler, TestScript};

/// How a single script ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    /// Non-zero exit, `None` when killed by a signal
    Failed(Option<i32>),
    TimedOut(u64),
    /// Dry run, nothing was executed
    Skipped,
}

/// Result of running one script
#[derive(Debug)]
pub struct TestResult {
    pub descriptor: String,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl TestResult {
    /// Whether the script did not fail (dry-run skips count as passing)
    pub fn passed(&self) -> bool {
        matches!(self.outcome, Outcome::Passed | Outcome::Skipped)
    }

    /// Turn a failed outcome into an error
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            Outcome::Failed(code) => Err(Error::ScriptExecutionFailure {
                descriptor: self.descriptor,
                code,
            }),
            Outcome::TimedOut(secs) => Err(Error::ScriptTimeout {
                descriptor: self.descriptor,
                secs,
            }),
            Outcome::Passed | Outcome::Skipped => Ok(self),
        }
    }
}

/// Totals over a matrix run
#[derive(Debug, Default)]
pub struct Summary {
    pub passed: usize,
    pub failed: Vec<String>,
    pub skipped: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.passed + self.failed.len() + self.skipped
    }

    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, result: &TestResult) {
        match result.outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed(_) | Outcome::TimedOut(_) => {
                self.failed.push(result.descriptor.clone())
            }
        }
    }
}

/// Executes compiled scripts with an external interpreter
#[derive(Debug)]
pub struct ScriptRunner {
    config: RunnerConfig,
    /// `None` in dry-run mode
    interpreter: Option<PathBuf>,
}

impl ScriptRunner {
    /// Create a runner, resolving the interpreter unless `dry_run` is set
    pub fn new(config: RunnerConfig, dry_run: bool) -> Result<Self> {
        let interpreter = if dry_run {
            None
        } else {
            Some(config.resolve_interpreter()?)
        };
        Ok(Self {
            config,
            interpreter,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.interpreter.is_none()
    }

    /// Run a single script
    ///
    /// A failing or timed out script is an `Ok` result; `Err` means the
    /// script could not be written or the interpreter could not be started.
    pub async fn run(&self, script: &TestScript) -> Result<TestResult> {
        let descriptor = script.descriptor();
        info!(":: running {} with {}", script.name(), script.binding());

        let Some(interpreter) = &self.interpreter else {
            return Ok(TestResult {
                descriptor,
                outcome: Outcome::Skipped,
                duration: Duration::ZERO,
            });
        };

        // Keep the temporary file alive until the interpreter exits
        let (path, _temp) = self.persist(script)?;
        let work_dir = self
            .config
            .work_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        debug!(
            interpreter = %interpreter.display(),
            script = %path.display(),
            work_dir = %work_dir.display(),
            "spawning"
        );

        let started = Instant::now();
        let mut child = TokioCommand::new(interpreter)
            .arg(&path)
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let outcome = match self.config.timeout() {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => exit_outcome(status?),
                Err(_) => {
                    let _ = child.kill().await;
                    Outcome::TimedOut(limit.as_secs())
                }
            },
            None => exit_outcome(child.wait().await?),
        };

        let result = TestResult {
            descriptor,
            outcome,
            duration: started.elapsed(),
        };
        if !result.passed() {
            warn!(
                descriptor = %result.descriptor,
                outcome = ?result.outcome,
                work_dir = %work_dir.display(),
                "test failed"
            );
        }
        Ok(result)
    }

    /// Run every matching script of a matrix, printing one line per script
    ///
    /// `overrides` are appended to each script before it runs. With
    /// `fail_fast` the run stops after the first failing script.
    pub async fn run_matrix<M>(
        &self,
        matrix: &MatrixCompiler,
        matcher: Option<&M>,
        overrides: &[String],
        fail_fast: bool,
    ) -> Result<Summary>
    where
        M: DescriptorMatcher + ?Sized,
    {
        let mut summary = Summary::default();

        println!(
            "\n{} {}",
            "Running Matrix:".blue().bold(),
            matrix.name().white().bold()
        );

        for mut script in matrix.iter_matching(matcher) {
            script.append_overrides(overrides)?;
            let result = self.run(&script).await?;
            summary.record(&result);
            print_result(&result);

            if fail_fast && !result.passed() {
                println!("  {}", "Stopping after first failure".yellow());
                break;
            }
        }

        print_summary(&summary);
        Ok(summary)
    }

    /// Write the script to the configured path or a fresh temporary file
    fn persist(&self, script: &TestScript) -> Result<(PathBuf, Option<tempfile::TempPath>)> {
        if let Some(path) = &self.config.script_path {
            let path = self.script_location(path)?;
            script.save(&path)?;
            return Ok((path, None));
        }

        let mut file = tempfile::Builder::new()
            .prefix("matrix-shell-")
            .suffix(".sh")
            .tempfile()?;
        file.write_all(script.as_bytes())?;
        file.flush()?;
        let temp = file.into_temp_path();
        Ok((temp.to_path_buf(), Some(temp)))
    }

    /// Absolute location of a configured script path
    ///
    /// A relative path lives in the work directory, the same place the
    /// interpreter is started from.
    fn script_location(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let mut location = std::env::current_dir()?;
        if let Some(work_dir) = &self.config.work_dir {
            location.push(work_dir);
        }
        location.push(path);
        Ok(location)
    }
}

fn exit_outcome(status: std::process::ExitStatus) -> Outcome {
    if status.success() {
        Outcome::Passed
    } else {
        Outcome::Failed(status.code())
    }
}

fn print_result(result: &TestResult) {
    let secs = format!("({:.2}s)", result.duration.as_secs_f64());
    match result.outcome {
        Outcome::Passed => println!(
            "  {} {} {}",
            "✓".green(),
            result.descriptor,
            secs.dimmed()
        ),
        Outcome::Skipped => println!(
            "  {} {} {}",
            "-".dimmed(),
            result.descriptor,
            "(dry run)".dimmed()
        ),
        Outcome::Failed(code) => println!(
            "  {} {} {}",
            "✗".red(),
            result.descriptor,
            format!(
                "exit code {}",
                code.map_or_else(|| "signal".to_string(), |c| c.to_string())
            )
            .red()
        ),
        Outcome::TimedOut(limit) => println!(
            "  {} {} {}",
            "✗".red(),
            result.descriptor,
            format!("timed out after {limit}s").red()
        ),
    }
}

fn print_summary(summary: &Summary) {
    if summary.success() {
        println!(
            "\n{} {}\n",
            "✓".green().bold(),
            format!(
                "{} passed, {} skipped",
                summary.passed, summary.skipped
            )
            .green()
            .bold()
        );
    } else {
        println!(
            "\n{} {}",
            "✗".red().bold(),
            format!(
                "{} failed, {} passed, {} skipped",
                summary.failed.len(),
                summary.passed,
                summary.skipped
            )
            .red()
            .bold()
        );
        for descriptor in &summary.failed {
            println!("  {}", descriptor.red());
        }
        println!();
    }
}

/// Path of a script written by `render --output`
pub fn script_file_name(dir: &Path, descriptor: &str) -> PathBuf {
    dir.join(format!("{}.sh", file_stem(descriptor)))
}

/// Like [`script_file_name`], but never returns a path already in `taken`
///
/// Different descriptors can fold to the same file name (`p=a/b` and
/// `p=a-b`). Later ones get a `-2`, `-3`, ... suffix.
pub fn unique_script_file_name(
    dir: &Path,
    descriptor: &str,
    taken: &mut HashSet<PathBuf>,
) -> PathBuf {
    let path = script_file_name(dir, descriptor);
    if taken.insert(path.clone()) {
        return path;
    }

    let stem = file_stem(descriptor);
    let mut n = 2;
    loop {
        let candidate = dir.join(format!("{stem}-{n}.sh"));
        if taken.insert(candidate.clone()) {
            warn!(
                descriptor,
                path = %candidate.display(),
                "file name already used by another script"
            );
            return candidate;
        }
        n += 1;
    }
}

fn file_stem(descriptor: &str) -> String {
    let safe: String = descriptor
        .chars()
        .map(|c| match c {
            '/' => '-',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '=' | '-') => c,
            _ => '_',
        })
        .collect();
    safe.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bash_available() -> bool {
        which::which("bash").is_ok()
    }

    fn write_matrix(dir: &Path, body: &str) -> MatrixCompiler {
        let root = dir.join("suite.ms");
        std::fs::write(&root, body).unwrap();
        MatrixCompiler::open(&root).unwrap()
    }

    fn runner(dir: &Path, timeout_secs: u64) -> ScriptRunner {
        let config = RunnerConfig {
            timeout_secs,
            work_dir: Some(dir.to_path_buf()),
            ..RunnerConfig::default()
        };
        ScriptRunner::new(config, false).unwrap()
    }

    #[test]
    fn test_script_file_name() {
        let dir = Path::new("/out");
        assert_eq!(
            script_file_name(dir, "net/mode=tcp__size=64"),
            PathBuf::from("/out/net-mode=tcp__size=64.sh")
        );
        assert_eq!(script_file_name(dir, "net/"), PathBuf::from("/out/net.sh"));
        assert_eq!(
            script_file_name(dir, "net/path=a$b"),
            PathBuf::from("/out/net-path=a_b.sh")
        );
    }

    #[test]
    fn test_colliding_descriptors_get_distinct_files() {
        let dir = Path::new("/out");
        let mut taken = HashSet::new();
        assert_eq!(
            script_file_name(dir, "net/p=a/b"),
            script_file_name(dir, "net/p=a-b")
        );

        let first = unique_script_file_name(dir, "net/p=a/b", &mut taken);
        let second = unique_script_file_name(dir, "net/p=a-b", &mut taken);
        let third = unique_script_file_name(dir, "net/p=a_b", &mut taken);
        let fourth = unique_script_file_name(dir, "net/p=a$b", &mut taken);
        assert_eq!(first, PathBuf::from("/out/net-p=a-b.sh"));
        assert_eq!(second, PathBuf::from("/out/net-p=a-b-2.sh"));
        assert_eq!(third, PathBuf::from("/out/net-p=a_b.sh"));
        assert_eq!(fourth, PathBuf::from("/out/net-p=a_b-2.sh"));
        assert_eq!(taken.len(), 4);
    }

    #[test]
    fn test_into_result_maps_failures() {
        let failed = TestResult {
            descriptor: "m/a=1".to_string(),
            outcome: Outcome::Failed(Some(3)),
            duration: Duration::ZERO,
        };
        assert!(matches!(
            failed.into_result(),
            Err(Error::ScriptExecutionFailure { code: Some(3), .. })
        ));

        let skipped = TestResult {
            descriptor: "m/a=1".to_string(),
            outcome: Outcome::Skipped,
            duration: Duration::ZERO,
        };
        assert!(skipped.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let dir = tempdir().unwrap();
        let matrix = write_matrix(dir.path(), "params:\na: [1, 2]\nend\ntouch ran-$a\n");
        let runner = ScriptRunner::new(
            RunnerConfig {
                interpreter: "/definitely/not/here".to_string(),
                work_dir: Some(dir.path().to_path_buf()),
                ..RunnerConfig::default()
            },
            true,
        )
        .unwrap();
        assert!(runner.is_dry_run());

        let summary = runner
            .run_matrix::<str>(&matrix, None, &[], false)
            .await
            .unwrap();
        assert_eq!(summary.skipped, 2);
        assert!(summary.success());
        assert!(!dir.path().join("ran-1").exists());
    }

    #[tokio::test]
    async fn test_pass_and_fail_are_reported_per_script() {
        if !bash_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let matrix = write_matrix(dir.path(), "params:\ncode: [0, 3, 0]\nend\nexit $code\n");
        let runner = runner(dir.path(), 0);

        let results: Vec<_> = {
            let mut out = Vec::new();
            for script in &matrix {
                out.push(runner.run(&script).await.unwrap());
            }
            out
        };
        assert_eq!(results[0].outcome, Outcome::Passed);
        assert_eq!(results[1].outcome, Outcome::Failed(Some(3)));
        assert_eq!(results[2].outcome, Outcome::Passed);
    }

    #[tokio::test]
    async fn test_scripts_run_in_work_dir_with_overrides() {
        if !bash_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let matrix = write_matrix(
            dir.path(),
            "default_params:\nsuffix: default\nend\nparams:\nname: [a, b]\nend\necho ok > out-$name-$suffix\n",
        );
        let runner = runner(dir.path(), 0);

        let summary = runner
            .run_matrix(&matrix, Some("name=b"), &["suffix=user".to_string()], false)
            .await
            .unwrap();
        assert_eq!(summary.passed, 1);
        assert!(dir.path().join("out-b-user").exists());
        assert!(!dir.path().join("out-a-user").exists());
        assert!(!dir.path().join("out-b-default").exists());
    }

    #[tokio::test]
    async fn test_fail_fast_stops_run() {
        if !bash_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let matrix = write_matrix(dir.path(), "params:\ncode: [1, 0, 0]\nend\nexit $code\n");
        let runner = runner(dir.path(), 0);

        let summary = runner
            .run_matrix::<str>(&matrix, None, &[], true)
            .await
            .unwrap();
        assert_eq!(summary.total(), 1);
        assert_eq!(summary.failed, vec!["suite/code=1".to_string()]);
    }

    #[tokio::test]
    async fn test_timeout() {
        if !bash_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let matrix = write_matrix(dir.path(), "sleep 5\n");
        let runner = runner(dir.path(), 1);

        let script = matrix.iter().next().unwrap();
        let result = runner.run(&script).await.unwrap();
        assert_eq!(result.outcome, Outcome::TimedOut(1));
    }

    #[tokio::test]
    async fn test_fixed_script_path_is_written() {
        if !bash_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let matrix = write_matrix(dir.path(), "true\n");
        let script_path = dir.path().join("testshell.sh");
        let runner = ScriptRunner::new(
            RunnerConfig {
                script_path: Some(script_path.clone()),
                work_dir: Some(dir.path().to_path_buf()),
                ..RunnerConfig::default()
            },
            false,
        )
        .unwrap();

        let script = matrix.iter().next().unwrap();
        runner.run(&script).await.unwrap();
        assert_eq!(std::fs::read_to_string(&script_path).unwrap(), script.text());
    }

    #[tokio::test]
    async fn test_relative_script_path_lives_in_work_dir() {
        if !bash_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let matrix = write_matrix(dir.path(), "true\n");
        let runner = ScriptRunner::new(
            RunnerConfig {
                script_path: Some(PathBuf::from("testshell.sh")),
                work_dir: Some(dir.path().to_path_buf()),
                ..RunnerConfig::default()
            },
            false,
        )
        .unwrap();

        let script = matrix.iter().next().unwrap();
        let result = runner.run(&script).await.unwrap();
        assert_eq!(result.outcome, Outcome::Passed);
        assert_eq!(
            std::fs::read(dir.path().join("testshell.sh")).unwrap(),
            script.as_bytes()
        );
    }

    #[tokio::test]
    async fn test_non_utf8_body_runs() {
        if !bash_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let root = dir.path().join("latin.ms");
        std::fs::write(&root, b"printf 'caf\xe9' > out.txt\n").unwrap();
        let matrix = MatrixCompiler::open(&root).unwrap();
        let runner = runner(dir.path(), 0);

        let script = matrix.iter().next().unwrap();
        let result = runner.run(&script).await.unwrap();
        assert_eq!(result.outcome, Outcome::Passed);
        assert_eq!(std::fs::read(dir.path().join("out.txt")).unwrap(), b"caf\xe9");
    }
}
