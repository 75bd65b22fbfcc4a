//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Script runner settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Terminal output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Settings for executing rendered scripts
#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    /// Interpreter used to run each script (name on PATH or absolute path)
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Per-script timeout in seconds, 0 disables it
    #[serde(default)]
    pub timeout_secs: u64,

    /// Fixed location to write each script before running it.
    /// A fresh temporary file is used when unset.
    pub script_path: Option<PathBuf>,

    /// Working directory the scripts run in (default: current directory)
    pub work_dir: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: 0,
            script_path: None,
            work_dir: None,
        }
    }
}

fn default_interpreter() -> String {
    "bash".to_string()
}

/// Terminal output configuration
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Colorize pass/fail lines
    #[serde(default = "default_color")]
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
        }
    }
}

fn default_color() -> bool {
    true
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}

impl RunnerConfig {
    /// Resolve the interpreter to an executable path
    ///
    /// Names without a path separator are searched on PATH.
    pub fn resolve_interpreter(&self) -> Result<PathBuf> {
        let candidate = Path::new(&self.interpreter);
        if candidate.components().count() > 1 {
            if candidate.exists() {
                return Ok(candidate.to_path_buf());
            }
            return Err(Error::InterpreterNotFound(self.interpreter.clone()));
        }

        which::which(&self.interpreter)
            .map_err(|_| Error::InterpreterNotFound(self.interpreter.clone()))
    }

    /// Timeout as an `Option`, treating 0 as "no timeout"
    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }
}
