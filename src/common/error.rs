//! Error types for matrix-shell
//!
//! Error messages name the offending document and line where one is known,
//! so a test author can jump straight to the problem.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for matrix-shell
#[derive(Error, Debug)]
pub enum Error {
    // === Source Errors ===
    #[error("Matrix document '{}' not found", path.display())]
    DocumentNotFound { path: PathBuf },

    #[error("Included document '{path}' not found. Searched: {searched}")]
    ResourceNotFound { path: String, searched: String },

    #[error("Include cycle: '{}' is already being read", path.display())]
    IncludeCycle { path: PathBuf },

    #[error("'{block}' block opened at {}:{line} has no closing 'end' line", path.display())]
    UnterminatedBlock {
        block: String,
        path: PathBuf,
        line: usize,
    },

    // === Block Data Errors ===
    #[error("Malformed params block: {0}")]
    MalformedAxisData(String),

    #[error("Malformed default_params block: {0}")]
    MalformedDefaultData(String),

    // === Compilation Errors ===
    #[error("Invalid parameter override '{0}'. Expected KEY=VALUE with KEY a shell variable name")]
    InvalidOverride(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(String),

    // === Execution Errors ===
    #[error("Test {descriptor} failed with exit code {}", code.map_or_else(|| "none (killed by signal)".to_string(), |c| c.to_string()))]
    ScriptExecutionFailure {
        descriptor: String,
        code: Option<i32>,
    },

    #[error("Test {descriptor} timed out after {secs} seconds")]
    ScriptTimeout { descriptor: String, secs: u64 },

    #[error("Script interpreter '{0}' not found on PATH")]
    InterpreterNotFound(String),

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a resource not found error listing every location tried
    pub fn resource_not_found<P: AsRef<std::path::Path>>(path: &str, searched: &[P]) -> Self {
        Self::ResourceNotFound {
            path: path.to_string(),
            searched: searched
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Create an unterminated block error
    pub fn unterminated_block(block: &str, path: &std::path::Path, line: usize) -> Self {
        Self::UnterminatedBlock {
            block: block.to_string(),
            path: path.to_path_buf(),
            line,
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: &io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}
