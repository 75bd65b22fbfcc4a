//! Script execution
//!
//! Runs compiled matrix scripts through an external interpreter and reports
//! one pass/fail result per script. Whether to keep going after a failure is
//! up to the caller.

mod runner;

pub use runner::{
    script_file_name, unique_script_file_name, Outcome, ScriptRunner, Summary, TestResult,
};
