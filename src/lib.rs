//! matrix-shell - expand one shell test template into a matrix of scripts
//!
//! A matrix document declares parameter axes, default parameters and a
//! shell body. This library compiles it into one self-contained script per
//! combination of axis values, filters them by descriptor, and runs them.

pub mod cli;
pub mod commands;
pub mod common;
pub mod matrix;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use matrix::{DescriptorMatcher, MatrixCompiler, ParameterBinding, Pattern, TestScript};
