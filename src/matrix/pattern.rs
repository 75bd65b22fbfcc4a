//! Descriptor filters
//!
//! Any type implementing [`DescriptorMatcher`] can be handed to
//! `MatrixCompiler::iter_matching`. Regular expressions and plain substrings
//! are provided; an empty pattern of either kind matches everything.

use regex::Regex;

use crate::common::{Error, Result};

/// Predicate over a compiled script's descriptor
pub trait DescriptorMatcher {
    fn matches(&self, descriptor: &str) -> bool;
}

impl DescriptorMatcher for Regex {
    fn matches(&self, descriptor: &str) -> bool {
        self.is_match(descriptor)
    }
}

/// Substring match
impl DescriptorMatcher for str {
    fn matches(&self, descriptor: &str) -> bool {
        descriptor.contains(self)
    }
}

impl DescriptorMatcher for String {
    fn matches(&self, descriptor: &str) -> bool {
        descriptor.contains(self.as_str())
    }
}

/// A filter as given on the command line
#[derive(Debug, Clone)]
pub enum Pattern {
    Substring(String),
    Regex(Regex),
}

impl Pattern {
    /// Build a pattern, as a regular expression unless `substring` is set
    pub fn new(pattern: &str, substring: bool) -> Result<Self> {
        if substring {
            return Ok(Self::Substring(pattern.to_string()));
        }
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| Error::InvalidPattern(e.to_string()))
    }
}

impl DescriptorMatcher for Pattern {
    fn matches(&self, descriptor: &str) -> bool {
        match self {
            Self::Substring(s) => descriptor.contains(s.as_str()),
            Self::Regex(re) => re.is_match(descriptor),
        }
    }
}
