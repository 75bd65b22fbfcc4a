//! Default parameters shared by every script of a matrix
//!
//! A `default_params:` block is either a YAML mapping or a list of
//! single-entry mappings. Entries are kept exactly in block order.

use serde_yaml::Value;

use super::scalar_text;
use crate::common::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultParameterSet {
    entries: Vec<(String, String)>,
}

impl DefaultParameterSet {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Parse the text of a `default_params:` block
    pub fn parse(text: &str) -> Result<Self> {
        let doc: Value =
            serde_yaml::from_str(text).map_err(|e| Error::MalformedDefaultData(e.to_string()))?;

        let mut entries = Vec::new();
        match doc {
            Value::Null => {}
            Value::Mapping(mapping) => {
                for (key, value) in &mapping {
                    entries.push(entry(key, value)?);
                }
            }
            Value::Sequence(items) => {
                for item in &items {
                    match item {
                        Value::Mapping(single) if single.len() == 1 => {
                            for (key, value) in single {
                                entries.push(entry(key, value)?);
                            }
                        }
                        _ => {
                            return Err(Error::MalformedDefaultData(
                                "list items must each be a single `key: value` entry".to_string(),
                            ))
                        }
                    }
                }
            }
            _ => {
                return Err(Error::MalformedDefaultData(
                    "expected a mapping or a list of `key: value` entries".to_string(),
                ))
            }
        }

        Ok(Self { entries })
    }

    /// Entries in block order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry(key: &Value, value: &Value) -> Result<(String, String)> {
    let key = scalar_text(key).ok_or_else(|| {
        Error::MalformedDefaultData("parameter names must be scalars".to_string())
    })?;
    let value = scalar_text(value).ok_or_else(|| {
        Error::MalformedDefaultData(format!("value of '{key}' must be a scalar"))
    })?;
    Ok((key, value))
}
