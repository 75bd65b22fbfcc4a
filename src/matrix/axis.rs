//! Parameter axes and their Cartesian product
//!
//! A `params:` block is a YAML mapping of axis name to a list of values:
//!
//! ```yaml
//! mode: [tcp, udp]
//! size: [64, 1500]
//! ```
//!
//! Bindings are produced lazily in depth-first order: the first axis varies
//! slowest and the last axis varies fastest.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_yaml::Value;

use super::scalar_text;
use crate::common::{Error, Result};

/// A named, ordered list of candidate values for one parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    pub name: String,
    pub values: Vec<String>,
}

impl Axis {
    pub fn new<N, I, V>(name: N, values: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered set of axes, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisSet {
    axes: Vec<Axis>,
}

impl AxisSet {
    pub fn new(axes: Vec<Axis>) -> Self {
        Self { axes }
    }

    /// Parse the text of a `params:` block
    ///
    /// An empty block declares no axes.
    pub fn parse(text: &str) -> Result<Self> {
        let doc: Value =
            serde_yaml::from_str(text).map_err(|e| Error::MalformedAxisData(e.to_string()))?;

        let mapping = match doc {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(Error::MalformedAxisData(format!(
                    "expected a mapping of axis name to list of values, found {}",
                    kind_of(&other)
                )))
            }
        };

        let mut axes = Vec::with_capacity(mapping.len());
        for (key, value) in &mapping {
            let name = scalar_text(key).ok_or_else(|| {
                Error::MalformedAxisData(format!("axis name must be a scalar, found {}", kind_of(key)))
            })?;

            let Value::Sequence(items) = value else {
                return Err(Error::MalformedAxisData(format!(
                    "axis '{}' must be a list of values, found {}",
                    name,
                    kind_of(value)
                )));
            };

            let values = items
                .iter()
                .map(|item| {
                    scalar_text(item).ok_or_else(|| {
                        Error::MalformedAxisData(format!(
                            "axis '{}' has a non-scalar value ({})",
                            name,
                            kind_of(item)
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            axes.push(Axis { name, values });
        }

        Ok(Self { axes })
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Number of bindings in the full product, `None` on overflow
    pub fn binding_count(&self) -> Option<usize> {
        self.axes
            .iter()
            .try_fold(1usize, |acc, axis| acc.checked_mul(axis.values.len()))
    }

    /// Lazily generate every binding of the product
    pub fn bindings(&self) -> Bindings<'_> {
        Bindings {
            axes: &self.axes,
            cursor: Vec::new(),
            remaining: self.binding_count(),
            state: State::Fresh,
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// One point of the product: exactly one value per axis, in axis order
///
/// Bindings are plain values. Each one handed out by [`Bindings`] is built
/// fresh, so nothing observed through one binding changes with another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterBinding {
    entries: Vec<(String, String)>,
}

impl ParameterBinding {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Value bound to `name`, if that axis exists
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Entries in declared axis order
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

/// `k=v` pairs separated by spaces, e.g. `mode=tcp size=64`
impl fmt::Display for ParameterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

/// Serialized as a map that keeps axis order
impl Serialize for ParameterBinding {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Running,
    Done,
}

/// Pull-based depth-first generator over an [`AxisSet`]
///
/// `cursor[d]` is the index of the value currently chosen for axis `d`.
/// Advancing bumps the deepest axis and carries outwards, which yields the
/// same order as recursing over the axes with the last one innermost.
pub struct Bindings<'a> {
    axes: &'a [Axis],
    cursor: Vec<usize>,
    remaining: Option<usize>,
    state: State,
}

impl Bindings<'_> {
    fn current(&self) -> ParameterBinding {
        ParameterBinding {
            entries: self
                .axes
                .iter()
                .zip(&self.cursor)
                .map(|(axis, &i)| (axis.name.clone(), axis.values[i].clone()))
                .collect(),
        }
    }

    /// Move the cursor to the next point, returning false when exhausted
    fn advance(&mut self) -> bool {
        for depth in (0..self.axes.len()).rev() {
            self.cursor[depth] += 1;
            if self.cursor[depth] < self.axes[depth].values.len() {
                return true;
            }
            self.cursor[depth] = 0;
        }
        false
    }
}

impl Iterator for Bindings<'_> {
    type Item = ParameterBinding;

    fn next(&mut self) -> Option<ParameterBinding> {
        match self.state {
            State::Done => return None,
            State::Fresh => {
                if self.axes.iter().any(|axis| axis.values.is_empty()) {
                    self.state = State::Done;
                    return None;
                }
                self.cursor = vec![0; self.axes.len()];
                self.state = State::Running;
            }
            State::Running => {
                if !self.advance() {
                    self.state = State::Done;
                    return None;
                }
            }
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        Some(self.current())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match (self.state, self.remaining) {
            (State::Done, _) => (0, Some(0)),
            (_, Some(n)) => (n, Some(n)),
            (_, None) => (usize::MAX, None),
        }
    }
}
