//! Matrix document compiler
//!
//! Turns one `.ms` document (a shell body plus `params:` and
//! `default_params:` blocks and `#include` lines) into one script per point
//! of the parameter product.

mod axis;
mod compiler;
mod defaults;
mod parser;
mod pattern;
mod script;
mod source;

pub use axis::{Axis, AxisSet, Bindings, ParameterBinding};
pub use compiler::{MatrixCompiler, Scripts};
pub use defaults::DefaultParameterSet;
pub use parser::{
    Directive, DirectiveParser, ParsedDocument, BLOCK_TERMINATOR, DEFAULT_PARAMS_HEADER,
    PARAMS_HEADER,
};
pub use pattern::{DescriptorMatcher, Pattern};
pub use script::{descriptor, TestScript};
pub use source::{SourceLine, SourceStack};

use serde_yaml::Value;

/// Text of a YAML scalar as it appears in a script, `None` for collections
///
/// Null renders as the empty string.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}
