//! Directive parser for matrix documents
//!
//! A document is plain shell text with three kinds of directive lines:
//!
//! ```text
//! params:            <- axis block, YAML, closed by a line `end`
//! default_params:    <- default block, YAML, closed by a line `end`
//! #include other.ms  <- read other.ms here
//! ```
//!
//! Everything else becomes the script body, byte for byte. Headers and the
//! terminator must match the whole line exactly, so `params:\r` from a CRLF
//! document is body text. A repeated block replaces the earlier one.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, trace};

use super::axis::AxisSet;
use super::defaults::DefaultParameterSet;
use super::source::{SourceLine, SourceStack};
use crate::common::{Error, Result};

pub const PARAMS_HEADER: &str = "params:";
pub const DEFAULT_PARAMS_HEADER: &str = "default_params:";
pub const BLOCK_TERMINATOR: &str = "end";

fn include_pattern() -> &'static Regex {
    static INCLUDE: OnceLock<Regex> = OnceLock::new();
    INCLUDE.get_or_init(|| {
        Regex::new(r"^\s*#include\s+(\S.*?)\s*$").expect("include pattern is valid")
    })
}

/// How a single line is treated
#[derive(Debug, PartialEq, Eq)]
pub enum Directive<'a> {
    Params,
    DefaultParams,
    Include(&'a str),
    Text,
}

impl<'a> Directive<'a> {
    pub fn classify(line: &'a [u8]) -> Self {
        if line == PARAMS_HEADER.as_bytes() {
            return Self::Params;
        }
        if line == DEFAULT_PARAMS_HEADER.as_bytes() {
            return Self::DefaultParams;
        }
        // An include path has to be a valid file name string
        let Ok(line) = std::str::from_utf8(line) else {
            return Self::Text;
        };
        match include_pattern().captures(line).and_then(|c| c.get(1)) {
            Some(path) => Self::Include(path.as_str()),
            None => Self::Text,
        }
    }
}

/// Everything a matrix document declares
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub axes: AxisSet,
    pub defaults: DefaultParameterSet,
    /// Body lines in reading order, each ending with `\n`
    pub body: Vec<u8>,
}

pub struct DirectiveParser {
    source: SourceStack,
}

impl DirectiveParser {
    pub fn new(source: SourceStack) -> Self {
        Self { source }
    }

    /// Open `root` and parse it
    pub fn open(root: &Path) -> Result<Self> {
        Ok(Self::new(SourceStack::open(root)?))
    }

    /// Read every line of the root document and its includes
    ///
    /// Consumes the parser, so every source handle is closed on return,
    /// whether parsing succeeded or not.
    pub fn parse(mut self) -> Result<ParsedDocument> {
        let mut doc = ParsedDocument::default();

        while let Some(line) = self.source.next_line()? {
            match Directive::classify(&line.bytes) {
                Directive::Params => {
                    let text = self.read_block(&line, PARAMS_HEADER)?;
                    let text = block_text(text, &line, Error::MalformedAxisData)?;
                    doc.axes = AxisSet::parse(&text).map_err(|e| at_block(e, &line))?;
                    debug!(axes = doc.axes.len(), at = %location(&line), "params block");
                }
                Directive::DefaultParams => {
                    let text = self.read_block(&line, DEFAULT_PARAMS_HEADER)?;
                    let text = block_text(text, &line, Error::MalformedDefaultData)?;
                    doc.defaults =
                        DefaultParameterSet::parse(&text).map_err(|e| at_block(e, &line))?;
                    debug!(defaults = doc.defaults.len(), at = %location(&line), "default_params block");
                }
                Directive::Include(path) => {
                    debug!(include = path, at = %location(&line), "include");
                    self.source.include(path)?;
                }
                Directive::Text => {
                    doc.body.extend_from_slice(&line.bytes);
                    doc.body.push(b'\n');
                }
            }
        }

        Ok(doc)
    }

    /// Collect block lines up to, not including, the terminator
    fn read_block(&mut self, header: &SourceLine, block: &str) -> Result<Vec<u8>> {
        let mut text = Vec::new();
        loop {
            let Some(line) = self.source.next_line()? else {
                return Err(Error::unterminated_block(
                    block.trim_end_matches(':'),
                    &header.path,
                    header.number,
                ));
            };
            if line.bytes == BLOCK_TERMINATOR.as_bytes() {
                trace!(block, bytes = text.len(), "block closed");
                return Ok(text);
            }
            text.extend_from_slice(&line.bytes);
            text.push(b'\n');
        }
    }
}

fn location(line: &SourceLine) -> String {
    format!("{}:{}", line.path.display(), line.number)
}

/// Block contents are YAML, which must be UTF-8
fn block_text(
    bytes: Vec<u8>,
    header: &SourceLine,
    malformed: fn(String) -> Error,
) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| malformed(format!("{} (block at {})", e, location(header))))
}

fn at_block(err: Error, header: &SourceLine) -> Error {
    match err {
        Error::MalformedAxisData(msg) => {
            Error::MalformedAxisData(format!("{} (block at {})", msg, location(header)))
        }
        Error::MalformedDefaultData(msg) => {
            Error::MalformedDefaultData(format!("{} (block at {})", msg, location(header)))
        }
        other => other,
    }
}
