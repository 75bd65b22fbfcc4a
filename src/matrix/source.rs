//! Line stream over a root document and the documents it includes
//!
//! Includes are pushed on top of the stack, so their lines are read before
//! the rest of the including document resumes. A document's file handle is
//! closed as soon as it is exhausted and popped, and whatever is still open
//! is closed when the stack is dropped.
//!
//! Lines are raw bytes. Only the `\n` terminator is removed, so a `\r`
//! before it stays part of the line and shell text of any encoding passes
//! through untouched.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::common::{Error, Result};

/// One line read from a source document, without its `\n`
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub bytes: Vec<u8>,
    pub path: Rc<Path>,
    /// 1-based line number within `path`
    pub number: usize,
}

/// An open document on the stack
struct Frame {
    path: Rc<Path>,
    /// Canonical path, used to detect include cycles
    identity: PathBuf,
    reader: BufReader<File>,
    line: usize,
}

/// Stack of open documents, read as one logical line stream
pub struct SourceStack {
    root_dir: PathBuf,
    frames: Vec<Frame>,
}

impl SourceStack {
    /// Open the root document
    pub fn open(root: &Path) -> Result<Self> {
        if !root.exists() {
            return Err(Error::DocumentNotFound {
                path: root.to_path_buf(),
            });
        }

        let root_dir = match root.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut stack = Self {
            root_dir,
            frames: Vec::new(),
        };
        stack.push(root.to_path_buf())?;
        Ok(stack)
    }

    /// Directory of the root document, the fallback base for includes
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Number of documents currently open
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Include a document at the current read position
    ///
    /// `path` is tried as given first, then relative to the root document's
    /// directory.
    pub fn include(&mut self, path: &str) -> Result<()> {
        let literal = PathBuf::from(path);
        if literal.exists() {
            return self.push(literal);
        }

        let relative = self.root_dir.join(path);
        if relative.exists() {
            return self.push(relative);
        }

        Err(Error::resource_not_found(path, &[literal, relative]))
    }

    /// Read the next logical line, or `None` once every document is exhausted
    pub fn next_line(&mut self) -> Result<Option<SourceLine>> {
        loop {
            let Some(top) = self.frames.last_mut() else {
                return Ok(None);
            };

            let mut buf = Vec::new();
            let read = top
                .reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| Error::file_read(&top.path, &e))?;

            if read == 0 {
                if let Some(done) = self.frames.pop() {
                    debug!(path = %done.path.display(), lines = done.line, "closed source");
                }
                continue;
            }

            top.line += 1;
            if buf.last() == Some(&b'\n') {
                buf.pop();
            }

            return Ok(Some(SourceLine {
                bytes: buf,
                path: Rc::clone(&top.path),
                number: top.line,
            }));
        }
    }

    fn push(&mut self, path: PathBuf) -> Result<()> {
        let identity = path.canonicalize().unwrap_or_else(|_| path.clone());
        if self.frames.iter().any(|f| f.identity == identity) {
            return Err(Error::IncludeCycle { path });
        }

        let file = File::open(&path).map_err(|e| Error::file_read(&path, &e))?;
        debug!(path = %path.display(), depth = self.frames.len() + 1, "opened source");
        trace!(identity = %identity.display());

        self.frames.push(Frame {
            path: Rc::from(path.as_path()),
            identity,
            reader: BufReader::new(file),
            line: 0,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn drain(stack: &mut SourceStack) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = stack.next_line().unwrap() {
            lines.push(String::from_utf8_lossy(&line.bytes).into_owned());
        }
        lines
    }

    #[test]
    fn test_reads_lines_without_newline() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root.ms");
        std::fs::write(&root, "one\r\ntwo\nthree").unwrap();

        let mut stack = SourceStack::open(&root).unwrap();
        assert_eq!(drain(&mut stack), vec!["one\r", "two", "three"]);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_non_utf8_lines_pass_through() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root.ms");
        std::fs::write(&root, b"echo caf\xe9\nnext\n").unwrap();

        let mut stack = SourceStack::open(&root).unwrap();
        assert_eq!(stack.next_line().unwrap().unwrap().bytes, b"echo caf\xe9");
        assert_eq!(stack.next_line().unwrap().unwrap().bytes, b"next");
        assert!(stack.next_line().unwrap().is_none());
    }

    #[test]
    fn test_included_lines_come_before_remaining_lines() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root.ms");
        let child = dir.path().join("child.ms");
        std::fs::write(&root, "a\nb\n").unwrap();
        std::fs::write(&child, "c1\nc2\n").unwrap();

        let mut stack = SourceStack::open(&root).unwrap();
        assert_eq!(stack.next_line().unwrap().unwrap().bytes, b"a");
        stack.include(child.to_str().unwrap()).unwrap();
        assert_eq!(stack.depth(), 2);
        assert_eq!(drain(&mut stack), vec!["c1", "c2", "b"]);
    }

    #[test]
    fn test_include_falls_back_to_root_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root.ms");
        std::fs::write(&root, "a\n").unwrap();
        std::fs::write(dir.path().join("only-beside-root.inc"), "child\n").unwrap();

        let mut stack = SourceStack::open(&root).unwrap();
        stack.include("only-beside-root.inc").unwrap();
        let line = stack.next_line().unwrap().unwrap();
        assert_eq!(line.bytes, b"child");
        assert_eq!(line.number, 1);
        assert!(line.path.ends_with("only-beside-root.inc"));
    }

    #[test]
    fn test_include_missing_everywhere() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root.ms");
        std::fs::write(&root, "a\n").unwrap();

        let mut stack = SourceStack::open(&root).unwrap();
        let err = stack.include("no-such-file.inc").unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }

    #[test]
    fn test_missing_root() {
        let dir = tempdir().unwrap();
        let err = SourceStack::open(&dir.path().join("missing.ms")).err().unwrap();
        assert!(matches!(err, Error::DocumentNotFound { .. }));
        assert!(err.to_string().starts_with("Matrix document"));
    }

    #[test]
    fn test_include_cycle_detected() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root.ms");
        std::fs::write(&root, "a\n").unwrap();

        let mut stack = SourceStack::open(&root).unwrap();
        let err = stack.include(root.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, Error::IncludeCycle { .. }));
    }
}
