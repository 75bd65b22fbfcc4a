//! Matrix compiler: one document in, one script per binding out

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::axis::{AxisSet, Bindings};
use super::defaults::DefaultParameterSet;
use super::parser::DirectiveParser;
use super::pattern::DescriptorMatcher;
use super::script::TestScript;
use crate::common::Result;

/// A parsed matrix document
///
/// Parsing happens once, in [`MatrixCompiler::open`]. Scripts are compiled
/// lazily as the caller iterates.
#[derive(Debug, Clone)]
pub struct MatrixCompiler {
    name: Arc<str>,
    root: PathBuf,
    axes: AxisSet,
    defaults: Arc<DefaultParameterSet>,
    body: Arc<[u8]>,
}

impl MatrixCompiler {
    /// Parse the document at `path`, including everything it includes
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let doc = DirectiveParser::open(&root)?.parse()?;

        let compiler = Self {
            name: Arc::from(matrix_name(&root)),
            root,
            axes: doc.axes,
            defaults: Arc::new(doc.defaults),
            body: Arc::from(doc.body),
        };

        info!(
            matrix = %compiler.name,
            axes = compiler.axes.len(),
            scripts = ?compiler.axes.binding_count(),
            "compiled matrix"
        );
        Ok(compiler)
    }

    /// Base name of the root document without its extension
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn axes(&self) -> &AxisSet {
        &self.axes
    }

    pub fn defaults(&self) -> &DefaultParameterSet {
        &self.defaults
    }

    /// Body shared by every script, exactly as read from the documents
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Number of scripts the matrix expands to, `None` on overflow
    pub fn len(&self) -> Option<usize> {
        self.axes.binding_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Compile every script, in binding order
    pub fn iter(&self) -> Scripts<'_> {
        Scripts {
            compiler: self,
            bindings: self.axes.bindings(),
        }
    }

    /// Compile every script, keeping those whose descriptor matches
    ///
    /// Each script is compiled before it is tested; `None` keeps everything.
    pub fn iter_matching<'a, M>(
        &'a self,
        matcher: Option<&'a M>,
    ) -> impl Iterator<Item = TestScript> + 'a
    where
        M: DescriptorMatcher + ?Sized + 'a,
    {
        self.iter()
            .filter(move |script| matcher.map_or(true, |m| m.matches(&script.descriptor())))
    }
}

impl<'a> IntoIterator for &'a MatrixCompiler {
    type Item = TestScript;
    type IntoIter = Scripts<'a>;

    fn into_iter(self) -> Scripts<'a> {
        self.iter()
    }
}

/// Lazy iterator of compiled scripts
pub struct Scripts<'a> {
    compiler: &'a MatrixCompiler,
    bindings: Bindings<'a>,
}

impl Iterator for Scripts<'_> {
    type Item = TestScript;

    fn next(&mut self) -> Option<TestScript> {
        let binding = self.bindings.next()?;
        Some(TestScript::new(
            Arc::clone(&self.compiler.name),
            binding,
            Arc::clone(&self.compiler.defaults),
            Arc::clone(&self.compiler.body),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.bindings.size_hint()
    }
}

fn matrix_name(root: &Path) -> String {
    root.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}
