//! Source rewrites that add or remove `profileImport` instrumentation
//!
//! `inject` turns `import('./x.js')` into
//! `profileImport('./x.js', import.meta.url, null, '__AUTO_PROFILE__')` and
//! makes sure the file imports `profileImport`. `remove` undoes exactly the
//! calls that carry the marker and drops the import once nothing uses it.
//!
//! Both passes work on a tree-sitter tree and apply byte-range edits to the
//! original text, so code they do not touch keeps its formatting.

pub mod inject;
pub mod remove;
pub mod runner;

pub use inject::inject;
pub use remove::remove;

use std::ops::Range;
use std::path::PathBuf;

/// Name the instrumentation entry point is imported under
pub const DEFAULT_ENTRY_NAME: &str = "profileImport";

/// Fourth argument that tags calls written by `inject`
pub const DEFAULT_MARKER: &str = "__AUTO_PROFILE__";

/// Where the instrumentation entry point lives and how calls are tagged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrumentation {
    /// Absolute path of the module exporting the entry point
    pub module_path: PathBuf,
    pub entry_name: String,
    pub marker: String,
}

impl Instrumentation {
    pub fn new(module_path: impl Into<PathBuf>) -> Self {
        Self {
            module_path: crate::module_path::absolutize(&module_path.into()),
            entry_name: DEFAULT_ENTRY_NAME.to_string(),
            marker: DEFAULT_MARKER.to_string(),
        }
    }

    pub fn with_entry_name(mut self, name: impl Into<String>) -> Self {
        self.entry_name = name.into();
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }
}

/// A call site a transform left alone, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Result of running a transform over one file
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    /// Rewritten text, `None` when the file is unchanged
    pub source: Option<String>,
    /// Number of call sites rewritten
    pub rewritten: usize,
    pub import_added: bool,
    pub import_removed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl TransformOutput {
    pub fn is_changed(&self) -> bool {
        self.source.is_some()
    }

    /// The rewritten text, or `original` if nothing changed
    pub fn text<'a>(&'a self, original: &'a str) -> &'a str {
        self.source.as_deref().unwrap_or(original)
    }
}

/// Replace `range` of the source with `text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub range: Range<usize>,
    pub text: String,
}

impl Edit {
    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }
}

/// Apply edits to `source[range]`, returning the rewritten slice
///
/// Edits outside `range` are ignored. Overlapping edits keep the first one.
pub(crate) fn splice(source: &str, range: Range<usize>, edits: &[Edit]) -> String {
    let mut inner: Vec<&Edit> = edits
        .iter()
        .filter(|e| e.range.start >= range.start && e.range.end <= range.end)
        .collect();
    inner.sort_by_key(|e| (e.range.start, e.range.end));

    let mut out = String::with_capacity(range.len());
    let mut cursor = range.start;
    for edit in inner {
        if edit.range.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..edit.range.start]);
        out.push_str(&edit.text);
        cursor = edit.range.end;
    }
    out.push_str(&source[cursor..range.end]);
    out
}

/// Apply edits to the whole source
pub(crate) fn apply_edits(source: &str, edits: &[Edit]) -> String {
    splice(source, 0..source.len(), edits)
}
