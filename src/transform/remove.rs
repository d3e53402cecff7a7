//! Unwrap marked `profileImport` calls back into plain `import(...)`

use super::{apply_edits, splice, Edit, Instrumentation, TransformOutput};
use crate::error::Result;
use crate::syntax::{self, MarkedCall};
use std::ops::Range;
use std::path::Path;
use tree_sitter::Node;

/// Byte ranges of one unwrapped call: the whole call and the argument kept
struct Unwrapped {
    call: Range<usize>,
    kept: Range<usize>,
}

impl Unwrapped {
    /// True if text at `range` disappears when this call is unwrapped
    fn drops(&self, range: &Range<usize>) -> bool {
        contains(&self.call, range) && !contains(&self.kept, range)
    }
}

fn contains(outer: &Range<usize>, inner: &Range<usize>) -> bool {
    inner.start >= outer.start && inner.end <= outer.end
}

/// Replace every marked entry point call with `import(<first argument>)`
///
/// Only calls whose fourth argument is the marker literal are touched. When
/// at least one call was unwrapped and the instrumentation import is no
/// longer referenced, the import declaration is deleted too.
pub fn remove(source: &str, file_path: &Path, inst: &Instrumentation) -> Result<TransformOutput> {
    let tree = syntax::parse(source, file_path)?;
    let root = tree.root_node();
    let file_dir = file_path.parent().unwrap_or_else(|| Path::new("."));
    let file_dir = crate::module_path::absolutize(file_dir);

    let binding = syntax::find_import_binding(root, source, &file_dir, &inst.module_path);
    let local = binding
        .as_ref()
        .and_then(|b| b.default_local.as_deref())
        .unwrap_or(inst.entry_name.as_str());
    let callees: Vec<&str> = if local == inst.entry_name {
        vec![local]
    } else {
        vec![local, inst.entry_name.as_str()]
    };

    let mut output = TransformOutput::default();
    let mut edits: Vec<Edit> = Vec::new();
    let mut unwrapped = Vec::new();

    // Children first, so a marked call nested in another's path argument
    // is already rewritten when the outer one is spliced
    for node in syntax::postorder(root) {
        let Some(marked) = MarkedCall::from_node(node, source, &callees, &inst.marker) else {
            continue;
        };
        let call = marked.call.byte_range();
        let args = marked.arguments.byte_range();

        // From `(` to the end of the path: leading comments stay with it
        let kept = args.start + 1..marked.module_path.end_byte();
        let trail = if marked.argument_count == 4 {
            &source[marked.marker.end_byte()..args.end - 1]
        } else {
            ""
        };

        let argument = splice(source, kept.clone(), &edits);
        edits.retain(|e| !contains(&call, &e.range));
        edits.push(Edit::replace(
            call.clone(),
            format!("import({}{})", argument, trail),
        ));
        unwrapped.push(Unwrapped { call, kept });
        output.rewritten += 1;
    }

    if output.rewritten == 0 {
        return Ok(output);
    }

    if let Some(binding) = binding.as_ref().filter(|b| b.is_sole_default()) {
        let name = binding.default_local.as_deref().unwrap_or(local);
        let statement = binding.statement.byte_range();
        if !has_references(root, source, name, &statement, &unwrapped) {
            edits.push(Edit::replace(line_span(source, statement), ""));
            output.import_removed = true;
        } else {
            tracing::debug!(
                "{}: keeping import of {}, still referenced",
                file_path.display(),
                name
            );
        }
    }

    output.source = Some(apply_edits(source, &edits));
    Ok(output)
}

/// Uses of `name` that survive the rewrite, outside the import itself
fn has_references(
    root: Node<'_>,
    source: &str,
    name: &str,
    statement: &Range<usize>,
    unwrapped: &[Unwrapped],
) -> bool {
    syntax::preorder(root).into_iter().any(|node| {
        if !matches!(node.kind(), "identifier" | "shorthand_property_identifier") {
            return false;
        }
        if syntax::text(node, source) != name {
            return false;
        }
        let range = node.byte_range();
        !contains(statement, &range) && !unwrapped.iter().any(|u| u.drops(&range))
    })
}

/// Widen a statement's range to its whole line when it sits alone on it
fn line_span(source: &str, range: Range<usize>) -> Range<usize> {
    let bytes = source.as_bytes();

    let mut start = range.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    if start > 0 && bytes[start - 1] != b'\n' {
        start = range.start;
    }

    let mut end = range.end;
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t' | b'\r') {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'\n' {
        end += 1;
    }

    start..end
}
