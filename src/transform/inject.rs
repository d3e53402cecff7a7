//! Wrap literal dynamic imports in `profileImport`

use super::{apply_edits, Diagnostic, Edit, Instrumentation, TransformOutput};
use crate::error::Result;
use crate::module_path::import_specifier;
use crate::syntax::{self, DynamicImport};
use std::path::Path;

/// Rewrite every literal `import(...)` in `source` into a marked
/// `profileImport(...)` call, adding the import declaration if needed
///
/// Running `inject` on its own output changes nothing.
pub fn inject(source: &str, file_path: &Path, inst: &Instrumentation) -> Result<TransformOutput> {
    let tree = syntax::parse(source, file_path)?;
    let root = tree.root_node();
    let file_dir = file_path.parent().unwrap_or_else(|| Path::new("."));
    let file_dir = crate::module_path::absolutize(file_dir);

    let mut output = TransformOutput::default();
    let mut edits = Vec::new();

    let binding = syntax::find_import_binding(root, source, &file_dir, &inst.module_path);
    if binding.is_none() {
        let specifier = import_specifier(&file_dir, &inst.module_path);
        let declaration = format!("import {} from '{}';\n", inst.entry_name, specifier);
        let edit = match syntax::first_statement_start(root) {
            Some(at) => Edit::insert(at, declaration),
            None => {
                let sep = if source.is_empty() || source.ends_with('\n') {
                    ""
                } else {
                    "\n"
                };
                Edit::insert(source.len(), format!("{}{}", sep, declaration))
            }
        };
        edits.push(edit);
        output.import_added = true;
    }

    // Calls go through the name the file binds as its default import, when it has one
    let local = binding
        .as_ref()
        .and_then(|b| b.default_local.as_deref())
        .unwrap_or(inst.entry_name.as_str());
    let guard_names: Vec<&str> = if local == inst.entry_name {
        vec![local]
    } else {
        vec![local, inst.entry_name.as_str()]
    };

    for node in syntax::preorder(root) {
        let Some(import) = DynamicImport::from_node(node) else {
            continue;
        };

        if syntax::is_argument_of_call(import.outer(), source, &guard_names) {
            tracing::trace!("already wrapped: {}", syntax::text(import.call, source));
            continue;
        }

        let literal = import
            .source
            .filter(|arg| syntax::string_value(*arg, source).is_some());
        let Some(literal) = literal else {
            let kind = import.source.map(|n| n.kind()).unwrap_or("undefined");
            skip(
                &mut output,
                file_path,
                &import,
                source,
                format!("source is not a string literal (type: {})", kind),
            );
            continue;
        };

        // The entry point takes no import attributes
        if import.argument_count > 1 {
            skip(
                &mut output,
                file_path,
                &import,
                source,
                format!("{} arguments passed to import()", import.argument_count),
            );
            continue;
        }

        // Comments and a trailing comma inside the parentheses are carried over
        let (lead, trail) = match import.arguments {
            Some(args) => (
                &source[args.start_byte() + 1..literal.end_byte()],
                &source[literal.end_byte()..args.end_byte() - 1],
            ),
            None => (syntax::text(literal, source), ""),
        };
        let wrapped = format!(
            "{}({}, import.meta.url, null, '{}'{})",
            local, lead, inst.marker, trail
        );
        edits.push(Edit::replace(import.call.byte_range(), wrapped));
        output.rewritten += 1;
    }

    if output.rewritten > 0 || output.import_added {
        output.source = Some(apply_edits(source, &edits));
    }
    Ok(output)
}

/// Record a call site that stays a plain `import()`
fn skip(
    output: &mut TransformOutput,
    file_path: &Path,
    import: &DynamicImport<'_>,
    source: &str,
    reason: String,
) {
    let pos = import.call.start_position();
    let message = format!(
        "Skipping dynamic import: {}. Source: {}",
        reason,
        syntax::text(import.call, source)
    );
    tracing::warn!("{}:{}: {}", file_path.display(), pos.row + 1, message);
    output.diagnostics.push(Diagnostic {
        line: pos.row + 1,
        column: pos.column + 1,
        message,
    });
}
