//! Module path classification and lexical path helpers
//!
//! A module path handed to `profileImport` is one of three shapes, decided by
//! prefix alone (nothing is checked on disk):
//! - relative: starts with `.`
//! - workspace-scoped: starts with the configured scope, e.g. `@ktr-srt/`
//! - bare: anything else
//!
//! The path helpers here are purely lexical so that resolution behaves the
//! same whether or not the target exists.

use std::path::{Component, Path, PathBuf};

/// Default namespace prefix for workspace packages
pub const DEFAULT_WORKSPACE_SCOPE: &str = "@ktr-srt/";

/// Shape of a module path
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Relative,
    Workspace,
    Bare,
}

impl ModuleKind {
    /// Classify a module path by prefix
    pub fn classify(module_path: &str, workspace_scope: &str) -> Self {
        if module_path.starts_with('.') {
            ModuleKind::Relative
        } else if !workspace_scope.is_empty() && module_path.starts_with(workspace_scope) {
            ModuleKind::Workspace
        } else {
            ModuleKind::Bare
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleKind::Relative => write!(f, "relative"),
            ModuleKind::Workspace => write!(f, "workspace"),
            ModuleKind::Bare => write!(f, "bare"),
        }
    }
}

/// Convert an importer location to a filesystem path
///
/// Accepts `file://` URLs (as produced by `import.meta.url`) and plain paths.
/// Percent-escapes in URLs are decoded. Other URL schemes yield `None`.
pub fn location_to_path(location: &str) -> Option<PathBuf> {
    if let Some(rest) = location.strip_prefix("file://") {
        // file://localhost/x and file:///x both name /x
        let rest = rest.strip_prefix("localhost").unwrap_or(rest);
        let rest = strip_query_and_fragment(rest);
        if !rest.starts_with('/') {
            return None;
        }
        return Some(PathBuf::from(percent_decode(rest)));
    }
    if location.contains("://") {
        return None;
    }
    Some(PathBuf::from(location))
}

/// Resolve a relative module path against the importer's location
///
/// Mirrors `fileURLToPath(new URL(modulePath, importMetaUrl))`: the last
/// segment of the importer is dropped, the reference is joined onto what is
/// left, and `.`/`..` segments are folded. Query strings and fragments are
/// not part of the resulting path.
pub fn resolve_relative(module_path: &str, importer: &str) -> Option<PathBuf> {
    let importer_path = location_to_path(importer)?;
    let base = importer_path.parent().unwrap_or_else(|| Path::new("/"));
    let reference = percent_decode(strip_query_and_fragment(module_path));
    Some(normalize(&base.join(reference)))
}

/// Fold `.` and `..` components without touching the filesystem
///
/// `..` never climbs above the root of an absolute path.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = match out.components().next_back() {
                    Some(Component::Normal(_)) => out.pop(),
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => true,
                    _ => false,
                };
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Make a path absolute against the current directory, then normalize it
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        normalize(&cwd.join(path))
    }
}

/// Relative path from `from_dir` to `to`, using `/` separators
///
/// Both inputs are normalized first. The result has no leading `./`.
pub fn relative_path(from_dir: &Path, to: &Path) -> String {
    let from = normalize(from_dir);
    let to = normalize(to);
    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::new();
    for component in &from_parts[common..] {
        if matches!(component, Component::Normal(_) | Component::ParentDir) {
            segments.push("..".to_string());
        }
    }
    for component in &to_parts[common..] {
        segments.push(component.as_os_str().to_string_lossy().into_owned());
    }
    segments.join("/")
}

/// Relative path suitable for an ES import specifier (`./x` or `../x`)
pub fn import_specifier(from_dir: &Path, to: &Path) -> String {
    let rel = relative_path(from_dir, to);
    if rel.starts_with("../") || rel.starts_with("./") {
        rel
    } else {
        format!("./{}", rel)
    }
}

/// Last `/`-separated segment of a path
pub fn last_segment(path: &Path) -> String {
    path.to_string_lossy()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn strip_query_and_fragment(s: &str) -> &str {
    match s.find(['?', '#']) {
        Some(idx) => &s[..idx],
        None => s,
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
