//! Workspace root discovery and member enumeration
//!
//! A workspace root is the nearest ancestor whose package.json declares a
//! non-empty `workspaces` field. Members are the directories holding a
//! package.json that one of the root's glob patterns matches.

use crate::error::{Error, Result};
use crate::manifest::{PackageManifest, MANIFEST_FILE};
use crate::module_path::absolutize;
use std::path::{Path, PathBuf};

/// Walk upward from `start_dir` to the nearest workspace root
///
/// Returns `Ok(None)` when the filesystem root is reached without finding
/// one. `start_dir` must name a directory: a path with a file extension is
/// rejected.
pub fn find_workspace_root(start_dir: &Path) -> Result<Option<PathBuf>> {
    if start_dir.as_os_str().is_empty() || start_dir.extension().is_some() {
        return Err(Error::InvalidArgument(start_dir.display().to_string()));
    }

    let mut current = absolutize(start_dir);
    while current.parent().is_some() {
        let manifest_path = current.join(MANIFEST_FILE);
        if manifest_path.is_file() {
            match PackageManifest::read(&manifest_path) {
                Ok(manifest) if manifest.declares_workspaces() => return Ok(Some(current)),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("Error reading {}: {}", manifest_path.display(), err);
                }
            }
        }
        current.pop();
    }

    Ok(None)
}

/// List member package directories of the workspace containing `start_dir`
///
/// Patterns are expanded in declaration order; within a pattern, matches come
/// in glob order. Duplicates across patterns are kept. Patterns starting with
/// `!` remove matching members from the result.
pub fn workspace_members(start_dir: &Path) -> Result<Vec<PathBuf>> {
    let root = find_workspace_root(start_dir)?
        .ok_or_else(|| Error::WorkspaceRootNotFound(start_dir.to_path_buf()))?;
    let manifest = PackageManifest::read(&root.join(MANIFEST_FILE))?;

    let mut members = Vec::new();
    let mut exclusions = Vec::new();

    for pattern in manifest.workspace_patterns() {
        if let Some(negated) = pattern.strip_prefix('!') {
            exclusions.push(compile_pattern(&root, negated)?);
            continue;
        }

        let absolute = root.join(pattern).join(MANIFEST_FILE);
        let absolute = absolute.to_string_lossy();
        let matches = glob::glob(&absolute).map_err(|e| Error::Pattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        for entry in matches {
            match entry {
                Ok(manifest_path) => {
                    if let Some(dir) = manifest_path.parent() {
                        members.push(dir.to_path_buf());
                    }
                }
                Err(err) => tracing::warn!("skipping unreadable workspace entry: {}", err),
            }
        }
    }

    if !exclusions.is_empty() {
        members.retain(|dir| !exclusions.iter().any(|p| p.matches_path(dir)));
    }

    tracing::debug!(
        root = %root.display(),
        count = members.len(),
        "enumerated workspace members"
    );
    Ok(members)
}

fn compile_pattern(root: &Path, pattern: &str) -> Result<glob::Pattern> {
    let absolute = root.join(pattern);
    glob::Pattern::new(&absolute.to_string_lossy()).map_err(|e| Error::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Source of workspace member directories, injectable for tests
pub trait WorkspaceMembers: Send + Sync {
    fn members(&self, from_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Expands the `workspaces` globs found on disk
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobWorkspace;

impl WorkspaceMembers for GlobWorkspace {
    fn members(&self, from_dir: &Path) -> Result<Vec<PathBuf>> {
        workspace_members(from_dir)
    }
}

/// A fixed member list
#[derive(Debug, Default, Clone)]
pub struct StaticWorkspace(pub Vec<PathBuf>);

impl WorkspaceMembers for StaticWorkspace {
    fn members(&self, _from_dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sample_workspace() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "package.json",
            r#"{"name": "root", "workspaces": ["packages/*", "tools/cli"]}"#,
        );
        write(tmp.path(), "packages/util/package.json", r#"{"name": "@ktr-srt/util"}"#);
        write(tmp.path(), "packages/render/package.json", r#"{"name": "@ktr-srt/render"}"#);
        write(tmp.path(), "packages/render/src/index.js", "export default 1;\n");
        write(tmp.path(), "tools/cli/package.json", r#"{"name": "@ktr-srt/cli"}"#);
        fs::create_dir_all(tmp.path().join("packages/empty")).unwrap();
        tmp
    }

    #[test]
    fn test_rejects_path_with_extension() {
        let err = find_workspace_root(Path::new("/tmp/file.js")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_rejects_empty_path() {
        let err = find_workspace_root(Path::new("")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_finds_root_from_nested_member() {
        let tmp = sample_workspace();
        let root = find_workspace_root(&tmp.path().join("packages/render/src")).unwrap();
        assert_eq!(root, Some(tmp.path().to_path_buf()));
    }

    #[test]
    fn test_root_not_found_is_none() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "lonely/package.json", r#"{"name": "lonely"}"#);
        let root = find_workspace_root(&tmp.path().join("lonely")).unwrap();
        assert_eq!(root, None);
    }

    #[test]
    fn test_malformed_manifest_is_skipped() {
        let tmp = sample_workspace();
        write(tmp.path(), "packages/util/package.json", "{ broken");
        let root = find_workspace_root(&tmp.path().join("packages/util")).unwrap();
        assert_eq!(root, Some(tmp.path().to_path_buf()));
    }

    #[test]
    fn test_members_in_pattern_order() {
        let tmp = sample_workspace();
        let members = workspace_members(tmp.path()).unwrap();
        assert_eq!(
            members,
            vec![
                tmp.path().join("packages/render"),
                tmp.path().join("packages/util"),
                tmp.path().join("tools/cli"),
            ]
        );
    }

    #[test]
    fn test_members_from_nested_directory() {
        let tmp = sample_workspace();
        let members = workspace_members(&tmp.path().join("packages/render/src")).unwrap();
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn test_members_keep_duplicates() {
        let tmp = sample_workspace();
        write(
            tmp.path(),
            "package.json",
            r#"{"workspaces": ["packages/util", "packages/*"]}"#,
        );
        let members = workspace_members(tmp.path()).unwrap();
        let util = tmp.path().join("packages/util");
        assert_eq!(members.iter().filter(|m| **m == util).count(), 2);
    }

    #[test]
    fn test_negated_pattern_excludes() {
        let tmp = sample_workspace();
        write(
            tmp.path(),
            "package.json",
            r#"{"workspaces": ["packages/*", "!packages/util"]}"#,
        );
        let members = workspace_members(tmp.path()).unwrap();
        assert_eq!(members, vec![tmp.path().join("packages/render")]);
    }

    #[test]
    fn test_static_workspace() {
        let ws = StaticWorkspace(vec![PathBuf::from("/w/pkg")]);
        assert_eq!(ws.members(Path::new("/anywhere")).unwrap().len(), 1);
    }
}
