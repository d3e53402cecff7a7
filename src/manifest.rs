//! package.json reading and package name resolution

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "package.json";

/// The subset of package.json that viscera consumes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub workspaces: Option<Workspaces>,
}

/// `workspaces` in either npm array form or Yarn object form
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    Patterns(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl Workspaces {
    pub fn patterns(&self) -> &[String] {
        match self {
            Workspaces::Patterns(patterns) => patterns,
            Workspaces::Object { packages } => packages,
        }
    }
}

impl PackageManifest {
    /// Parse a manifest from JSON text
    pub fn from_json(path: &Path, content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a manifest file
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(path, &content)
    }

    /// Workspace glob patterns, empty when the field is absent
    pub fn workspace_patterns(&self) -> &[String] {
        self.workspaces
            .as_ref()
            .map(Workspaces::patterns)
            .unwrap_or_default()
    }

    /// True if this manifest marks a workspace root
    pub fn declares_workspaces(&self) -> bool {
        !self.workspace_patterns().is_empty()
    }
}

/// Find the nearest readable package.json at or above `dir`
///
/// `dir` may also point directly at a package.json. Missing or malformed
/// manifests are skipped and the parent directory is tried next. The search
/// fails once it reaches the filesystem root.
pub fn find_manifest(dir: &Path) -> Result<(PathBuf, PackageManifest)> {
    let mut current = crate::module_path::absolutize(dir);

    loop {
        if current.parent().is_none() {
            return Err(Error::Manifest(format!(
                "Could not find {} above {}",
                MANIFEST_FILE,
                dir.display()
            )));
        }

        let candidate = if current.file_name().is_some_and(|n| n == MANIFEST_FILE) {
            current.clone()
        } else {
            current.join(MANIFEST_FILE)
        };

        match PackageManifest::read(&candidate) {
            Ok(manifest) => return Ok((candidate, manifest)),
            Err(err) => {
                tracing::trace!("skipping {}: {}", candidate.display(), err);
            }
        }

        current.pop();
    }
}

/// Return the unscoped package name (`@scope/util` -> `util`)
///
/// Uses `manifest` when given, otherwise the nearest package.json at or above
/// `dirname`. One of the two must be provided.
pub fn package_name(manifest: Option<&PackageManifest>, dirname: Option<&Path>) -> Result<String> {
    let found;
    let manifest = match (manifest, dirname) {
        (Some(manifest), _) => manifest,
        (None, Some(dir)) => {
            found = find_manifest(dir)?.1;
            &found
        }
        (None, None) => {
            return Err(Error::Manifest(
                "Either a manifest or a directory must be provided".to_string(),
            ))
        }
    };

    let name = manifest.name.as_deref().ok_or_else(|| {
        Error::Manifest("package.json is missing the required 'name' field".to_string())
    })?;

    Ok(unscoped_name(name).to_string())
}

/// Strip an npm scope, keeping only the segment after the last `/`
pub fn unscoped_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Source of package names for importers, injectable for tests
pub trait PackageNames: Send + Sync {
    fn package_name(&self, dir: &Path) -> Result<String>;
}

/// Looks names up in package.json files on disk
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestPackageNames;

impl PackageNames for ManifestPackageNames {
    fn package_name(&self, dir: &Path) -> Result<String> {
        package_name(None, Some(dir))
    }
}
