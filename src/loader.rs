//! Module loaders used by the resolver
//!
//! A loader turns a resolved target (a path or a bare specifier) into the
//! module's value. Tests hand the resolver a closure; the CLI uses
//! `FsModuleLoader`, which reads modules from disk.

use crate::error::{Error, Result};
use crate::manifest::{PackageManifest, MANIFEST_FILE};
use crate::module_path::{location_to_path, normalize};
use crate::syntax;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const DEFAULT_MAIN: &str = "index.js";
const NODE_MODULES: &str = "node_modules";

/// Produces a module value for a resolved target
pub trait ModuleLoader: Send + Sync {
    fn load(&self, target: &str) -> Result<Value>;
}

impl<F> ModuleLoader for F
where
    F: Fn(&str) -> Result<Value> + Send + Sync,
{
    fn load(&self, target: &str) -> Result<Value> {
        self(target)
    }
}

/// Loads modules from the filesystem
///
/// - a directory loads its package.json `main`, or `index.js`
/// - a `.json` file loads as `{ "default": <parsed JSON> }`
/// - any other file is parsed as JavaScript and loads as an object mapping
///   each exported name to the source text of its declaration
/// - a bare specifier is looked up in `node_modules`, walking up from
///   `base_dir`
#[derive(Debug, Clone)]
pub struct FsModuleLoader {
    base_dir: PathBuf,
}

impl FsModuleLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// File a target would be loaded from
    pub fn locate(&self, target: &str) -> Result<PathBuf> {
        let candidate = if target.starts_with("file://") {
            location_to_path(target)
                .ok_or_else(|| Error::load(target, "unsupported module location"))?
        } else if Path::new(target).is_absolute() || target.starts_with('.') {
            normalize(&self.base_dir.join(target))
        } else {
            self.find_in_node_modules(target)
                .ok_or_else(|| Error::load(target, "package not found in node_modules"))?
        };
        entry_file(target, &candidate)
    }

    fn find_in_node_modules(&self, specifier: &str) -> Option<PathBuf> {
        self.base_dir
            .ancestors()
            .map(|dir| dir.join(NODE_MODULES).join(specifier))
            .find(|candidate| candidate.exists())
    }
}

impl Default for FsModuleLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

impl ModuleLoader for FsModuleLoader {
    fn load(&self, target: &str) -> Result<Value> {
        let path = self.locate(target)?;
        tracing::trace!("loading {} from {}", target, path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            let value: Value = serde_json::from_str(&content).map_err(|source| Error::Json {
                path: path.clone(),
                source,
            })?;
            let mut namespace = Map::new();
            namespace.insert("default".to_string(), value);
            return Ok(Value::Object(namespace));
        }

        let tree = syntax::parse(&content, &path)?;
        let namespace: Map<String, Value> = syntax::exported_names(tree.root_node(), &content)
            .into_iter()
            .map(|(name, body)| (name, Value::String(body)))
            .collect();
        Ok(Value::Object(namespace))
    }
}

/// The file to read for `path`, following a package's `main` for directories
fn entry_file(target: &str, path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        return Err(Error::load(target, format!("{} does not exist", path.display())));
    }

    let manifest_path = path.join(MANIFEST_FILE);
    let main = if manifest_path.is_file() {
        PackageManifest::read(&manifest_path)?.main
    } else {
        None
    };
    let entry = normalize(&path.join(main.as_deref().unwrap_or(DEFAULT_MAIN)));
    let entry = if entry.is_dir() {
        entry.join(DEFAULT_MAIN)
    } else {
        entry
    };

    if entry.is_file() {
        Ok(entry)
    } else {
        Err(Error::load(
            target,
            format!("entry point {} does not exist", entry.display()),
        ))
    }
}
