//! Error types for module resolution, manifests and source transforms

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the resolver, the workspace helpers and the transforms
#[derive(Error, Debug)]
pub enum Error {
    /// A required input was missing (e.g. no importer location)
    #[error("{0}")]
    Configuration(String),

    /// No usable package.json, or one without a `name`
    #[error("manifest error: {0}")]
    Manifest(String),

    /// A workspace-scoped module path matched no workspace member
    #[error("Could not find workspace member for {module_path}")]
    WorkspaceResolution {
        module_path: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// No ancestor declares `workspaces`
    #[error("no workspace root found above {}", .0.display())]
    WorkspaceRootNotFound(PathBuf),

    #[error("Invalid start directory: {0}")]
    InvalidArgument(String),

    /// The loader failed to produce a module value
    #[error("failed to load '{target}': {reason}")]
    Load { target: String, reason: String },

    /// Source text the JavaScript grammar cannot parse
    #[error("{}:{line}:{column}: cannot parse source", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
    },

    #[error("invalid glob pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn load(target: impl Into<String>, reason: impl ToString) -> Self {
        Error::Load {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap any failure raised while resolving a workspace-scoped path
    pub(crate) fn workspace_resolution(module_path: &str, source: Option<Error>) -> Self {
        Error::WorkspaceResolution {
            module_path: module_path.to_string(),
            source: source.map(Box::new),
        }
    }
}

/// Result type for viscera operations
pub type Result<T> = std::result::Result<T, Error>;
