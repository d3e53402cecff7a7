//! Viscera - dynamic import() profiling for JavaScript workspaces
//!
//! This library times dynamic module loads, resolves relative,
//! workspace-scoped and bare module paths the way the `profileImport`
//! wrapper does, and rewrites JavaScript sources to add or remove that
//! wrapper around `import()` calls.

pub mod cli;
pub mod config;
pub mod cumulative;
pub mod error;
pub mod load_timer;
pub mod loader;
pub mod manifest;
pub mod module_path;
pub mod resolver;
pub mod syntax;
pub mod transform;
pub mod workspace;

pub use error::{Error, Result};
pub use resolver::{profile_import, ModuleLoadResolver};
