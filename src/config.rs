//! viscera.toml configuration
//!
//! Looked up in this order: an explicit `--config` path, the nearest
//! `viscera.toml` at or above the working directory, then the built-in
//! `viscera-default.toml`. Relative paths in a config file are taken
//! relative to the directory holding that file.

use crate::resolver::{MemberMatch, ModuleLoadResolver};
use crate::transform::runner::{Mode, RunOptions, DEFAULT_EXTENSIONS};
use crate::transform::{Instrumentation, DEFAULT_ENTRY_NAME, DEFAULT_MARKER};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "viscera.toml";

const DEFAULT_TOML: &str = include_str!("../viscera-default.toml");

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstrumentationConfig {
    /// Module that exports the entry point
    pub entry_module: PathBuf,
    pub entry_name: String,
    pub marker: String,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            entry_module: PathBuf::from("src/profileImport.js"),
            entry_name: DEFAULT_ENTRY_NAME.to_string(),
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    pub workspace_scope: String,
    pub member_match: MemberMatch,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            workspace_scope: crate::module_path::DEFAULT_WORKSPACE_SCOPE.to_string(),
            member_match: MemberMatch::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    pub extensions: Vec<String>,
    pub ignore: Vec<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            ignore: vec!["**/node_modules/**".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisceraConfig {
    pub instrumentation: InstrumentationConfig,
    pub resolver: ResolverConfig,
    pub transform: TransformConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl VisceraConfig {
    /// Parse configuration text
    ///
    /// Relative paths stay relative until `with_base_dir` is applied.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse viscera configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        let dir = crate::module_path::absolutize(path.parent().unwrap_or_else(|| Path::new(".")));
        Ok(config.with_base_dir(dir))
    }

    /// The built-in configuration
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(DEFAULT_TOML).context("Failed to parse embedded viscera-default.toml")
    }

    /// Nearest viscera.toml at or above `start`
    pub fn discover(start: &Path) -> Option<PathBuf> {
        crate::module_path::absolutize(start)
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Explicit file, else the nearest viscera.toml above `cwd`, else built-ins
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::discover(cwd) {
            Some(path) => {
                tracing::debug!("using config {}", path.display());
                Self::from_file(path)
            }
            None => Ok(Self::embedded()?.with_base_dir(cwd.to_path_buf())),
        }
    }

    pub fn with_base_dir(mut self, dir: PathBuf) -> Self {
        self.base_dir = Some(dir);
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    fn validate(&self) -> Result<()> {
        if self.instrumentation.entry_name.is_empty() {
            anyhow::bail!("instrumentation.entry_name must not be empty");
        }
        if self.instrumentation.marker.is_empty() {
            anyhow::bail!("instrumentation.marker must not be empty");
        }
        if self.transform.extensions.is_empty() {
            anyhow::bail!("transform.extensions must list at least one extension");
        }
        Ok(())
    }

    /// Absolute path of the entry point module
    pub fn entry_module(&self) -> PathBuf {
        let module = &self.instrumentation.entry_module;
        match &self.base_dir {
            Some(dir) if module.is_relative() => crate::module_path::normalize(&dir.join(module)),
            _ => crate::module_path::absolutize(module),
        }
    }

    pub fn instrumentation(&self) -> Instrumentation {
        Instrumentation::new(self.entry_module())
            .with_entry_name(self.instrumentation.entry_name.clone())
            .with_marker(self.instrumentation.marker.clone())
    }

    pub fn run_options(&self, mode: Mode, dry_run: bool) -> RunOptions {
        RunOptions {
            mode,
            extensions: self.transform.extensions.clone(),
            ignore: self.transform.ignore.clone(),
            dry_run,
        }
    }

    /// A resolver with this configuration's scope and matching rule
    pub fn resolver(&self) -> ModuleLoadResolver {
        ModuleLoadResolver::new()
            .with_workspace_scope(self.resolver.workspace_scope.clone())
            .with_member_match(self.resolver.member_match)
    }
}
