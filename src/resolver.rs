//! Profiled module loading
//!
//! `ModuleLoadResolver::profile_import` is the Rust side of the
//! `profileImport(modulePath, importMetaUrl, importer, marker)` entry point
//! that `inject` writes into sources. It resolves the module path, loads the
//! target through a `ModuleLoader`, logs the load time and adds it to the
//! cumulative total that is reported at process exit.

use crate::cumulative::{self, CumulativeTimer, ProcessExit, TeardownRegistry};
use crate::error::{Error, Result};
use crate::load_timer::LoadTimer;
use crate::loader::{FsModuleLoader, ModuleLoader};
use crate::manifest::{ManifestPackageNames, PackageNames};
use crate::module_path::{
    last_segment, location_to_path, resolve_relative, ModuleKind, DEFAULT_WORKSPACE_SCOPE,
};
use crate::workspace::{GlobWorkspace, WorkspaceMembers};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a workspace-scoped module path picks its member directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberMatch {
    /// The member's directory name occurs anywhere in the module path
    ///
    /// `@ktr-srt/ui-kit` matches a member directory named `ui`, so the
    /// first listed member wins when names overlap.
    #[default]
    Substring,
    /// The member's directory name equals the last segment of the module path
    Exact,
}

impl MemberMatch {
    pub fn matches(self, module_path: &str, member: &Path) -> bool {
        let segment = last_segment(member);
        match self {
            MemberMatch::Substring => module_path.contains(segment.as_str()),
            MemberMatch::Exact => module_path.rsplit('/').next() == Some(segment.as_str()),
        }
    }
}

/// Where a module path ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// A filesystem path (relative and workspace-scoped module paths)
    Path(PathBuf),
    /// A bare specifier, passed to the loader unchanged
    Bare(String),
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedTarget::Path(path) => write!(f, "{}", path.display()),
            ResolvedTarget::Bare(specifier) => write!(f, "{}", specifier),
        }
    }
}

/// Everything known about one profiled load
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// The module path as written by the caller
    pub module_path: String,
    pub kind: ModuleKind,
    pub resolved: ResolvedTarget,
    /// Time spent inside the loader
    pub duration: Duration,
    /// Unscoped name of the importing package, when one was found
    pub package: Option<String>,
    /// The per-load line that was logged
    pub summary: Option<String>,
    /// The module value as the loader returned it
    pub value: Value,
}

impl LoadOutcome {
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// Return the sole `default` export of a module, or the module itself
///
/// A module object whose only key is `default` is replaced by that value.
/// Anything else (including non-objects) is returned unchanged.
pub fn unwrap_default_export(module: Value) -> Value {
    match module {
        Value::Object(mut map) if map.len() == 1 => match map.remove("default") {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Resolves, loads and times dynamic imports
pub struct ModuleLoadResolver {
    workspace_scope: String,
    member_match: MemberMatch,
    workspace: Box<dyn WorkspaceMembers>,
    packages: Box<dyn PackageNames>,
    timer: Arc<CumulativeTimer>,
    teardown: Arc<dyn TeardownRegistry>,
    loader: Box<dyn ModuleLoader>,
}

impl Default for ModuleLoadResolver {
    fn default() -> Self {
        Self {
            workspace_scope: DEFAULT_WORKSPACE_SCOPE.to_string(),
            member_match: MemberMatch::default(),
            workspace: Box::new(GlobWorkspace),
            packages: Box::new(ManifestPackageNames),
            timer: Arc::clone(cumulative::global()),
            teardown: Arc::new(ProcessExit),
            loader: Box::new(FsModuleLoader::default()),
        }
    }
}

impl ModuleLoadResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace_scope(mut self, scope: impl Into<String>) -> Self {
        self.workspace_scope = scope.into();
        self
    }

    pub fn with_member_match(mut self, member_match: MemberMatch) -> Self {
        self.member_match = member_match;
        self
    }

    pub fn with_workspace(mut self, workspace: impl WorkspaceMembers + 'static) -> Self {
        self.workspace = Box::new(workspace);
        self
    }

    pub fn with_package_names(mut self, packages: impl PackageNames + 'static) -> Self {
        self.packages = Box::new(packages);
        self
    }

    pub fn with_timer(mut self, timer: Arc<CumulativeTimer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn with_teardown(mut self, teardown: Arc<dyn TeardownRegistry>) -> Self {
        self.teardown = teardown;
        self
    }

    /// Loader used when a call does not bring its own
    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn workspace_scope(&self) -> &str {
        &self.workspace_scope
    }

    pub fn timer(&self) -> &Arc<CumulativeTimer> {
        &self.timer
    }

    pub fn classify(&self, module_path: &str) -> ModuleKind {
        ModuleKind::classify(module_path, &self.workspace_scope)
    }

    /// Resolve `module_path` as seen from `importer` without loading it
    pub fn resolve(&self, module_path: &str, importer: &str) -> Result<ResolvedTarget> {
        match self.classify(module_path) {
            ModuleKind::Relative => resolve_relative(module_path, importer)
                .map(ResolvedTarget::Path)
                .ok_or_else(|| {
                    Error::Configuration(format!("unsupported importer location: {}", importer))
                }),
            ModuleKind::Workspace => self
                .resolve_workspace(module_path, importer)
                .map(ResolvedTarget::Path),
            ModuleKind::Bare => Ok(ResolvedTarget::Bare(module_path.to_string())),
        }
    }

    fn resolve_workspace(&self, module_path: &str, importer: &str) -> Result<PathBuf> {
        let importer_dir = importer_dir(importer)
            .ok_or_else(|| Error::workspace_resolution(module_path, None))?;
        let members = self
            .workspace
            .members(&importer_dir)
            .map_err(|e| Error::workspace_resolution(module_path, Some(e)))?;

        let found = members
            .into_iter()
            .find(|member| self.member_match.matches(module_path, member));
        match found {
            Some(member) => {
                tracing::trace!("{} -> {}", module_path, member.display());
                Ok(member)
            }
            None => Err(Error::workspace_resolution(module_path, None)),
        }
    }

    /// Resolve, load and time a module, returning the full outcome
    ///
    /// `loader` overrides the resolver's default loader for this call.
    pub fn load(
        &self,
        module_path: &str,
        importer: Option<&str>,
        loader: Option<&dyn ModuleLoader>,
    ) -> Result<LoadOutcome> {
        let importer = importer.filter(|s| !s.is_empty()).ok_or_else(|| {
            Error::Configuration("importMetaUrl is required for relative module paths".to_string())
        })?;

        let package = self.package_of(importer);
        let kind = self.classify(module_path);
        let resolved = self.resolve(module_path, importer)?;

        let loader = loader.unwrap_or(self.loader.as_ref());
        let start = Instant::now();
        let value = loader.load(&resolved.to_string())?;
        let duration = start.elapsed();

        let mut load_timer = LoadTimer::new(importer, package.clone());
        load_timer.track(module_path, duration.as_secs_f64() * 1000.0);
        let summary = load_timer.summarize();

        self.timer.add(duration);
        self.timer.ensure_exit_report(self.teardown.as_ref());

        Ok(LoadOutcome {
            module_path: module_path.to_string(),
            kind,
            resolved,
            duration,
            package,
            summary,
            value,
        })
    }

    /// Load a module the way the injected `profileImport` call does
    ///
    /// `marker` only tags call sites for `remove`; it has no effect here.
    pub fn profile_import(
        &self,
        module_path: &str,
        importer: Option<&str>,
        loader: Option<&dyn ModuleLoader>,
        _marker: Option<&str>,
    ) -> Result<Value> {
        self.load(module_path, importer, loader)
            .map(|outcome| unwrap_default_export(outcome.value))
    }

    fn package_of(&self, importer: &str) -> Option<String> {
        let dir = importer_dir(importer)?;
        match self.packages.package_name(&dir) {
            Ok(name) => Some(name),
            Err(e) => {
                tracing::debug!("no package name for {}: {}", importer, e);
                None
            }
        }
    }
}

fn importer_dir(importer: &str) -> Option<PathBuf> {
    let path = location_to_path(importer)?;
    path.parent().map(Path::to_path_buf)
}

/// `profileImport` with a default resolver (global timer, process exit report)
pub fn profile_import(
    module_path: &str,
    importer: Option<&str>,
    loader: Option<&dyn ModuleLoader>,
) -> Result<Value> {
    ModuleLoadResolver::default().profile_import(module_path, importer, loader, None)
}
