//! Resolution against a real workspace on disk

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use viscera::cumulative::{CumulativeTimer, ManualTeardown};
use viscera::loader::FsModuleLoader;
use viscera::manifest::{package_name, ManifestPackageNames, PackageNames};
use viscera::module_path::ModuleKind;
use viscera::resolver::{MemberMatch, ModuleLoadResolver, ResolvedTarget};
use viscera::workspace::{find_workspace_root, workspace_members};
use viscera::Error;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn monorepo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(
        root,
        "package.json",
        r#"{"name": "mono", "workspaces": {"packages": ["libs/*", "apps/*", "!libs/legacy"]}}"#,
    );
    write(root, "libs/ui/package.json", r#"{"name": "@ktr-srt/ui", "main": "src/index.js"}"#);
    write(root, "libs/ui/src/index.js", "export default function Button() {}\n");
    write(root, "libs/ui-kit/package.json", r#"{"name": "@ktr-srt/ui-kit"}"#);
    write(root, "libs/ui-kit/index.js", "export const kit = true;\nexport function theme() {}\n");
    write(root, "libs/legacy/package.json", r#"{"name": "@ktr-srt/legacy"}"#);
    write(root, "apps/web/package.json", r#"{"name": "@ktr-srt/web"}"#);
    write(root, "apps/web/src/routes/home.js", "export default 'home';\n");
    write(root, "apps/web/src/routes/config.json", r#"{"debug": false}"#);
    tmp
}

fn importer(root: &Path) -> String {
    format!("file://{}", root.join("apps/web/src/main.js").display())
}

fn resolver(root: &Path, timer: &Arc<CumulativeTimer>) -> ModuleLoadResolver {
    ModuleLoadResolver::new()
        .with_timer(Arc::clone(timer))
        .with_teardown(Arc::new(ManualTeardown::new()))
        .with_loader(FsModuleLoader::new(root.join("apps/web/src")))
}

#[test]
fn test_root_found_from_nested_member() {
    let tmp = monorepo();
    let root = find_workspace_root(&tmp.path().join("apps/web/src/routes")).unwrap();
    assert_eq!(root.as_deref(), Some(tmp.path()));
}

#[test]
fn test_members_follow_pattern_order_and_exclusions() {
    let tmp = monorepo();
    let members = workspace_members(&tmp.path().join("apps/web")).unwrap();
    let rel: Vec<PathBuf> = members
        .iter()
        .map(|m| m.strip_prefix(tmp.path()).unwrap().to_path_buf())
        .collect();
    assert_eq!(
        rel,
        [
            PathBuf::from("libs/ui"),
            PathBuf::from("libs/ui-kit"),
            PathBuf::from("apps/web")
        ]
    );
}

#[test]
fn test_package_name_of_importer() {
    let tmp = monorepo();
    let dir = tmp.path().join("apps/web/src/routes");
    assert_eq!(ManifestPackageNames.package_name(&dir).unwrap(), "web");
    assert_eq!(package_name(None, Some(&dir)).unwrap(), "web");
}

#[test]
fn test_workspace_module_loads_through_main() {
    let tmp = monorepo();
    let timer = Arc::new(CumulativeTimer::new());
    let resolver = resolver(tmp.path(), &timer);

    let value = resolver
        .profile_import("@ktr-srt/ui", Some(&importer(tmp.path())), None, None)
        .unwrap();
    assert_eq!(value, json!("function Button() {}"));
    assert_eq!(timer.loads(), 1);
}

#[test]
fn test_substring_rule_is_first_match() {
    let tmp = monorepo();
    let timer = Arc::new(CumulativeTimer::new());
    let importer = importer(tmp.path());

    // "ui" is listed first and occurs inside "@ktr-srt/ui-kit"
    let loose = resolver(tmp.path(), &timer);
    let resolved = loose.resolve("@ktr-srt/ui-kit", &importer).unwrap();
    assert_eq!(resolved, ResolvedTarget::Path(tmp.path().join("libs/ui")));

    let exact = resolver(tmp.path(), &timer).with_member_match(MemberMatch::Exact);
    let outcome = exact.load("@ktr-srt/ui-kit", Some(&importer), None).unwrap();
    assert_eq!(outcome.resolved, ResolvedTarget::Path(tmp.path().join("libs/ui-kit")));
    assert_eq!(
        outcome.value,
        json!({ "kit": "const kit = true;", "theme": "function theme() {}" })
    );
}

#[test]
fn test_excluded_member_is_not_resolvable() {
    let tmp = monorepo();
    let timer = Arc::new(CumulativeTimer::new());
    let err = resolver(tmp.path(), &timer)
        .with_member_match(MemberMatch::Exact)
        .load("@ktr-srt/legacy", Some(&importer(tmp.path())), None)
        .unwrap_err();
    assert!(matches!(err, Error::WorkspaceResolution { .. }));
    assert_eq!(timer.loads(), 0);
}

#[test]
fn test_relative_modules_from_file_url() {
    let tmp = monorepo();
    let timer = Arc::new(CumulativeTimer::new());
    let resolver = resolver(tmp.path(), &timer);
    let importer = importer(tmp.path());

    let home = resolver.load("./routes/home.js", Some(&importer), None).unwrap();
    assert_eq!(home.kind, ModuleKind::Relative);
    assert_eq!(home.package.as_deref(), Some("web"));
    assert_eq!(viscera::resolver::unwrap_default_export(home.value), json!("'home'"));

    let config = resolver
        .profile_import("./routes/config.json?v=2", Some(&importer), None, None)
        .unwrap();
    assert_eq!(config, json!({ "debug": false }));
    assert_eq!(timer.loads(), 2);
}

#[test]
fn test_outside_workspace_is_resolution_error() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "solo/package.json", r#"{"name": "solo"}"#);
    let importer = format!("file://{}", tmp.path().join("solo/index.js").display());

    let timer = Arc::new(CumulativeTimer::new());
    let err = resolver(tmp.path(), &timer)
        .resolve("@ktr-srt/anything", &importer)
        .unwrap_err();
    match err {
        Error::WorkspaceResolution { source, .. } => {
            assert!(matches!(source.as_deref(), Some(Error::WorkspaceRootNotFound(_))));
        }
        other => panic!("unexpected error: {other}"),
    }
}
