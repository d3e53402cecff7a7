//! Apply a transform to many files
//!
//! Files are processed one at a time. A failure is recorded against the
//! file and the run moves on; only files whose text changed are written.

use super::{inject, remove, Diagnostic, Instrumentation, TransformOutput};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions picked up when walking directories
pub const DEFAULT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx"];

/// Which rewrite to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Inject,
    Remove,
}

impl Mode {
    pub fn apply(self, source: &str, path: &Path, inst: &Instrumentation) -> Result<TransformOutput> {
        match self {
            Mode::Inject => inject(source, path, inst),
            Mode::Remove => remove(source, path, inst),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: Mode,
    /// Extensions (without the dot) accepted while walking directories
    pub extensions: Vec<String>,
    /// Glob patterns; matching files and directories are skipped
    pub ignore: Vec<String>,
    /// Compute changes without writing them
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Inject,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            ignore: vec!["**/node_modules/**".to_string()],
            dry_run: false,
        }
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Changed { rewritten: usize },
    Unmodified,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-file results of a run, in processing order
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
}

impl RunSummary {
    /// Files that were (or in a dry run, would be) rewritten
    pub fn changed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Changed { .. }))
    }

    pub fn unmodified(&self) -> usize {
        self.count(|o| *o == FileOutcome::Unmodified)
    }

    pub fn errors(&self) -> Vec<(&Path, &str)> {
        self.files
            .iter()
            .filter_map(|f| match &f.outcome {
                FileOutcome::Failed(reason) => Some((f.path.as_path(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Total call sites rewritten across all files
    pub fn rewritten(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.outcome {
                FileOutcome::Changed { rewritten } => rewritten,
                _ => 0,
            })
            .sum()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = (&Path, &Diagnostic)> {
        self.files
            .iter()
            .flat_map(|f| f.diagnostics.iter().map(move |d| (f.path.as_path(), d)))
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// Compiled ignore patterns
struct IgnoreSet(Vec<glob::Pattern>);

impl IgnoreSet {
    fn new(patterns: &[String]) -> Result<Self> {
        patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| Error::Pattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(IgnoreSet)
    }

    fn matches(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        self.0.iter().any(|p| {
            p.matches(&path_str)
                || p.matches(&format!("{}/", path_str))
                || p.matches(&format!("{}/x", path_str))
                || p.matches(&name)
        })
    }
}

/// Expand `paths` into the list of files a run would touch
///
/// Explicitly named files are taken as-is; directories are walked in
/// file-name order, keeping files with an accepted extension.
pub fn collect_files(paths: &[PathBuf], options: &RunOptions) -> Result<Vec<PathBuf>> {
    let ignore = IgnoreSet::new(&options.ignore)?;
    let mut files = Vec::new();

    for path in paths {
        let meta = std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if meta.is_file() {
            files.push(path.clone());
            continue;
        }

        let walker = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !ignore.matches(e.path()));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && has_extension(entry.path(), &options.extensions) {
                files.push(entry.into_path());
            }
        }
    }

    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Run the transform over every file under `paths`
pub fn run(paths: &[PathBuf], inst: &Instrumentation, options: &RunOptions) -> Result<RunSummary> {
    let files = collect_files(paths, options)?;
    tracing::debug!("{:?} over {} file(s)", options.mode, files.len());

    let mut summary = RunSummary::default();
    for path in files {
        let report = process_file(&path, inst, options);
        if let FileOutcome::Failed(reason) = &report.outcome {
            tracing::warn!("{}: {}", path.display(), reason);
        }
        summary.files.push(report);
    }
    Ok(summary)
}

fn process_file(path: &Path, inst: &Instrumentation, options: &RunOptions) -> FileReport {
    let mut report = FileReport {
        path: path.to_path_buf(),
        outcome: FileOutcome::Unmodified,
        diagnostics: Vec::new(),
    };

    let result = std::fs::read_to_string(path)
        .map_err(|e| Error::io(path, e))
        .and_then(|source| {
            let output = options.mode.apply(&source, path, inst)?;
            if let (Some(text), false) = (&output.source, options.dry_run) {
                std::fs::write(path, text).map_err(|e| Error::io(path, e))?;
            }
            Ok(output)
        });

    match result {
        Ok(output) => {
            if output.is_changed() {
                report.outcome = FileOutcome::Changed {
                    rewritten: output.rewritten,
                };
            }
            report.diagnostics = output.diagnostics;
        }
        Err(e) => report.outcome = FileOutcome::Failed(e.to_string()),
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn instrumentation(root: &Path) -> Instrumentation {
        Instrumentation::new(root.join("src/profileImport.js"))
    }

    #[test]
    fn test_collect_respects_extensions_and_ignores() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "app/a.js", "");
        write(root, "app/b.mjs", "");
        write(root, "app/notes.md", "");
        write(root, "app/node_modules/dep/index.js", "");

        let files = collect_files(&[root.join("app")], &RunOptions::default()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.js", "b.mjs"]);
    }

    #[test]
    fn test_explicit_file_is_always_included() {
        let tmp = TempDir::new().unwrap();
        let file = write(tmp.path(), "script.ts", "");
        let files = collect_files(&[file.clone()], &RunOptions::default()).unwrap();
        assert_eq!(files, [file]);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = collect_files(&[tmp.path().join("nope")], &RunOptions::default());
        assert!(matches!(err, Err(Error::Io { .. })));
    }

    #[test]
    fn test_bad_ignore_pattern() {
        let tmp = TempDir::new().unwrap();
        let options = RunOptions {
            ignore: vec!["[".to_string()],
            ..RunOptions::default()
        };
        assert!(matches!(
            collect_files(&[tmp.path().to_path_buf()], &options),
            Err(Error::Pattern { .. })
        ));
    }

    #[test]
    fn test_run_writes_changed_files_only() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let dynamic = write(root, "app/dynamic.js", "await import('./x.js');\n");
        let plain_src = "import profileImport from '../src/profileImport.js';\nconst a = 1;\n";
        let plain = write(root, "app/plain.js", plain_src);

        let summary = run(&[root.join("app")], &instrumentation(root), &RunOptions::default()).unwrap();

        assert_eq!(summary.changed(), 1);
        assert_eq!(summary.unmodified(), 1);
        assert_eq!(summary.rewritten(), 1);
        assert!(fs::read_to_string(&dynamic).unwrap().contains("__AUTO_PROFILE__"));
        assert_eq!(fs::read_to_string(&plain).unwrap(), plain_src);
    }

    #[test]
    fn test_dry_run_leaves_files_alone() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let src = "await import('./x.js');\n";
        let file = write(root, "app/dynamic.js", src);

        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let summary = run(&[file.clone()], &instrumentation(root), &options).unwrap();

        assert_eq!(summary.changed(), 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), src);
    }

    #[test]
    fn test_failure_does_not_stop_the_run() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "app/a_broken.js", "const = ;\n");
        let good = write(root, "app/b_good.js", "import('./x.js');\n");

        let summary = run(&[root.join("app")], &instrumentation(root), &RunOptions::default()).unwrap();

        let errors = summary.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].0.ends_with("a_broken.js"));
        assert!(errors[0].1.contains("cannot parse"));
        assert_eq!(summary.changed(), 1);
        assert!(fs::read_to_string(good).unwrap().starts_with("import profileImport"));
    }

    #[test]
    fn test_remove_mode_round_trip() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let src = "export async function load() {\n  return import('./x.js');\n}\n";
        let file = write(root, "app/load.js", src);
        let inst = instrumentation(root);

        run(&[file.clone()], &inst, &RunOptions::default()).unwrap();
        let options = RunOptions {
            mode: Mode::Remove,
            ..RunOptions::default()
        };
        let summary = run(&[file.clone()], &inst, &options).unwrap();

        assert_eq!(summary.changed(), 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), src);
    }

    #[test]
    fn test_diagnostics_are_collected() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "app/computed.js", "export const f = (p) => import(p);\n");

        let summary = run(&[root.join("app")], &instrumentation(root), &RunOptions::default()).unwrap();
        assert_eq!(summary.diagnostics().count(), 1);
    }
}
