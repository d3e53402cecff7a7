use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use viscera::cli::{Cli, Command, OutputFormat, TargetArgs, TransformArgs, WorkspaceArgs};
use viscera::config::VisceraConfig;
use viscera::loader::FsModuleLoader;
use viscera::resolver::unwrap_default_export;
use viscera::transform::runner::{self, FileOutcome, Mode, RunOptions};
use viscera::transform::Instrumentation;
use viscera::{module_path, workspace};

/// Initialize tracing subscriber; `--debug` turns on everything
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Importer location for a `--from` path
fn importer_location(from: &Path) -> PathBuf {
    let path = module_path::absolutize(from);
    if path.is_dir() {
        path.join("index.js")
    } else {
        path
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print each rewritten file to stdout; a failing file is reported and skipped
fn print_transformed(
    mode: Mode,
    paths: &[PathBuf],
    inst: &Instrumentation,
    options: &RunOptions,
) -> Result<()> {
    let mut failed = 0;
    for path in runner::collect_files(paths, options)? {
        let printed = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .and_then(|source| {
                let output = mode
                    .apply(&source, &path, inst)
                    .with_context(|| format!("Failed to transform {}", path.display()))?;
                Ok(output.text(&source).to_string())
            });
        match printed {
            Ok(text) => print!("{}", text),
            Err(e) => {
                eprintln!("error: {:#}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} file(s) could not be transformed", failed);
    }
    Ok(())
}

fn run_transform(mode: Mode, args: TransformArgs, config: &VisceraConfig) -> Result<()> {
    let mut inst = config.instrumentation();
    if let Some(entry) = &args.entry_module {
        inst.module_path = module_path::absolutize(entry);
    }
    let options = config.run_options(mode, args.dry_run || args.print);

    if args.print {
        return print_transformed(mode, &args.paths, &inst, &options);
    }

    let summary = runner::run(&args.paths, &inst, &options)?;

    for (path, diagnostic) in summary.diagnostics() {
        eprintln!(
            "{}:{}:{}: {}",
            path.display(),
            diagnostic.line,
            diagnostic.column,
            diagnostic.message
        );
    }

    let verb = if args.dry_run { "would rewrite" } else { "rewrote" };
    for report in &summary.files {
        if let FileOutcome::Changed { rewritten } = report.outcome {
            println!("{} {} ({} call site(s))", verb, report.path.display(), rewritten);
        }
    }

    let errors = summary.errors();
    for (path, reason) in &errors {
        eprintln!("error: {}: {}", path.display(), reason);
    }
    println!(
        "{} changed, {} unmodified, {} failed",
        summary.changed(),
        summary.unmodified(),
        errors.len()
    );

    if !errors.is_empty() {
        anyhow::bail!("{} file(s) could not be transformed", errors.len());
    }
    Ok(())
}

fn run_resolve(args: TargetArgs, config: &VisceraConfig) -> Result<()> {
    let resolver = config.resolver();
    let importer = importer_location(&args.from);
    let importer = importer.to_string_lossy();

    let kind = resolver.classify(&args.module);
    let resolved = resolver
        .resolve(&args.module, &importer)
        .with_context(|| format!("Failed to resolve {}", args.module))?;

    match args.format {
        OutputFormat::Text => println!("{} ({}) -> {}", args.module, kind, resolved),
        OutputFormat::Json => print_json(&json!({
            "module": args.module,
            "importer": importer,
            "kind": kind,
            "resolved": resolved.to_string(),
        }))?,
    }
    Ok(())
}

fn run_load(args: TargetArgs, config: &VisceraConfig) -> Result<()> {
    let importer = importer_location(&args.from);
    let base_dir = importer
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    let resolver = config.resolver().with_loader(FsModuleLoader::new(base_dir));

    let importer = importer.to_string_lossy();
    let outcome = resolver
        .load(&args.module, Some(importer.as_ref()), None)
        .with_context(|| format!("Failed to load {}", args.module))?;

    match args.format {
        OutputFormat::Text => {
            if let Some(line) = &outcome.summary {
                println!("{}", line);
            }
            println!("resolved: {} ({})", outcome.resolved, outcome.kind);
            if let Some(package) = &outcome.package {
                println!("importer package: {}", package);
            }
        }
        OutputFormat::Json => print_json(&json!({
            "module": outcome.module_path,
            "kind": outcome.kind,
            "resolved": outcome.resolved.to_string(),
            "package": outcome.package,
            "duration_ms": outcome.duration_ms(),
            "value": unwrap_default_export(outcome.value.clone()),
        }))?,
    }
    Ok(())
}

fn run_workspace(args: WorkspaceArgs) -> Result<()> {
    let dir = module_path::absolutize(&args.dir);
    let root = workspace::find_workspace_root(&dir)?
        .with_context(|| format!("No workspace root found above {}", dir.display()))?;
    let members = workspace::workspace_members(&dir)?;

    match args.format {
        OutputFormat::Text => {
            println!("workspace root: {}", root.display());
            for member in &members {
                println!("  {}", member.display());
            }
        }
        OutputFormat::Json => print_json(&json!({
            "root": root,
            "members": members,
        }))?,
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let cwd = std::env::current_dir().context("Failed to determine the working directory")?;
    let config = VisceraConfig::load(args.config.as_deref(), &cwd)?;

    match args.command {
        Command::Inject(transform) => run_transform(Mode::Inject, transform, &config),
        Command::Remove(transform) => run_transform(Mode::Remove, transform, &config),
        Command::Resolve(target) => run_resolve(target, &config),
        Command::Load(target) => run_load(target, &config),
        Command::Workspace(ws) => run_workspace(ws),
    }
}
