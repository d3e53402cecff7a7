//! CLI argument parsing for viscera

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "viscera")]
#[command(version)]
#[command(about = "Profile dynamic import() load times in JavaScript workspaces", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration file (default: nearest viscera.toml, then built-in defaults)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wrap literal import() calls in the profiling entry point
    Inject(TransformArgs),
    /// Unwrap marked profiling calls back into import()
    Remove(TransformArgs),
    /// Show how a module path resolves from an importing file
    Resolve(TargetArgs),
    /// Load a module through the profiler and report its load time
    Load(TargetArgs),
    /// List the members of the workspace containing a directory
    Workspace(WorkspaceArgs),
}

#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Files or directories to rewrite
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Report what would change without writing files
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Print rewritten sources to stdout instead of writing them
    #[arg(long)]
    pub print: bool,

    /// Module exporting the entry point (overrides the config file)
    #[arg(long = "entry-module", value_name = "FILE")]
    pub entry_module: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Module path as it would be passed to import()
    pub module: String,

    /// Importing file; a directory stands for a module directly inside it
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub from: PathBuf,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct WorkspaceArgs {
    /// Directory inside the workspace
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_inject_paths() {
        let cli = Cli::parse_from(["viscera", "inject", "src", "lib/a.js"]);
        match cli.command {
            Command::Inject(args) => {
                assert_eq!(args.paths, [PathBuf::from("src"), PathBuf::from("lib/a.js")]);
                assert!(!args.dry_run);
                assert!(!args.print);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_transform_requires_paths() {
        assert!(Cli::try_parse_from(["viscera", "remove"]).is_err());
    }

    #[test]
    fn test_cli_dry_run_short_flag() {
        let cli = Cli::parse_from(["viscera", "remove", "-n", "src"]);
        assert!(matches!(cli.command, Command::Remove(ref a) if a.dry_run));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["viscera", "inject", "src", "--debug", "-c", "v.toml"]);
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("v.toml")));
    }

    #[test]
    fn test_cli_resolve_defaults() {
        let cli = Cli::parse_from(["viscera", "resolve", "@ktr-srt/util"]);
        match cli.command {
            Command::Resolve(args) => {
                assert_eq!(args.module, "@ktr-srt/util");
                assert_eq!(args.from, PathBuf::from("."));
                assert_eq!(args.format, OutputFormat::Text);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_load_json_format() {
        let cli = Cli::parse_from([
            "viscera", "load", "./a.js", "--from", "app/main.js", "--format", "json",
        ]);
        assert!(matches!(
            cli.command,
            Command::Load(ref a) if a.format == OutputFormat::Json && a.from == PathBuf::from("app/main.js")
        ));
    }

    #[test]
    fn test_cli_workspace_default_dir() {
        let cli = Cli::parse_from(["viscera", "workspace"]);
        assert!(matches!(cli.command, Command::Workspace(ref a) if a.dir == PathBuf::from(".")));
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["viscera", "workspace", "--format", "csv"]).is_err());
    }
}
