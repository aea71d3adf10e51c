//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// maltrace -- batch malware detection across static, AI and event-log modules.
///
/// Use `maltrace <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "maltrace", version, about, long_about = None)]
pub struct Cli {
    /// Path to the maltrace.toml configuration file.
    #[arg(short, long, global = true, default_value = "maltrace.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit files as one batch and wait for the result.
    Scan(ScanArgs),

    /// Run the detection modules against a single file.
    Detect(DetectArgs),

    /// Inspect event-log hunt rules.
    Rules(RulesArgs),

    /// Score a set of predictions against ground-truth labels.
    Evaluate(EvaluateArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- scan ----

/// Submit a batch of files. Directories are expanded one level deep.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Files or directories to analyse.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Modules to run (static, ai, dynamic). Defaults depend on each file's type.
    #[arg(long, value_delimiter = ',')]
    pub modules: Option<Vec<String>>,

    /// Ground-truth label file (JSON map, JSON records or CSV).
    #[arg(long)]
    pub ground_truth: Option<PathBuf>,

    /// Status polling interval in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub poll_ms: u64,
}

// ---- detect ----

/// Analyse one file and print per-module outcomes plus a summary report.
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// File to analyse.
    pub file: PathBuf,

    /// Modules to run (static, ai, dynamic). Defaults depend on the file type.
    #[arg(long, value_delimiter = ',')]
    pub modules: Option<Vec<String>>,
}

// ---- rules ----

/// Inspect event-log hunt rules.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List the rules that survive loading and platform filtering.
    List {
        /// Rule directory (default: `dynamic.rule_dir` from the configuration).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Report how many rule files were loaded and why others were skipped.
    Validate {
        /// Rule directory (default: `dynamic.rule_dir` from the configuration).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

// ---- evaluate ----

/// Score predictions offline.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// JSON object mapping file name to a boolean malicious prediction.
    #[arg(long)]
    pub predictions: PathBuf,

    /// Ground-truth label file (JSON map, JSON records or CSV).
    #[arg(long)]
    pub ground_truth: PathBuf,
}

// ---- config ----

/// Manage maltrace configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, storage, static, ai, dynamic, batch).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_scan_with_modules() {
        let cli = Cli::try_parse_from([
            "maltrace",
            "scan",
            "a.exe",
            "samples/",
            "--modules",
            "static,ai",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.paths.len(), 2);
                assert_eq!(
                    args.modules,
                    Some(vec!["static".to_owned(), "ai".to_owned()])
                );
                assert!(args.ground_truth.is_none());
                assert_eq!(args.poll_ms, 500);
            }
            _ => panic!("expected Scan command"),
        }
    }

    #[test]
    fn test_cli_parse_scan_requires_paths() {
        let result = Cli::try_parse_from(["maltrace", "scan"]);
        assert!(result.is_err(), "scan without paths should fail");
    }

    #[test]
    fn test_cli_parse_scan_with_ground_truth() {
        let cli = Cli::try_parse_from([
            "maltrace",
            "scan",
            "samples",
            "--ground-truth",
            "labels.csv",
            "--poll-ms",
            "50",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.ground_truth, Some(PathBuf::from("labels.csv")));
                assert_eq!(args.poll_ms, 50);
                assert!(args.modules.is_none());
            }
            _ => panic!("expected Scan command"),
        }
    }

    #[test]
    fn test_cli_parse_detect() {
        let cli = Cli::try_parse_from(["maltrace", "detect", "Security.evtx"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Detect(args) => {
                assert_eq!(args.file, PathBuf::from("Security.evtx"));
                assert!(args.modules.is_none());
            }
            _ => panic!("expected Detect command"),
        }
    }

    #[test]
    fn test_cli_parse_rules_list_with_dir() {
        let cli = Cli::try_parse_from(["maltrace", "rules", "list", "--dir", "/opt/sigma"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::List { dir },
            }) => assert_eq!(dir, Some(PathBuf::from("/opt/sigma"))),
            _ => panic!("expected Rules List command"),
        }
    }

    #[test]
    fn test_cli_parse_rules_validate_default_dir() {
        let cli =
            Cli::try_parse_from(["maltrace", "rules", "validate"]).expect("parse succeeded");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::Validate { dir },
            }) => assert!(dir.is_none()),
            _ => panic!("expected Rules Validate command"),
        }
    }

    #[test]
    fn test_cli_parse_evaluate_requires_both_files() {
        assert!(
            Cli::try_parse_from(["maltrace", "evaluate", "--predictions", "p.json"]).is_err()
        );
        let cli = Cli::try_parse_from([
            "maltrace",
            "evaluate",
            "--predictions",
            "p.json",
            "--ground-truth",
            "gt.csv",
        ])
        .expect("parse succeeded");
        assert!(matches!(cli.command, Commands::Evaluate(_)));
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["maltrace", "config", "show", "--section", "batch"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("batch")),
            _ => panic!("expected Config Show command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from([
            "maltrace",
            "config",
            "validate",
            "--config",
            "/etc/maltrace.toml",
            "--output",
            "json",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
        ])
        .expect("parse succeeded");
        assert_eq!(cli.config, PathBuf::from("/etc/maltrace.toml"));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
    }

    #[test]
    fn test_cli_default_config_path() {
        let cli = Cli::try_parse_from(["maltrace", "config", "validate"]).expect("parse succeeded");
        assert_eq!(cli.config, PathBuf::from("maltrace.toml"));
        assert!(matches!(cli.output, OutputFormat::Text));
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
