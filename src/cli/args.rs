//! CLI argument definitions using clap derive

use crate::filter::CompilerFilter;
use crate::isa::InstructionSet;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// aotguard - Freshness governor for ahead-of-time compiled artifacts
///
/// Checks whether compiled artifacts for a bytecode source are still valid
/// and regenerates them through the configured compiler when they are not.
#[derive(Parser, Debug)]
#[command(name = "aotguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "AOTGUARD_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the freshness of both candidate artifacts
    Status(StatusArgs),

    /// Show what it would take to bring the best artifact up to date
    Plan(PlanArgs),

    /// Regenerate the best artifact if needed
    Update(PlanArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Source selection shared by all artifact commands
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Bytecode source location
    pub source: PathBuf,

    /// Target instruction set (defaults to the host's)
    #[arg(long, value_parser = parse_isa)]
    pub isa: Option<InstructionSet>,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the plan and update commands
#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Target compiler filter (defaults to the configured compiler options)
    #[arg(long, value_parser = parse_filter)]
    pub filter: Option<CompilerFilter>,

    /// The profile changed since the artifact was compiled
    #[arg(long)]
    pub profile_changed: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for the status command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON output
    Json,
}

fn parse_isa(s: &str) -> Result<InstructionSet, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_filter(s: &str) -> Result<CompilerFilter, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_status() {
        let cli = Cli::parse_from(["aotguard", "status", "/data/app/base.jar", "--isa", "arm64"]);
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.source.source, PathBuf::from("/data/app/base.jar"));
                assert_eq!(args.source.isa, Some(InstructionSet::Arm64));
                assert_eq!(args.format, OutputFormat::Text);
            }
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn cli_parses_plan() {
        let cli = Cli::parse_from([
            "aotguard",
            "plan",
            "/data/app/base.jar",
            "--filter",
            "speed-profile",
            "--profile-changed",
        ]);
        match cli.command {
            Commands::Plan(args) => {
                assert_eq!(args.filter, Some(CompilerFilter::SpeedProfile));
                assert!(args.profile_changed);
                assert_eq!(args.source.isa, None);
            }
            _ => panic!("expected Plan command"),
        }
    }

    #[test]
    fn cli_parses_update() {
        let cli = Cli::parse_from(["aotguard", "-vv", "update", "/a/b.jar"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Update(_)));
    }

    #[test]
    fn cli_rejects_unknown_filter() {
        let result = Cli::try_parse_from(["aotguard", "plan", "/a/b.jar", "--filter", "fastest"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_rejects_unknown_isa() {
        let result = Cli::try_parse_from(["aotguard", "status", "/a/b.jar", "--isa", "riscv"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_config_init_force() {
        let cli = Cli::parse_from(["aotguard", "config", "init", "--force"]);
        match cli.command {
            Commands::Config(args) => {
                assert!(matches!(args.action, Some(ConfigAction::Init { force: true })));
            }
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn cli_parses_config_without_action() {
        let cli = Cli::parse_from(["aotguard", "config"]);
        match cli.command {
            Commands::Config(args) => assert!(args.action.is_none()),
            _ => panic!("expected Config command"),
        }
    }
}
