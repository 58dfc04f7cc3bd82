//! Clap derive structures for the `swmon` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// swmon -- TP-Link switch telemetry collector
#[derive(Debug, Parser)]
#[command(
    name = "swmon",
    version,
    about = "Poll TP-Link managed switches and write their telemetry to InfluxDB",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "SWMON_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start polling every configured switch until interrupted
    Run(RunArgs),

    /// Validate the configuration and log in to each switch once
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Print metrics as JSON lines instead of writing to InfluxDB
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Only check this device
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Skip the InfluxDB health probe
    #[arg(long)]
    pub skip_influx: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["swmon", "run", "-vv", "--log-json", "--dry-run"]).unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert!(cli.global.log_json);
        assert!(matches!(cli.command, Command::Run(RunArgs { dry_run: true })));
    }

    #[test]
    fn check_accepts_device_filter() {
        let cli = Cli::try_parse_from(["swmon", "--config", "/tmp/s.toml", "check", "-d", "core"]).unwrap();
        assert_eq!(cli.global.config, Some(PathBuf::from("/tmp/s.toml")));
        match cli.command {
            Command::Check(args) => assert_eq!(args.device.as_deref(), Some("core")),
            Command::Run(_) => panic!("expected check"),
        }
    }
}
