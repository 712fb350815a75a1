//! Clap derive structures for the `meshwatch` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// meshwatch -- device presence notifications for a Tailscale tailnet
#[derive(Debug, Parser)]
#[command(
    name = "meshwatch",
    version,
    about = "Watch a tailnet and notify when devices come online or go offline",
    long_about = "Polls the tailnet device directory on a fixed interval, diffs it against\n\
        the last persisted state, and delivers a notification for every device\n\
        that comes online, goes offline, or appears for the first time.\n\n\
        Without a subcommand, runs the monitor until SIGINT or SIGTERM.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (default: platform config dir, meshwatch/config.toml)
    #[arg(long, short = 'c', env = "MESHWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        env = "MESHWATCH_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the monitor until interrupted (default)
    Run,

    /// Run a single poll cycle and exit
    Once(OnceArgs),

    /// Print the persisted device state
    State(StateArgs),

    /// Print the effective configuration (API token omitted)
    Config,
}

#[derive(Debug, Default, Args)]
pub struct OnceArgs {
    /// Also send the status report
    #[arg(long)]
    pub report: bool,
}

#[derive(Debug, Args)]
pub struct StateArgs {
    /// Emit JSON instead of a plain listing
    #[arg(long)]
    pub json: bool,
}
