//! CLI definitions and entry point.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Local task state for iterative agent execution loops
#[derive(Parser, Debug)]
#[command(name = "lw", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// State directory (auto-discover .loopwork if not set)
    #[arg(long, global = true, env = "LOOPWORK_DIR")]
    pub dir: Option<PathBuf>,

    /// Prefix for locally created issue ids
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Tracker backend (linear, jira or local)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only log errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write logs as JSON lines to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Allocate the next local issue id
    NextId,

    /// Show the dependency graph of a local issue
    Graph(GraphArgs),

    /// Parse (and optionally record) a completion report
    Parse(ParseArgs),

    /// Show the iteration log of an issue
    Log(LogArgs),

    /// Write the completion summary of an issue
    Summary(SummaryArgs),

    /// Show the resolved project settings
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct GraphArgs {
    /// Parent issue id
    pub issue: String,

    /// Only list tasks that are ready to run
    #[arg(long)]
    pub ready: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ParseArgs {
    /// Report file (reads stdin when omitted)
    pub file: Option<PathBuf>,

    /// Only print the status tag, without validating the rest
    #[arg(long, conflicts_with = "apply")]
    pub status_only: bool,

    /// Record the outcome against this parent issue
    #[arg(long, value_name = "ISSUE")]
    pub apply: Option<String>,

    /// When the attempt started (RFC 3339, defaults to now)
    #[arg(long, requires = "apply")]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Parent issue id
    pub issue: String,

    /// Only show attempts for this sub-task
    #[arg(long)]
    pub subtask: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    /// Parent issue id
    pub issue: String,
}
