use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use flaketrack_core::ReportFormat;

#[derive(Parser)]
#[command(
    name = "flaketrack",
    version,
    about = "Aggregate per-branch test flakiness from CI JUnit artifacts in object storage"
)]
pub struct Cli {
    /// YAML config file (built-in defaults when omitted)
    #[arg(long, global = true, env = "FLAKETRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store URL, overrides the config (gs://, s3://?region=.., file:///path, memory://)
    #[arg(long, global = true, env = "FLAKETRACK_STORE")]
    pub store: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Defaults to `run`
    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Aggregate every configured window and write one report each
    Run(RunArgs),
    /// List the artifacts a run would fold, without fetching them
    Resolve(ResolveArgs),
    /// Parse a local JUnit file and print its outcome records
    Parse(ParseArgs),
    Version,
}

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Window size in days; repeat for several reports (overrides the config)
    #[arg(long = "window", value_name = "DAYS")]
    pub windows: Vec<u32>,

    /// Treat this date (YYYY-MM-DD) as today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Report format: xml or json (overrides the config)
    #[arg(long)]
    pub format: Option<ReportFormat>,

    /// Print run summaries as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ResolveArgs {
    /// Window size in days (defaults to the first configured window)
    #[arg(long, value_name = "DAYS")]
    pub window: Option<u32>,

    /// Treat this date (YYYY-MM-DD) as today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ParseArgs {
    /// JUnit XML file
    pub file: PathBuf,

    #[arg(long)]
    pub json: bool,
}
