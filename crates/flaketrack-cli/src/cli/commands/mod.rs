use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use flaketrack_core::{load_config, FlakeConfig};

use super::args::*;
use crate::exit_codes::SUCCESS;

pub mod parse;
pub mod resolve;
pub mod run;

pub async fn dispatch(cli: Cli) -> Result<i32> {
    let global = GlobalArgs {
        config: cli.config,
        store: cli.store,
    };
    match cli.cmd.unwrap_or_else(|| Command::Run(RunArgs::default())) {
        Command::Run(args) => run::run(&global, args).await,
        Command::Resolve(args) => resolve::run(&global, args).await,
        Command::Parse(args) => parse::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}

/// Flags shared by every command.
pub struct GlobalArgs {
    pub config: Option<std::path::PathBuf>,
    pub store: Option<String>,
}

impl GlobalArgs {
    /// The config file (or defaults) with CLI overrides applied.
    pub fn settings(&self) -> Result<FlakeConfig> {
        let mut cfg = match &self.config {
            Some(path) => load(path)?,
            None => FlakeConfig::default(),
        };
        if let Some(store) = &self.store {
            cfg.store = store.clone();
        }
        Ok(cfg)
    }
}

fn load(path: &Path) -> Result<FlakeConfig> {
    load_config(path).with_context(|| format!("failed to load config {}", path.display()))
}

/// "Now" for a run: noon of `date` in the configured offset, or the clock.
pub fn now_for(date: Option<NaiveDate>, offset: FixedOffset) -> Result<DateTime<Utc>> {
    let Some(date) = date else {
        return Ok(Utc::now());
    };
    let noon = date
        .and_hms_opt(12, 0, 0)
        .context("invalid time of day")?;
    let local = offset
        .from_local_datetime(&noon)
        .single()
        .with_context(|| format!("{date} has no unambiguous noon at offset {offset}"))?;
    Ok(local.with_timezone(&Utc))
}
