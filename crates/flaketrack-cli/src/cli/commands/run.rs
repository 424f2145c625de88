use anyhow::Result;
use flaketrack_core::{Pipeline, RunSummary};

use super::{now_for, GlobalArgs};
use crate::cli::args::RunArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(global: &GlobalArgs, args: RunArgs) -> Result<i32> {
    let cfg = global.settings()?;
    let offset = cfg.utc_offset()?;

    let mut pipeline = match Pipeline::from_config(&cfg) {
        Ok(pipeline) => pipeline.with_windows(args.windows.clone()),
        Err(e) => {
            eprintln!("{e}");
            return Ok(e.exit_code());
        }
    };
    if let Some(format) = args.format {
        pipeline = pipeline.with_format(format);
    }

    let now = now_for(args.date, offset)?;
    let mut code = SUCCESS;
    for (days, result) in pipeline.run_all(now).await {
        match result {
            Ok(summary) => print_summary(&summary, args.json)?,
            Err(e) => {
                eprintln!("window {days}d failed: {e}");
                code = code.max(e.exit_code());
            }
        }
    }
    Ok(code)
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
    } else {
        println!(
            "{:>3}d  {}  artifacts={}/{} skipped={} suites={} cases={} flaky={}",
            summary.window_days,
            summary.report_key,
            summary.parsed,
            summary.in_window,
            summary.skipped,
            summary.stats.suites,
            summary.stats.cases,
            summary.stats.flaky_cases
        );
    }
    Ok(())
}
