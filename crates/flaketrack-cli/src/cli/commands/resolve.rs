//! `flaketrack resolve` - dry run of artifact discovery.

use anyhow::{Context, Result};
use flaketrack_core::Pipeline;
use serde::Serialize;

use super::{now_for, GlobalArgs};
use crate::cli::args::ResolveArgs;
use crate::exit_codes::{RUN_FAILED, SUCCESS};

#[derive(Serialize)]
struct Row<'a> {
    branch: &'a str,
    created: String,
    bucket: &'a str,
    key: &'a str,
}

pub async fn run(global: &GlobalArgs, args: ResolveArgs) -> Result<i32> {
    let cfg = global.settings()?;
    let offset = cfg.utc_offset()?;
    let days = args
        .window
        .or_else(|| cfg.windows.first().copied())
        .context("no window configured")?;
    let pipeline = match Pipeline::from_config(&cfg) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("{e}");
            return Ok(e.exit_code());
        }
    };

    let now = now_for(args.date, offset)?;
    let refs = match pipeline.resolve_window(days, now).await {
        Ok(refs) => refs,
        Err(e) => {
            eprintln!("resolve failed: {e}");
            return Ok(e.exit_code().max(RUN_FAILED));
        }
    };

    for r in &refs {
        let row = Row {
            branch: &r.branch,
            created: r.created.to_rfc3339(),
            bucket: &r.bucket,
            key: &r.key,
        };
        if args.json {
            println!("{}", serde_json::to_string(&row)?);
        } else {
            println!("{}\t{}\t{}/{}", row.branch, row.created, row.bucket, row.key);
        }
    }
    if refs.is_empty() && !args.json {
        eprintln!("(no artifacts in the last {days} days)");
    }
    Ok(SUCCESS)
}
