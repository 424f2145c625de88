use anyhow::{Context, Result};
use flaketrack_core::junit;

use crate::cli::args::ParseArgs;
use crate::exit_codes::{RUN_FAILED, SUCCESS};

pub fn run(args: ParseArgs) -> Result<i32> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let records = match junit::parse_records(&bytes) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("{}: {e}", args.file.display());
            return Ok(RUN_FAILED);
        }
    };

    for record in &records {
        if args.json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            let status = if record.failed { "FAIL" } else { "PASS" };
            println!(
                "{status}\t{}\t{}\t{}",
                record.suite, record.class, record.method
            );
        }
    }
    Ok(SUCCESS)
}
