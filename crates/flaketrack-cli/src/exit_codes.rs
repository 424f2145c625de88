//! Process exit codes. Part of the CLI contract.

pub const SUCCESS: i32 = 0;
pub const RUN_FAILED: i32 = 1; // A window run failed (listing, fetch or report write)
pub const CONFIG_ERROR: i32 = 2; // Config, credential or store setup failure
