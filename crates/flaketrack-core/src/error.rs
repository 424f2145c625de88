use thiserror::Error;

use crate::config::ConfigError;
use crate::report::ReportError;
use crate::resolver::ResolveError;
use crate::store::StoreError;

/// Why a run (or the setup before it) failed.
///
/// Artifacts that fail to parse are not errors at this level; they are
/// counted in the run summary and skipped.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Store construction failed (bad URL, missing credentials).
    #[error("store setup failed: {0}")]
    Setup(#[from] StoreError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to fetch artifact {bucket}/{key}: {source}")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl RunError {
    /// 2 for configuration and setup problems, 1 for a failed run.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(_) | RunError::Setup(_) => 2,
            RunError::Resolve(_) | RunError::Fetch { .. } | RunError::Report(_) => 1,
        }
    }
}
