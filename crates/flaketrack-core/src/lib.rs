pub mod aggregate;
pub mod branch;
pub mod config;
pub mod error;
pub mod junit;
pub mod pattern;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod store;
pub mod window;

// Convenience re-exports
pub use aggregate::{AggregationState, AggregationStats, CaseKey, Counter, Stability, SuiteEntry};
pub use branch::{BranchPolicy, TokenBranchPolicy};
pub use config::{load_config, ConfigError, FlakeConfig};
pub use error::RunError;
pub use junit::{JunitError, OutcomeRecord, SuiteOutcome};
pub use pattern::{PathPattern, PatternError};
pub use pipeline::{Pipeline, RunSummary};
pub use report::{FlakeReport, ReportDestination, ReportError, ReportFormat, ReportRecord};
pub use resolver::{ObjectRef, PatternResolver, ResolveError};
pub use store::{
    ArtifactStore, ListEntry, ListScope, ObjectStoreArtifactStore, RetryPolicy, StoreError,
    StoreSpec,
};
pub use window::WindowFilter;

// Re-export bytes for CLI convenience
pub use bytes::Bytes;
