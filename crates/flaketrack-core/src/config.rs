//! Run configuration.
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! stock setup: the Istio prow buckets, windows of 30 and 7 days, XML reports
//! written to `istio-flakey-test`.
//!
//! ```yaml
//! store: gs://
//! bucket: istio-flakey-test
//! output_prefix: reports
//! patterns:
//!   - istio-prow/logs/*-master/*/artifacts/junit.xml
//! windows: [30, 7]
//! branches:
//!   tokens: [master, release-1.1]
//!   fallback: unknown
//! format: xml
//! parallel: 8
//! utc_offset_minutes: 0
//! retry:
//!   max_retries: 3
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use chrono::FixedOffset;
use serde::Deserialize;
use thiserror::Error;

use crate::branch::TokenBranchPolicy;
use crate::pattern::PathPattern;
use crate::report::{ReportDestination, ReportFormat};
use crate::store::RetryPolicy;

pub const DEFAULT_STORE: &str = "gs://";
pub const DEFAULT_OUTPUT_BUCKET: &str = "istio-flakey-test";
pub const DEFAULT_WINDOWS: [u32; 2] = [30, 7];
pub const DEFAULT_PARALLEL: usize = 8;
const MAX_OFFSET_MINUTES: i32 = 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlakeConfig {
    /// Store URL: `gs://`, `s3://?region=..`, `file:///root` or `memory://`.
    pub store: String,
    /// Bucket receiving the reports.
    pub bucket: String,
    pub output_prefix: Option<String>,
    pub patterns: Vec<PathPattern>,
    /// Trailing window sizes in days, one report each.
    pub windows: Vec<u32>,
    pub branches: TokenBranchPolicy,
    pub format: ReportFormat,
    /// Artifacts fetched and parsed concurrently.
    pub parallel: usize,
    /// Offset used to turn timestamps into calendar dates.
    pub utc_offset_minutes: i32,
    pub retry: RetryPolicy,
}

impl Default for FlakeConfig {
    fn default() -> Self {
        Self {
            store: DEFAULT_STORE.to_string(),
            bucket: DEFAULT_OUTPUT_BUCKET.to_string(),
            output_prefix: None,
            patterns: default_patterns(),
            windows: DEFAULT_WINDOWS.to_vec(),
            branches: TokenBranchPolicy::default(),
            format: ReportFormat::Xml,
            parallel: DEFAULT_PARALLEL,
            utc_offset_minutes: 0,
            retry: RetryPolicy::default(),
        }
    }
}

fn default_patterns() -> Vec<PathPattern> {
    [
        "istio-prow/logs/*-master/*/artifacts/junit.xml",
        "istio-prow/logs/*-release-1.1/*/artifacts/junit.xml",
    ]
    .iter()
    .filter_map(|raw| PathPattern::parse(raw).ok())
    .collect()
}

pub fn load_config(path: &Path) -> Result<FlakeConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    FlakeConfig::from_yaml_str(&raw)
}

impl FlakeConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as null; treat it as "all defaults".
        let cfg: FlakeConfig = if raw.trim().is_empty() {
            FlakeConfig::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.patterns.is_empty() {
            return Err(ConfigError::Invalid("config has no patterns".into()));
        }
        if self.windows.is_empty() {
            return Err(ConfigError::Invalid("config has no windows".into()));
        }
        if self.parallel == 0 {
            return Err(ConfigError::Invalid("parallel must be at least 1".into()));
        }
        if self.bucket.is_empty() || self.bucket.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "output bucket '{}' must be a single path component",
                self.bucket
            )));
        }
        if self.utc_offset_minutes.abs() >= MAX_OFFSET_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes {} is outside -1439..=1439",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Every bucket the run reads from or writes to, deduplicated.
    pub fn buckets(&self) -> Vec<String> {
        let mut buckets: BTreeSet<String> = self
            .patterns
            .iter()
            .map(|p| p.bucket().to_string())
            .collect();
        buckets.insert(self.bucket.clone());
        buckets.into_iter().collect()
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "utc_offset_minutes {} is not a valid offset",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn destination(&self) -> ReportDestination {
        let dest = ReportDestination::new(self.bucket.clone());
        match &self.output_prefix {
            Some(prefix) => dest.with_prefix(prefix.clone()),
            None => dest,
        }
    }
}
