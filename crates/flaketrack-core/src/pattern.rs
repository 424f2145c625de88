//! Wildcard object-key patterns.
//!
//! A pattern is `bucket/literal*literal*...`: the first path component names
//! the bucket, the rest is split on `*` while keeping every literal (slashes
//! included) intact.
//!
//! ```text
//! istio-prow/logs/*-master/*/artifacts/junit.xml
//! bucket     = istio-prow
//! literals   = ["logs/", "-master/", "/artifacts/junit.xml"]
//! ```
//!
//! Only one wildcard per path component is supported; there is no general
//! glob or regex engine behind this.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

pub const WILDCARD: char = '*';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("pattern '{0}' has no bucket component (expected 'bucket/path')")]
    MissingBucket(String),

    #[error("pattern '{0}' has a wildcard in its bucket component")]
    WildcardInBucket(String),

    #[error("pattern '{pattern}' has more than one wildcard in component '{component}'")]
    MultipleWildcards { pattern: String, component: String },
}

/// A parsed, validated wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct PathPattern {
    raw: String,
    bucket: String,
    /// Literal text around the wildcards; always `wildcards + 1` entries.
    literals: Vec<String>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let raw = raw.trim();
        let path = raw
            .strip_prefix("gs://")
            .or_else(|| raw.strip_prefix("s3://"))
            .unwrap_or(raw);
        if path.is_empty() {
            return Err(PatternError::Empty);
        }

        let (bucket, rest) = path
            .split_once('/')
            .ok_or_else(|| PatternError::MissingBucket(raw.to_string()))?;
        if bucket.contains(WILDCARD) {
            return Err(PatternError::WildcardInBucket(raw.to_string()));
        }
        if bucket.is_empty() {
            return Err(PatternError::MissingBucket(raw.to_string()));
        }

        let literals: Vec<String> = rest.split(WILDCARD).map(str::to_string).collect();

        // Between two wildcards there must be a path boundary.
        if literals.len() > 2 {
            for inner in &literals[1..literals.len() - 1] {
                if !inner.contains('/') {
                    return Err(PatternError::MultipleWildcards {
                        pattern: raw.to_string(),
                        component: format!("{WILDCARD}{inner}{WILDCARD}"),
                    });
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            bucket: bucket.to_string(),
            literals,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Literal text before, between and after the wildcards.
    pub fn literals(&self) -> &[String] {
        &self.literals
    }

    pub fn wildcard_count(&self) -> usize {
        self.literals.len() - 1
    }

    pub fn is_literal(&self) -> bool {
        self.wildcard_count() == 0
    }
}

impl TryFrom<String> for PathPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl std::str::FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
