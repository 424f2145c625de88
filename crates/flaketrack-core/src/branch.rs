//! Branch inference for resolved artifacts.
//!
//! The branch label is decided once per pattern, when the pattern is
//! resolved, and copied onto every ref it produces.

use serde::{Deserialize, Serialize};

pub const DEFAULT_FALLBACK_BRANCH: &str = "unknown";

/// Maps a pattern's text to a branch label.
pub trait BranchPolicy: Send + Sync {
    fn infer(&self, pattern: &str) -> String;
}

impl<F> BranchPolicy for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn infer(&self, pattern: &str) -> String {
        self(pattern)
    }
}

/// Picks the first configured token that occurs in the pattern text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenBranchPolicy {
    pub tokens: Vec<String>,
    pub fallback: String,
}

impl Default for TokenBranchPolicy {
    fn default() -> Self {
        Self {
            tokens: vec!["master".to_string(), "release-1.1".to_string()],
            fallback: DEFAULT_FALLBACK_BRANCH.to_string(),
        }
    }
}

impl TokenBranchPolicy {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            fallback: DEFAULT_FALLBACK_BRANCH.to_string(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }
}

impl BranchPolicy for TokenBranchPolicy {
    fn infer(&self, pattern: &str) -> String {
        self.tokens
            .iter()
            .find(|token| !token.is_empty() && pattern.contains(token.as_str()))
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
