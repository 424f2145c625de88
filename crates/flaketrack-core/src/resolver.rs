//! Wildcard pattern resolution on top of prefix listing.
//!
//! The store only answers "which keys start with this prefix". A pattern is
//! resolved by alternating two moves:
//!
//! 1. **List**: for every known directory, ask the store for the children of
//!    `directory + pending literal`. This expands one wildcard to exactly one
//!    path component.
//! 2. **Filter**: the literal after a wildcard, up to its first `/`, finishes
//!    that component. It is checked as a suffix of the entries already listed,
//!    never by issuing a new listing. Whatever follows the `/` is carried as
//!    the pending literal into the next listing.
//!
//! The literal after the last wildcard is the terminal step: one recursive
//! listing per surviving directory, kept by suffix.
//!
//! ```text
//! bucket/logs/*-master/1234/artifacts/junit.xml
//!   list   logs/                                  -> logs/ci-master/, logs/ci-rel/
//!   filter "-master/"                             -> logs/ci-master/
//!   list   logs/ci-master/1234/artifacts/junit.xml (recursive, suffix match)
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::branch::BranchPolicy;
use crate::pattern::PathPattern;
use crate::store::{ArtifactStore, ListEntry, ListScope, StoreError};

/// One discovered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
    pub created: DateTime<Utc>,
    /// Inferred from the pattern that produced this ref.
    pub branch: String,
}

/// A listing call failed after the store's retries.
#[derive(Debug, Error)]
#[error("failed to resolve pattern '{pattern}' at prefix '{prefix}': {source}")]
pub struct ResolveError {
    pub pattern: String,
    pub prefix: String,
    #[source]
    pub source: StoreError,
}

/// Listings in flight per pattern step unless told otherwise.
pub const DEFAULT_LIST_CONCURRENCY: usize = 8;

pub struct PatternResolver<'a> {
    store: &'a dyn ArtifactStore,
    branches: &'a dyn BranchPolicy,
    concurrency: usize,
}

impl<'a> PatternResolver<'a> {
    pub fn new(store: &'a dyn ArtifactStore, branches: &'a dyn BranchPolicy) -> Self {
        Self {
            store,
            branches,
            concurrency: DEFAULT_LIST_CONCURRENCY,
        }
    }

    /// Bound on concurrent listings across the directories of one step.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Resolve every pattern and return the union of their refs.
    ///
    /// Patterns expand concurrently. Refs are deduplicated on
    /// `(bucket, key, branch)`; order follows the pattern list.
    pub async fn resolve(&self, patterns: &[PathPattern]) -> Result<Vec<ObjectRef>, ResolveError> {
        let per_pattern = try_join_all(patterns.iter().map(|p| self.resolve_pattern(p))).await?;

        let mut seen = HashSet::new();
        let mut refs = Vec::new();
        for r in per_pattern.into_iter().flatten() {
            if seen.insert((r.bucket.clone(), r.key.clone(), r.branch.clone())) {
                refs.push(r);
            }
        }
        Ok(refs)
    }

    pub async fn resolve_pattern(
        &self,
        pattern: &PathPattern,
    ) -> Result<Vec<ObjectRef>, ResolveError> {
        let branch = self.branches.infer(pattern.as_str());
        let literals = pattern.literals();

        if pattern.is_literal() {
            let entries = self
                .list(pattern, &literals[0], ListScope::Recursive)
                .await?;
            return Ok(into_refs(pattern, &branch, entries));
        }

        // The root "directory" is the empty key.
        let mut frontier = vec![String::new()];
        let mut pending = literals[0].clone();

        for literal in &literals[1..] {
            let expanded = self
                .list_each(pattern, &frontier, &pending, ListScope::Children)
                .await?;

            match literal.split_once('/') {
                Some((stem, rest)) => {
                    let head = format!("{stem}/");
                    frontier = expanded
                        .into_iter()
                        .filter(|e| e.is_directory() && e.key.ends_with(&head))
                        .map(|e| e.key)
                        .collect();
                    pending = rest.to_string();
                }
                None => {
                    // Only the last literal can lack a '/': it ends a file name.
                    let objects: Vec<ListEntry> = expanded
                        .into_iter()
                        .filter(|e| !e.is_directory() && e.key.ends_with(literal.as_str()))
                        .collect();
                    let refs = into_refs(pattern, &branch, objects);
                    info!(pattern = %pattern, branch = %branch, found = refs.len(), "resolved pattern");
                    return Ok(refs);
                }
            }

            if frontier.is_empty() {
                debug!(pattern = %pattern, literal = %literal, "no listing matched, pattern pruned");
                return Ok(Vec::new());
            }
        }

        let whole_directory = pending.is_empty() || pending.ends_with('/');
        let objects: Vec<ListEntry> = self
            .list_each(pattern, &frontier, &pending, ListScope::Recursive)
            .await?
            .into_iter()
            .filter(|e| whole_directory || e.key.ends_with(pending.as_str()))
            .collect();

        let refs = into_refs(pattern, &branch, objects);
        info!(pattern = %pattern, branch = %branch, found = refs.len(), "resolved pattern");
        Ok(refs)
    }

    /// List `dir + pending` for every directory, keeping directory order.
    async fn list_each(
        &self,
        pattern: &PathPattern,
        dirs: &[String],
        pending: &str,
        scope: ListScope,
    ) -> Result<Vec<ListEntry>, ResolveError> {
        let listings: Vec<Vec<ListEntry>> = stream::iter(dirs.iter().map(|dir| {
            let prefix = format!("{dir}{pending}");
            async move { self.list(pattern, &prefix, scope).await }
        }))
        .buffered(self.concurrency)
        .try_collect()
        .await?;
        Ok(listings.into_iter().flatten().collect())
    }

    async fn list(
        &self,
        pattern: &PathPattern,
        prefix: &str,
        scope: ListScope,
    ) -> Result<Vec<ListEntry>, ResolveError> {
        self.store
            .list(pattern.bucket(), prefix, scope)
            .await
            .map_err(|source| ResolveError {
                pattern: pattern.to_string(),
                prefix: prefix.to_string(),
                source,
            })
    }
}

fn into_refs(pattern: &PathPattern, branch: &str, entries: Vec<ListEntry>) -> Vec<ObjectRef> {
    entries
        .into_iter()
        .filter_map(|entry| {
            // Directories carry no creation time and never become refs.
            let created = entry.created?;
            Some(ObjectRef {
                bucket: pattern.bucket().to_string(),
                key: entry.key,
                created,
                branch: branch.to_string(),
            })
        })
        .collect()
}
