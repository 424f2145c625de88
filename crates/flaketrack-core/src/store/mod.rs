//! Object storage adapter.
//!
//! Everything the pipeline needs from a bucket goes through [`ArtifactStore`]:
//! a prefix listing, a content fetch and a single-shot write. The store has no
//! glob support; wildcard expansion lives in [`crate::resolver`].
//!
//! # Listing semantics
//!
//! Prefixes are plain string prefixes (`logs/pr-` matches `logs/pr-12/...`),
//! not path-segment prefixes. A [`ListScope::Children`] listing returns the
//! immediate children below the prefix's directory, with sub-directories
//! reported as keys ending in `/`:
//!
//! ```text
//! list("logs/", Children)   -> logs/ci-master/, logs/ci-release/, logs/README
//! list("logs/ci-", Children) -> logs/ci-master/, logs/ci-release/
//! list("logs/", Recursive)  -> every object under logs/
//! ```

pub mod error;
pub mod object_store_backend;
pub mod retry;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

pub use error::{StoreError, StoreResult};
pub use object_store_backend::ObjectStoreArtifactStore;
pub use retry::RetryPolicy;

/// Parsed store specification from CLI/config.
///
/// # Examples
///
/// ```text
/// gs://                      (Google Cloud Storage, credentials from env)
/// s3://?region=eu-west-1
/// file:///var/lib/flaketrack (bucket = first directory below the root)
/// memory://                  (for testing)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSpec {
    /// The scheme (gs, s3, file, memory)
    pub scheme: String,
    /// Filesystem root for `file://`.
    pub root: Option<String>,
    /// Optional region (for S3)
    pub region: Option<String>,
}

impl StoreSpec {
    /// Parse a store URL like `gs://` or `file:///path`.
    pub fn parse(spec: &str) -> StoreResult<Self> {
        if let Some(scheme) = spec.strip_suffix("://") {
            if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(StoreError::InvalidSpec {
                    spec: spec.to_string(),
                    reason: "missing scheme".to_string(),
                });
            }
            return Ok(Self {
                scheme: scheme.to_ascii_lowercase(),
                root: None,
                region: None,
            });
        }

        let url = url::Url::parse(spec).map_err(|e| StoreError::InvalidSpec {
            spec: spec.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = url.scheme().to_string();
        let root = match url.path() {
            "" | "/" => None,
            path => Some(path.to_string()),
        };

        // Extract region from query params if present
        let region = url
            .query_pairs()
            .find(|(k, _)| k == "region")
            .map(|(_, v)| v.to_string());

        Ok(Self {
            scheme,
            root,
            region,
        })
    }
}

/// How far below the prefix a listing reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Immediate children of the prefix's directory (one path level).
    Children,
    /// Every object whose key starts with the prefix.
    Recursive,
}

/// One key returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Key relative to the bucket. Directory entries end with `/`.
    pub key: String,
    /// Object creation time; `None` for directory entries.
    pub created: Option<DateTime<Utc>>,
}

impl ListEntry {
    pub fn object(key: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            created: Some(created),
        }
    }

    pub fn directory(key: impl Into<String>) -> Self {
        let mut key = key.into();
        if !key.ends_with('/') {
            key.push('/');
        }
        Self { key, created: None }
    }

    pub fn is_directory(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// The storage collaborator used by the resolver, the pipeline and the
/// report emitter.
///
/// Implementations own retries and per-call deadlines; callers see either a
/// result or the error that survived the retry budget.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// List keys in `bucket` that start with `prefix`.
    ///
    /// An empty result is not an error.
    async fn list(&self, bucket: &str, prefix: &str, scope: ListScope)
        -> StoreResult<Vec<ListEntry>>;

    /// Download an object's content.
    ///
    /// # Returns
    ///
    /// - `Err(StoreError::NotFound)` if the object doesn't exist
    async fn get(&self, bucket: &str, key: &str) -> StoreResult<Bytes>;

    /// Write an object in one call, replacing any previous content.
    async fn put(&self, bucket: &str, key: &str, bytes: Bytes, content_type: &str)
        -> StoreResult<()>;
}
