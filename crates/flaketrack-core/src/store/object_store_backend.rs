//! Object store implementation of ArtifactStore.
//!
//! Supports GCS, S3, local filesystem and memory via the `object_store` crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{
    Attribute, Attributes, ObjectMeta, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
};
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};

use super::{
    ArtifactStore, ListEntry, ListScope, RetryPolicy, StoreError, StoreResult, StoreSpec,
};

/// Where a bucket's objects live.
enum Layout {
    /// A single store holding every bucket as its first path component
    /// (memory, file).
    Shared(Arc<dyn ObjectStore>),
    /// One client per bucket (gs, s3), built up front so credential
    /// problems surface before any run starts.
    PerBucket(HashMap<String, Arc<dyn ObjectStore>>),
}

/// Artifact store backed by `object_store`.
///
/// Supports:
/// - Google Cloud Storage
/// - S3 and S3-compatible (MinIO, R2)
/// - Local filesystem
/// - In-memory (for testing)
pub struct ObjectStoreArtifactStore {
    layout: Layout,
    retry: RetryPolicy,
    /// Whether the backend accepts object attributes (content type).
    /// We attempt attributed writes first, and fall back if unsupported.
    attributes_supported: bool,
}

impl ObjectStoreArtifactStore {
    /// Create a store from a parsed spec. `buckets` lists every bucket the
    /// caller will touch; cloud schemes build one client per bucket.
    pub fn from_spec(
        spec: &StoreSpec,
        buckets: &[String],
        retry: RetryPolicy,
    ) -> StoreResult<Self> {
        let (layout, attributes_supported) = match spec.scheme.as_str() {
            "memory" => (
                Layout::Shared(Arc::new(object_store::memory::InMemory::new())),
                true,
            ),
            "file" => {
                let path = spec
                    .root
                    .clone()
                    .unwrap_or_else(|| "/tmp/flaketrack-store".to_string());
                // Ensure directory exists
                std::fs::create_dir_all(&path).map_err(|e| StoreError::Io {
                    message: format!("failed to create store directory {}: {}", path, e),
                })?;
                let store =
                    object_store::local::LocalFileSystem::new_with_prefix(&path).map_err(|e| {
                        StoreError::NotConfigured {
                            message: format!("failed to create local store at {}: {}", path, e),
                        }
                    })?;
                (Layout::Shared(Arc::new(store)), false)
            }
            "gs" | "s3" => {
                let mut clients = HashMap::new();
                for bucket in buckets {
                    validate_bucket(bucket)?;
                    if !clients.contains_key(bucket) {
                        clients.insert(bucket.clone(), build_client(spec, bucket)?);
                    }
                }
                (Layout::PerBucket(clients), true)
            }
            scheme => {
                return Err(StoreError::InvalidSpec {
                    spec: spec.scheme.clone(),
                    reason: format!("unsupported scheme: {}", scheme),
                })
            }
        };

        Ok(Self {
            layout,
            retry,
            attributes_supported,
        })
    }

    /// Create a store from a URL string.
    pub fn from_url(url: &str, buckets: &[String], retry: RetryPolicy) -> StoreResult<Self> {
        let spec = StoreSpec::parse(url)?;
        Self::from_spec(&spec, buckets, retry)
    }

    /// Create an in-memory store for testing.
    pub fn memory() -> Self {
        Self {
            layout: Layout::Shared(Arc::new(object_store::memory::InMemory::new())),
            retry: RetryPolicy::none(),
            attributes_supported: true,
        }
    }

    /// The store holding `bucket` and the key root inside it.
    fn locate(&self, bucket: &str) -> StoreResult<(Arc<dyn ObjectStore>, String)> {
        validate_bucket(bucket)?;
        match &self.layout {
            Layout::Shared(store) => Ok((store.clone(), format!("{bucket}/"))),
            Layout::PerBucket(clients) => clients
                .get(bucket)
                .map(|store| (store.clone(), String::new()))
                .ok_or_else(|| StoreError::NotConfigured {
                    message: format!("no client configured for bucket '{bucket}'"),
                }),
        }
    }

    async fn list_once(
        &self,
        bucket: &str,
        prefix: &str,
        scope: ListScope,
    ) -> StoreResult<Vec<ListEntry>> {
        let (store, root) = self.locate(bucket)?;
        let full = format!("{root}{prefix}");
        // object_store lists by path segment; list the enclosing directory
        // and apply the string prefix ourselves, on decoded keys.
        let dir = full.rfind('/').map(|i| &full[..i]).unwrap_or("");
        let dir_path = (!dir.is_empty()).then(|| Path::from(dir));

        let mut entries = Vec::new();
        match scope {
            ListScope::Recursive => {
                let metas: Vec<ObjectMeta> =
                    match store.list(dir_path.as_ref()).try_collect().await {
                        Ok(metas) => metas,
                        // A missing directory is an empty listing.
                        Err(object_store::Error::NotFound { .. }) => Vec::new(),
                        Err(e) => return Err(StoreError::from_object_store(e, &full)),
                    };
                for meta in metas {
                    let key = raw_key(&meta.location);
                    if key.starts_with(&full) {
                        entries.push(ListEntry::object(relative(&root, &key), meta.last_modified));
                    }
                }
            }
            ListScope::Children => {
                let result = match store.list_with_delimiter(dir_path.as_ref()).await {
                    Ok(result) => result,
                    Err(object_store::Error::NotFound { .. }) => return Ok(Vec::new()),
                    Err(e) => return Err(StoreError::from_object_store(e, &full)),
                };
                for dir in result.common_prefixes {
                    let key = format!("{}/", raw_key(&dir));
                    if key.starts_with(&full) {
                        entries.push(ListEntry::directory(relative(&root, &key)));
                    }
                }
                for meta in result.objects {
                    let key = raw_key(&meta.location);
                    if key.starts_with(&full) {
                        entries.push(ListEntry::object(relative(&root, &key), meta.last_modified));
                    }
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(bucket, prefix, ?scope, found = entries.len(), "listed prefix");
        Ok(entries)
    }

    async fn get_once(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let (store, root) = self.locate(bucket)?;
        let path = Path::from(format!("{root}{key}"));

        let result = store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                key: format!("{bucket}/{key}"),
            },
            other => StoreError::from_object_store(other, key),
        })?;

        result.bytes().await.map_err(|e| StoreError::Io {
            message: format!("failed to read {bucket}/{key}: {}", e),
        })
    }

    async fn put_once(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StoreResult<()> {
        let (store, root) = self.locate(bucket)?;
        let path = Path::from(format!("{root}{key}"));

        if self.attributes_supported {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            let opts = PutOptions {
                attributes,
                ..Default::default()
            };

            match store
                .put_opts(&path, PutPayload::from_bytes(bytes.clone()), opts)
                .await
            {
                Ok(_) => return Ok(()),
                Err(
                    object_store::Error::NotSupported { .. }
                    | object_store::Error::NotImplemented { .. },
                ) => {
                    warn!(
                        bucket,
                        key,
                        "object attributes not supported by backend, writing without content type"
                    );
                }
                Err(e) => return Err(StoreError::from_object_store(e, key)),
            }
        }

        store
            .put(&path, PutPayload::from_bytes(bytes))
            .await
            .map_err(|e| StoreError::from_object_store(e, key))?;

        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for ObjectStoreArtifactStore {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        scope: ListScope,
    ) -> StoreResult<Vec<ListEntry>> {
        self.retry
            .run("list", || self.list_once(bucket, prefix, scope))
            .await
    }

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        self.retry.run("get", || self.get_once(bucket, key)).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StoreResult<()> {
        self.retry
            .run("put", || self.put_once(bucket, key, bytes.clone(), content_type))
            .await
    }
}

fn build_client(spec: &StoreSpec, bucket: &str) -> StoreResult<Arc<dyn ObjectStore>> {
    match spec.scheme.as_str() {
        "gs" => {
            let store = object_store::gcp::GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(bucket)
                .build()
                .map_err(|e| StoreError::NotConfigured {
                    message: format!("failed to create GCS client for '{}': {}", bucket, e),
                })?;
            Ok(Arc::new(store))
        }
        "s3" => {
            let mut builder = object_store::aws::AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .with_allow_http(false);

            if let Some(region) = &spec.region {
                builder = builder.with_region(region);
            }

            Ok(Arc::new(builder.build().map_err(|e| {
                StoreError::NotConfigured {
                    message: format!("failed to create S3 client for '{}': {}", bucket, e),
                }
            })?))
        }
        scheme => Err(StoreError::InvalidSpec {
            spec: scheme.to_string(),
            reason: format!("unsupported scheme: {}", scheme),
        }),
    }
}

fn validate_bucket(bucket: &str) -> StoreResult<()> {
    if bucket.is_empty() || bucket.contains('/') {
        return Err(StoreError::InvalidSpec {
            spec: bucket.to_string(),
            reason: "bucket name must be a single non-empty path component".to_string(),
        });
    }
    Ok(())
}

/// The key as it was written. `Path` percent-encodes characters such as
/// `#`, `[` or `%` in each part.
fn raw_key(location: &Path) -> String {
    location
        .parts()
        .map(|part| percent_decode_str(part.as_ref()).decode_utf8_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn relative(root: &str, key: &str) -> String {
    key.strip_prefix(root).unwrap_or(key).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> ObjectStoreArtifactStore {
        let store = ObjectStoreArtifactStore::memory();
        for key in [
            "logs/ci-master/1/artifacts/junit.xml",
            "logs/ci-master/2/artifacts/junit.xml",
            "logs/ci-release/1/artifacts/junit.xml",
            "logs/README",
            "other/file.txt",
        ] {
            store
                .put("bucket", key, Bytes::from("x"), "text/plain")
                .await
                .expect("put failed");
        }
        store
    }

    fn keys(entries: &[ListEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_children_listing_returns_directories_and_objects() {
        let store = seeded().await;
        let entries = store
            .list("bucket", "logs/", ListScope::Children)
            .await
            .unwrap();
        assert_eq!(
            keys(&entries),
            vec!["logs/README", "logs/ci-master/", "logs/ci-release/"]
        );
        assert!(entries[1].created.is_none());
        assert!(entries[0].created.is_some());
    }

    #[tokio::test]
    async fn test_children_listing_applies_string_prefix() {
        let store = seeded().await;
        let entries = store
            .list("bucket", "logs/ci-m", ListScope::Children)
            .await
            .unwrap();
        assert_eq!(keys(&entries), vec!["logs/ci-master/"]);
    }

    #[tokio::test]
    async fn test_recursive_listing() {
        let store = seeded().await;
        let entries = store
            .list("bucket", "logs/ci-master/", ListScope::Recursive)
            .await
            .unwrap();
        assert_eq!(
            keys(&entries),
            vec![
                "logs/ci-master/1/artifacts/junit.xml",
                "logs/ci-master/2/artifacts/junit.xml"
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_an_error() {
        let store = seeded().await;
        let entries = store
            .list("bucket", "nothing/here/", ListScope::Children)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let store = seeded().await;
        let entries = store
            .list("elsewhere", "logs/", ListScope::Recursive)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_get_roundtrip_and_not_found() {
        let store = seeded().await;
        let bytes = store.get("bucket", "logs/README").await.unwrap();
        assert_eq!(bytes, Bytes::from("x"));

        let missing = store.get("bucket", "logs/missing.xml").await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = ObjectStoreArtifactStore::memory();
        store
            .put("out", "r.xml", Bytes::from("one"), "text/xml")
            .await
            .unwrap();
        store
            .put("out", "r.xml", Bytes::from("two"), "text/xml")
            .await
            .unwrap();
        assert_eq!(store.get("out", "r.xml").await.unwrap(), Bytes::from("two"));
    }

    #[tokio::test]
    async fn test_rejects_bad_bucket() {
        let store = ObjectStoreArtifactStore::memory();
        let result = store.list("a/b", "x", ListScope::Recursive).await;
        assert!(matches!(result, Err(StoreError::InvalidSpec { .. })));
    }

    #[test]
    fn test_unsupported_scheme() {
        let spec = StoreSpec::parse("ftp://host/path").unwrap();
        let result = ObjectStoreArtifactStore::from_spec(&spec, &[], RetryPolicy::none());
        assert!(matches!(result, Err(StoreError::InvalidSpec { .. })));
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().display());
        let store = ObjectStoreArtifactStore::from_url(&url, &[], RetryPolicy::none()).unwrap();

        store
            .put("bucket", "logs/a/junit.xml", Bytes::from("<x/>"), "text/xml")
            .await
            .unwrap();
        let entries = store
            .list("bucket", "logs/", ListScope::Children)
            .await
            .unwrap();
        assert_eq!(keys(&entries), vec!["logs/a/"]);
        assert!(dir.path().join("bucket/logs/a/junit.xml").exists());
    }

    #[tokio::test]
    async fn test_keys_with_encoded_characters_list_and_fetch_as_written() {
        let store = ObjectStoreArtifactStore::memory();
        let written = [
            "logs/ci-master/run 3/artifacts/junit.xml",
            "logs/ci-master/run#1/artifacts/junit.xml",
            "logs/ci-master/run[2]/artifacts/junit.xml",
        ];
        for key in written {
            store
                .put("bucket", key, Bytes::from(key), "text/xml")
                .await
                .unwrap();
        }

        let children = store
            .list("bucket", "logs/ci-master/run", ListScope::Children)
            .await
            .unwrap();
        assert_eq!(
            keys(&children),
            vec![
                "logs/ci-master/run 3/",
                "logs/ci-master/run#1/",
                "logs/ci-master/run[2]/"
            ]
        );

        let objects = store
            .list("bucket", "logs/ci-master/run#", ListScope::Recursive)
            .await
            .unwrap();
        assert_eq!(keys(&objects), vec!["logs/ci-master/run#1/artifacts/junit.xml"]);

        for entry in store
            .list("bucket", "logs/", ListScope::Recursive)
            .await
            .unwrap()
        {
            let body = store.get("bucket", &entry.key).await.unwrap();
            assert_eq!(body, Bytes::from(entry.key.clone()));
        }
    }

    #[tokio::test]
    async fn test_put_falls_back_when_backend_rejects_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let local = object_store::local::LocalFileSystem::new_with_prefix(dir.path()).unwrap();
        // The local backend refuses attributed writes.
        let store = ObjectStoreArtifactStore {
            layout: Layout::Shared(Arc::new(local)),
            retry: RetryPolicy::none(),
            attributes_supported: true,
        };

        store
            .put("out", "reports/r.xml", Bytes::from("<r/>"), "text/xml")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("out/reports/r.xml")).unwrap(),
            b"<r/>"
        );
    }
}
