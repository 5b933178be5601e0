//! Artifact bucket provisioning on the object store.
//!
//! The tracking server writes artifacts into a single bucket. The bucket must
//! exist before the server is pointed at the store, so the operator creates it
//! whenever object-storage relation data arrives.

use std::collections::BTreeSet;

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::relations::{ObjectStorageRelation, TlsVerification};

/// Region reported to S3-compatible stores that do not use regions.
const DEFAULT_REGION: &str = "us-east-1";

/// Makes sure a bucket exists on the store described by relation data.
#[async_trait]
pub trait BucketProvisioner: Send + Sync {
    /// Create `bucket` unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BucketUnavailable`] when the store cannot be reached
    /// or refuses the request.
    async fn ensure_bucket(&self, store: &ObjectStorageRelation, bucket: &str) -> Result<()>;
}

/// Provisioner talking to an S3-compatible API such as MinIO.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3BucketProvisioner;

impl S3BucketProvisioner {
    pub const fn new() -> Self {
        Self
    }

    fn endpoint_url(store: &ObjectStorageRelation) -> String {
        let scheme = match store.tls {
            TlsVerification::Verify => "https",
            TlsVerification::Skip => "http",
        };
        format!("{scheme}://{}", store.endpoint())
    }
}

#[async_trait]
impl BucketProvisioner for S3BucketProvisioner {
    async fn ensure_bucket(&self, store: &ObjectStorageRelation, bucket: &str) -> Result<()> {
        let unavailable = |reason: String| Error::bucket_unavailable(bucket, reason);

        let region = Region::Custom {
            region: DEFAULT_REGION.to_string(),
            endpoint: Self::endpoint_url(store),
        };
        let credentials = Credentials::new(
            Some(store.access_key.as_str()),
            Some(store.secret_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|e| unavailable(e.to_string()))?;

        let handle = Bucket::new(bucket, region.clone(), credentials.clone())
            .map_err(|e| unavailable(e.to_string()))?
            .with_path_style();

        if handle.exists().await.map_err(|e| unavailable(e.to_string()))? {
            debug!(bucket, endpoint = %store.endpoint(), "Bucket already exists");
            return Ok(());
        }

        let response = Bucket::create_with_path_style(
            bucket,
            region,
            credentials,
            BucketConfiguration::default(),
        )
        .await
        .map_err(|e| unavailable(e.to_string()))?;

        if !response.success() {
            return Err(unavailable(format!(
                "create returned {}: {}",
                response.response_code, response.response_text
            )));
        }

        info!(bucket, endpoint = %store.endpoint(), "Bucket created");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inner {
    buckets: BTreeSet<(String, String)>,
    creates: usize,
    unreachable: bool,
}

/// In-memory object store for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryBuckets {
    inner: Mutex<Inner>,
}

impl InMemoryBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request fail as if the store were down.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().await.unreachable = unreachable;
    }

    /// Whether `bucket` exists on the store at `endpoint`.
    pub async fn contains(&self, endpoint: &str, bucket: &str) -> bool {
        self.inner
            .lock()
            .await
            .buckets
            .contains(&(endpoint.to_string(), bucket.to_string()))
    }

    /// Number of buckets actually created, not counting ones that existed.
    pub async fn create_count(&self) -> usize {
        self.inner.lock().await.creates
    }
}

#[async_trait]
impl BucketProvisioner for InMemoryBuckets {
    async fn ensure_bucket(&self, store: &ObjectStorageRelation, bucket: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.unreachable {
            return Err(Error::bucket_unavailable(
                bucket,
                format!("connection to {} refused", store.endpoint()),
            ));
        }

        if inner.buckets.insert((store.endpoint(), bucket.to_string())) {
            inner.creates = inner.creates.saturating_add(1);
        }
        Ok(())
    }
}
