//! Object storage access for artifacts served through the CDN
//!
//! [`ObjectStorage`] is the seam the transport selector falls back to; the
//! production implementation reads from S3 with `object_store`.

use std::fmt;

use async_trait::async_trait;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tokio::io::AsyncWrite;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::errors::{StorageError, StorageResult};

/// Read access to the bucket holding artifacts
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stream the object stored under `key` into `writer`, returning the
    /// number of bytes written
    ///
    /// `key` is the URL path of the CDN location, percent-encoded and with
    /// its leading slash, e.g. `/key/path`.
    async fn get_object(
        &self,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> StorageResult<u64>;

    /// Bucket name, for logging
    fn bucket(&self) -> &str;
}

/// S3-backed [`ObjectStorage`]
///
/// Credentials come from the standard AWS environment variables.
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a client for `bucket` in `region`
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configure` if the builder rejects the settings
    pub fn new(bucket: &str, region: &str) -> StorageResult<Self> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .build()
            .map_err(|source| StorageError::Configure {
                bucket: bucket.to_string(),
                source,
            })?;

        Ok(Self {
            store,
            bucket: bucket.to_string(),
        })
    }
}

impl fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Storage")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn get_object(
        &self,
        key: &str,
        writer: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> StorageResult<u64> {
        let path = object_path(key)?;
        debug!("Getting s3://{}/{}", self.bucket, path);

        let result = self
            .store
            .get(&path)
            .await
            .map_err(|source| StorageError::Get {
                key: key.to_string(),
                source,
            })?;

        let stream = result
            .into_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let mut reader = StreamReader::new(stream);

        tokio::io::copy(&mut reader, writer)
            .await
            .map_err(|source| StorageError::Stream {
                key: key.to_string(),
                source,
            })
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Decode a CDN URL path into an object path
pub fn object_path(key: &str) -> StorageResult<ObjectPath> {
    ObjectPath::from_url_path(key).map_err(|source| StorageError::InvalidKey {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_strips_leading_slash() {
        assert_eq!(object_path("/key/path").unwrap().as_ref(), "key/path");
    }

    #[test]
    fn test_object_path_decodes_escapes() {
        assert_eq!(
            object_path("/builds/42/my%20file.bin").unwrap().as_ref(),
            "builds/42/my file.bin"
        );
    }

    #[test]
    fn test_object_path_rejects_traversal() {
        assert!(object_path("/a/../b").is_err());
    }

    #[test]
    fn test_s3_storage_configures() {
        let storage = S3Storage::new("artifacts-bucket", "us-east-1").unwrap();
        assert_eq!(storage.bucket(), "artifacts-bucket");
    }
}
