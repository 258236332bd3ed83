//! S3-compatible object storage uploader (MinIO in the reference deployment).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::uploader::{content_type_for, file_name, ArtifactUploader, UploadOutcome};

/// Configuration for the object store uploader.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region
    pub region: String,
    /// Lifetime of returned links
    pub link_ttl: Duration,
}

impl ObjectStoreConfig {
    pub const DEFAULT_BUCKET: &'static str = "video-clips";
    pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("OBJECT_STORE_ENDPOINT")
                .map_err(|_| StorageError::config_error("OBJECT_STORE_ENDPOINT not set"))?,
            access_key_id: std::env::var("OBJECT_STORE_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("OBJECT_STORE_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("OBJECT_STORE_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("OBJECT_STORE_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("OBJECT_STORE_BUCKET")
                .unwrap_or_else(|_| Self::DEFAULT_BUCKET.to_string()),
            region: std::env::var("OBJECT_STORE_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            link_ttl: std::env::var("OBJECT_STORE_LINK_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Self::DEFAULT_LINK_TTL),
        })
    }
}

/// Uploads artifacts under `<group>/<file name>` and hands out presigned GET links.
#[derive(Clone)]
pub struct ObjectStoreUploader {
    client: Client,
    bucket: String,
    link_ttl: Duration,
}

impl ObjectStoreUploader {
    pub fn new(config: ObjectStoreConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "object-store",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            link_ttl: config.link_ttl,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(ObjectStoreConfig::from_env()?))
    }

    pub fn object_key(group: &str, local_path: &Path) -> String {
        format!("{}/{}", group.trim_matches('/'), file_name(local_path))
    }

    /// Upload a file.
    pub async fn upload_file(&self, path: &Path, key: &str) -> StorageResult<()> {
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type_for(path))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}/{}", path.display(), self.bucket, key);
        Ok(())
    }

    /// Generate a presigned URL for GET.
    pub async fn presign_get(&self, key: &str) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(self.link_ttl)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}

#[async_trait]
impl ArtifactUploader for ObjectStoreUploader {
    fn name(&self) -> &'static str {
        "object_store"
    }

    async fn upload(&self, group: &str, local_path: &Path) -> StorageResult<UploadOutcome> {
        if !tokio::fs::try_exists(local_path).await.unwrap_or(false) {
            warn!("Artifact {} not found, skipping object upload", local_path.display());
            return Ok(UploadOutcome::NotFound);
        }

        let key = Self::object_key(group, local_path);
        self.upload_file(local_path, &key).await?;
        let url = self.presign_get(&key).await?;
        Ok(UploadOutcome::Uploaded(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploader() -> ObjectStoreUploader {
        ObjectStoreUploader::new(ObjectStoreConfig {
            endpoint_url: "http://localhost:9000".to_string(),
            access_key_id: "minio".to_string(),
            secret_access_key: "minio-secret".to_string(),
            bucket_name: ObjectStoreConfig::DEFAULT_BUCKET.to_string(),
            region: "us-east-1".to_string(),
            link_ttl: ObjectStoreConfig::DEFAULT_LINK_TTL,
        })
    }

    #[test]
    fn test_object_key() {
        assert_eq!(
            ObjectStoreUploader::object_key("vid-1/", Path::new("/tmp/work/vid-1-00:00:01-00:00:12.mp4")),
            "vid-1/vid-1-00:00:01-00:00:12.mp4"
        );
    }

    #[tokio::test]
    async fn test_presign_is_path_style_with_ttl() {
        let url = uploader().presign_get("vid-1/clip.mp4").await.unwrap();
        assert!(url.starts_with("http://localhost:9000/video-clips/vid-1/clip.mp4?"));
        assert!(url.contains("X-Amz-Expires=86400"));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = uploader()
            .upload("vid-1", &dir.path().join("missing.mp4"))
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::NotFound);
    }
}
