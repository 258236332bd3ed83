//! Google Drive uploader (Drive v3 REST).
//!
//! Each video gets a folder named after its id under the configured parent
//! folder. Files are sent with a resumable upload session and the returned
//! `webViewLink` is what reviewers open.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::token_cache::{AccessTokenSource, TokenCache};
use crate::uploader::{content_type_for, file_name, ArtifactUploader, UploadOutcome};

pub const DEFAULT_DRIVE_API_URL: &str = "https://www.googleapis.com";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Drive uploader configuration.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Parent folder all video folders are created in
    pub parent_folder_id: String,
    /// API base, overridable for tests
    pub api_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl DriveConfig {
    pub fn new(parent_folder_id: impl Into<String>) -> Self {
        Self {
            parent_folder_id: parent_folder_id.into(),
            api_url: DEFAULT_DRIVE_API_URL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let folder = std::env::var("DRIVE_FOLDER_ID")
            .map_err(|_| StorageError::config_error("DRIVE_FOLDER_ID not set"))?;
        Ok(Self::new(folder))
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

/// Uploads artifacts into per-video Drive folders.
pub struct DriveUploader {
    http: Client,
    config: DriveConfig,
    tokens: Arc<dyn AccessTokenSource>,
    /// group name -> folder id
    folders: Mutex<HashMap<String, String>>,
}

impl DriveUploader {
    pub fn new(config: DriveConfig, tokens: Arc<dyn AccessTokenSource>) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("clipqa-storage/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config,
            tokens,
            folders: Mutex::new(HashMap::new()),
        })
    }

    /// Service account and parent folder from the environment.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(DriveConfig::from_env()?, Arc::new(TokenCache::drive_from_env()?))
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.config.api_url)
    }

    /// Folder id for `name` under the parent folder, creating it when absent.
    pub async fn folder_for(&self, name: &str) -> StorageResult<String> {
        let mut folders = self.folders.lock().await;
        if let Some(id) = folders.get(name) {
            return Ok(id.clone());
        }

        let id = match self.find_folder(name).await? {
            Some(id) => id,
            None => self.create_folder(name).await?,
        };
        folders.insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn find_folder(&self, name: &str) -> StorageResult<Option<String>> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and '{}' in parents and trashed = false",
            escape_query(name),
            FOLDER_MIME_TYPE,
            escape_query(&self.config.parent_folder_id)
        );

        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(self.files_url())
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;

        let list: FileList = check_status(response).await?.json().await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(&self, name: &str) -> StorageResult<String> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(self.files_url())
            .bearer_auth(token)
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [self.config.parent_folder_id],
            }))
            .send()
            .await?;

        let folder: DriveFile = check_status(response).await?.json().await?;
        info!(folder = %name, id = %folder.id, "Created Drive folder");
        Ok(folder.id)
    }

    /// Upload `local_path` into `folder_id`, returning the view link.
    pub async fn upload_to_folder(&self, folder_id: &str, local_path: &Path) -> StorageResult<String> {
        let name = file_name(local_path);
        let content_type = content_type_for(local_path);
        let bytes = tokio::fs::read(local_path).await?;
        let token = self.tokens.access_token().await?;

        let session = self
            .http
            .post(format!("{}/upload/drive/v3/files", self.config.api_url))
            .bearer_auth(&token)
            .query(&[
                ("uploadType", "resumable"),
                ("fields", "id,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", bytes.len().to_string())
            .json(&json!({ "name": name, "parents": [folder_id] }))
            .send()
            .await?;

        let session = check_status(session).await?;
        let location = session
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StorageError::InvalidResponse("upload session has no Location".into()))?
            .to_string();

        debug!("Uploading {} ({} bytes) to Drive", name, bytes.len());

        let response = self
            .http
            .put(location)
            .bearer_auth(&token)
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let file: DriveFile = check_status(response).await?.json().await?;
        let link = file
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", file.id));

        info!("Uploaded {} to Drive as {}", name, file.id);
        Ok(link)
    }
}

#[async_trait]
impl ArtifactUploader for DriveUploader {
    fn name(&self) -> &'static str {
        "drive"
    }

    async fn upload(&self, group: &str, local_path: &Path) -> StorageResult<UploadOutcome> {
        if !tokio::fs::try_exists(local_path).await.unwrap_or(false) {
            warn!("Artifact {} not found, skipping Drive upload", local_path.display());
            return Ok(UploadOutcome::NotFound);
        }

        let folder_id = self.folder_for(group).await?;
        let link = self.upload_to_folder(&folder_id, local_path).await?;
        Ok(UploadOutcome::Uploaded(link))
    }
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

async fn check_status(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Http {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_cache::StaticToken;
    use wiremock::matchers::{header as has_header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn uploader_for(server: &MockServer) -> DriveUploader {
        let mut config = DriveConfig::new("parent-1");
        config.api_url = server.uri();
        DriveUploader::new(config, Arc::new(StaticToken("tok".into()))).unwrap()
    }

    async fn mount_upload(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .and(query_param("uploadType", "resumable"))
            .and(has_header("authorization", "Bearer tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Location", format!("{}/session/abc", server.uri()).as_str()),
            )
            .mount(server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/session/abc"))
            .and(has_header("content-type", "video/mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "file-9",
                "webViewLink": "https://drive.google.com/file/d/file-9/view"
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("it's"), "it\\'s");
    }

    #[tokio::test]
    async fn test_upload_reuses_existing_folder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [ { "id": "folder-7" } ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "unused" })))
            .expect(0)
            .mount(&server)
            .await;
        mount_upload(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"mp4 bytes").unwrap();

        let uploader = uploader_for(&server);
        let outcome = uploader.upload("vid-1", &file).await.unwrap();
        assert_eq!(
            outcome,
            UploadOutcome::Uploaded("https://drive.google.com/file/d/file-9/view".into())
        );
        // cached, no second lookup
        assert_eq!(uploader.folder_for("vid-1").await.unwrap(), "folder-7");
    }

    #[tokio::test]
    async fn test_creates_missing_folder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "folder-new" })))
            .expect(1)
            .mount(&server)
            .await;

        let uploader = uploader_for(&server);
        assert_eq!(uploader.folder_for("vid-2").await.unwrap(), "folder-new");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let outcome = uploader_for(&server)
            .upload("vid-1", &dir.path().join("gone.mp4"))
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_api_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("insufficient permissions"))
            .mount(&server)
            .await;

        let err = uploader_for(&server).folder_for("vid-3").await.unwrap_err();
        assert!(matches!(err, StorageError::Http { status: 403, .. }));
    }
}
