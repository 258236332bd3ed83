//! Source video download over HTTP.

use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Downloads source videos into the work directory.
#[derive(Debug, Clone)]
pub struct SourceDownloader {
    http: reqwest::Client,
}

impl SourceDownloader {
    /// Create a downloader whose requests fail after `timeout`.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// A partial file is removed when the transfer fails.
    pub async fn download(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        info!("Downloading source {} -> {}", url, dest.display());

        let result = self.stream_to_file(url, dest).await;
        if result.is_err() {
            let _ = fs::remove_file(dest).await;
        }
        result
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::download_failed(format!("GET {} returned {}", url, status)));
        }

        let mut stream = response.bytes_stream();
        let mut file = fs::File::create(dest).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let data = chunk?;
            file.write_all(&data).await?;
            written += data.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(MediaError::download_failed(format!("{} returned an empty body", url)));
        }

        debug!("Downloaded {} bytes to {}", written, dest.display());
        Ok(written)
    }
}

/// Stream `url` into `dest` with a one hour transfer limit.
pub async fn download_source(url: &str, dest: impl AsRef<Path>) -> MediaResult<u64> {
    SourceDownloader::new(Duration::from_secs(3600))?
        .download(url, dest.as_ref())
        .await
}
