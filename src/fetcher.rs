//! Archive downloads over HTTP
//!
//! [`FileFetcher`] issues a GET for a resolved download, checks that the
//! server answered with an archive, and streams the body to disk. Every
//! outcome is reported as a [`DownloadResult`]; nothing here returns an error
//! to the poll loop.

use crate::config::{FetchConfig, FileCollisionAction};
use crate::error::{Error, ErrorCategory, Result};
use crate::types::DownloadResult;
use crate::utils::{filename_from_response, get_unique_path, sanitize_filename};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Size of the slices written to disk
const CHUNK_SIZE: usize = 8192;

/// Most bytes of an error response kept for diagnostics
const ERROR_BODY_LIMIT: usize = 4096;

/// Suffix for files that are still being written
const PARTIAL_SUFFIX: &str = ".part";

/// Downloads archives into a directory
#[derive(Debug, Clone)]
pub struct FileFetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
    expected_content_type: String,
    file_collision: FileCollisionAction,
}

impl FileFetcher {
    /// Create a fetcher from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("inbox-dl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            download_dir: config.download_dir.clone(),
            expected_content_type: config.expected_content_type.to_ascii_lowercase(),
            file_collision: config.file_collision,
        })
    }

    /// Download `url`, naming the file `filename` when given
    ///
    /// Without a filename, the name comes from `Content-Disposition`, then the
    /// URL path, then `download.zip`. A response that is not 200 or whose
    /// content-type does not match leaves nothing on disk.
    pub async fn fetch(&self, url: &str, filename: Option<&str>) -> DownloadResult {
        let result = match self.try_fetch(url, filename).await {
            Ok(result) => result,
            Err(e) => DownloadResult::Failed {
                status: None,
                message: e.to_string(),
            },
        };

        match &result {
            DownloadResult::Succeeded { path, bytes } => {
                info!(url = %url, path = %path.display(), bytes, "Download complete");
            }
            DownloadResult::Rejected { content_type } => {
                warn!(
                    url = %url,
                    content_type = content_type.as_deref().unwrap_or("<none>"),
                    expected = %self.expected_content_type,
                    category = ErrorCategory::ContentTypeMismatch.as_str(),
                    "Response is not an archive, nothing written"
                );
            }
            DownloadResult::Skipped { path } => {
                info!(url = %url, path = %path.display(), "File already exists, skipping download");
            }
            DownloadResult::Failed { status, message } => {
                warn!(url = %url, status = ?status, error = %message, category = ErrorCategory::TransferError.as_str(), "Download failed");
            }
        }
        result
    }

    async fn try_fetch(&self, url: &str, filename: Option<&str>) -> Result<DownloadResult> {
        debug!(url = %url, "Requesting download");
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = read_error_body(&mut response).await;
            return Ok(DownloadResult::Failed {
                status: Some(status.as_u16()),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let matches = content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains(&self.expected_content_type));
        if !matches {
            return Ok(DownloadResult::Rejected { content_type });
        }

        let name = filename
            .and_then(sanitize_filename)
            .unwrap_or_else(|| filename_from_response(response.headers(), url));
        let desired = self.download_dir.join(&name);
        let Some(target) = get_unique_path(&desired, self.file_collision)? else {
            return Ok(DownloadResult::Skipped { path: desired });
        };

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let partial = partial_path(&target);
        match write_body(&mut response, &partial, &target).await {
            Ok(bytes) => Ok(DownloadResult::Succeeded {
                path: target,
                bytes,
            }),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await
                    && cleanup.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial download");
                }
                Err(e)
            }
        }
    }
}

/// Stream the body into `partial`, then move it to `target`
async fn write_body(response: &mut reqwest::Response, partial: &Path, target: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(partial).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = response.chunk().await? {
        for piece in chunk.chunks(CHUNK_SIZE) {
            file.write_all(piece).await?;
        }
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(partial, target).await?;
    Ok(written)
}

/// First [`ERROR_BODY_LIMIT`] bytes of a response, lossily decoded
async fn read_error_body(response: &mut reqwest::Response) -> String {
    let mut body = Vec::new();
    while body.len() < ERROR_BODY_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }
    body.truncate(ERROR_BODY_LIMIT);
    String::from_utf8_lossy(&body).into_owned()
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
