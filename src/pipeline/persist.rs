//! Background persistence: write a transport payload to the images directory.
//!
//! Payloads arrive either inline (base64, sometimes as a `data:` URL) or as
//! a URL the provider hosts for a limited time. Both end up as
//! `<images_dir>/<stem>.<ext>` with the extension chosen from the content.

use crate::pipeline::image::ImagePayload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Why a payload could not be saved. Always non-fatal for the run.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Invalid base64 image data: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Image download from {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes rendered backgrounds under one directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    images_dir: PathBuf,
    client: reqwest::Client,
    download_timeout: Duration,
}

impl ImageStore {
    pub fn new(images_dir: impl Into<PathBuf>, download_timeout: Duration) -> Self {
        Self {
            images_dir: images_dir.into(),
            client: reqwest::Client::new(),
            download_timeout,
        }
    }

    pub fn images_dir(&self) -> &std::path::Path {
        &self.images_dir
    }

    /// Persist `payload` as `<stem>.<ext>` and return the file path.
    pub async fn save(&self, payload: &ImagePayload, stem: &str) -> Result<PathBuf, PersistError> {
        match payload {
            ImagePayload::Base64(data) => self.save_base64(data, stem).await,
            ImagePayload::Url(url) => self.download(url, stem).await,
        }
    }

    /// Decode base64 (an optional `data:...;base64,` prefix is dropped).
    pub async fn save_base64(&self, data: &str, stem: &str) -> Result<PathBuf, PersistError> {
        let encoded = match data.split_once(',') {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => data,
        };
        let bytes = STANDARD.decode(encoded.trim())?;
        let ext = extension_for_bytes(&bytes);
        debug!("Decoded {} bytes of base64 image data ({})", bytes.len(), ext);
        self.write(stem, ext, &bytes).await
    }

    /// Fetch `url` with the download timeout.
    pub async fn download(&self, url: &str, stem: &str) -> Result<PathBuf, PersistError> {
        let fail = |reason: String| PersistError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fail(format!("timed out after {}s", self.download_timeout.as_secs()))
                } else {
                    fail(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;

        self.write(stem, extension_for_content_type(&content_type), &bytes)
            .await
    }

    async fn write(&self, stem: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf, PersistError> {
        tokio::fs::create_dir_all(&self.images_dir)
            .await
            .map_err(|source| PersistError::Write {
                path: self.images_dir.clone(),
                source,
            })?;

        let path = self.images_dir.join(format!("{stem}.{ext}"));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| PersistError::Write {
                path: path.clone(),
                source,
            })?;

        info!("Saved background: {}", path.display());
        Ok(path)
    }
}

/// `jpg` for data starting with the JPEG signature, `png` otherwise.
pub fn extension_for_bytes(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&JPEG_MAGIC) {
        "jpg"
    } else {
        "png"
    }
}

/// `png` when the declared type mentions png, `jpg` otherwise.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    if content_type.to_ascii_lowercase().contains("png") {
        "png"
    } else {
        "jpg"
    }
}
