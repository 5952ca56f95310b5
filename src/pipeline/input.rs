//! Input resolution: load a user-supplied path or URL into memory.
//!
//! lopdf parses from a byte slice, so unlike a file-path based renderer there
//! is no need to stage downloads in a temp directory: the bytes are read once,
//! checked for the `%PDF` magic, and handed to extraction. The [`Document`]
//! is dropped as soon as text has been extracted.

use crate::error::Pdf2AudioError;
use std::path::PathBuf;
use tracing::{debug, info};

/// An uploaded PDF: raw bytes plus a name for error messages.
#[derive(Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    /// File path, URL, or `<memory>` for in-memory input.
    pub source_name: String,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("source_name", &self.source_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Document {
    /// Wrap in-memory bytes, validating the PDF magic.
    pub fn from_bytes(
        bytes: Vec<u8>,
        source_name: impl Into<String>,
    ) -> Result<Self, Pdf2AudioError> {
        let source_name = source_name.into();
        check_magic(&bytes, &source_name)?;
        Ok(Self { bytes, source_name })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the input string as a PDF document.
///
/// URLs are downloaded with the given timeout; anything else is treated as a
/// local path.
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<Document, Pdf2AudioError> {
    if input.trim().is_empty() {
        return Err(Pdf2AudioError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(input).await
    }
}

async fn load_local(path_str: &str) -> Result<Document, Pdf2AudioError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => {
            Pdf2AudioError::PermissionDenied { path: path.clone() }
        }
        _ => Pdf2AudioError::FileNotFound { path: path.clone() },
    })?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Document::from_bytes(bytes, path_str)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, Pdf2AudioError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2AudioError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2AudioError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2AudioError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2AudioError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2AudioError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Document::from_bytes(bytes.to_vec(), url)
}

fn check_magic(bytes: &[u8], source_name: &str) -> Result<(), Pdf2AudioError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        return Err(Pdf2AudioError::NotAPdf {
            source_name: source_name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}
