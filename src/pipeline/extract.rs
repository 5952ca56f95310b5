//! Text extraction: PDF bytes → page text in page order, via lopdf.
//!
//! Parsing is CPU-bound, so it runs inside `tokio::task::spawn_blocking`
//! to keep the async workers free for the LLM calls that follow.
//!
//! Extraction results can be memoized in an [`ExtractionCache`] keyed by the
//! SHA-256 of the document bytes: re-running the pipeline on the same upload
//! (a different voice, a different chunk size) skips re-parsing.

use crate::error::{ExtractionError, Pdf2AudioError};
use crate::output::DocumentMetadata;
use crate::pipeline::input::Document;
use lopdf::Object;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Concatenated page text of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// Page texts joined with `\n`, in page order.
    pub text: String,
    pub page_count: usize,
    /// Hex SHA-256 of the source bytes.
    pub digest: String,
}

impl ExtractedText {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Memoizes [`ExtractedText`] by document content.
///
/// Share one cache across runs through `Arc`; entries live as long as the
/// cache does.
#[derive(Debug, Default)]
pub struct ExtractionCache {
    entries: Mutex<HashMap<String, Arc<ExtractedText>>>,
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, digest: &str) -> Option<Arc<ExtractedText>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(digest)
            .cloned()
    }

    pub fn insert(&self, text: Arc<ExtractedText>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(text.digest.clone(), text);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Hex SHA-256 of `bytes`, used as the memoization key.
pub fn content_digest(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    hash.iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Extract all page text, consulting `cache` first.
///
/// Returns the text and whether it came from the cache.
pub async fn extract_text(
    document: &Document,
    password: Option<&str>,
    cache: Option<&ExtractionCache>,
) -> Result<(Arc<ExtractedText>, bool), Pdf2AudioError> {
    let digest = content_digest(&document.bytes);

    if let Some(hit) = cache.and_then(|c| c.get(&digest)) {
        debug!("Extraction cache hit for {}", document.source_name);
        return Ok((hit, true));
    }

    let bytes = document.bytes.clone();
    let source_name = document.source_name.clone();
    let pwd = password.map(str::to_string);

    let extracted = tokio::task::spawn_blocking(move || {
        extract_blocking(&bytes, &source_name, pwd.as_deref(), digest)
    })
    .await
    .map_err(|e| Pdf2AudioError::Internal(format!("Extraction task panicked: {}", e)))??;

    let extracted = Arc::new(extracted);
    if let Some(c) = cache {
        c.insert(Arc::clone(&extracted));
    }
    Ok((extracted, false))
}

/// Blocking implementation of text extraction.
fn extract_blocking(
    bytes: &[u8],
    source_name: &str,
    password: Option<&str>,
    digest: String,
) -> Result<ExtractedText, ExtractionError> {
    let document = load_pdf(bytes, source_name, password)?;

    let pages = document.get_pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut page_texts = Vec::with_capacity(pages.len());
    for &page_num in pages.keys() {
        // An unreadable page contributes nothing rather than sinking the document.
        let text = match document.extract_text(&[page_num]) {
            Ok(t) => t,
            Err(e) => {
                warn!("Page {}: no extractable text ({})", page_num, e);
                String::new()
            }
        };
        debug!("Page {}: {} chars", page_num, text.len());
        page_texts.push(text.trim_end().to_string());
    }

    Ok(ExtractedText {
        text: page_texts.join("\n"),
        page_count: pages.len(),
        digest,
    })
}

/// Parse and, when needed, decrypt a PDF.
fn load_pdf(
    bytes: &[u8],
    source_name: &str,
    password: Option<&str>,
) -> Result<lopdf::Document, ExtractionError> {
    let mut document =
        lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::Malformed {
            source_name: source_name.to_string(),
            detail: e.to_string(),
        })?;

    if document.is_encrypted() {
        match password {
            Some(pwd) => document
                .decrypt(pwd)
                .map_err(|_| ExtractionError::WrongPassword {
                    source_name: source_name.to_string(),
                })?,
            None => {
                return Err(ExtractionError::PasswordRequired {
                    source_name: source_name.to_string(),
                })
            }
        }
    }

    Ok(document)
}

/// Read document metadata without extracting text.
pub async fn read_metadata(
    document: &Document,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2AudioError> {
    let bytes = document.bytes.clone();
    let source_name = document.source_name.clone();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || -> Result<DocumentMetadata, ExtractionError> {
        let encrypted = lopdf::Document::load_mem(&bytes)
            .map(|d| d.is_encrypted())
            .unwrap_or(false);
        let doc = load_pdf(&bytes, &source_name, pwd.as_deref())?;
        Ok(metadata_of(&doc, encrypted))
    })
    .await
    .map_err(|e| Pdf2AudioError::Internal(format!("Metadata task panicked: {}", e)))?
    .map_err(Pdf2AudioError::from)
}

fn metadata_of(doc: &lopdf::Document, is_encrypted: bool) -> DocumentMetadata {
    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| match obj {
            Object::Reference(id) => doc.get_dictionary(*id).ok(),
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        });

    let field = |key: &[u8]| -> Option<String> {
        let value = info?.get(key).ok()?;
        match value {
            Object::String(raw, _) => {
                let s = decode_pdf_string(raw);
                (!s.trim().is_empty()).then_some(s)
            }
            _ => None,
        }
    };

    DocumentMetadata {
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
        creator: field(b"Creator"),
        producer: field(b"Producer"),
        page_count: doc.get_pages().len(),
        pdf_version: doc.version.clone(),
        is_encrypted,
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, else byte-per-char.
fn decode_pdf_string(raw: &[u8]) -> String {
    if raw.len() >= 2 && raw[0] == 0xFE && raw[1] == 0xFF {
        let units: Vec<u16> = raw[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        raw.iter().map(|&b| b as char).collect()
    }
}
