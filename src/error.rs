//! Error types for the edgequake-pdf2audio library.
//!
//! Errors are grouped by the pipeline stage that raises them:
//!
//! * [`ConfigurationError`]: credentials or builder settings are unusable.
//!   Always fatal, and always raised before the input document is read.
//! * [`ExtractionError`]: the PDF could not be parsed. Fatal: there is no
//!   partial text to work from.
//! * [`SummarizationError`]: a single chunk failed at the LLM. Whether this
//!   aborts the job depends on [`crate::config::SummaryFailurePolicy`]; under
//!   the placeholder policy it is stored inside
//!   [`crate::output::ChunkSummary`] instead of being propagated.
//! * [`SynthesisError`]: the speech backend failed. Fatal: half an audio
//!   file is not useful.
//!
//! [`Pdf2AudioError`] is what the top-level `convert*` functions return; it
//! wraps the four categories plus input and output I/O failures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2audio library.
#[derive(Debug, Error)]
pub enum Pdf2AudioError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input was read, but is not a PDF.
    #[error("Input is not a valid PDF: '{source_name}'\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    // ── Stage errors ──────────────────────────────────────────────────────
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// A chunk failed and the failure policy is `Abort`, or the failure is
    /// one no placeholder can paper over (bad credentials).
    #[error(transparent)]
    Summarization(#[from] SummarizationError),

    /// Every chunk failed; the summary would be nothing but placeholders.
    #[error("All {total} chunks failed to summarize.\nFirst error: {first_error}")]
    AllChunksFailed { total: usize, first_error: String },

    /// The document contained no extractable text.
    #[error("No extractable text found in '{source_name}' (scanned or image-only PDF?)")]
    NoText { source_name: String },

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The zip archive could not be assembled.
    #[error("Failed to build archive '{path}': {detail}")]
    Archive { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Credentials or settings are unusable. Raised before any input is read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Neither an API key, a named provider, nor a pre-built backend was set.
    #[error(
        "No summarization credentials configured.\n\
Set GOOGLE_API_KEY (or pass --api-key), or choose a provider with --provider."
    )]
    MissingCredentials,

    /// The API key is blank or malformed.
    #[error("API key is invalid: {reason}")]
    InvalidApiKey { reason: String },

    /// The service rejected the key during the pre-flight check.
    #[error("Credentials rejected by '{backend}': {detail}")]
    InvalidCredentials { backend: String, detail: String },

    /// The named LLM provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The PDF could not be turned into text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// Header, trailer, xref or object streams are corrupt.
    #[error("PDF '{source_name}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    Malformed { source_name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{source_name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { source_name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{source_name}'")]
    WrongPassword { source_name: String },
}

/// A single chunk could not be summarized.
///
/// Stored in [`crate::output::ChunkSummary`] under the placeholder policy,
/// so it is `Clone` and serialisable.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummarizationError {
    /// Chunks must carry at least one word.
    #[error("Chunk {chunk}: refusing to summarize an empty chunk")]
    EmptyChunk { chunk: usize },

    /// The service answered with an error.
    #[error("Chunk {chunk}: summarization service error: {detail}")]
    Service { chunk: usize, detail: String },

    /// The service rejected the call with HTTP 429.
    #[error("Chunk {chunk}: rate limited by '{backend}'")]
    RateLimited {
        chunk: usize,
        backend: String,
        retry_after_secs: Option<u64>,
    },

    /// No answer within the configured per-call timeout.
    #[error("Chunk {chunk}: summarization timed out after {secs}s")]
    Timeout { chunk: usize, secs: u64 },

    /// The service rejected the credentials (HTTP 401/403).
    #[error("Chunk {chunk}: '{backend}' rejected the credentials: {detail}")]
    Unauthorized {
        chunk: usize,
        backend: String,
        detail: String,
    },

    /// The service answered but returned no text.
    #[error("Chunk {chunk}: summarization service returned no text")]
    EmptyResponse { chunk: usize },
}

impl SummarizationError {
    /// Zero-based index of the chunk that failed.
    pub fn chunk(&self) -> usize {
        match self {
            Self::EmptyChunk { chunk }
            | Self::Service { chunk, .. }
            | Self::RateLimited { chunk, .. }
            | Self::Timeout { chunk, .. }
            | Self::Unauthorized { chunk, .. }
            | Self::EmptyResponse { chunk } => *chunk,
        }
    }
}

/// The speech backend could not produce audio.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Engine binary missing, network unreachable, or HTTP failure.
    #[error("Speech backend '{backend}' is unavailable: {detail}")]
    BackendUnavailable { backend: String, detail: String },

    /// The backend does not speak this language.
    #[error("Language '{language}' is not supported by '{backend}'")]
    UnsupportedLanguage { backend: String, language: String },

    /// The voice index does not exist on this machine.
    #[error("Voice index {index} is out of range ({available} voices installed)")]
    VoiceIndexOutOfRange { index: usize, available: usize },

    /// No installed voice matches the requested id or gender.
    #[error("No voice matching '{requested}' is installed")]
    VoiceNotFound { requested: String },

    /// The backend has no voice choice at all.
    #[error("Speech backend '{backend}' does not support voice selection")]
    VoiceSelectionUnsupported { backend: String },

    /// The engine ran but exited unsuccessfully.
    #[error("Speech engine '{backend}' failed: {detail}")]
    EngineFailed { backend: String, detail: String },

    /// Nothing left to speak after cleaning.
    #[error("Nothing to synthesize: text is empty after cleaning")]
    EmptyText,

    /// Writing the audio file failed.
    #[error("Failed to write audio file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
