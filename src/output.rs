//! Result types returned by the conversion entry points.
//!
//! Everything here is `Serialize` so the CLI's `--json` mode can print a run
//! verbatim and callers can persist it next to the audio.

use crate::error::SummarizationError;
use crate::pipeline::speech::AudioFormat;
use crate::pipeline::timestamps::TimestampMarker;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Document-level metadata read from the PDF trailer and page tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
}

/// Summary of one chunk, successful or substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSummary {
    /// Zero-based chunk index; summaries are joined in this order.
    pub index: usize,
    /// Summary text, or the placeholder when `error` is set.
    pub text: String,
    /// Word count of the source chunk.
    pub source_words: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Set when the service failed and a placeholder was substituted.
    pub error: Option<SummarizationError>,
}

impl ChunkSummary {
    pub fn is_placeholder(&self) -> bool {
        self.error.is_some()
    }
}

/// The synthesized speech file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub bytes: u64,
    /// Backend that produced the file, e.g. "google-translate-tts".
    pub backend: String,
    /// Voice id actually used, when the backend has voices.
    pub voice: Option<String>,
    pub language: String,
}

/// Files produced by one run, ready for download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputBundle {
    pub audio: PathBuf,
    pub transcript: Option<PathBuf>,
    pub timestamps: Option<PathBuf>,
    pub archive: Option<PathBuf>,
}

impl OutputBundle {
    /// Every file the bundle refers to, audio first.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.audio.clone()];
        files.extend(self.transcript.iter().cloned());
        files.extend(self.timestamps.iter().cloned());
        files.extend(self.archive.iter().cloned());
        files
    }
}

/// Run statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrationStats {
    pub page_count: usize,
    pub extracted_chars: usize,
    pub total_chunks: usize,
    pub failed_chunks: usize,
    pub summary_chars: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// True when the extracted text came from the memoization cache.
    pub extraction_cached: bool,
    pub extract_duration_ms: u64,
    pub summarize_duration_ms: u64,
    pub synthesize_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a text-only run ([`crate::convert::summarize`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutput {
    /// Chunk summaries joined with blank lines, in chunk order.
    pub summary: String,
    /// Per-chunk results, sorted by index.
    pub chunks: Vec<ChunkSummary>,
    /// Indices of chunks that received a placeholder.
    pub failed_chunks: Vec<usize>,
    pub timestamps: Vec<TimestampMarker>,
    pub stats: NarrationStats,
}

/// Result of a full run ([`crate::convert::convert`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationOutput {
    pub summary: String,
    pub chunks: Vec<ChunkSummary>,
    pub failed_chunks: Vec<usize>,
    pub timestamps: Vec<TimestampMarker>,
    pub audio: AudioArtifact,
    pub bundle: OutputBundle,
    pub stats: NarrationStats,
}
