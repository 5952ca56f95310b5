//! # edgequake-pdf2audio
//!
//! Turn PDF documents into narrated audio summaries.
//!
//! A long paper is more useful on a walk than on a screen, but reading all of
//! it aloud is too long. This crate extracts the text, has an LLM summarize
//! it chunk by chunk in plain spoken prose, and feeds the summary to a
//! text-to-speech engine. The result is an audio file, a transcript, rough
//! section timestamps, and a zip with all three.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       resolve local file, URL download, or in-memory bytes
//!  ├─ 2. Extract     page text via lopdf (CPU-bound, spawn_blocking, memoized)
//!  ├─ 3. Chunk       greedy word-bounded chunks, 3000 chars by default
//!  ├─ 4. Summarize   concurrent LLM calls (Gemini, or any edgequake-llm provider)
//!  ├─ 5. Join        summaries in chunk order, blank-line separated
//!  ├─ 6. Timestamps  "Section N: X.XXs" estimates, 0.5 s per word
//!  ├─ 7. Speech      Google Translate TTS (MP3) or local espeak-ng (WAV)
//!  └─ 8. Package     transcript, timestamps, flat deflate zip
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2audio::{convert, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // The library never reads API keys from the environment itself.
//!     let config = PipelineConfig::builder()
//!         .api_key(std::env::var("GOOGLE_API_KEY")?)
//!         .build()?;
//!     let output = convert("paper.pdf", "paper.mp3", &config).await?;
//!     println!("{}", output.audio.path.display());
//!     eprintln!("{} chunks, {} placeholders",
//!         output.stats.total_chunks,
//!         output.stats.failed_chunks);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2audio` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2audio = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing a Speech Backend
//!
//! | Backend | Output | Needs | Voices |
//! |---------|--------|-------|--------|
//! | `network` (default) | MP3 | internet | one per language |
//! | `local` | WAV | `espeak-ng` on `PATH` | every installed voice, adjustable rate |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    PipelineConfig, PipelineConfigBuilder, SpeechBackendKind, SpeechConfig, SummaryFailurePolicy,
};
pub use convert::{
    convert, convert_from_bytes, convert_sync, inspect, inspect_with_password, list_voices,
    summarize,
};
pub use error::{
    ConfigurationError, ExtractionError, Pdf2AudioError, SummarizationError, SynthesisError,
};
pub use output::{
    AudioArtifact, ChunkSummary, DocumentMetadata, NarrationOutput, NarrationStats, OutputBundle,
    SummaryOutput,
};
pub use pipeline::extract::ExtractionCache;
pub use pipeline::speech::{AudioFormat, Gender, SpeechBackend, Voice, VoiceSelection};
pub use pipeline::summarize::{GeminiBackend, ProviderBackend, SummaryBackend};
pub use pipeline::timestamps::TimestampMarker;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use stream::{summary_stream, summary_stream_from_bytes, SummaryStream};
