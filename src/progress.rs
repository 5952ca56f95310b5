//! Progress-callback trait for pipeline stage and chunk events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages. The pipeline itself knows
//! nothing about progress bars; the CLI subscribes with an indicatif bar, a
//! web front-end could forward the same events over a socket.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2audio::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, Mutex};
//!
//! struct StageLog(Mutex<Vec<Stage>>);
//!
//! impl PipelineProgressCallback for StageLog {
//!     fn on_stage_complete(&self, stage: Stage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let log = Arc::new(StageLog(Mutex::new(Vec::new())));
//! let config = PipelineConfig::builder()
//!     .progress_callback(log as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Extract,
    Chunk,
    Summarize,
    Join,
    Timestamps,
    Synthesize,
    Package,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "Extracting text",
            Stage::Chunk => "Chunking",
            Stage::Summarize => "Summarizing",
            Stage::Join => "Joining summaries",
            Stage::Timestamps => "Estimating timestamps",
            Stage::Synthesize => "Synthesizing speech",
            Stage::Package => "Packaging",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as it runs.
///
/// All methods default to no-ops. Chunk events may arrive concurrently and
/// out of chunk order when `concurrency > 1`; protect shared state with a
/// `Mutex` or atomics.
pub trait PipelineProgressCallback: Send + Sync {
    /// A stage is about to run.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// A stage finished successfully.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Chunking finished; `total_chunks` summaries will be requested.
    fn on_chunks_ready(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Just before the summarization request for a chunk (0-indexed).
    fn on_chunk_start(&self, chunk: usize, total_chunks: usize) {
        let _ = (chunk, total_chunks);
    }

    /// A chunk was summarized; `summary_len` is the summary's byte length.
    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, summary_len: usize) {
        let _ = (chunk, total_chunks, summary_len);
    }

    /// A chunk failed. Under the placeholder policy the run continues.
    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, error: &str) {
        let _ = (chunk, total_chunks, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
