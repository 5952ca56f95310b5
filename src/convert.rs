//! Eager (whole-document) entry points.
//!
//! [`convert`] runs the full pipeline and returns once the audio and its
//! companion files are on disk. [`summarize`] stops after the summary, for
//! callers that only want text. Use [`crate::stream::summary_stream`] to
//! receive chunk summaries as they complete.
//!
//! Every entry point that talks to an LLM resolves and verifies its
//! credentials before the input is read: a missing key fails in milliseconds
//! instead of after a 100 MB download.

use crate::config::PipelineConfig;
use crate::error::Pdf2AudioError;
use crate::output::{
    ChunkSummary, DocumentMetadata, NarrationOutput, NarrationStats, OutputBundle, SummaryOutput,
};
use crate::pipeline::chunk;
use crate::pipeline::extract::{self, ExtractedText};
use crate::pipeline::input::{self, Document};
use crate::pipeline::package::{self, OutputPaths};
use crate::pipeline::speech::{self, SpeechBackend, Voice};
use crate::pipeline::summarize::{self, Summarizer};
use crate::pipeline::timestamps;
use crate::progress::Stage;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Narrate a PDF file or URL as an audio summary.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`: Local file path or HTTP/HTTPS URL to a PDF
/// * `output`: Where to put the audio. Its stem names every output file;
///   the extension is replaced by the backend's (`.mp3` or `.wav`).
/// * `config`: Pipeline configuration, including credentials
///
/// # Returns
/// `Ok(NarrationOutput)` on success, even if some chunks fell back to a
/// placeholder (check `output.failed_chunks`).
///
/// # Errors
/// Returns `Err(Pdf2AudioError)` for fatal errors:
/// - Missing or rejected credentials (before the input is read)
/// - Invalid voice selection (before the input is read)
/// - File not found, not a PDF, corrupt or encrypted PDF
/// - A chunk failed under the abort policy, or every chunk failed
/// - Speech synthesis or output writing failed
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2audio::{convert, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::builder()
///     .api_key(std::env::var("GOOGLE_API_KEY")?)
///     .build()?;
/// let output = convert("paper.pdf", "out/paper.mp3", &config).await?;
/// println!("{}", output.audio.path.display());
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<NarrationOutput, Pdf2AudioError> {
    let input_str = input_str.as_ref();
    info!("Starting narration: {}", input_str);

    let prepared = prepare_narration(config).await?;
    let document = input::load_document(input_str, config.download_timeout_secs).await?;
    narrate(document, prepared, output_path.as_ref(), config).await
}

/// Narrate PDF bytes already in memory.
///
/// Same contract as [`convert`]; the bytes must start with `%PDF`.
pub async fn convert_from_bytes(
    bytes: &[u8],
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<NarrationOutput, Pdf2AudioError> {
    let prepared = prepare_narration(config).await?;
    let document = Document::from_bytes(bytes.to_vec(), "<memory>")?;
    narrate(document, prepared, output_path.as_ref(), config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<NarrationOutput, Pdf2AudioError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2AudioError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, output_path, config))
}

/// Summarize a PDF without synthesizing speech or writing files.
pub async fn summarize(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<SummaryOutput, Pdf2AudioError> {
    let summarizer = prepare_summarizer(config).await?;
    let document = input::load_document(input_str.as_ref(), config.download_timeout_secs).await?;
    run_summary(document, &summarizer, config).await
}

/// Extract PDF metadata without summarizing.
///
/// Does not require an API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, Pdf2AudioError> {
    inspect_with_password(input_str, None).await
}

/// [`inspect`] for password-protected documents.
pub async fn inspect_with_password(
    input_str: impl AsRef<str>,
    password: Option<&str>,
) -> Result<DocumentMetadata, Pdf2AudioError> {
    let document = input::load_document(input_str.as_ref(), 120).await?;
    extract::read_metadata(&document, password).await
}

/// Voices offered by the configured speech backend, in selection order.
pub async fn list_voices(config: &PipelineConfig) -> Result<Vec<Voice>, Pdf2AudioError> {
    let backend = speech::resolve_speech_backend(config);
    Ok(backend.list_voices().await?)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Everything validated before the input is touched.
struct PreparedNarration {
    summarizer: Summarizer,
    speech_backend: Arc<dyn SpeechBackend>,
    voice: Option<Voice>,
}

async fn prepare_narration(config: &PipelineConfig) -> Result<PreparedNarration, Pdf2AudioError> {
    let summarizer = prepare_summarizer(config).await?;
    let speech_backend = speech::resolve_speech_backend(config);
    let voice = speech::prepare_voice(speech_backend.as_ref(), &config.speech).await?;
    Ok(PreparedNarration {
        summarizer,
        speech_backend,
        voice,
    })
}

/// Resolve the summarization backend and, if enabled, check its credentials.
pub(crate) async fn prepare_summarizer(
    config: &PipelineConfig,
) -> Result<Summarizer, Pdf2AudioError> {
    let backend = summarize::resolve_backend(config)?;
    if config.verify_credentials {
        summarize::verify_backend(backend.as_ref()).await?;
    }
    debug!("Summarization backend: {}", backend.name());
    Ok(Summarizer::from_config(backend, config))
}

pub(crate) fn stage_start(config: &PipelineConfig, stage: Stage) {
    debug!("{}…", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

pub(crate) fn stage_complete(config: &PipelineConfig, stage: Stage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage);
    }
}

/// Extraction plus chunking, shared with the streaming API.
pub(crate) struct ChunkedDocument {
    pub text: Arc<ExtractedText>,
    pub cached: bool,
    pub chunks: Vec<String>,
    pub extract_duration_ms: u64,
}

pub(crate) async fn extract_and_chunk(
    document: Document,
    config: &PipelineConfig,
) -> Result<ChunkedDocument, Pdf2AudioError> {
    stage_start(config, Stage::Extract);
    let start = Instant::now();
    let (text, cached) = extract::extract_text(
        &document,
        config.password.as_deref(),
        config.extraction_cache.as_deref(),
    )
    .await?;
    let extract_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} chars from {} pages in {}ms{}",
        text.text.len(),
        text.page_count,
        extract_duration_ms,
        if cached { " (cached)" } else { "" }
    );

    if text.text.trim().is_empty() {
        return Err(Pdf2AudioError::NoText {
            source_name: document.source_name,
        });
    }
    // The raw bytes are no longer needed.
    drop(document);
    stage_complete(config, Stage::Extract);

    stage_start(config, Stage::Chunk);
    let chunks = chunk::chunk_text(&text.text, config.chunk_size);
    info!("Split {} words into {} chunks", text.word_count(), chunks.len());
    if let Some(ref cb) = config.progress_callback {
        cb.on_chunks_ready(chunks.len());
    }
    stage_complete(config, Stage::Chunk);

    Ok(ChunkedDocument {
        text,
        cached,
        chunks,
        extract_duration_ms,
    })
}

async fn run_summary(
    document: Document,
    summarizer: &Summarizer,
    config: &PipelineConfig,
) -> Result<SummaryOutput, Pdf2AudioError> {
    let total_start = Instant::now();
    let chunked = extract_and_chunk(document, config).await?;

    stage_start(config, Stage::Summarize);
    let summarize_start = Instant::now();
    let chunks = summarize::summarize_chunks(summarizer, &chunked.chunks, config).await?;
    let summarize_duration_ms = summarize_start.elapsed().as_millis() as u64;
    stage_complete(config, Stage::Summarize);

    stage_start(config, Stage::Join);
    let summary = summarize::join_summaries(&chunks);
    stage_complete(config, Stage::Join);

    let markers = if config.timestamps {
        stage_start(config, Stage::Timestamps);
        let m = timestamps::estimate_timestamps(&summary);
        stage_complete(config, Stage::Timestamps);
        m
    } else {
        Vec::new()
    };

    let failed_chunks: Vec<usize> = chunks
        .iter()
        .filter(|c| c.is_placeholder())
        .map(|c| c.index)
        .collect();

    let stats = summary_stats(&chunked, &chunks, &summary, summarize_duration_ms, total_start);

    Ok(SummaryOutput {
        summary,
        chunks,
        failed_chunks,
        timestamps: markers,
        stats,
    })
}

fn summary_stats(
    chunked: &ChunkedDocument,
    chunks: &[ChunkSummary],
    summary: &str,
    summarize_duration_ms: u64,
    total_start: Instant,
) -> NarrationStats {
    NarrationStats {
        page_count: chunked.text.page_count,
        extracted_chars: chunked.text.text.chars().count(),
        total_chunks: chunks.len(),
        failed_chunks: chunks.iter().filter(|c| c.is_placeholder()).count(),
        summary_chars: summary.chars().count(),
        total_input_tokens: chunks.iter().map(|c| c.input_tokens as u64).sum(),
        total_output_tokens: chunks.iter().map(|c| c.output_tokens as u64).sum(),
        extraction_cached: chunked.cached,
        extract_duration_ms: chunked.extract_duration_ms,
        summarize_duration_ms,
        synthesize_duration_ms: 0,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    }
}

async fn narrate(
    document: Document,
    prepared: PreparedNarration,
    output_path: &Path,
    config: &PipelineConfig,
) -> Result<NarrationOutput, Pdf2AudioError> {
    let total_start = Instant::now();
    let summary_output = run_summary(document, &prepared.summarizer, config).await?;

    let paths = OutputPaths::new(output_path, prepared.speech_backend.format());
    package::ensure_parent(&paths.audio).await?;

    // ── Speech ───────────────────────────────────────────────────────────
    stage_start(config, Stage::Synthesize);
    let synth_start = Instant::now();
    let audio = speech::synthesize_speech(
        prepared.speech_backend.as_ref(),
        &summary_output.summary,
        prepared.voice.as_ref(),
        &config.speech,
        &paths.audio,
    )
    .await?;
    let synthesize_duration_ms = synth_start.elapsed().as_millis() as u64;
    info!(
        "Audio written: {} ({} bytes, {}ms)",
        audio.path.display(),
        audio.bytes,
        synthesize_duration_ms
    );
    stage_complete(config, Stage::Synthesize);

    // ── Companion files and archive ──────────────────────────────────────
    stage_start(config, Stage::Package);
    let transcript = if config.write_transcript {
        package::write_atomic(&paths.transcript, summary_output.summary.as_bytes()).await?;
        Some(paths.transcript.clone())
    } else {
        None
    };

    let timestamp_file = if config.timestamps {
        let rendered = timestamps::render_timestamps(&summary_output.timestamps);
        package::write_atomic(&paths.timestamps, rendered.as_bytes()).await?;
        Some(paths.timestamps.clone())
    } else {
        None
    };

    let mut bundle = OutputBundle {
        audio: audio.path.clone(),
        transcript,
        timestamps: timestamp_file,
        archive: None,
    };
    if config.create_archive {
        package::write_archive(&paths.archive, &bundle.files()).await?;
        bundle.archive = Some(paths.archive.clone());
    }
    stage_complete(config, Stage::Package);

    let mut stats = summary_output.stats;
    stats.synthesize_duration_ms = synthesize_duration_ms;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Narration complete: {} chunks ({} placeholders), {}ms total",
        stats.total_chunks, stats.failed_chunks, stats.total_duration_ms
    );

    Ok(NarrationOutput {
        summary: summary_output.summary,
        chunks: summary_output.chunks,
        failed_chunks: summary_output.failed_chunks,
        timestamps: summary_output.timestamps,
        audio,
        bundle,
        stats,
    })
}
