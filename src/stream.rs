//! Streaming summary API: emit chunk summaries as they complete.
//!
//! Long documents take minutes to summarize. [`summary_stream`] yields each
//! chunk's summary as soon as the service answers, so a caller can show
//! partial text, start its own speech engine early, or give up part way.
//!
//! Items arrive in completion order; sort by [`ChunkSummary::index`] (or
//! pass the collected items to [`crate::pipeline::summarize::join_summaries`])
//! when order matters. No failure policy is applied: each failed chunk is
//! an `Err` item and the caller decides what to do with it.

use crate::config::PipelineConfig;
use crate::convert::{extract_and_chunk, prepare_summarizer};
use crate::error::{Pdf2AudioError, SummarizationError};
use crate::output::ChunkSummary;
use crate::pipeline::input::{self, Document};
use crate::pipeline::summarize::Summarizer;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of chunk summaries.
pub type SummaryStream =
    Pin<Box<dyn Stream<Item = Result<ChunkSummary, SummarizationError>> + Send>>;

/// Summarize a PDF, streaming chunk summaries as they are ready.
///
/// # Returns
/// - `Ok(SummaryStream)`: a stream of `Result<ChunkSummary, SummarizationError>`
/// - `Err(Pdf2AudioError)`: fatal error (credentials, file not found, not a
///   PDF, no text)
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2audio::{summary_stream, PipelineConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::builder().api_key("AIza...").build()?;
/// let mut stream = summary_stream("paper.pdf", &config).await?;
/// while let Some(item) = stream.next().await {
///     match item {
///         Ok(s) => println!("Chunk {}: {}", s.index, s.text),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn summary_stream(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<SummaryStream, Pdf2AudioError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming summary: {}", input_str);

    let summarizer = prepare_summarizer(config).await?;
    let document = input::load_document(input_str, config.download_timeout_secs).await?;
    stream_document(document, summarizer, config).await
}

/// [`summary_stream`] for PDF bytes already in memory.
pub async fn summary_stream_from_bytes(
    bytes: &[u8],
    config: &PipelineConfig,
) -> Result<SummaryStream, Pdf2AudioError> {
    let summarizer = prepare_summarizer(config).await?;
    let document = Document::from_bytes(bytes.to_vec(), "<memory>")?;
    stream_document(document, summarizer, config).await
}

async fn stream_document(
    document: Document,
    summarizer: Summarizer,
    config: &PipelineConfig,
) -> Result<SummaryStream, Pdf2AudioError> {
    let chunked = extract_and_chunk(document, config).await?;
    let total = chunked.chunks.len();
    let callback = config.progress_callback.clone();

    let s = stream::iter(chunked.chunks.into_iter().enumerate().map(move |(index, chunk)| {
        let summarizer = summarizer.clone();
        let cb = callback.clone();
        async move {
            if let Some(ref cb) = cb {
                cb.on_chunk_start(index, total);
            }
            let start = Instant::now();
            let result = summarizer.summarize_chunk(index, &chunk).await;
            match result {
                Ok(response) => {
                    if let Some(ref cb) = cb {
                        cb.on_chunk_complete(index, total, response.text.len());
                    }
                    Ok(ChunkSummary {
                        index,
                        text: response.text,
                        source_words: chunk.split_whitespace().count(),
                        input_tokens: response.input_tokens,
                        output_tokens: response.output_tokens,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error: None,
                    })
                }
                Err(e) => {
                    if let Some(ref cb) = cb {
                        cb.on_chunk_error(index, total, &e.to_string());
                    }
                    Err(e)
                }
            }
        }
    }))
    .buffer_unordered(config.concurrency.max(1));

    Ok(Box::pin(s))
}
