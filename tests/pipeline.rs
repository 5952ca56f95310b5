//! Offline integration tests for the full pipeline.
//!
//! PDFs are built in memory with lopdf and both the summarizer and the speech
//! engine are fakes, so these run without network access or API keys.
//!
//! Run with:
//!   cargo test --test pipeline

mod common;

use common::{
    five_char_words, pdf_with_info, pdf_with_pages, FakeSpeechBackend, FakeSummaryBackend,
};
use edgequake_pdf2audio::{
    convert, convert_from_bytes, inspect, summarize, summary_stream_from_bytes, AudioFormat,
    ConfigurationError, ExtractionCache, Pdf2AudioError, PipelineConfig, PipelineProgressCallback,
    SpeechBackendKind, SpeechConfig, Stage, SummaryFailurePolicy, SynthesisError, VoiceSelection,
};
use futures::StreamExt;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn config_with(
    summary: Arc<FakeSummaryBackend>,
    speech: Arc<FakeSpeechBackend>,
) -> edgequake_pdf2audio::PipelineConfigBuilder {
    PipelineConfig::builder()
        .summary_backend(summary)
        .speech_backend(speech)
        .prompt_template("{text}")
        .extraction_cache(None)
}

fn zip_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            (entry.name().to_string(), bytes)
        })
        .collect()
}

#[derive(Default)]
struct StageLog {
    events: Mutex<Vec<(Stage, bool)>>,
    chunks_ready: Mutex<Option<usize>>,
}

impl PipelineProgressCallback for StageLog {
    fn on_stage_start(&self, stage: Stage) {
        self.events.lock().unwrap().push((stage, false));
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.events.lock().unwrap().push((stage, true));
    }

    fn on_chunks_ready(&self, total_chunks: usize) {
        *self.chunks_ready.lock().unwrap() = Some(total_chunks);
    }
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn short_document_becomes_one_chunk_and_a_full_bundle() {
    // Ten words.
    let pdf = pdf_with_pages(&["Rust is a systems language without any garbage collector inside"]);
    let dir = tempfile::tempdir().unwrap();
    let summary = Arc::new(FakeSummaryBackend::default());
    let speech = Arc::new(FakeSpeechBackend::default());
    let config = config_with(summary.clone(), speech.clone()).build().unwrap();

    let out = convert_from_bytes(&pdf, dir.path().join("talk.mp3"), &config)
        .await
        .unwrap();

    assert_eq!(out.chunks.len(), 1);
    assert_eq!(out.chunks[0].source_words, 10);
    assert_eq!(summary.calls.load(Ordering::SeqCst), 1);
    assert!(out.failed_chunks.is_empty());
    assert_eq!(out.summary, "Summary of Rust.");

    // The extension follows the backend's format.
    assert_eq!(out.audio.format, AudioFormat::Wav);
    assert_eq!(out.audio.path, dir.path().join("talk.wav"));
    assert!(out.audio.bytes > 0);
    assert_eq!(std::fs::read(&out.audio.path).unwrap(), b"Summary of Rust");

    let transcript = out.bundle.transcript.clone().unwrap();
    assert_eq!(transcript, dir.path().join("talk_summary.txt"));
    assert_eq!(std::fs::read_to_string(&transcript).unwrap(), "Summary of Rust.");

    let timestamps = out.bundle.timestamps.clone().unwrap();
    assert_eq!(
        std::fs::read_to_string(&timestamps).unwrap(),
        "Section 1: 0.00s\n"
    );

    let archive = out.bundle.archive.clone().unwrap();
    let entries = zip_entries(&archive);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["talk.wav", "talk_summary.txt", "talk_timestamps.txt"]);
    assert_eq!(entries[1].1, b"Summary of Rust.");
}

#[tokio::test]
async fn convert_reads_from_a_path() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.pdf");
    std::fs::write(&input, pdf_with_pages(&["Hello from a file on disk"])).unwrap();
    let config = config_with(
        Arc::new(FakeSummaryBackend::default()),
        Arc::new(FakeSpeechBackend::default()),
    )
    .build()
    .unwrap();

    let out = convert(input.to_str().unwrap(), dir.path().join("out/doc.mp3"), &config)
        .await
        .unwrap();
    assert!(out.audio.path.exists());
    assert_eq!(out.stats.page_count, 1);
}

#[tokio::test]
async fn optional_outputs_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(
        Arc::new(FakeSummaryBackend::default()),
        Arc::new(FakeSpeechBackend::default()),
    )
    .timestamps(false)
    .write_transcript(false)
    .create_archive(false)
    .build()
    .unwrap();

    let out = convert_from_bytes(
        &pdf_with_pages(&["only audio please"]),
        dir.path().join("a.mp3"),
        &config,
    )
        .await
        .unwrap();
    assert!(out.bundle.transcript.is_none());
    assert!(out.bundle.timestamps.is_none());
    assert!(out.bundle.archive.is_none());
    assert!(out.timestamps.is_empty());
    assert!(!dir.path().join("a.zip").exists());
    assert_eq!(out.bundle.files(), vec![dir.path().join("a.wav")]);
}

// ── Chunking ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ten_thousand_characters_make_four_chunks() {
    let text = five_char_words(1667);
    let pdf = pdf_with_pages(&[text.as_str()]);
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("long.pdf");
    std::fs::write(&input, pdf).unwrap();

    let summary = Arc::new(FakeSummaryBackend::default());
    let config = config_with(summary.clone(), Arc::new(FakeSpeechBackend::default()))
        .chunk_size(3000)
        .build()
        .unwrap();

    let out = summarize(input.to_str().unwrap(), &config).await.unwrap();
    assert_eq!(out.chunks.len(), 4);
    assert_eq!(out.stats.total_chunks, 4);
    assert_eq!(summary.calls.load(Ordering::SeqCst), 4);
    let words: usize = out.chunks.iter().map(|c| c.source_words).sum();
    assert_eq!(words, 1667);
}

#[tokio::test]
async fn summaries_keep_chunk_order_when_completion_order_differs() {
    // Five-letter words with a five-character cap: one chunk per word.
    let pdf = pdf_with_pages(&["alpha bravo", "charl delta", "echoo"]);
    let summary = Arc::new(FakeSummaryBackend {
        scramble: true,
        ..Default::default()
    });
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(summary, Arc::new(FakeSpeechBackend::default()))
        .chunk_size(5)
        .concurrency(5)
        .build()
        .unwrap();

    let out = convert_from_bytes(&pdf, dir.path().join("o.mp3"), &config)
        .await
        .unwrap();

    let indices: Vec<usize> = out.chunks.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert_eq!(
        out.summary,
        "Summary of alpha.\n\nSummary of bravo.\n\nSummary of charl.\n\nSummary of delta.\n\nSummary of echoo."
    );
    assert_eq!(out.stats.page_count, 3);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_chunk_is_replaced_by_a_placeholder() {
    let pdf = pdf_with_pages(&["alpha bravo charl"]);
    let summary = Arc::new(FakeSummaryBackend {
        fail_on: Some("bravo".into()),
        ..Default::default()
    });
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(summary, Arc::new(FakeSpeechBackend::default()))
        .chunk_size(5)
        .build()
        .unwrap();

    let out = convert_from_bytes(&pdf, dir.path().join("o.mp3"), &config)
        .await
        .unwrap();

    assert_eq!(out.failed_chunks, vec![1]);
    assert_eq!(out.stats.failed_chunks, 1);
    assert!(out.chunks[1].is_placeholder());
    assert_eq!(
        out.summary,
        "Summary of alpha.\n\nSummary unavailable for part 2.\n\nSummary of charl."
    );
    let transcript = std::fs::read_to_string(out.bundle.transcript.unwrap()).unwrap();
    assert!(transcript.contains("Summary unavailable for part 2."));
}

#[tokio::test]
async fn abort_policy_fails_the_run() {
    let pdf = pdf_with_pages(&["alpha bravo charl"]);
    let summary = Arc::new(FakeSummaryBackend {
        fail_on: Some("bravo".into()),
        ..Default::default()
    });
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(summary, Arc::new(FakeSpeechBackend::default()))
        .chunk_size(5)
        .failure_policy(SummaryFailurePolicy::Abort)
        .build()
        .unwrap();

    let err = convert_from_bytes(&pdf, dir.path().join("o.mp3"), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2AudioError::Summarization(_)), "got {err:?}");
    assert!(!dir.path().join("o.wav").exists());
}

#[tokio::test]
async fn every_chunk_failing_is_an_error() {
    let pdf = pdf_with_pages(&["doomed words only"]);
    let summary = Arc::new(FakeSummaryBackend {
        fail_on: Some("doomed".into()),
        ..Default::default()
    });
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(summary, Arc::new(FakeSpeechBackend::default()))
        .build()
        .unwrap();

    let err = convert_from_bytes(&pdf, dir.path().join("o.mp3"), &config)
        .await
        .unwrap_err();
    assert!(
        matches!(err, Pdf2AudioError::AllChunksFailed { total: 1, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn missing_credentials_fail_before_the_input_is_read() {
    let config = PipelineConfig::builder()
        .speech_backend(Arc::new(FakeSpeechBackend::default()))
        .build()
        .unwrap();

    let err = convert("/no/such/file.pdf", "/tmp/never.mp3", &config)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            Pdf2AudioError::Configuration(ConfigurationError::MissingCredentials)
        ),
        "got {err:?}"
    );
}

#[tokio::test]
async fn rejected_credentials_stop_before_any_summary_call() {
    let summary = Arc::new(FakeSummaryBackend {
        reject_credentials: true,
        ..Default::default()
    });
    let config = config_with(summary.clone(), Arc::new(FakeSpeechBackend::default()))
        .build()
        .unwrap();

    let err = convert("/no/such/file.pdf", "/tmp/never.mp3", &config)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            Pdf2AudioError::Configuration(ConfigurationError::InvalidCredentials { .. })
        ),
        "got {err:?}"
    );
    assert_eq!(summary.verifications.load(Ordering::SeqCst), 1);
    assert_eq!(summary.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn verification_can_be_skipped() {
    let summary = Arc::new(FakeSummaryBackend::default());
    let config = config_with(summary.clone(), Arc::new(FakeSpeechBackend::default()))
        .verify_credentials(false)
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    convert_from_bytes(&pdf_with_pages(&["quick check"]), dir.path().join("o.mp3"), &config)
        .await
        .unwrap();
    assert_eq!(summary.verifications.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn out_of_range_voice_fails_before_summarizing() {
    let summary = Arc::new(FakeSummaryBackend::default());
    let config = config_with(summary.clone(), Arc::new(FakeSpeechBackend::default()))
        .voice(VoiceSelection::Index(5))
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = convert_from_bytes(&pdf_with_pages(&["some text"]), dir.path().join("o.mp3"), &config)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            Pdf2AudioError::Synthesis(SynthesisError::VoiceIndexOutOfRange {
                index: 5,
                available: 2
            })
        ),
        "got {err:?}"
    );
    assert_eq!(summary.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_local_engine_fails_before_summarizing() {
    let summary = Arc::new(FakeSummaryBackend::default());
    let config = PipelineConfig::builder()
        .summary_backend(summary.clone())
        .speech(SpeechConfig {
            backend: SpeechBackendKind::Local,
            engine_program: "definitely-not-an-installed-tts-engine".into(),
            ..SpeechConfig::default()
        })
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let pdf = pdf_with_pages(&["some text"]);
    let err = convert_from_bytes(&pdf, dir.path().join("o.wav"), &config)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            Pdf2AudioError::Synthesis(SynthesisError::BackendUnavailable { .. })
        ),
        "got {err:?}"
    );
    assert_eq!(summary.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn selected_voice_and_its_language_reach_the_engine() {
    let speech = Arc::new(FakeSpeechBackend::default());
    let config = config_with(Arc::new(FakeSummaryBackend::default()), speech.clone())
        .voice(VoiceSelection::Index(1))
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let out = convert_from_bytes(
        &pdf_with_pages(&["Bonjour tout le monde"]),
        dir.path().join("o.mp3"),
        &config,
    )
        .await
        .unwrap();
    assert_eq!(out.audio.voice.as_deref(), Some("fr-fr"));
    assert_eq!(out.audio.language, "fr-fr");

    let requests = speech.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1.as_deref(), Some("fr-fr"));
    assert_eq!(requests[0].2, "fr-fr");
    // Punctuation is stripped before synthesis.
    assert_eq!(requests[0].0, "Summary of Bonjour");
}

#[tokio::test]
async fn empty_page_yields_no_text_error() {
    let config = config_with(
        Arc::new(FakeSummaryBackend::default()),
        Arc::new(FakeSpeechBackend::default()),
    )
    .build()
    .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = convert_from_bytes(&pdf_with_pages(&[""]), dir.path().join("o.mp3"), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2AudioError::NoText { .. }), "got {err:?}");
}

#[tokio::test]
async fn non_pdf_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    std::fs::write(&input, "just some notes").unwrap();
    let config = config_with(
        Arc::new(FakeSummaryBackend::default()),
        Arc::new(FakeSpeechBackend::default()),
    )
    .build()
    .unwrap();

    let err = summarize(input.to_str().unwrap(), &config).await.unwrap_err();
    assert!(matches!(err, Pdf2AudioError::NotAPdf { .. }), "got {err:?}");
}

// ── Progress, caching, metadata ──────────────────────────────────────────────

#[tokio::test]
async fn stages_are_reported_in_pipeline_order() {
    let log = Arc::new(StageLog::default());
    let config = config_with(
        Arc::new(FakeSummaryBackend::default()),
        Arc::new(FakeSpeechBackend::default()),
    )
    .progress_callback(log.clone())
    .build()
    .unwrap();
    let dir = tempfile::tempdir().unwrap();

    convert_from_bytes(&pdf_with_pages(&["stage by stage"]), dir.path().join("o.mp3"), &config)
        .await
        .unwrap();

    let events = log.events.lock().unwrap().clone();
    let expected: Vec<(Stage, bool)> = [
        Stage::Extract,
        Stage::Chunk,
        Stage::Summarize,
        Stage::Join,
        Stage::Timestamps,
        Stage::Synthesize,
        Stage::Package,
    ]
    .into_iter()
    .flat_map(|s| [(s, false), (s, true)])
    .collect();
    assert_eq!(events, expected);
    assert_eq!(*log.chunks_ready.lock().unwrap(), Some(1));
}

#[tokio::test]
async fn second_run_on_the_same_bytes_hits_the_extraction_cache() {
    let cache = Arc::new(ExtractionCache::new());
    let config = config_with(
        Arc::new(FakeSummaryBackend::default()),
        Arc::new(FakeSpeechBackend::default()),
    )
    .extraction_cache(Some(cache.clone()))
    .build()
    .unwrap();
    let pdf = pdf_with_pages(&["cache me if you can"]);
    let dir = tempfile::tempdir().unwrap();

    let first = convert_from_bytes(&pdf, dir.path().join("one.mp3"), &config)
        .await
        .unwrap();
    let second = convert_from_bytes(&pdf, dir.path().join("two.mp3"), &config)
        .await
        .unwrap();

    assert!(!first.stats.extraction_cached);
    assert!(second.stats.extraction_cached);
    assert_eq!(cache.len(), 1);
    assert_eq!(first.summary, second.summary);
}

#[tokio::test]
async fn inspect_reads_metadata_without_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("meta.pdf");
    std::fs::write(&input, pdf_with_info(&["one", "two"], Some("A Test Title"))).unwrap();

    let meta = inspect(input.to_str().unwrap()).await.unwrap();
    assert_eq!(meta.page_count, 2);
    assert_eq!(meta.title.as_deref(), Some("A Test Title"));
    assert_eq!(meta.author.as_deref(), Some("Test Author"));
    assert!(!meta.is_encrypted);
}

// ── Streaming ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_every_chunk() {
    let config = config_with(
        Arc::new(FakeSummaryBackend {
            scramble: true,
            ..Default::default()
        }),
        Arc::new(FakeSpeechBackend::default()),
    )
    .chunk_size(5)
    .build()
    .unwrap();

    let stream = summary_stream_from_bytes(&pdf_with_pages(&["alpha bravo charl"]), &config)
        .await
        .unwrap();
    let mut items: Vec<_> = stream
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    items.sort_by_key(|c| c.index);

    let texts: Vec<&str> = items.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["Summary of alpha.", "Summary of bravo.", "Summary of charl."]
    );
}

#[tokio::test]
async fn stream_surfaces_chunk_errors_as_items() {
    let config = config_with(
        Arc::new(FakeSummaryBackend {
            fail_on: Some("bravo".into()),
            ..Default::default()
        }),
        Arc::new(FakeSpeechBackend::default()),
    )
    .chunk_size(5)
    .build()
    .unwrap();

    let results: Vec<_> = summary_stream_from_bytes(&pdf_with_pages(&["alpha bravo"]), &config)
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(results.len(), 2);
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
}
