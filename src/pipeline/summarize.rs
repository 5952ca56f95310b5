//! Chunk summarization: one LLM call per chunk, joined in chunk order.
//!
//! This is the only stage with LLM network I/O. Chunks are independent, so
//! they go through a bounded pool (`buffer_unordered(concurrency)`); results
//! arrive in completion order and are sorted back by chunk index before
//! joining. There are no retries: a failed call is handled by
//! [`SummaryFailurePolicy`].
//!
//! Backends implement [`SummaryBackend`]. Two ship with the crate:
//! [`GeminiBackend`] talks to the Generative Language REST API with an
//! explicitly supplied key, [`ProviderBackend`] adapts any
//! `edgequake_llm::LLMProvider`.

use crate::config::{validate_api_key, PipelineConfig, SummaryFailurePolicy, DEFAULT_GEMINI_MODEL};
use crate::error::{ConfigurationError, Pdf2AudioError, SummarizationError};
use crate::output::ChunkSummary;
use crate::prompts::summary_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Text plus token accounting returned by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendResponse {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl BackendResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Failure of a single backend call, before it is tied to a chunk.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("{0}")]
    Service(String),
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("empty response")]
    EmptyResponse,
}

/// A generative-text service that turns a prompt into text.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    /// Short identifier used in logs and errors, e.g. "gemini".
    fn name(&self) -> &str;

    /// Send one prompt, return the generated text.
    async fn generate(&self, prompt: &str) -> Result<BackendResponse, BackendError>;

    /// Cheap credentials check run before any input is read.
    async fn verify(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

// ── Gemini ───────────────────────────────────────────────────────────────

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative Language API (`models/{model}:generateContent`).
///
/// The key is sent in the `x-goog-api-key` header rather than the query
/// string so it never appears in request URLs or logs.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: usize,
}

impl GeminiBackend {
    /// Create a client for `model` authenticated with `api_key`.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let api_key = api_key.into();
        validate_api_key(&api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            temperature: 0.3,
            max_output_tokens: 2048,
        })
    }

    /// Point at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_generation(mut self, temperature: f32, max_output_tokens: usize) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }

    fn request_body(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: usize,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: usize,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: usize,
}

impl GenerateResponse {
    fn into_backend_response(self) -> Result<BackendResponse, BackendError> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }

        let (input_tokens, output_tokens) = self
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((0, 0));

        Ok(BackendResponse {
            text,
            input_tokens,
            output_tokens,
        })
    }
}

/// Map a non-success HTTP answer to a [`BackendError`].
///
/// Gemini reports a bad key as `400 INVALID_ARGUMENT` with `API_KEY_INVALID`
/// in the body, not as 401.
fn classify_http_error(
    status: reqwest::StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> BackendError {
    match status.as_u16() {
        429 => BackendError::RateLimited {
            retry_after_secs: retry_after,
        },
        401 | 403 => BackendError::Unauthorized(format!("HTTP {status}")),
        400 if body.contains("API_KEY_INVALID") || body.contains("API key not valid") => {
            BackendError::Unauthorized("API key not valid".to_string())
        }
        _ => BackendError::Service(format!("HTTP {status}: {}", truncate(body, 300))),
    }
}

fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl SummaryBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<BackendResponse, BackendError> {
        let response = self
            .client
            .post(format!("{}:generateContent", self.model_url()))
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| BackendError::Service(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status, retry_after, &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Service(format!("Failed to parse Gemini response: {e}")))?;

        parsed.into_backend_response()
    }

    async fn verify(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| BackendError::Service(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let retry_after = retry_after_secs(&response);
        let body = response.text().await.unwrap_or_default();
        Err(classify_http_error(status, retry_after, &body))
    }
}

// ── edgequake-llm providers ──────────────────────────────────────────────

/// Adapter over any `edgequake_llm` provider (OpenAI, Anthropic, Ollama, …).
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
            options: CompletionOptions::default(),
        }
    }

    pub fn with_generation(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.options = CompletionOptions {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
            ..Default::default()
        };
        self
    }
}

#[async_trait]
impl SummaryBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<BackendResponse, BackendError> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| classify_provider_error(&e.to_string()))?;

        if response.content.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        Ok(BackendResponse {
            text: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

/// Providers only expose a message string; sort it into our categories.
fn classify_provider_error(message: &str) -> BackendError {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") {
        BackendError::RateLimited {
            retry_after_secs: None,
        }
    } else if lower.contains("401")
        || lower.contains("403")
        || lower.contains("unauthorized")
        || lower.contains("invalid api key")
    {
        BackendError::Unauthorized(message.to_string())
    } else {
        BackendError::Service(message.to_string())
    }
}

fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "gemini" => DEFAULT_GEMINI_MODEL,
        "anthropic" => "claude-3-5-haiku-latest",
        "ollama" => "llama3.2",
        _ => "gpt-4.1-nano",
    }
}

/// Resolve the summarization backend, from most-specific to least-specific:
///
/// 1. **Pre-built backend** (`config.summary_backend`), used as-is.
/// 2. **Named provider** (`config.provider_name`) through edgequake-llm's
///    `ProviderFactory`, which reads that provider's own key variable.
/// 3. **API key** (`config.api_key`) for the Gemini REST backend.
///
/// Nothing configured is [`ConfigurationError::MissingCredentials`]. The
/// library never looks for API keys in the environment itself.
pub fn resolve_backend(
    config: &PipelineConfig,
) -> Result<Arc<dyn SummaryBackend>, ConfigurationError> {
    if let Some(ref backend) = config.summary_backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            ConfigurationError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        let backend = ProviderBackend::new(provider, name.clone())
            .with_generation(config.temperature, config.max_tokens);
        return Ok(Arc::new(backend));
    }

    if let Some(ref key) = config.api_key {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        let backend = GeminiBackend::new(key.clone(), model)?
            .with_generation(config.temperature, config.max_tokens);
        return Ok(Arc::new(backend));
    }

    Err(ConfigurationError::MissingCredentials)
}

/// Run the backend's credentials check.
///
/// A rejection is fatal. Any other failure (network down, 5xx) is logged and
/// left for the chunk calls to report.
pub async fn verify_backend(backend: &dyn SummaryBackend) -> Result<(), ConfigurationError> {
    match backend.verify().await {
        Ok(()) => {
            debug!("Credentials verified for '{}'", backend.name());
            Ok(())
        }
        Err(BackendError::Unauthorized(detail)) => Err(ConfigurationError::InvalidCredentials {
            backend: backend.name().to_string(),
            detail,
        }),
        Err(e) => {
            warn!("Could not verify credentials for '{}': {}", backend.name(), e);
            Ok(())
        }
    }
}

// ── Orchestration ────────────────────────────────────────────────────────

/// Summarizes single chunks with a fixed prompt template and timeout.
#[derive(Clone)]
pub struct Summarizer {
    backend: Arc<dyn SummaryBackend>,
    prompt_template: Option<String>,
    timeout: Option<Duration>,
}

impl Summarizer {
    pub fn new(backend: Arc<dyn SummaryBackend>) -> Self {
        Self {
            backend,
            prompt_template: None,
            timeout: None,
        }
    }

    pub fn from_config(backend: Arc<dyn SummaryBackend>, config: &PipelineConfig) -> Self {
        Self {
            backend,
            prompt_template: config.prompt_template.clone(),
            timeout: (config.api_timeout_secs > 0)
                .then(|| Duration::from_secs(config.api_timeout_secs)),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Summarize one chunk; `index` is only used to label errors.
    pub async fn summarize_chunk(
        &self,
        index: usize,
        chunk: &str,
    ) -> Result<BackendResponse, SummarizationError> {
        if chunk.trim().is_empty() {
            return Err(SummarizationError::EmptyChunk { chunk: index });
        }

        let prompt = summary_prompt(self.prompt_template.as_deref(), chunk);
        let call = self.backend.generate(&prompt);

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                SummarizationError::Timeout {
                    chunk: index,
                    secs: limit.as_secs(),
                }
            })?,
            None => call.await,
        };

        result.map_err(|e| self.chunk_error(index, e))
    }

    fn chunk_error(&self, chunk: usize, e: BackendError) -> SummarizationError {
        let backend = self.backend.name().to_string();
        match e {
            BackendError::Service(detail) => SummarizationError::Service { chunk, detail },
            BackendError::RateLimited { retry_after_secs } => SummarizationError::RateLimited {
                chunk,
                backend,
                retry_after_secs,
            },
            BackendError::Unauthorized(detail) => SummarizationError::Unauthorized {
                chunk,
                backend,
                detail,
            },
            BackendError::EmptyResponse => SummarizationError::EmptyResponse { chunk },
        }
    }
}

/// Spoken notice substituted for a failed chunk.
pub fn placeholder_summary(index: usize) -> String {
    format!("Summary unavailable for part {}.", index + 1)
}

/// Summarize every chunk through a pool of `config.concurrency` workers.
///
/// The returned summaries are sorted by chunk index. Failures follow
/// `config.failure_policy`; an `Unauthorized` failure aborts under either
/// policy, and if every chunk fails the result is
/// [`Pdf2AudioError::AllChunksFailed`].
pub async fn summarize_chunks(
    summarizer: &Summarizer,
    chunks: &[String],
    config: &PipelineConfig,
) -> Result<Vec<ChunkSummary>, Pdf2AudioError> {
    let total = chunks.len();
    let policy = config.failure_policy;
    info!(
        "Summarizing {} chunks with '{}' (concurrency {})",
        total,
        summarizer.backend_name(),
        config.concurrency
    );

    let mut summaries: Vec<ChunkSummary> =
        stream::iter(chunks.iter().enumerate().map(|(index, chunk)| {
            let cb = config.progress_callback.clone();
            async move {
                if let Some(ref cb) = cb {
                    cb.on_chunk_start(index, total);
                }
                let start = Instant::now();
                let result = summarizer.summarize_chunk(index, chunk).await;
                let duration_ms = start.elapsed().as_millis() as u64;
                let source_words = chunk.split_whitespace().count();

                match result {
                    Ok(response) => {
                        debug!(
                            "Chunk {}: {} input tokens, {} output tokens, {}ms",
                            index, response.input_tokens, response.output_tokens, duration_ms
                        );
                        if let Some(ref cb) = cb {
                            cb.on_chunk_complete(index, total, response.text.len());
                        }
                        Ok(ChunkSummary {
                            index,
                            text: response.text,
                            source_words,
                            input_tokens: response.input_tokens,
                            output_tokens: response.output_tokens,
                            duration_ms,
                            error: None,
                        })
                    }
                    Err(e) => {
                        if let Some(ref cb) = cb {
                            cb.on_chunk_error(index, total, &e.to_string());
                        }
                        let fatal = policy == SummaryFailurePolicy::Abort
                            || matches!(e, SummarizationError::Unauthorized { .. });
                        if fatal {
                            return Err(e);
                        }
                        warn!("{}; substituting placeholder", e);
                        Ok(ChunkSummary {
                            index,
                            text: placeholder_summary(index),
                            source_words,
                            input_tokens: 0,
                            output_tokens: 0,
                            duration_ms,
                            error: Some(e),
                        })
                    }
                }
            }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .try_collect()
        .await?;

    summaries.sort_by_key(|s| s.index);

    if !summaries.is_empty() && summaries.iter().all(ChunkSummary::is_placeholder) {
        let first_error = summaries
            .iter()
            .find_map(|s| s.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Pdf2AudioError::AllChunksFailed {
            total: summaries.len(),
            first_error,
        });
    }

    Ok(summaries)
}

/// Join summaries in chunk order, separated by a blank line.
///
/// Order is taken from `ChunkSummary::index`, not slice position, so the
/// result is the same whatever order the summaries completed in.
pub fn join_summaries(summaries: &[ChunkSummary]) -> String {
    let mut ordered: Vec<&ChunkSummary> = summaries.iter().collect();
    ordered.sort_by_key(|s| s.index);
    ordered
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes the last line of the prompt (the chunk) in upper case, failing
    /// on chunks containing "FAIL" and sleeping longer for earlier chunks.
    struct ScriptedBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SummaryBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<BackendResponse, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let chunk = prompt.rsplit("\n\n").next().unwrap_or_default().to_string();
            if chunk.contains("UNAUTHORIZED") {
                return Err(BackendError::Unauthorized("HTTP 403".into()));
            }
            if chunk.contains("FAIL") {
                return Err(BackendError::Service("HTTP 500".into()));
            }
            if chunk.contains("SLOW") {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            // Earlier chunks finish later.
            let delay = 40u64.saturating_sub(chunk.len() as u64 % 40);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(BackendResponse::text(chunk.to_uppercase()))
        }
    }

    fn scripted() -> Arc<ScriptedBackend> {
        Arc::new(ScriptedBackend {
            calls: AtomicUsize::new(0),
        })
    }

    fn config(policy: SummaryFailurePolicy) -> PipelineConfig {
        PipelineConfig::builder()
            .concurrency(4)
            .failure_policy(policy)
            .build()
            .unwrap()
    }

    fn chunks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn summaries_are_sorted_by_chunk_index() {
        let backend = scripted();
        let summarizer = Summarizer::new(backend.clone());
        let input = chunks(&["a", "bb", "ccc", "dddd", "eeeee"]);
        let out = summarize_chunks(&summarizer, &input, &config(SummaryFailurePolicy::Abort))
            .await
            .unwrap();
        let texts: Vec<&str> = out.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "BB", "CCC", "DDDD", "EEEEE"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn placeholder_policy_records_failures_and_continues() {
        let summarizer = Summarizer::new(scripted());
        let input = chunks(&["first", "FAIL here", "third"]);
        let out = summarize_chunks(&summarizer, &input, &config(SummaryFailurePolicy::Placeholder))
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
        assert!(out[1].is_placeholder());
        assert_eq!(out[1].text, "Summary unavailable for part 2.");
        assert_eq!(out[1].error.as_ref().unwrap().chunk(), 1);
        assert_eq!(out[2].text, "THIRD");
    }

    #[tokio::test]
    async fn abort_policy_stops_on_first_failure() {
        let summarizer = Summarizer::new(scripted());
        let input = chunks(&["first", "FAIL here", "third"]);
        let err = summarize_chunks(&summarizer, &input, &config(SummaryFailurePolicy::Abort))
            .await
            .unwrap_err();
        match err {
            Pdf2AudioError::Summarization(SummarizationError::Service { chunk, .. }) => {
                assert_eq!(chunk, 1)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_aborts_even_with_placeholders() {
        let summarizer = Summarizer::new(scripted());
        let input = chunks(&["fine", "UNAUTHORIZED"]);
        let err = summarize_chunks(&summarizer, &input, &config(SummaryFailurePolicy::Placeholder))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Pdf2AudioError::Summarization(SummarizationError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn all_chunks_failing_is_fatal() {
        let summarizer = Summarizer::new(scripted());
        let input = chunks(&["FAIL one", "FAIL two"]);
        let err = summarize_chunks(&summarizer, &input, &config(SummaryFailurePolicy::Placeholder))
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2AudioError::AllChunksFailed { total: 2, .. }));
    }

    #[tokio::test]
    async fn empty_chunk_is_rejected_without_a_call() {
        let backend = scripted();
        let summarizer = Summarizer::new(backend.clone());
        let err = summarizer.summarize_chunk(3, "   ").await.unwrap_err();
        assert_eq!(err, SummarizationError::EmptyChunk { chunk: 3 });
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let config = PipelineConfig::builder().api_timeout_secs(1).build().unwrap();
        let summarizer = Summarizer::from_config(scripted(), &config);
        let err = summarizer.summarize_chunk(0, "SLOW").await.unwrap_err();
        assert_eq!(err, SummarizationError::Timeout { chunk: 0, secs: 1 });
    }

    #[test]
    fn join_uses_index_order_and_blank_lines() {
        let mk = |index: usize, text: &str| ChunkSummary {
            index,
            text: text.to_string(),
            source_words: 1,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            error: None,
        };
        let joined = join_summaries(&[mk(2, "third\n"), mk(0, " first"), mk(1, "second")]);
        assert_eq!(joined, "first\n\nsecond\n\nthird");
    }

    #[test]
    fn missing_credentials_is_a_configuration_error() {
        let config = PipelineConfig::default();
        assert_eq!(
            resolve_backend(&config).err(),
            Some(ConfigurationError::MissingCredentials)
        );
    }

    #[test]
    fn api_key_resolves_to_gemini() {
        let config = PipelineConfig::builder().api_key("AIzaTestKey").build().unwrap();
        let backend = resolve_backend(&config).unwrap();
        assert_eq!(backend.name(), "gemini");
    }

    #[test]
    fn http_errors_are_classified() {
        use reqwest::StatusCode;
        assert_eq!(
            classify_http_error(StatusCode::TOO_MANY_REQUESTS, Some(7), ""),
            BackendError::RateLimited {
                retry_after_secs: Some(7)
            }
        );
        assert!(matches!(
            classify_http_error(StatusCode::FORBIDDEN, None, ""),
            BackendError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_http_error(
                StatusCode::BAD_REQUEST,
                None,
                r#"{"error":{"status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#
            ),
            BackendError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_http_error(StatusCode::INTERNAL_SERVER_ERROR, None, "oops"),
            BackendError::Service(_)
        ));
    }

    #[test]
    fn provider_errors_are_classified() {
        assert!(matches!(
            classify_provider_error("API error 429: Too Many Requests"),
            BackendError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_provider_error("401 Unauthorized"),
            BackendError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_provider_error("connection reset"),
            BackendError::Service(_)
        ));
    }

    #[test]
    fn gemini_response_parsing() {
        let json = r#"{
            "candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "world."}]}}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        let r = parsed.into_backend_response().unwrap();
        assert_eq!(r.text, "Hello world.");
        assert_eq!((r.input_tokens, r.output_tokens), (12, 3));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(
            empty.into_backend_response().unwrap_err(),
            BackendError::EmptyResponse
        );
    }

    #[test]
    fn gemini_request_shape() {
        let backend = GeminiBackend::new("AIzaTestKey", "gemini-2.0-flash")
            .unwrap()
            .with_generation(0.2, 1024);
        let body = serde_json::to_value(backend.request_body("hi")).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(
            backend.model_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash"
        );
    }
}
