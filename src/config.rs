//! Configuration types for PDF-to-audio conversion.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Credentials live here too: the summarizer
//! receives its API key from the config at construction time, never from
//! process-wide state, so tests can run with fake keys or a fake backend.

use crate::error::ConfigurationError;
use crate::pipeline::extract::ExtractionCache;
use crate::pipeline::speech::{SpeechBackend, VoiceSelection};
use crate::pipeline::summarize::SummaryBackend;
use crate::progress::ProgressCallback;
use crate::prompts::TEXT_PLACEHOLDER;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default chunk size cap, in characters of joined words.
pub const DEFAULT_CHUNK_SIZE: usize = 3000;

/// Default Gemini model used when only an API key is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Configuration for a PDF-to-audio run.
///
/// Built via [`PipelineConfig::builder()`]. `PipelineConfig::default()` has no
/// credentials; running with it fails with
/// [`ConfigurationError::MissingCredentials`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2audio::{PipelineConfig, SummaryFailurePolicy};
///
/// let config = PipelineConfig::builder()
///     .api_key("AIza-example-key")
///     .chunk_size(3000)
///     .concurrency(4)
///     .failure_policy(SummaryFailurePolicy::Abort)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Maximum chunk size in characters (joined words). Default: 3000.
    ///
    /// A single word longer than this still becomes its own chunk.
    pub chunk_size: usize,

    /// Number of chunks summarized concurrently. Default: 4.
    ///
    /// `1` gives a plain sequential loop. Keep this low enough to stay under
    /// the service's rate limit; there are no retries.
    pub concurrency: usize,

    /// What to do when one chunk fails. Default: [`SummaryFailurePolicy::Placeholder`].
    pub failure_policy: SummaryFailurePolicy,

    /// API key for the Gemini backend.
    pub api_key: Option<String>,

    /// Model identifier. If None, uses [`DEFAULT_GEMINI_MODEL`] (or the
    /// provider default when `provider_name` is set).
    pub model: Option<String>,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    /// Takes precedence over `api_key`; the provider reads its own key.
    pub provider_name: Option<String>,

    /// Pre-constructed summarization backend. Takes precedence over everything.
    pub summary_backend: Option<Arc<dyn SummaryBackend>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens generated per chunk summary. Default: 2048.
    pub max_tokens: usize,

    /// Per-chunk LLM call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Validate credentials with a cheap request before reading the input. Default: true.
    pub verify_credentials: bool,

    /// Custom summary prompt; must contain `{text}`. If None, uses the built-in one.
    pub prompt_template: Option<String>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Produce `Section N` timestamp markers. Default: true.
    pub timestamps: bool,

    /// Write `<name>_summary.txt` next to the audio. Default: true.
    pub write_transcript: bool,

    /// Bundle all outputs into `<name>.zip`. Default: true.
    pub create_archive: bool,

    /// Speech synthesis settings.
    pub speech: SpeechConfig,

    /// Pre-constructed speech backend. Takes precedence over `speech.backend`.
    pub speech_backend: Option<Arc<dyn SpeechBackend>>,

    /// Memoizes extracted text by document content. None disables memoization.
    pub extraction_cache: Option<Arc<ExtractionCache>>,

    /// Receives stage and chunk events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: 4,
            failure_policy: SummaryFailurePolicy::default(),
            api_key: None,
            model: None,
            provider_name: None,
            summary_backend: None,
            temperature: 0.3,
            max_tokens: 2048,
            api_timeout_secs: 60,
            verify_credentials: true,
            prompt_template: None,
            password: None,
            download_timeout_secs: 120,
            timestamps: true,
            write_transcript: true,
            create_archive: true,
            speech: SpeechConfig::default(),
            speech_backend: None,
            extraction_cache: Some(Arc::new(ExtractionCache::new())),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("chunk_size", &self.chunk_size)
            .field("concurrency", &self.concurrency)
            .field("failure_policy", &self.failure_policy)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field(
                "summary_backend",
                &self.summary_backend.as_ref().map(|b| b.name().to_string()),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("verify_credentials", &self.verify_credentials)
            .field("timestamps", &self.timestamps)
            .field("write_transcript", &self.write_transcript)
            .field("create_archive", &self.create_archive)
            .field("speech", &self.speech)
            .field(
                "speech_backend",
                &self.speech_backend.as_ref().map(|b| b.name().to_string()),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn failure_policy(mut self, policy: SummaryFailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn summary_backend(mut self, backend: Arc<dyn SummaryBackend>) -> Self {
        self.config.summary_backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn verify_credentials(mut self, v: bool) -> Self {
        self.config.verify_credentials = v;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn timestamps(mut self, v: bool) -> Self {
        self.config.timestamps = v;
        self
    }

    pub fn write_transcript(mut self, v: bool) -> Self {
        self.config.write_transcript = v;
        self
    }

    pub fn create_archive(mut self, v: bool) -> Self {
        self.config.create_archive = v;
        self
    }

    pub fn speech(mut self, speech: SpeechConfig) -> Self {
        self.config.speech = speech;
        self
    }

    pub fn tts_backend(mut self, kind: SpeechBackendKind) -> Self {
        self.config.speech.backend = kind;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.speech.language = language.into();
        self
    }

    pub fn voice(mut self, voice: VoiceSelection) -> Self {
        self.config.speech.voice = voice;
        self
    }

    pub fn speech_rate(mut self, wpm: u32) -> Self {
        self.config.speech.rate = wpm.clamp(80, 450);
        self
    }

    pub fn speech_backend(mut self, backend: Arc<dyn SpeechBackend>) -> Self {
        self.config.speech_backend = Some(backend);
        self
    }

    pub fn extraction_cache(mut self, cache: Option<Arc<ExtractionCache>>) -> Self {
        self.config.extraction_cache = cache;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Credentials are only checked for shape here; whether any credentials
    /// exist at all is decided when the pipeline resolves its backend.
    pub fn build(self) -> Result<PipelineConfig, ConfigurationError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(ConfigurationError::Invalid(
                "Chunk size must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ConfigurationError::Invalid(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if let Some(ref key) = c.api_key {
            validate_api_key(key)?;
        }
        if let Some(ref template) = c.prompt_template {
            if !template.contains(TEXT_PLACEHOLDER) {
                return Err(ConfigurationError::Invalid(format!(
                    "Prompt template must contain the {TEXT_PLACEHOLDER} placeholder"
                )));
            }
        }
        if c.speech.language.trim().is_empty() {
            return Err(ConfigurationError::Invalid(
                "Speech language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Reject API keys that cannot possibly be valid.
///
/// This is a shape check only; [`crate::pipeline::summarize::SummaryBackend::verify`]
/// asks the service.
pub fn validate_api_key(key: &str) -> Result<(), ConfigurationError> {
    if key.trim().is_empty() {
        return Err(ConfigurationError::InvalidApiKey {
            reason: "key is empty".into(),
        });
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ConfigurationError::InvalidApiKey {
            reason: "key contains whitespace or control characters".into(),
        });
    }
    Ok(())
}

// ── Speech ───────────────────────────────────────────────────────────────

/// Speech synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Which built-in backend to use. Default: [`SpeechBackendKind::Network`].
    pub backend: SpeechBackendKind,

    /// Language code, e.g. "en", "fr". Default: "en".
    ///
    /// The network backend validates it against its language table; the local
    /// engine uses the selected voice's language instead.
    pub language: String,

    /// Voice selection (local engine only). Default: [`VoiceSelection::Default`].
    pub voice: VoiceSelection,

    /// Speaking rate in words per minute (local engine only). Default: 150.
    pub rate: u32,

    /// Local engine executable. Default: "espeak-ng".
    pub engine_program: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            backend: SpeechBackendKind::default(),
            language: "en".to_string(),
            voice: VoiceSelection::default(),
            rate: 150,
            engine_program: "espeak-ng".to_string(),
        }
    }
}

/// Built-in speech backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpeechBackendKind {
    /// Google Translate TTS over HTTPS; MP3 output, language selectable.
    #[default]
    Network,
    /// Local `espeak-ng` engine; WAV output, voice and rate selectable.
    Local,
}

// ── Summaries ────────────────────────────────────────────────────────────

/// What to do when a single chunk fails to summarize.
///
/// | Policy | Effect |
/// |--------|--------|
/// | `Placeholder` | Substitute a short spoken notice, record the failure, continue (default) |
/// | `Abort` | Fail the whole job on the first failed chunk |
///
/// Under either policy a credentials rejection aborts the job, and a run in
/// which every chunk fails is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SummaryFailurePolicy {
    #[default]
    Placeholder,
    Abort,
}
