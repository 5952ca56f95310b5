//! Speech synthesis: cleaned summary text → audio file.
//!
//! Two backends implement [`SpeechBackend`]:
//!
//! | Backend | Output | Language | Voice choice | Network |
//! |---------|--------|----------|--------------|---------|
//! | [`NetworkTts`] | MP3 | selectable | none | yes |
//! | [`LocalTts`]   | WAV | from the voice | discrete voices, rate | no |
//!
//! Voice selection is resolved against the backend's live voice list before
//! anything expensive runs, so a bad index fails the job up front instead of
//! after the summaries have been paid for. There is never a silent fallback
//! to the default voice.

pub mod clean;
pub mod local;
pub mod network;

pub use clean::clean_for_speech;
pub use local::LocalTts;
pub use network::NetworkTts;

use crate::config::{PipelineConfig, SpeechBackendKind, SpeechConfig};
use crate::error::SynthesisError;
use crate::output::AudioArtifact;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Container format of the synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Gender::Male),
            "f" | "female" => Ok(Gender::Female),
            other => Err(format!("unknown gender '{other}'")),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "male",
            Gender::Female => "female",
        })
    }
}

/// A voice installed in a speech backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Stable identifier passed back to the engine.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Language code the voice speaks.
    pub language: String,
    pub gender: Option<Gender>,
}

/// Which voice to synthesize with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceSelection {
    /// The backend's own default.
    #[default]
    Default,
    /// Stable id as reported by [`SpeechBackend::list_voices`].
    Id(String),
    /// Position in the voice list. Not stable across machines; validated
    /// against the live list.
    Index(usize),
    /// First voice of this gender.
    Gender(Gender),
}

impl VoiceSelection {
    /// Parse a user-facing voice argument: `male`/`female`, a number, or an id.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("default") {
            return VoiceSelection::Default;
        }
        if let Ok(gender) = s.parse::<Gender>() {
            return VoiceSelection::Gender(gender);
        }
        if let Ok(index) = s.parse::<usize>() {
            return VoiceSelection::Index(index);
        }
        VoiceSelection::Id(s.to_string())
    }
}

impl fmt::Display for VoiceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceSelection::Default => f.write_str("default"),
            VoiceSelection::Id(id) => f.write_str(id),
            VoiceSelection::Index(i) => write!(f, "#{i}"),
            VoiceSelection::Gender(g) => write!(f, "{g}"),
        }
    }
}

/// Pick the voice `selection` refers to from `voices`.
///
/// `Default` resolves to `None` (engine default). Everything else must match
/// exactly one installed voice or fail.
pub fn resolve_voice(
    selection: &VoiceSelection,
    voices: &[Voice],
) -> Result<Option<Voice>, SynthesisError> {
    match selection {
        VoiceSelection::Default => Ok(None),
        VoiceSelection::Index(index) => voices
            .get(*index)
            .cloned()
            .map(Some)
            .ok_or(SynthesisError::VoiceIndexOutOfRange {
                index: *index,
                available: voices.len(),
            }),
        VoiceSelection::Id(id) => voices
            .iter()
            .find(|v| v.id == *id || v.name.eq_ignore_ascii_case(id))
            .cloned()
            .map(Some)
            .ok_or_else(|| SynthesisError::VoiceNotFound {
                requested: id.clone(),
            }),
        VoiceSelection::Gender(gender) => voices
            .iter()
            .find(|v| v.gender == Some(*gender))
            .cloned()
            .map(Some)
            .ok_or_else(|| SynthesisError::VoiceNotFound {
                requested: gender.to_string(),
            }),
    }
}

/// One synthesis job.
#[derive(Debug, Clone)]
pub struct SpeechRequest<'a> {
    /// Already cleaned text.
    pub text: &'a str,
    pub language: &'a str,
    pub voice: Option<&'a Voice>,
    /// Words per minute; ignored by backends without rate control.
    pub rate: u32,
}

/// A text-to-speech engine.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Format of the files [`synthesize`](Self::synthesize) writes.
    fn format(&self) -> AudioFormat;

    /// Whether a non-default [`VoiceSelection`] makes sense.
    fn supports_voice_selection(&self) -> bool {
        true
    }

    /// Fail early if the backend cannot speak `language`.
    fn check_language(&self, language: &str) -> Result<(), SynthesisError> {
        let _ = language;
        Ok(())
    }

    /// Installed voices, in a stable order.
    async fn list_voices(&self) -> Result<Vec<Voice>, SynthesisError>;

    /// Synthesize `request.text` into `output`, returning the bytes written.
    async fn synthesize(
        &self,
        request: &SpeechRequest<'_>,
        output: &Path,
    ) -> Result<u64, SynthesisError>;
}

/// Build the speech backend for `config`.
///
/// A pre-built `config.speech_backend` wins over `config.speech.backend`.
pub fn resolve_speech_backend(config: &PipelineConfig) -> Arc<dyn SpeechBackend> {
    if let Some(ref backend) = config.speech_backend {
        return Arc::clone(backend);
    }
    match config.speech.backend {
        SpeechBackendKind::Network => Arc::new(NetworkTts::new()),
        SpeechBackendKind::Local => Arc::new(LocalTts::new(config.speech.engine_program.clone())),
    }
}

/// Validate language and voice selection against `backend`.
///
/// Runs before extraction so that voice errors, and a missing local engine,
/// surface before any LLM call.
pub async fn prepare_voice(
    backend: &dyn SpeechBackend,
    speech: &SpeechConfig,
) -> Result<Option<Voice>, SynthesisError> {
    if speech.voice == VoiceSelection::Default {
        backend.check_language(&speech.language)?;
        if backend.supports_voice_selection() {
            // Listing voices doubles as a check that the engine runs at all.
            let voices = backend.list_voices().await?;
            debug!("{} voices available from '{}'", voices.len(), backend.name());
        }
        return Ok(None);
    }
    if !backend.supports_voice_selection() {
        return Err(SynthesisError::VoiceSelectionUnsupported {
            backend: backend.name().to_string(),
        });
    }
    let voices = backend.list_voices().await?;
    debug!("{} voices available from '{}'", voices.len(), backend.name());
    let voice = resolve_voice(&speech.voice, &voices)?;
    if let Some(ref v) = voice {
        info!("Using voice '{}' ({})", v.name, v.id);
    }
    Ok(voice)
}

/// Clean `text` and synthesize it to `output`.
pub async fn synthesize_speech(
    backend: &dyn SpeechBackend,
    text: &str,
    voice: Option<&Voice>,
    speech: &SpeechConfig,
    output: &Path,
) -> Result<AudioArtifact, SynthesisError> {
    let cleaned = clean_for_speech(text);
    if cleaned.is_empty() {
        return Err(SynthesisError::EmptyText);
    }

    let language = voice
        .map(|v| v.language.as_str())
        .unwrap_or(speech.language.as_str());

    info!(
        "Synthesizing {} chars with '{}' → {}",
        cleaned.len(),
        backend.name(),
        output.display()
    );

    let request = SpeechRequest {
        text: &cleaned,
        language,
        voice,
        rate: speech.rate,
    };
    let bytes = backend.synthesize(&request, output).await?;

    Ok(AudioArtifact {
        path: output.to_path_buf(),
        format: backend.format(),
        bytes,
        backend: backend.name().to_string(),
        voice: voice.map(|v| v.id.clone()),
        language: language.to_string(),
    })
}
