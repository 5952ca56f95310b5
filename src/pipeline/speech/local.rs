//! Offline speech through a local `espeak-ng` process.
//!
//! The engine reads text on stdin and writes a WAV file itself, so nothing
//! but the exit status comes back over the pipe.

use super::{AudioFormat, Gender, SpeechBackend, SpeechRequest, Voice};
use crate::error::SynthesisError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const BACKEND_NAME: &str = "espeak-ng";

pub struct LocalTts {
    program: String,
}

impl Default for LocalTts {
    fn default() -> Self {
        Self::new(BACKEND_NAME)
    }
}

impl LocalTts {
    /// `program` is the engine executable, looked up on `PATH`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn unavailable(&self, detail: String) -> SynthesisError {
        SynthesisError::BackendUnavailable {
            backend: BACKEND_NAME.to_string(),
            detail: format!("{} ({})", detail, self.program),
        }
    }

    fn failed(&self, detail: String) -> SynthesisError {
        SynthesisError::EngineFailed {
            backend: BACKEND_NAME.to_string(),
            detail,
        }
    }
}

/// Parse the table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
///  2  en-us           --/M      English_(America)  gmw/en-US            (en 2)
/// ```
pub fn parse_voice_list(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let language = cols.next()?;
            let age_gender = cols.next()?;
            let name = cols.next()?;
            let gender = match age_gender.rsplit('/').next() {
                Some("M") => Some(Gender::Male),
                Some("F") => Some(Gender::Female),
                _ => None,
            };
            Some(Voice {
                id: language.to_string(),
                name: name.to_string(),
                language: language.to_string(),
                gender,
            })
        })
        .collect()
}

#[async_trait]
impl SpeechBackend for LocalTts {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, SynthesisError> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .output()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failed(format!("--voices: {}", stderr.trim())));
        }
        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn synthesize(
        &self,
        request: &SpeechRequest<'_>,
        output: &Path,
    ) -> Result<u64, SynthesisError> {
        let mut cmd = Command::new(&self.program);
        if let Some(voice) = request.voice {
            cmd.args(["-v", voice.id.as_str()]);
        } else {
            cmd.args(["-v", request.language]);
        }
        cmd.arg("-s")
            .arg(request.rate.to_string())
            .arg("-w")
            .arg(output)
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!("Running {:?}", cmd);
        match self.run_engine(cmd, request.text, output).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                // The engine may have started the WAV before failing.
                let _ = tokio::fs::remove_file(output).await;
                Err(e)
            }
        }
    }
}

impl LocalTts {
    /// Spawn the engine, feed `text` on stdin, and check what it wrote.
    async fn run_engine(
        &self,
        mut cmd: Command,
        text: &str,
        output: &Path,
    ) -> Result<u64, SynthesisError> {
        let mut child = cmd.spawn().map_err(|e| self.unavailable(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| self.failed(format!("writing text to engine: {e}")))?;
        }

        let result = child
            .wait_with_output()
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(self.failed(format!("exit {}: {}", result.status, stderr.trim())));
        }

        let meta = tokio::fs::metadata(output)
            .await
            .map_err(|source| SynthesisError::Io {
                path: output.to_path_buf(),
                source,
            })?;
        if meta.len() == 0 {
            return Err(self.failed("engine produced an empty file".to_string()));
        }
        Ok(meta.len())
    }
}
