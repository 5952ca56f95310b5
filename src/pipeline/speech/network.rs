//! Google Translate text-to-speech over HTTPS.
//!
//! The endpoint accepts short utterances only, so the text is cut into
//! word-bounded pieces of at most [`MAX_PIECE_CHARS`] characters with the
//! same chunker used for summarization; a single longer word is split on
//! character boundaries. Pieces are fetched a few at a time but written in
//! order; concatenated MP3 frames play back as one stream.

use super::{AudioFormat, SpeechBackend, SpeechRequest, Voice};
use crate::error::SynthesisError;
use crate::pipeline::chunk::chunk_text;
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Longest piece the endpoint reliably accepts.
pub const MAX_PIECE_CHARS: usize = 100;

/// Requests in flight at once.
const FETCH_CONCURRENCY: usize = 4;

const BACKEND_NAME: &str = "google-translate-tts";

/// Language codes the endpoint speaks.
const SUPPORTED_LANGUAGES: &[&str] = &[
    "af", "ar", "bg", "bn", "bs", "ca", "cs", "cy", "da", "de", "el", "en", "eo", "es", "et",
    "fi", "fr", "gu", "hi", "hr", "hu", "hy", "id", "is", "it", "iw", "ja", "jw", "km", "kn",
    "ko", "la", "lv", "mk", "ml", "mr", "ms", "my", "ne", "nl", "no", "pl", "pt", "ro", "ru",
    "si", "sk", "sq", "sr", "su", "sv", "sw", "ta", "te", "th", "tl", "tr", "uk", "ur", "vi",
    "zh", "zh-cn", "zh-tw",
];

/// Whether `language` (e.g. "en", "en-GB", "zh-TW") is accepted.
pub fn is_supported_language(language: &str) -> bool {
    let lang = language.trim().to_ascii_lowercase();
    let base = lang.split(['-', '_']).next().unwrap_or_default();
    SUPPORTED_LANGUAGES.contains(&lang.as_str()) || SUPPORTED_LANGUAGES.contains(&base)
}

/// Cut `text` into request-sized pieces, in reading order.
pub fn speech_pieces(text: &str) -> Vec<String> {
    chunk_text(text, MAX_PIECE_CHARS)
        .into_iter()
        .flat_map(|piece| {
            if piece.chars().count() <= MAX_PIECE_CHARS {
                return vec![piece];
            }
            let chars: Vec<char> = piece.chars().collect();
            chars
                .chunks(MAX_PIECE_CHARS)
                .map(|c| c.iter().collect())
                .collect()
        })
        .collect()
}

pub struct NetworkTts {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for NetworkTts {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkTts {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: TTS_URL.to_string(),
        }
    }

    /// Use a different endpoint (mirrors, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch_piece(
        &self,
        piece: &str,
        language: &str,
        index: usize,
        total: usize,
    ) -> Result<Vec<u8>, SynthesisError> {
        let total_s = total.to_string();
        let index_s = index.to_string();
        let len_s = piece.chars().count().to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language),
                ("q", piece),
                ("total", total_s.as_str()),
                ("idx", index_s.as_str()),
                ("textlen", len_s.as_str()),
            ])
            .send()
            .await
            .map_err(|e| unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {status} for piece {index}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| unavailable(format!("reading audio failed: {e}")))?;
        if bytes.is_empty() {
            return Err(unavailable(format!("empty audio for piece {index}")));
        }
        Ok(bytes.to_vec())
    }
}

fn unavailable(detail: String) -> SynthesisError {
    SynthesisError::BackendUnavailable {
        backend: BACKEND_NAME.to_string(),
        detail,
    }
}

#[async_trait]
impl SpeechBackend for NetworkTts {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    fn supports_voice_selection(&self) -> bool {
        false
    }

    fn check_language(&self, language: &str) -> Result<(), SynthesisError> {
        if is_supported_language(language) {
            Ok(())
        } else {
            Err(SynthesisError::UnsupportedLanguage {
                backend: BACKEND_NAME.to_string(),
                language: language.to_string(),
            })
        }
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, SynthesisError> {
        Ok(Vec::new())
    }

    async fn synthesize(
        &self,
        request: &SpeechRequest<'_>,
        output: &Path,
    ) -> Result<u64, SynthesisError> {
        self.check_language(request.language)?;

        let pieces = speech_pieces(request.text);
        if pieces.is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        let total = pieces.len();
        debug!("Fetching {} speech pieces", total);

        // `buffered` keeps input order, unlike `buffer_unordered`.
        let audio = stream::iter(pieces.iter().enumerate())
            .map(|(i, piece)| self.fetch_piece(piece, request.language, i, total))
            .buffered(FETCH_CONCURRENCY)
            .boxed();

        let file = tokio::fs::File::create(output)
            .await
            .map_err(|source| SynthesisError::Io {
                path: output.to_path_buf(),
                source,
            })?;

        match append_pieces(file, audio, output).await {
            Ok(written) => Ok(written),
            Err(e) => {
                // A truncated MP3 still plays; never leave one behind.
                let _ = tokio::fs::remove_file(output).await;
                Err(e)
            }
        }
    }
}

/// Write pieces to `file` as they arrive. The file is closed on return.
async fn append_pieces(
    mut file: tokio::fs::File,
    pieces: impl Stream<Item = Result<Vec<u8>, SynthesisError>>,
    output: &Path,
) -> Result<u64, SynthesisError> {
    let io_err = |source| SynthesisError::Io {
        path: output.to_path_buf(),
        source,
    };
    let mut pieces = std::pin::pin!(pieces);
    let mut written = 0u64;
    while let Some(piece) = pieces.next().await {
        let bytes = piece?;
        file.write_all(&bytes).await.map_err(io_err)?;
        written += bytes.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve `[idx]` for every request, slower for earlier pieces, or HTTP
    /// 500 for `fail_idx`. Returns the endpoint URL.
    async fn piece_server(fail_idx: Option<usize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&request).to_string();
                    let idx: usize = head
                        .split("idx=")
                        .nth(1)
                        .map(|rest| rest.chars().take_while(char::is_ascii_digit).collect())
                        .and_then(|digits: String| digits.parse().ok())
                        .unwrap_or(0);
                    let delay = 40 * (5 - idx.min(5)) as u64;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    let (status, body) = if fail_idx == Some(idx) {
                        ("500 Internal Server Error", String::new())
                    } else {
                        ("200 OK", format!("[{idx}]"))
                    };
                    let response = format!(
                        "HTTP/1.1 {status}\r\nContent-Length: {}\r\n\
                         Connection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/translate_tts")
    }

    /// Thirty ten-character words: three pieces of ten words each.
    fn three_pieces_of_text() -> String {
        vec!["narration"; 30].join(" ")
    }

    #[test]
    fn language_table() {
        assert!(is_supported_language("en"));
        assert!(is_supported_language("EN-gb"));
        assert!(is_supported_language("zh-TW"));
        assert!(is_supported_language("pt_BR"));
        assert!(!is_supported_language("tlh"));
        assert!(!is_supported_language(""));
    }

    #[test]
    fn pieces_respect_endpoint_limit() {
        let text = vec!["narration"; 200].join(" ");
        let pieces = speech_pieces(&text);
        assert!(pieces.iter().all(|p| p.chars().count() <= MAX_PIECE_CHARS));
        assert_eq!(speech_pieces(&three_pieces_of_text()).len(), 3);
    }

    #[test]
    fn overlong_word_is_split_on_char_boundaries() {
        let word = "é".repeat(250);
        let pieces = speech_pieces(&format!("intro {word} outro"));
        assert_eq!(pieces.len(), 5);
        assert_eq!(pieces[0], "intro");
        assert_eq!(pieces[1].chars().count(), 100);
        assert_eq!(pieces[2].chars().count(), 100);
        assert_eq!(pieces[3].chars().count(), 50);
        assert_eq!(pieces[4], "outro");
        assert_eq!(pieces[1..4].concat(), word);
    }

    #[tokio::test]
    async fn pieces_are_appended_in_order_despite_completion_order() {
        let tts = NetworkTts::new().with_endpoint(piece_server(None).await);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.mp3");
        let text = three_pieces_of_text();
        let request = SpeechRequest {
            text: &text,
            language: "en",
            voice: None,
            rate: 150,
        };

        let written = tts.synthesize(&request, &out).await.unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(bytes, b"[0][1][2]");
        assert_eq!(written, bytes.len() as u64);
    }

    #[tokio::test]
    async fn failure_after_some_pieces_removes_the_partial_file() {
        let tts = NetworkTts::new().with_endpoint(piece_server(Some(2)).await);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.mp3");
        let text = three_pieces_of_text();
        let request = SpeechRequest {
            text: &text,
            language: "en",
            voice: None,
            rate: 150,
        };

        let err = tts.synthesize(&request, &out).await.unwrap_err();
        assert!(matches!(err, SynthesisError::BackendUnavailable { .. }), "got {err:?}");
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn unsupported_language_fails_before_any_request() {
        let tts = NetworkTts::new().with_endpoint("http://127.0.0.1:9/unreachable");
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.mp3");
        let request = SpeechRequest {
            text: "hello",
            language: "tlh",
            voice: None,
            rate: 150,
        };
        let err = tts.synthesize(&request, &out).await.unwrap_err();
        assert!(matches!(err, SynthesisError::UnsupportedLanguage { .. }));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_backend_unavailable() {
        let tts = NetworkTts::new().with_endpoint("http://127.0.0.1:9/unreachable");
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.mp3");
        let request = SpeechRequest {
            text: "hello world",
            language: "en",
            voice: None,
            rate: 150,
        };
        let err = tts.synthesize(&request, &out).await.unwrap_err();
        assert!(matches!(err, SynthesisError::BackendUnavailable { .. }));
        assert!(!out.exists());
    }
}
