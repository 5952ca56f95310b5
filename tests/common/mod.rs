//! Shared fixtures: in-memory PDFs and fake backends.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pdf2audio::pipeline::speech::SpeechRequest;
use edgequake_pdf2audio::pipeline::summarize::{BackendError, BackendResponse};
use edgequake_pdf2audio::{
    AudioFormat, Gender, SpeechBackend, SummaryBackend, SynthesisError, Voice,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Build a PDF with one page per entry of `pages`, each drawn as a single
/// line of Courier text.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    pdf_with_info(pages, None)
}

/// Like [`pdf_with_pages`] with an optional `/Title` in the Info dictionary.
pub fn pdf_with_info(pages: &[&str], title: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![20.into(), 800.into()]),
        ];
        if !text.is_empty() {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(title) = title {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Author" => Object::string_literal("Test Author"),
        });
        doc.trailer.set("Info", info_id);
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// `n` distinct lowercase words of five letters.
pub fn five_char_words(n: usize) -> String {
    (0..n)
        .map(|i| {
            let mut w = String::with_capacity(5);
            let mut k = i;
            for _ in 0..5 {
                w.push((b'a' + (k % 26) as u8) as char);
                k /= 26;
            }
            w
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summary backend that answers "Summary of <first word>." Use with the
/// `{text}` prompt template so the prompt is the chunk itself.
#[derive(Default)]
pub struct FakeSummaryBackend {
    pub calls: AtomicUsize,
    pub verifications: AtomicUsize,
    /// Chunks containing this word fail with a service error.
    pub fail_on: Option<String>,
    /// Reject `verify()` as unauthorized.
    pub reject_credentials: bool,
    /// Sleep longer for chunks that sort earlier, so completion order is
    /// the reverse of chunk order.
    pub scramble: bool,
}

#[async_trait]
impl SummaryBackend for FakeSummaryBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str) -> Result<BackendResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref word) = self.fail_on {
            if prompt.contains(word.as_str()) {
                return Err(BackendError::Service("HTTP 500".into()));
            }
        }
        let first = prompt.split_whitespace().next().unwrap_or_default();
        if self.scramble {
            let rank = first.bytes().next().unwrap_or(b'z');
            let delay = u64::from(b'z'.saturating_sub(rank)) * 5;
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(BackendResponse {
            text: format!("Summary of {first}."),
            input_tokens: prompt.split_whitespace().count(),
            output_tokens: 3,
        })
    }

    async fn verify(&self) -> Result<(), BackendError> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        if self.reject_credentials {
            Err(BackendError::Unauthorized("HTTP 403".into()))
        } else {
            Ok(())
        }
    }
}

/// Speech backend that writes the cleaned text as the "audio" bytes.
pub struct FakeSpeechBackend {
    pub voices: Vec<Voice>,
    pub requests: Mutex<Vec<(String, Option<String>, String)>>,
}

impl Default for FakeSpeechBackend {
    fn default() -> Self {
        Self {
            voices: vec![
                Voice {
                    id: "en-us".into(),
                    name: "English".into(),
                    language: "en-us".into(),
                    gender: Some(Gender::Male),
                },
                Voice {
                    id: "fr-fr".into(),
                    name: "French".into(),
                    language: "fr-fr".into(),
                    gender: Some(Gender::Female),
                },
            ],
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpeechBackend for FakeSpeechBackend {
    fn name(&self) -> &str {
        "fake-tts"
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, SynthesisError> {
        Ok(self.voices.clone())
    }

    async fn synthesize(
        &self,
        request: &SpeechRequest<'_>,
        output: &Path,
    ) -> Result<u64, SynthesisError> {
        self.requests.lock().unwrap().push((
            request.text.to_string(),
            request.voice.map(|v| v.id.clone()),
            request.language.to_string(),
        ));
        std::fs::write(output, request.text.as_bytes()).map_err(|source| SynthesisError::Io {
            path: output.to_path_buf(),
            source,
        })?;
        Ok(request.text.len() as u64)
    }
}
