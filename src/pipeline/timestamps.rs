//! Approximate `Section N` markers for the narrated summary.
//!
//! There is no alignment with the real audio: each sentence is assumed to
//! take half a second per word, and a marker is placed every five sentences.
//! Good enough to skip around a long recording.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds of speech assumed per word.
pub const SECONDS_PER_WORD: f64 = 0.5;

/// Sentences per section.
pub const SENTENCES_PER_SECTION: usize = 5;

/// One estimated section start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampMarker {
    /// 1-based section number.
    pub section: usize,
    /// 0-based index of the sentence that opens the section.
    pub sentence_index: usize,
    /// Estimated elapsed seconds before that sentence.
    pub elapsed_secs: f64,
}

impl fmt::Display for TimestampMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Section {}: {:.2}s", self.section, self.elapsed_secs)
    }
}

/// Split text into sentences at `.`, `!` or `?` followed by whitespace.
///
/// The terminator stays with its sentence. Blank pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_i, next_c)) = chars.peek() {
                if next_c.is_whitespace() {
                    push_sentence(&mut sentences, &text[start..next_i]);
                    start = next_i;
                }
            }
        }
    }
    push_sentence(&mut sentences, &text[start..]);
    sentences
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, piece: &'a str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        sentences.push(piece);
    }
}

/// Estimate section markers for `text`.
///
/// N sentences give `ceil(N / 5)` markers; section 1 is always at 0.00s.
pub fn estimate_timestamps(text: &str) -> Vec<TimestampMarker> {
    let mut markers = Vec::new();
    let mut elapsed = 0.0_f64;

    for (i, sentence) in split_sentences(text).into_iter().enumerate() {
        if i % SENTENCES_PER_SECTION == 0 {
            markers.push(TimestampMarker {
                section: i / SENTENCES_PER_SECTION + 1,
                sentence_index: i,
                elapsed_secs: elapsed,
            });
        }
        elapsed += sentence.split_whitespace().count() as f64 * SECONDS_PER_WORD;
    }
    markers
}

/// One marker per line, newline-terminated.
pub fn render_timestamps(markers: &[TimestampMarker]) -> String {
    markers.iter().map(|m| format!("{m}\n")).collect()
}
