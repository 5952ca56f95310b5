//! Text preparation for speech engines.
//!
//! Markup and punctuation symbols are stripped so the engine does not read
//! them aloud ("asterisk asterisk"). Apostrophes are kept: "don't" must stay
//! one pronounceable word.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_SYMBOLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[*@#^&(){}\[\]:;<>,.!?"“”`]"#).unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Remove speech-hostile symbols, collapse whitespace, trim.
pub fn clean_for_speech(text: &str) -> String {
    let stripped = RE_SYMBOLS.replace_all(text, "");
    RE_WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}
