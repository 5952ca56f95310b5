//! Text chunking: split extracted text into word-bounded chunks.
//!
//! Greedy accumulation: words are appended to the current chunk until the
//! next word would push the joined length past the cap, then a new chunk
//! starts. The size of a chunk is its joined length in characters (word
//! lengths plus one space between consecutive words), so a rejoined chunk
//! never exceeds the cap unless it is a single oversized word, which is kept
//! whole rather than split.
//!
//! Chunks partition the word sequence: concatenating their words gives back
//! the original words, in order, with nothing dropped or duplicated.

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Words are whitespace-separated; each chunk re-joins its words with a
/// single space. Empty or whitespace-only input yields no chunks.
///
/// ```rust
/// use edgequake_pdf2audio::pipeline::chunk::chunk_text;
///
/// let chunks = chunk_text("one two three four", 9);
/// assert_eq!(chunks, vec!["one two", "three", "four"]);
/// ```
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}
