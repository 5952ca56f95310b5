//! Pipeline stages for PDF-to-audio conversion.
//!
//! Each submodule implements exactly one transformation step and can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ summarize ──▶ timestamps ──▶ speech ──▶ package
//! (URL/path) (lopdf)   (words)   (LLM, join)   (estimate)    (TTS)      (zip)
//! ```
//!
//! 1. [`input`]: load the user-supplied path, URL or bytes; check `%PDF`
//! 2. [`extract`]: page text in page order; runs in `spawn_blocking`,
//!    memoized by content digest
//! 3. [`chunk`]: greedy word-bounded chunks under a character cap
//! 4. [`summarize`]: one LLM call per chunk through a bounded pool, then
//!    join in chunk order; the only stage that talks to the LLM
//! 5. [`timestamps`]: approximate `Section N` markers from the summary
//! 6. [`speech`]: clean the summary and synthesize audio
//! 7. [`package`]: flat deflate zip of the outputs

pub mod chunk;
pub mod extract;
pub mod input;
pub mod package;
pub mod speech;
pub mod summarize;
pub mod timestamps;
