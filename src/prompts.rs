//! Prompt templates for chunk summarization.
//!
//! Every prompt lives here so the wording can change without touching the
//! orchestration in [`crate::pipeline::summarize`]. Callers can override the
//! default via [`crate::config::PipelineConfig::prompt_template`].

/// Placeholder replaced with the chunk text.
pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Default instruction sent with every chunk.
///
/// The summary is read aloud, so the prompt asks for plain spoken prose:
/// no headings, bullets or markup that a speech engine would stumble over.
pub const DEFAULT_SUMMARY_PROMPT: &str = "Please provide a detailed summary of the following text. \
Note that this summary will be used to convert into an audio podcast, so write accordingly, \
explaining all key points in simple words. Write plain flowing prose without headings, \
bullet points, tables or markdown formatting.\n\n{text}";

/// Render the prompt for one chunk.
///
/// Uses `template` when given, else [`DEFAULT_SUMMARY_PROMPT`].
pub fn summary_prompt(template: Option<&str>, chunk: &str) -> String {
    template
        .unwrap_or(DEFAULT_SUMMARY_PROMPT)
        .replace(TEXT_PLACEHOLDER, chunk)
}
