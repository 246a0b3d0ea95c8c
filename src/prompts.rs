//! Prompts for the vision-LLM OCR backend.
//!
//! Kept in one place so the transcription instructions can change without
//! touching the request code in [`crate::pipeline::llm`]. A custom prompt can
//! be supplied with [`crate::pipeline::llm::VisionLlmDetector::with_system_prompt`].

/// Sentinel the model is asked to answer with when a page has no text.
pub const NO_TEXT_SENTINEL: &str = "NO_TEXT";

/// Default system prompt: plain transcription, no formatting.
pub const DEFAULT_OCR_PROMPT: &str = r#"You are an OCR engine. Transcribe all text visible in the image exactly as written.

Follow these rules precisely:

1. Preserve the reading order a human would follow.
2. Keep the original line breaks; separate blocks with a blank line.
3. Do not translate, summarise, correct or explain anything.
4. Do not add Markdown, HTML or any other formatting.
5. Do not wrap the output in code fences.
6. If the image contains no legible text, answer with exactly: NO_TEXT"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_sentinel() {
        assert!(DEFAULT_OCR_PROMPT.contains(NO_TEXT_SENTINEL));
    }
}
