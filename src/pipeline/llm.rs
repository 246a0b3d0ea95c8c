//! Vision-LLM OCR backend.
//!
//! Sends the page PNG as an image attachment with a transcription prompt and
//! treats the whole answer as the page's single annotation. Any provider
//! supported by `edgequake-llm` works (OpenAI, Anthropic, Gemini, Ollama, …).
//!
//! Like the Vision backend this never retries: a provider error becomes
//! [`OcrServiceError::Api`] and the request is aborted.

use crate::error::OcrServiceError;
use crate::pipeline::encode::EncodedPage;
use crate::pipeline::ocr::TextDetector;
use crate::pipeline::postprocess;
use crate::prompts::{DEFAULT_OCR_PROMPT, NO_TEXT_SENTINEL};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// [`TextDetector`] backed by a multimodal LLM.
pub struct VisionLlmDetector {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    max_tokens: usize,
}

impl VisionLlmDetector {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            system_prompt: DEFAULT_OCR_PROMPT.to_string(),
            max_tokens: 4096,
        }
    }

    /// Instantiate a named provider (`"openai"`, `"anthropic"`, …).
    ///
    /// The API key is read from the provider's usual environment variable.
    pub fn from_provider_name(name: &str, model: Option<&str>) -> Result<Self, OcrServiceError> {
        let model = model.unwrap_or(DEFAULT_MODEL);
        let provider = ProviderFactory::create_llm_provider(name, model)
            .map_err(|e| OcrServiceError::NotConfigured(format!("provider '{}': {}", name, e)))?;
        Ok(Self::new(provider))
    }

    /// Resolve a provider from the environment.
    ///
    /// `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` win when both are set;
    /// otherwise the factory picks the first provider with an API key.
    pub fn from_env() -> Result<Self, OcrServiceError> {
        if let (Ok(prov), Ok(model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !prov.is_empty() && !model.is_empty() {
                return Self::from_provider_name(&prov, Some(&model));
            }
        }

        let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
            OcrServiceError::NotConfigured(format!(
                "no LLM provider could be detected from the environment \
                 (set OPENAI_API_KEY, ANTHROPIC_API_KEY, …): {}",
                e
            ))
        })?;
        Ok(Self::new(llm_provider))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TextDetector for VisionLlmDetector {
    async fn detect_text(&self, page: &EncodedPage) -> Result<Option<String>, OcrServiceError> {
        let start = Instant::now();
        let image = ImageData::new(page.to_base64(), page.mime_type()).with_detail("high");
        let messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user_with_images("", vec![image]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.build_options()))
            .await
            .map_err(|e| OcrServiceError::Api {
                status: None,
                message: e.to_string(),
            })?;

        debug!(
            "LLM page {}: {} input tokens, {} output tokens, {:?}",
            page.index,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(interpret_transcription(&response.content))
    }

    fn name(&self) -> &str {
        "vision-llm"
    }
}

/// Clean a raw transcription; empty output or the sentinel means no text.
pub fn interpret_transcription(raw: &str) -> Option<String> {
    let cleaned = postprocess::clean_transcription(raw);
    if cleaned.is_empty() || cleaned == NO_TEXT_SENTINEL {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_absent() {
        assert_eq!(interpret_transcription("NO_TEXT"), None);
        assert_eq!(interpret_transcription("  NO_TEXT\n"), None);
        assert_eq!(interpret_transcription("```\nNO_TEXT\n```"), None);
    }

    #[test]
    fn empty_is_absent() {
        assert_eq!(interpret_transcription(""), None);
        assert_eq!(interpret_transcription(" \n\t"), None);
    }

    #[test]
    fn text_is_kept() {
        assert_eq!(
            interpret_transcription("Invoice 42\r\nTotal: 10 EUR  \n").as_deref(),
            Some("Invoice 42\nTotal: 10 EUR")
        );
    }

    #[test]
    fn sentinel_inside_text_is_kept() {
        assert!(interpret_transcription("Reply NO_TEXT if empty").is_some());
    }
}
