//! Adapter from any `edgequake-llm` provider to [`Transcriber`].
//!
//! The chunk travels as a base64 attachment with an `application/pdf` mime
//! type. Providers that accept document attachments (Gemini, Anthropic,
//! recent OpenAI models) read it directly; the prompt is sent as the system
//! message.

use super::{Transcriber, Transcription, TranscriptionRequest, PDF_MIME};
use crate::error::TranscriptionError;
use crate::pipeline::split::ChunkPayload;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use tracing::debug;

pub struct ProviderTranscriber {
    label: String,
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl ProviderTranscriber {
    pub fn new(
        label: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
        temperature: f32,
        max_tokens: usize,
    ) -> Self {
        Self {
            label: label.into(),
            provider,
            temperature,
            max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transcriber for ProviderTranscriber {
    fn name(&self) -> &str {
        &self.label
    }

    async fn transcribe(
        &self,
        payload: &ChunkPayload,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, TranscriptionError> {
        let document = ImageData::new(payload.to_base64(), PDF_MIME);
        let messages = vec![
            ChatMessage::system(request.prompt.as_str()),
            ChatMessage::user_with_images("", vec![document]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| TranscriptionError::classify(&e.to_string()))?;

        debug!(
            "Pages {}: {} input tokens, {} output tokens",
            payload.range, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(TranscriptionError::MalformedResponse {
                detail: "provider returned empty content".to_string(),
            });
        }

        Ok(Transcription {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}
