//! Transcription backends: turn a chunk's PDF bytes into text.
//!
//! The rest of the crate only sees the [`Transcriber`] trait, so tests drive
//! the whole pipeline with scripted in-process implementations and the CLI
//! picks a real backend at startup:
//!
//! * [`GeminiTranscriber`]: direct `generateContent` calls with the chunk as
//!   inline `application/pdf` data. The default.
//! * [`ProviderTranscriber`]: any `edgequake-llm` provider (OpenAI,
//!   Anthropic, Ollama, …), with the chunk attached as a document.

pub mod gemini;
pub mod provider;

pub use gemini::{GeminiConfig, GeminiTranscriber};
pub use provider::ProviderTranscriber;

use crate::config::{ExtractionConfig, ResponseFormat, DEFAULT_GEMINI_MODEL};
use crate::error::{Pdf2TxtError, TranscriptionError};
use crate::pipeline::split::ChunkPayload;
use async_trait::async_trait;
use edgequake_llm::ProviderFactory;
use std::sync::Arc;
use tracing::{debug, info};

/// Mime type of every chunk payload.
pub const PDF_MIME: &str = "application/pdf";

/// What to ask for, shared by every chunk of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionRequest {
    pub prompt: String,
    pub format: ResponseFormat,
}

/// Raw text returned by a backend for one chunk, before local rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Transcription {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// A remote service that maps a PDF excerpt to text.
///
/// One call per attempt: retries, timeouts and cancellation are handled by
/// [`crate::pipeline::transcribe`], so implementations stay a thin wrapper
/// over the wire protocol.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Short backend label for logs.
    fn name(&self) -> &str;

    async fn transcribe(
        &self,
        payload: &ChunkPayload,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, TranscriptionError>;
}

/// Pick the backend for `config`, from most-specific to least-specific.
///
/// 1. **Pre-built transcriber** (`config.transcriber`), used as-is.
/// 2. **Named provider** (`config.provider_name`): `"gemini"` selects the
///    Gemini backend; any other name goes through
///    [`ProviderFactory::create_llm_provider`].
/// 3. **API key** (`config.api_key`) with no provider: Gemini.
/// 4. **Auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_transcriber(config: &ExtractionConfig) -> Result<Arc<dyn Transcriber>, Pdf2TxtError> {
    if let Some(ref transcriber) = config.transcriber {
        return Ok(Arc::clone(transcriber));
    }

    if let Some(ref name) = config.provider_name {
        if name.eq_ignore_ascii_case("gemini") {
            return gemini_from_config(config);
        }
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        info!("Using provider '{}' with model '{}'", name, model);
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            Pdf2TxtError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        return Ok(Arc::new(ProviderTranscriber::new(
            name.clone(),
            provider,
            config.temperature,
            config.max_output_tokens,
        )));
    }

    if config.api_key.is_some() {
        return gemini_from_config(config);
    }

    debug!("No provider or API key configured; auto-detecting from environment");
    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2TxtError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No API key was given and no provider could be auto-detected.\n\
                Set GEMINI_API_KEY, pass --api-key, or configure another provider.\n\
                Error: {e}"
            ),
        })?;
    Ok(Arc::new(ProviderTranscriber::new(
        "auto",
        provider,
        config.temperature,
        config.max_output_tokens,
    )))
}

fn gemini_from_config(config: &ExtractionConfig) -> Result<Arc<dyn Transcriber>, Pdf2TxtError> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| Pdf2TxtError::ProviderNotConfigured {
            provider: "gemini".to_string(),
            hint: "Provide --api-key or set GEMINI_API_KEY.".to_string(),
        })?;
    let gemini = GeminiConfig {
        api_key,
        model: config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        endpoint: config
            .api_endpoint
            .clone()
            .unwrap_or_else(|| gemini::DEFAULT_ENDPOINT.to_string()),
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
    };
    info!("Using Gemini model '{}'", gemini.model);
    let transcriber = GeminiTranscriber::new(gemini)
        .map_err(|e| Pdf2TxtError::Internal(format!("HTTP client: {e}")))?;
    Ok(Arc::new(transcriber))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prebuilt_transcriber_wins() {
        struct Fixed;
        #[async_trait]
        impl Transcriber for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }
            async fn transcribe(
                &self,
                _payload: &ChunkPayload,
                _request: &TranscriptionRequest,
            ) -> Result<Transcription, TranscriptionError> {
                Ok(Transcription::text("ok"))
            }
        }

        let config = ExtractionConfig::builder()
            .provider_name("gemini")
            .transcriber(Arc::new(Fixed))
            .build()
            .unwrap();
        let t = resolve_transcriber(&config).unwrap();
        assert_eq!(t.name(), "fixed");
    }

    #[test]
    fn gemini_without_key_is_not_configured() {
        let config = ExtractionConfig::builder()
            .provider_name("gemini")
            .build()
            .unwrap();
        let err = resolve_transcriber(&config).err().expect("should fail");
        assert!(matches!(err, Pdf2TxtError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn api_key_selects_gemini() {
        let config = ExtractionConfig::builder().api_key("k").build().unwrap();
        let t = resolve_transcriber(&config).unwrap();
        assert_eq!(t.name(), "gemini");
    }
}
