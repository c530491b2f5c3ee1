//! Gemini `generateContent` backend.
//!
//! Gemini accepts PDF documents natively as inline data, so each chunk is
//! sent as-is: no rasterisation, and the model sees the real text layer
//! where one exists.

use super::{Transcriber, Transcription, TranscriptionRequest, PDF_MIME};
use crate::config::ResponseFormat;
use crate::error::TranscriptionError;
use crate::pipeline::split::ChunkPayload;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error};

/// Public Gemini API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Connection settings for [`GeminiTranscriber`].
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub temperature: f32,
    pub max_output_tokens: usize,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

/// Gemini REST client.
#[derive(Debug)]
pub struct GeminiTranscriber {
    client: Client,
    config: GeminiConfig,
}

impl GeminiTranscriber {
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn transcribe(
        &self,
        payload: &ChunkPayload,
        request: &TranscriptionRequest,
    ) -> Result<Transcription, TranscriptionError> {
        let body = build_request(&self.config, payload, request);
        debug!(
            "Sending pages {} ({} bytes) to {}",
            payload.range,
            payload.bytes.len(),
            self.config.model
        );

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TranscriptionError::Network {
                detail: e.to_string(),
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Network {
                detail: e.to_string(),
            })?;

        if !status.is_success() {
            error!("Gemini API error ({}) for pages {}", status, payload.range);
            return Err(classify_status(status, retry_after, &text));
        }

        parse_response(&text)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

// ── Request / response mapping ───────────────────────────────────────────

fn build_request<'a>(
    config: &GeminiConfig,
    payload: &ChunkPayload,
    request: &'a TranscriptionRequest,
) -> GenerateContentRequest<'a> {
    let response_mime_type = match request.format {
        ResponseFormat::Structured => Some("application/json"),
        ResponseFormat::Markdown => None,
    };
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                Part::Text {
                    text: &request.prompt,
                },
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: PDF_MIME,
                        data: payload.to_base64(),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            response_mime_type,
        },
    }
}

/// Map a successful response body to a [`Transcription`].
fn parse_response(body: &str) -> Result<Transcription, TranscriptionError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| TranscriptionError::MalformedResponse {
            detail: format!("invalid JSON envelope: {e}"),
        })?;

    if let Some(reason) = parsed
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(TranscriptionError::InvalidRequest {
            status: 200,
            detail: format!("prompt blocked: {reason}"),
        });
    }

    let candidate = parsed
        .candidates
        .first()
        .ok_or_else(|| TranscriptionError::MalformedResponse {
            detail: "response has no candidates".to_string(),
        })?;

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(TranscriptionError::MalformedResponse {
            detail: format!("empty candidate text (finish reason: {reason})"),
        });
    }

    let (input_tokens, output_tokens) = parsed
        .usage_metadata
        .map(|u| (u.prompt_token_count, u.candidates_token_count))
        .unwrap_or((0, 0));

    Ok(Transcription {
        text,
        input_tokens,
        output_tokens,
    })
}

/// Map a non-2xx response to a typed error.
fn classify_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> TranscriptionError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|env| match (env.error.status, env.error.message) {
            (Some(s), Some(m)) => Some(format!("{s}: {m}")),
            (None, Some(m)) => Some(m),
            (Some(s), None) => Some(s),
            (None, None) => None,
        })
        .unwrap_or_else(|| body.chars().take(300).collect());

    match status.as_u16() {
        429 => TranscriptionError::RateLimited {
            retry_after_secs: retry_after,
            detail,
        },
        401 | 403 => TranscriptionError::Auth { detail },
        408 | 504 => TranscriptionError::Server {
            status: status.as_u16(),
            detail,
        },
        s if status.is_client_error() => TranscriptionError::InvalidRequest { status: s, detail },
        s => TranscriptionError::Server { status: s, detail },
    }
}
