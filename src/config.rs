//! Configuration types for chunked PDF text extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Credentials are part of the config:
//! the library never reads the API key from the environment itself, so the
//! whole pipeline can be driven from tests with an explicit (or mocked)
//! backend.
//!
//! [`FileConfig`] is the optional JSON file layer used by the CLI. Its fields
//! fill in whatever was not given on the command line or in the environment.

use crate::error::Pdf2TxtError;
use crate::plan::{PageRange, DEFAULT_CHUNK_SIZE};
use crate::progress::ProgressCallback;
use crate::transcriber::Transcriber;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default Gemini model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2txt::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .chunk_size(3)
///     .concurrency(5)
///     .api_key("test-key")
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_size, 3);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Pages per chunk. Default: 3.
    pub chunk_size: usize,

    /// Maximum chunk pipelines in flight across the whole run. Default: 5.
    ///
    /// This is the only throttle on the remote API. Lower it when the
    /// backend answers with rate-limit errors.
    pub concurrency: usize,

    /// Documents processed at the same time in a directory run. Default: 4.
    pub document_concurrency: usize,

    /// Backend name: "gemini", or any provider known to `edgequake-llm`
    /// ("openai", "anthropic", "ollama", …). If None, auto-detected.
    pub provider_name: Option<String>,

    /// Model identifier. If None, the backend default is used.
    pub model: Option<String>,

    /// Pre-constructed backend. Takes precedence over `provider_name`.
    pub transcriber: Option<Arc<dyn Transcriber>>,

    /// API key for the Gemini backend.
    pub api_key: Option<String>,

    /// Override of the Gemini API base URL.
    pub api_endpoint: Option<String>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per chunk. Default: 8192.
    pub max_output_tokens: usize,

    /// Retries after the first attempt on a retryable failure. Default: 4.
    pub max_retries: u32,

    /// Initial backoff in milliseconds, doubled per retry. Default: 4000.
    pub retry_backoff_ms: u64,

    /// Upper bound on a single backoff in milliseconds. Default: 60000.
    pub max_backoff_ms: u64,

    /// Minimum wait after a rate-limit response in milliseconds. Default: 10000.
    pub rate_limit_pause_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// What the backend is asked to return. Default: [`ResponseFormat::Structured`].
    pub response_format: ResponseFormat,

    /// Custom prompt. If None, the built-in prompt for `response_format` is used.
    pub system_prompt: Option<String>,

    /// Marker written before each chunk in the transcript. Default: comment.
    pub chunk_marker: ChunkMarker,

    /// Receives per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: 5,
            document_concurrency: 4,
            provider_name: None,
            model: None,
            transcriber: None,
            api_key: None,
            api_endpoint: None,
            temperature: 0.1,
            max_output_tokens: 8192,
            max_retries: 4,
            retry_backoff_ms: 4000,
            max_backoff_ms: 60_000,
            rate_limit_pause_ms: 10_000,
            api_timeout_secs: 120,
            response_format: ResponseFormat::default(),
            system_prompt: None,
            chunk_marker: ChunkMarker::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("chunk_size", &self.chunk_size)
            .field("concurrency", &self.concurrency)
            .field("document_concurrency", &self.document_concurrency)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("transcriber", &self.transcriber.as_ref().map(|t| t.name().to_string()))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_endpoint", &self.api_endpoint)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("response_format", &self.response_format)
            .field("chunk_marker", &self.chunk_marker)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        self.retry_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn chunk_size(mut self, pages: usize) -> Self {
        self.config.chunk_size = pages;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn document_concurrency(mut self, n: usize) -> Self {
        self.config.document_concurrency = n.max(1);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.config.transcriber = Some(transcriber);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.api_endpoint = Some(url.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn rate_limit_pause_ms(mut self, ms: u64) -> Self {
        self.config.rate_limit_pause_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.config.response_format = format;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn chunk_marker(mut self, marker: ChunkMarker) -> Self {
        self.config.chunk_marker = marker;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Fill every field the file sets and the builder has not been given.
    ///
    /// Call this after applying CLI/environment values: fields already set
    /// to `Some` are left alone; numeric fields are taken from the file
    /// only when `overridden` does not list them.
    pub fn apply_file(mut self, file: &FileConfig, overridden: &[&str]) -> Self {
        let keep = |name: &str| overridden.contains(&name);
        let c = &mut self.config;
        if c.api_key.is_none() {
            c.api_key = file.api_key.clone();
        }
        if c.provider_name.is_none() {
            c.provider_name = file.provider.clone();
        }
        if c.model.is_none() {
            c.model = file.model.clone();
        }
        if c.api_endpoint.is_none() {
            c.api_endpoint = file.api_endpoint.clone();
        }
        if c.system_prompt.is_none() {
            c.system_prompt = file.system_prompt.clone();
        }
        if let (Some(v), false) = (file.chunk_size, keep("chunk_size")) {
            c.chunk_size = v;
        }
        if let (Some(v), false) = (file.concurrency, keep("concurrency")) {
            c.concurrency = v.max(1);
        }
        if let (Some(v), false) = (file.document_concurrency, keep("document_concurrency")) {
            c.document_concurrency = v.max(1);
        }
        if let (Some(v), false) = (file.max_retries, keep("max_retries")) {
            c.max_retries = v;
        }
        if let (Some(v), false) = (file.api_timeout_secs, keep("api_timeout_secs")) {
            c.api_timeout_secs = v;
        }
        if let (Some(v), false) = (file.temperature, keep("temperature")) {
            c.temperature = v.clamp(0.0, 2.0);
        }
        if let (Some(v), false) = (file.response_format, keep("response_format")) {
            c.response_format = v;
        }
        if let (Some(v), false) = (file.chunk_marker.clone(), keep("chunk_marker")) {
            c.chunk_marker = v;
        }
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2TxtError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(Pdf2TxtError::InvalidConfig(
                "Chunk size must be ≥ 1 page".into(),
            ));
        }
        if c.concurrency == 0 || c.document_concurrency == 0 {
            return Err(Pdf2TxtError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2TxtError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            return Err(Pdf2TxtError::InvalidConfig("API key is empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What the backend is asked to return for each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// JSON elements (sub titles, paragraphs, tables) with page indices,
    /// rendered locally to markdown with `[page_index: N]` lines. (default)
    #[default]
    Structured,
    /// Plain markdown, used as returned.
    Markdown,
}

/// Marker written before each chunk's text in the transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMarker {
    /// No marker; chunks joined with a blank line.
    None,
    /// HTML comment: `<!-- pages 1-3 -->`. (default)
    #[default]
    Comment,
    /// Visible bracket line: `[pages 1-3]`.
    Heading,
}

impl ChunkMarker {
    /// Render the marker line for `range`, if any.
    pub fn render(&self, range: PageRange) -> Option<String> {
        match self {
            ChunkMarker::None => None,
            ChunkMarker::Comment => Some(format!("<!-- pages {} -->", range)),
            ChunkMarker::Heading => Some(format!("[pages {}]", range)),
        }
    }
}

// ── File layer ───────────────────────────────────────────────────────────

/// Optional JSON configuration file.
///
/// ```json
/// { "api_key": "…", "model": "gemini-2.5-flash", "chunk_size": 3, "concurrency": 5 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_endpoint: Option<String>,
    pub system_prompt: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub document_concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub api_timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
    pub response_format: Option<ResponseFormat>,
    pub chunk_marker: Option<ChunkMarker>,
}

impl FileConfig {
    /// Read and parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self, Pdf2TxtError> {
        let raw = std::fs::read_to_string(path).map_err(|e| Pdf2TxtError::ConfigFile {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::parse(&raw).map_err(|detail| Pdf2TxtError::ConfigFile {
            path: path.to_path_buf(),
            detail,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    }
}
