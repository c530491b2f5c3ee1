//! Error types for the edgequake-pdf2txt library.
//!
//! Three error types for three scopes:
//!
//! * [`Pdf2TxtError`]: **fatal for one document** (unreadable file, not a
//!   PDF, out-of-range page request, output not writable). Returned as
//!   `Err(..)` from the extraction entry points. A batch run records it and
//!   moves on to the next document.
//!
//! * [`ChunkError`]: **non-fatal**. One chunk failed but the others are
//!   fine. Stored in [`crate::output::ChunkResult`] and rendered as a failure
//!   marker in the transcript.
//!
//! * [`TranscriptionError`]: the typed failure of a single call to the
//!   remote transcription backend. The retry loop uses
//!   [`TranscriptionError::is_retryable`] to decide whether another attempt
//!   is worthwhile; the last one ends up inside [`ChunkError::Transcription`].

use crate::plan::PageRange;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors for a single document.
#[derive(Debug, Error)]
pub enum Pdf2TxtError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input is neither a PDF file nor a directory.
    #[error("Invalid input '{path}': expected a .pdf file or a directory containing PDFs")]
    InvalidInput { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// The PDF could not be parsed at all.
    #[error("Failed to open PDF '{path}': {detail}")]
    DocumentOpen { path: PathBuf, detail: String },

    /// The PDF is encrypted with a non-empty user password.
    #[error("PDF '{path}' is encrypted and cannot be opened without a password")]
    Encrypted { path: PathBuf },

    /// A page range reaches outside the document.
    #[error("Pages {range} are out of range (document has {total} pages)")]
    OutOfRange { range: PageRange, total: usize },

    // ── Transcriber errors ────────────────────────────────────────────────
    /// No transcription backend could be configured (missing API key etc.).
    #[error("Transcription provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another input of the same run already writes to this output file.
    #[error("Output file '{path}' would also be written for '{other}'; skipping")]
    OutputConflict { path: PathBuf, other: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A JSON configuration file could not be read or parsed.
    #[error("Failed to load config file '{path}': {detail}")]
    ConfigFile { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ChunkError {
    /// The sub-document for the chunk could not be produced.
    #[error("pages {range}: sub-document extraction failed: {detail}")]
    Extract { range: PageRange, detail: String },

    /// The transcription backend failed; `attempts` calls were made.
    #[error("pages {range}: transcription failed after {attempts} attempt(s): {cause}")]
    Transcription {
        range: PageRange,
        attempts: u32,
        cause: TranscriptionError,
    },

    /// The run was cancelled before the chunk finished.
    #[error("pages {range}: cancelled")]
    Cancelled { range: PageRange },
}

impl ChunkError {
    pub fn range(&self) -> PageRange {
        match self {
            ChunkError::Extract { range, .. }
            | ChunkError::Transcription { range, .. }
            | ChunkError::Cancelled { range } => *range,
        }
    }

    /// Short cause without the page prefix, used in transcript markers.
    pub fn cause(&self) -> String {
        match self {
            ChunkError::Extract { detail, .. } => format!("extraction failed: {detail}"),
            ChunkError::Transcription { cause, .. } => cause.to_string(),
            ChunkError::Cancelled { .. } => "cancelled".to_string(),
        }
    }
}

/// A failed call to the transcription backend.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TranscriptionError {
    /// The call did not complete within the per-call timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// HTTP 429 or a quota message. `retry_after_secs` is the server's hint.
    #[error("rate limited: {detail}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        detail: String,
    },

    /// HTTP 401/403: the key is missing, wrong or lacks access.
    #[error("authentication failed: {detail}")]
    Auth { detail: String },

    /// Any other 4xx: the request itself is wrong and will not improve.
    #[error("request rejected (HTTP {status}): {detail}")]
    InvalidRequest { status: u16, detail: String },

    /// HTTP 5xx from the backend.
    #[error("server error (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },

    /// Connection-level failure.
    #[error("network error: {detail}")]
    Network { detail: String },

    /// The backend answered, but not with anything usable.
    #[error("malformed response: {detail}")]
    MalformedResponse { detail: String },

    /// Error reported by a generic LLM provider that could not be classified.
    #[error("provider error: {detail}")]
    Provider { detail: String },
}

impl TranscriptionError {
    /// Whether another attempt has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TranscriptionError::Auth { .. } | TranscriptionError::InvalidRequest { .. }
        )
    }

    /// Classify a free-form provider error message.
    ///
    /// Generic providers only expose a message, so keyword matching is the
    /// best signal available for rate limits, quota exhaustion and auth.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let detail = message.to_string();
        if lower.contains("rate limit")
            || lower.contains("quota")
            || lower.contains("429")
            || lower.contains("resource_exhausted")
        {
            TranscriptionError::RateLimited {
                retry_after_secs: None,
                detail,
            }
        } else if lower.contains("unauthorized")
            || lower.contains("authentication")
            || lower.contains("api key")
            || lower.contains("401")
            || lower.contains("403")
        {
            TranscriptionError::Auth { detail }
        } else {
            TranscriptionError::Provider { detail }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_display_uses_page_numbers() {
        let e = Pdf2TxtError::OutOfRange {
            range: PageRange::new(6, 9),
            total: 7,
        };
        let msg = e.to_string();
        assert!(msg.contains("7-9"), "got: {msg}");
        assert!(msg.contains("7 pages"), "got: {msg}");
    }

    #[test]
    fn chunk_error_cause_drops_page_prefix() {
        let e = ChunkError::Transcription {
            range: PageRange::new(3, 6),
            attempts: 5,
            cause: TranscriptionError::Timeout { secs: 120 },
        };
        assert_eq!(e.cause(), "timed out after 120s");
        assert!(e.to_string().starts_with("pages 4-6"));
        assert_eq!(e.range(), PageRange::new(3, 6));
    }

    #[test]
    fn auth_and_invalid_request_are_not_retried() {
        assert!(!TranscriptionError::Auth { detail: "bad key".into() }.is_retryable());
        assert!(!TranscriptionError::InvalidRequest {
            status: 400,
            detail: "bad payload".into()
        }
        .is_retryable());
        assert!(TranscriptionError::Timeout { secs: 1 }.is_retryable());
        assert!(TranscriptionError::MalformedResponse { detail: "x".into() }.is_retryable());
    }

    #[test]
    fn classify_recognises_quota_messages() {
        let e = TranscriptionError::classify("Quota exceeded for requests per minute");
        assert!(matches!(e, TranscriptionError::RateLimited { .. }));
        let e = TranscriptionError::classify("401 Unauthorized: invalid API key");
        assert!(matches!(e, TranscriptionError::Auth { .. }));
        let e = TranscriptionError::classify("connection reset");
        assert!(matches!(e, TranscriptionError::Provider { .. }));
    }

    #[test]
    fn chunk_error_roundtrips_through_json() {
        let e = ChunkError::Cancelled {
            range: PageRange::new(0, 3),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        let back: ChunkError = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, e);
    }
}
