//! # edgequake-pdf2txt
//!
//! Extract the text of PDF documents by having a language model transcribe
//! them a few pages at a time.
//!
//! ## Why chunks?
//!
//! Models read a short PDF excerpt far more reliably than a whole book, and
//! a failure (rate limit, timeout, refusal) costs only the pages of one
//! chunk. Each chunk is cut out as a standalone PDF, sent to the backend
//! independently and in parallel, and the answers are stitched back
//! together in page order. A chunk that still fails after its retries is
//! replaced by a visible failure marker instead of sinking the document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Plan       contiguous page ranges of `chunk_size` pages
//!  ├─ 2. Split      one standalone sub-PDF per range (lopdf, spawn_blocking)
//!  ├─ 3. Transcribe Gemini / any edgequake-llm provider, bounded concurrency,
//!  │                per-call timeout, exponential backoff
//!  ├─ 4. Render     structured JSON → markdown, deterministic cleanup
//!  └─ 5. Assemble   page order, chunk markers, failure markers → <stem>.txt
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2txt::{ExtractionConfig, Extractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY")?)
//!         .chunk_size(3)
//!         .concurrency(5)
//!         .build()?;
//!     let extractor = Extractor::new(config)?;
//!     let output = extractor.extract("document.pdf").await?;
//!     println!("{}", output.transcript.text);
//!     eprintln!(
//!         "{}/{} chunks ok",
//!         output.stats.succeeded_chunks, output.stats.total_chunks
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2txt` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2txt = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod progress;
pub mod prompts;
pub mod transcriber;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ChunkMarker, ExtractionConfig, ExtractionConfigBuilder, FileConfig, ResponseFormat};
pub use error::{ChunkError, Pdf2TxtError, TranscriptionError};
pub use extract::{inspect, inspect_all, Extractor};
pub use output::{
    BatchReport, ChunkResult, ChunkResults, DocumentInfo, DocumentReport, ExtractionOutput,
    ExtractionStats, InspectReport, Transcript,
};
pub use pipeline::assemble::assemble;
pub use pipeline::cancel::Cancellation;
pub use pipeline::dispatch::Dispatcher;
pub use pipeline::input::{output_path_for, resolve_inputs};
pub use pipeline::split::{ChunkPayload, SourceDocument};
pub use plan::{plan, PageRange};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use transcriber::{Transcriber, Transcription, TranscriptionRequest};
