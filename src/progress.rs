//! Progress-callback trait for per-chunk extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as chunks are dispatched and completed.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2txt::{ExtractionProgressCallback, ExtractionConfig, PageRange};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, document: &str, range: PageRange, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{document}: pages {range} done ({text_len} bytes)");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::plan::PageRange;
use std::sync::Arc;

/// Called by the pipeline as it processes each chunk.
///
/// Chunks of one document, and chunks of different documents in a batch
/// run, complete concurrently and out of order. Implementations must protect
/// shared mutable state with `Mutex`/atomics.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once per document, after planning and before any chunk starts.
    fn on_document_start(&self, document: &str, total_chunks: usize) {
        let _ = (document, total_chunks);
    }

    /// Called when a chunk acquires a worker slot.
    fn on_chunk_start(&self, document: &str, range: PageRange) {
        let _ = (document, range);
    }

    /// Called when a chunk was transcribed.
    fn on_chunk_complete(&self, document: &str, range: PageRange, text_len: usize) {
        let _ = (document, range, text_len);
    }

    /// Called when a chunk failed after all retries, or was cancelled.
    fn on_chunk_error(&self, document: &str, range: PageRange, error: &str) {
        let _ = (document, range, error);
    }

    /// Called once per document after every chunk has a result.
    fn on_document_complete(&self, document: &str, total_chunks: usize, succeeded: usize) {
        let _ = (document, total_chunks, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
