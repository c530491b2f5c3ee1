//! Result types produced by an extraction run.

use crate::error::ChunkError;
use crate::plan::PageRange;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Dispatcher output: one entry per planned range, in no particular order.
pub type ChunkResults = HashMap<PageRange, ChunkResult>;

/// Outcome of the extract → transcribe pipeline for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// Pages covered by this chunk.
    pub range: PageRange,
    /// Cleaned markdown for the chunk. Empty when `error` is set.
    pub markdown: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Attempts beyond the first.
    pub retries: u32,
    pub duration_ms: u64,
    /// `Some` when the chunk failed; the transcript gets a failure marker.
    pub error: Option<ChunkError>,
}

impl ChunkResult {
    pub fn success(range: PageRange, markdown: String) -> Self {
        Self {
            range,
            markdown,
            input_tokens: 0,
            output_tokens: 0,
            retries: 0,
            duration_ms: 0,
            error: None,
        }
    }

    pub fn failure(error: ChunkError) -> Self {
        Self {
            range: error.range(),
            markdown: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            retries: 0,
            duration_ms: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The assembled, page-ordered text of a whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// Ranges in the order they appear in `text`.
    pub ranges: Vec<PageRange>,
    /// Ranges that were replaced by a failure marker.
    pub failed_ranges: Vec<PageRange>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_ranges.is_empty()
    }
}

/// Counters for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub total_chunks: usize,
    pub succeeded_chunks: usize,
    pub failed_chunks: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

/// Everything produced for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Path or label of the source document.
    pub source: String,
    pub page_count: usize,
    pub transcript: Transcript,
    /// Chunk results sorted by range start.
    pub chunks: Vec<ChunkResult>,
    pub stats: ExtractionStats,
}

/// Structural facts about a PDF, available without any API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub page_count: usize,
    pub pdf_version: String,
    /// Chunks the document would be split into.
    pub chunks: Vec<PageRange>,
}

/// Outcome of inspecting one input of a `--plan-only` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectReport {
    pub input: PathBuf,
    pub info: Option<DocumentInfo>,
    /// Why the file could not be inspected.
    pub error: Option<String>,
}

/// Outcome of one document within a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub input: PathBuf,
    /// Written output file, when the document got that far.
    pub output: Option<PathBuf>,
    pub stats: Option<ExtractionStats>,
    /// Fatal error message, when the document could not be processed.
    pub error: Option<String>,
}

impl DocumentReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a batch run over one file or a directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Reports in input order.
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn failed_documents(&self) -> usize {
        self.documents.iter().filter(|d| !d.is_success()).count()
    }

    /// Documents written with at least one failed chunk.
    pub fn partial_documents(&self) -> usize {
        self.documents
            .iter()
            .filter_map(|d| d.stats.as_ref())
            .filter(|s| s.failed_chunks > 0)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed_documents() == 0 && self.partial_documents() == 0
    }
}
