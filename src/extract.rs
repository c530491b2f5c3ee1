//! Extraction entry points: one document, one output file, or a whole batch.
//!
//! An [`Extractor`] owns what every document of a run shares: the resolved
//! backend, the run-wide semaphore that bounds backend calls, and the
//! cancellation handle. Documents are independent otherwise; in a batch a
//! document that cannot be opened is reported and the others carry on.

use crate::config::ExtractionConfig;
use crate::error::Pdf2TxtError;
use crate::output::{
    BatchReport, ChunkResult, DocumentInfo, DocumentReport, ExtractionOutput, ExtractionStats,
    InspectReport,
};
use crate::pipeline::assemble::assemble;
use crate::pipeline::cancel::Cancellation;
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::input::{output_path_for, resolve_inputs};
use crate::pipeline::split::SourceDocument;
use crate::plan::plan;
use crate::transcriber::{resolve_transcriber, Transcriber};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub struct Extractor {
    config: Arc<ExtractionConfig>,
    transcriber: Arc<dyn Transcriber>,
    permits: Arc<Semaphore>,
    cancel: Cancellation,
}

impl Extractor {
    /// Build an extractor, resolving the backend from `config`.
    ///
    /// # Errors
    /// [`Pdf2TxtError::ProviderNotConfigured`] when no backend can be set up.
    pub fn new(config: ExtractionConfig) -> Result<Self, Pdf2TxtError> {
        let transcriber = resolve_transcriber(&config)?;
        Ok(Self::with_transcriber(config, transcriber))
    }

    /// Build an extractor around an explicit backend.
    pub fn with_transcriber(config: ExtractionConfig, transcriber: Arc<dyn Transcriber>) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            config: Arc::new(config),
            transcriber,
            permits,
            cancel: Cancellation::new(),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Handle that stops this extractor's runs. Clone it into a signal handler.
    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    /// Extract the text of the PDF at `path`.
    ///
    /// # Returns
    /// `Ok` as soon as the document could be opened, even if some chunks
    /// failed: check `output.stats.failed_chunks` or
    /// `output.transcript.failed_ranges`.
    ///
    /// # Errors
    /// Fatal per-document errors only: unreadable file, not a PDF,
    /// encrypted, or unparseable.
    pub async fn extract(&self, path: impl AsRef<Path>) -> Result<ExtractionOutput, Pdf2TxtError> {
        let path = path.as_ref().to_path_buf();
        info!("Starting extraction: {}", path.display());
        let source = path.display().to_string();
        let document = blocking(move || SourceDocument::open(&path)).await?;
        self.extract_document(Arc::new(document), source).await
    }

    /// Extract the text of a PDF held in memory. `label` names it in logs,
    /// progress events and the output.
    pub async fn extract_bytes(
        &self,
        label: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<ExtractionOutput, Pdf2TxtError> {
        let label = label.into();
        let name = label.clone();
        let document = blocking(move || SourceDocument::from_bytes(name, &bytes)).await?;
        self.extract_document(Arc::new(document), label).await
    }

    async fn extract_document(
        &self,
        document: Arc<SourceDocument>,
        source: String,
    ) -> Result<ExtractionOutput, Pdf2TxtError> {
        let start = Instant::now();
        let page_count = document.page_count();

        // ── Step 1: Plan chunks ──────────────────────────────────────────
        let ranges = plan(page_count, self.config.chunk_size);
        debug!(
            "{}: {} pages in {} chunks of up to {}",
            source,
            page_count,
            ranges.len(),
            self.config.chunk_size
        );

        // ── Step 2: Extract and transcribe every chunk ───────────────────
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.transcriber),
            Arc::clone(&self.config),
            Arc::clone(&self.permits),
            self.cancel.clone(),
        );
        let results = dispatcher.dispatch(document, &ranges).await?;

        // ── Step 3: Assemble in page order ───────────────────────────────
        let transcript = assemble(&results, &self.config.chunk_marker);
        let mut chunks: Vec<ChunkResult> = results.into_values().collect();
        chunks.sort_by_key(|c| c.range);

        // ── Step 4: Stats ────────────────────────────────────────────────
        let succeeded = chunks.iter().filter(|c| c.is_success()).count();
        let stats = ExtractionStats {
            total_pages: page_count,
            total_chunks: chunks.len(),
            succeeded_chunks: succeeded,
            failed_chunks: chunks.len() - succeeded,
            total_input_tokens: chunks.iter().map(|c| c.input_tokens).sum(),
            total_output_tokens: chunks.iter().map(|c| c.output_tokens).sum(),
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        if stats.failed_chunks > 0 {
            warn!(
                "{}: {} of {} chunks failed; transcript has failure markers",
                source, stats.failed_chunks, stats.total_chunks
            );
        }
        info!(
            "Extraction complete: {} ({} pages, {}/{} chunks, {}ms)",
            source, page_count, succeeded, stats.total_chunks, stats.total_duration_ms
        );

        Ok(ExtractionOutput {
            source,
            page_count,
            transcript,
            chunks,
            stats,
        })
    }

    /// Extract `path` and write `<output_dir>/<stem>.txt`.
    ///
    /// The file is written to a temporary name in `output_dir` first and
    /// renamed into place, so it is either complete or absent.
    pub async fn extract_to_file(
        &self,
        path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<ExtractionStats, Pdf2TxtError> {
        let path = path.as_ref();
        let output = self.extract(path).await?;
        let out_path = output_path_for(path, output_dir.as_ref());
        write_atomic(out_path.clone(), output.transcript.text).await?;
        info!("Wrote {}", out_path.display());
        Ok(output.stats)
    }

    /// Process a PDF file, or every PDF of a directory, into `output_dir`.
    ///
    /// Documents run `document_concurrency` at a time. A document-level
    /// failure is logged and recorded in the report; it never stops the
    /// batch.
    ///
    /// # Errors
    /// Only when `input` itself cannot be resolved or `output_dir` cannot be
    /// created.
    pub async fn run(
        &self,
        input: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<BatchReport, Pdf2TxtError> {
        let inputs = resolve_inputs(input.as_ref())?;
        let output_dir = output_dir.as_ref();
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| Pdf2TxtError::OutputWriteFailed {
                path: output_dir.to_path_buf(),
                source: e,
            })?;

        info!(
            "Processing {} document(s) into {}",
            inputs.len(),
            output_dir.display()
        );

        let jobs = claim_outputs(inputs, output_dir);
        let mut indexed: Vec<(usize, DocumentReport)> = stream::iter(jobs.into_iter().enumerate())
            .map(|(idx, (path, clash))| async move {
                let report = match clash {
                    Some(err) => {
                        error!("{}: {}", path.display(), err);
                        DocumentReport {
                            input: path,
                            output: None,
                            stats: None,
                            error: Some(err.to_string()),
                        }
                    }
                    None => self.run_one(path, output_dir).await,
                };
                (idx, report)
            })
            .buffer_unordered(self.config.document_concurrency.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(idx, _)| *idx);

        let report = BatchReport {
            documents: indexed.into_iter().map(|(_, r)| r).collect(),
        };
        info!(
            "Batch complete: {} document(s), {} failed, {} partial",
            report.documents.len(),
            report.failed_documents(),
            report.partial_documents()
        );
        Ok(report)
    }

    async fn run_one(&self, input: PathBuf, output_dir: &Path) -> DocumentReport {
        if self.cancel.is_cancelled() {
            return DocumentReport {
                input,
                output: None,
                stats: None,
                error: Some("cancelled before start".to_string()),
            };
        }

        match self.extract_to_file(&input, output_dir).await {
            Ok(stats) => DocumentReport {
                output: Some(output_path_for(&input, output_dir)),
                input,
                stats: Some(stats),
                error: None,
            },
            Err(e) => {
                error!("{}: {}", input.display(), e);
                DocumentReport {
                    input,
                    output: None,
                    stats: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Pair each input with the conflict that keeps it from running, if any.
///
/// Output names are compared case-insensitively, so `a.pdf` and `A.PDF`
/// clash even on a case-sensitive file system; the first input in sorted
/// order keeps the file.
fn claim_outputs(
    inputs: Vec<PathBuf>,
    output_dir: &Path,
) -> Vec<(PathBuf, Option<Pdf2TxtError>)> {
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    inputs
        .into_iter()
        .map(|input| {
            let out = output_path_for(&input, output_dir);
            let key = out.to_string_lossy().to_lowercase();
            let clash = match claimed.get(&key) {
                Some(first) => Some(Pdf2TxtError::OutputConflict {
                    path: out,
                    other: first.clone(),
                }),
                None => {
                    claimed.insert(key, input.clone());
                    None
                }
            };
            (input, clash)
        })
        .collect()
}

/// Page count, PDF version and chunk plan of a local PDF. No backend needed.
pub async fn inspect(
    path: impl AsRef<Path>,
    chunk_size: usize,
) -> Result<DocumentInfo, Pdf2TxtError> {
    let path = path.as_ref().to_path_buf();
    let open_path = path.clone();
    let document = blocking(move || SourceDocument::open(&open_path)).await?;
    Ok(DocumentInfo {
        page_count: document.page_count(),
        pdf_version: document.pdf_version().to_string(),
        chunks: plan(document.page_count(), chunk_size.max(1)),
        path,
    })
}

/// [`inspect`] every PDF that `input` resolves to, in sorted order.
///
/// A file that cannot be opened is recorded in its report and the rest are
/// still inspected.
///
/// # Errors
/// Only when `input` itself cannot be resolved.
pub async fn inspect_all(
    input: impl AsRef<Path>,
    chunk_size: usize,
) -> Result<Vec<InspectReport>, Pdf2TxtError> {
    let inputs = resolve_inputs(input.as_ref())?;
    let mut reports = Vec::with_capacity(inputs.len());
    for path in inputs {
        let report = match inspect(&path, chunk_size).await {
            Ok(info) => InspectReport {
                input: path,
                info: Some(info),
                error: None,
            },
            Err(e) => {
                warn!("{}: {}", path.display(), e);
                InspectReport {
                    input: path,
                    info: None,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }
    Ok(reports)
}

/// Run CPU-bound lopdf work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, Pdf2TxtError>
where
    F: FnOnce() -> Result<T, Pdf2TxtError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Pdf2TxtError::Internal(format!("blocking task failed: {e}")))?
}

/// Write `text` to `path` through a temporary file in the same directory.
async fn write_atomic(path: PathBuf, text: String) -> Result<(), Pdf2TxtError> {
    blocking(move || {
        let fail = |source: std::io::Error| Pdf2TxtError::OutputWriteFailed {
            path: path.clone(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(fail)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(fail)?;
        tmp.write_all(text.as_bytes()).map_err(fail)?;
        tmp.flush().map_err(fail)?;
        tmp.persist(&path).map_err(|e| fail(e.error))?;
        Ok(())
    })
    .await
}
