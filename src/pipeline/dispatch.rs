//! Parallel dispatch: every planned range through extract → transcribe.
//!
//! Chunk pipelines of one document are driven by a single future
//! (`buffer_unordered`), which also owns the result map, so results are
//! collected without locks. The run-wide [`Semaphore`] is what actually
//! bounds calls to the backend: it is shared by every document of a batch,
//! so `concurrency` holds for the whole run, not per document.

use crate::config::ExtractionConfig;
use crate::error::{ChunkError, Pdf2TxtError};
use crate::output::{ChunkResult, ChunkResults};
use crate::pipeline::cancel::Cancellation;
use crate::pipeline::split::SourceDocument;
use crate::pipeline::transcribe::transcribe_chunk;
use crate::plan::PageRange;
use crate::prompts::default_prompt;
use crate::transcriber::{Transcriber, TranscriptionRequest};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub struct Dispatcher {
    transcriber: Arc<dyn Transcriber>,
    request: TranscriptionRequest,
    config: Arc<ExtractionConfig>,
    permits: Arc<Semaphore>,
    cancel: Cancellation,
}

impl Dispatcher {
    /// `permits` is shared with every other dispatcher of the run.
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        config: Arc<ExtractionConfig>,
        permits: Arc<Semaphore>,
        cancel: Cancellation,
    ) -> Self {
        let request = TranscriptionRequest {
            prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| default_prompt(config.response_format).to_string()),
            format: config.response_format,
        };
        Self {
            transcriber,
            request,
            config,
            permits,
            cancel,
        }
    }

    /// Run all `ranges` of `document`; one result per range.
    ///
    /// Every range is checked against the document before any work starts;
    /// a range outside it fails the whole call with
    /// [`Pdf2TxtError::OutOfRange`]. After that nothing fails the call:
    /// extraction errors, backend errors and cancellation are recorded in
    /// the range's [`ChunkResult`].
    pub async fn dispatch(
        &self,
        document: Arc<SourceDocument>,
        ranges: &[PageRange],
    ) -> Result<ChunkResults, Pdf2TxtError> {
        for &range in ranges {
            document.check_range(range)?;
        }

        let name = document.name().to_string();
        let progress = self.config.progress_callback.clone();
        if let Some(ref cb) = progress {
            cb.on_document_start(&name, ranges.len());
        }
        info!(
            "{}: dispatching {} chunks via {} (concurrency {})",
            name,
            ranges.len(),
            self.transcriber.name(),
            self.config.concurrency
        );

        let mut results: ChunkResults = HashMap::with_capacity(ranges.len());
        let mut pending = stream::iter(ranges.iter().copied())
            .map(|range| self.run_chunk(Arc::clone(&document), range))
            .buffer_unordered(self.config.concurrency.max(1));
        while let Some(result) = pending.next().await {
            results.insert(result.range, result);
        }

        let succeeded = results.values().filter(|r| r.is_success()).count();
        if let Some(ref cb) = progress {
            cb.on_document_complete(&name, ranges.len(), succeeded);
        }
        info!(
            "{}: {}/{} chunks succeeded",
            name,
            succeeded,
            ranges.len()
        );
        Ok(results)
    }

    async fn run_chunk(&self, document: Arc<SourceDocument>, range: PageRange) -> ChunkResult {
        let name = document.name().to_string();

        // A closed semaphore only happens at shutdown; treat it like cancellation.
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.permits.acquire() => permit.ok(),
        };
        let result = match permit {
            None => ChunkResult::failure(ChunkError::Cancelled { range }),
            Some(permit) => {
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_chunk_start(&name, range);
                }
                let result = self.extract_and_transcribe(document, range).await;
                drop(permit);
                result
            }
        };

        if let Some(ref cb) = self.config.progress_callback {
            match result.error {
                None => cb.on_chunk_complete(&name, range, result.markdown.len()),
                Some(ref e) => cb.on_chunk_error(&name, range, &e.cause()),
            }
        }
        match result.error {
            None => debug!("{}: pages {} done", name, range),
            Some(ChunkError::Cancelled { .. }) => debug!("{}: pages {} cancelled", name, range),
            Some(ref e) => warn!("{}: {}", name, e),
        }
        result
    }

    async fn extract_and_transcribe(
        &self,
        document: Arc<SourceDocument>,
        range: PageRange,
    ) -> ChunkResult {
        let extracted = tokio::task::spawn_blocking(move || document.extract(range)).await;
        let payload = match extracted {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                return ChunkResult::failure(ChunkError::Extract {
                    range,
                    detail: e.to_string(),
                })
            }
            Err(join) => {
                return ChunkResult::failure(ChunkError::Extract {
                    range,
                    detail: format!("extraction task failed: {join}"),
                })
            }
        };

        transcribe_chunk(
            self.transcriber.as_ref(),
            &payload,
            &self.request,
            &self.config,
            &self.cancel,
        )
        .await
    }
}
