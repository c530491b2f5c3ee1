//! One chunk through the backend: call, retry, render, clean.
//!
//! The backend is called at most `1 + max_retries` times. Every attempt is
//! bounded by `api_timeout_secs`; between attempts the chunk sleeps for an
//! exponentially growing backoff (`retry_backoff_ms * 2^(n-1)`, capped at
//! `max_backoff_ms`). After a rate-limit answer the sleep is stretched to at
//! least `rate_limit_pause_ms` or the server's `Retry-After`, whichever is
//! longer. Auth and invalid-request failures end the loop immediately.
//!
//! A response that cannot be rendered (structured JSON that does not parse)
//! counts as a failed attempt, so it is retried like a transport error.

use crate::config::{ExtractionConfig, ResponseFormat};
use crate::error::{ChunkError, TranscriptionError};
use crate::output::ChunkResult;
use crate::pipeline::cancel::Cancellation;
use crate::pipeline::postprocess::clean_text;
use crate::pipeline::split::ChunkPayload;
use crate::pipeline::structured::render_structured;
use crate::plan::PageRange;
use crate::transcriber::{Transcriber, Transcription, TranscriptionRequest};
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Transcribe one chunk. Never fails: errors end up in `ChunkResult::error`.
pub async fn transcribe_chunk(
    transcriber: &dyn Transcriber,
    payload: &ChunkPayload,
    request: &TranscriptionRequest,
    config: &ExtractionConfig,
    cancel: &Cancellation,
) -> ChunkResult {
    let start = Instant::now();
    let range = payload.range;
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<TranscriptionError> = None;
    let mut attempts = 0u32;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let wait = retry_delay(config, attempt, last_err.as_ref());
            warn!(
                "Pages {}: retry {}/{} after {}ms",
                range,
                attempt,
                config.max_retries,
                wait.as_millis()
            );
            tokio::select! {
                _ = cancel.cancelled() => return cancelled(range, attempts, start),
                _ = sleep(wait) => {}
            }
        }
        if cancel.is_cancelled() {
            return cancelled(range, attempts, start);
        }

        attempts = attempt + 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(range, attempts, start),
            r = timeout(call_timeout, transcriber.transcribe(payload, request)) => r,
        };

        let rendered = match outcome {
            Err(_) => Err(TranscriptionError::Timeout {
                secs: config.api_timeout_secs,
            }),
            Ok(result) => result.and_then(|t| render(t, request.format, range)),
        };

        match rendered {
            Ok((markdown, usage)) => {
                let duration = start.elapsed();
                debug!(
                    "Pages {}: {} input tokens, {} output tokens, {:?}",
                    range, usage.input_tokens, usage.output_tokens, duration
                );
                return ChunkResult {
                    range,
                    markdown,
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    retries: attempt,
                    duration_ms: duration.as_millis() as u64,
                    error: None,
                };
            }
            Err(e) => {
                warn!(
                    "Pages {}: attempt {}/{} failed: {}",
                    range,
                    attempts,
                    config.max_retries + 1,
                    e
                );
                let retryable = e.is_retryable();
                last_err = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }

    let cause = last_err.unwrap_or_else(|| TranscriptionError::Provider {
        detail: "no attempt was made".to_string(),
    });
    ChunkResult {
        retries: attempts.saturating_sub(1),
        duration_ms: start.elapsed().as_millis() as u64,
        ..ChunkResult::failure(ChunkError::Transcription {
            range,
            attempts,
            cause,
        })
    }
}

/// Sleep before retry number `attempt` (1-based).
fn retry_delay(
    config: &ExtractionConfig,
    attempt: u32,
    last_err: Option<&TranscriptionError>,
) -> Duration {
    let mut ms = config.backoff_ms(attempt);
    if let Some(TranscriptionError::RateLimited {
        retry_after_secs, ..
    }) = last_err
    {
        ms = ms.max(config.rate_limit_pause_ms);
        if let Some(secs) = retry_after_secs {
            ms = ms.max(secs.saturating_mul(1000));
        }
    }
    Duration::from_millis(ms)
}

/// Turn raw backend text into cleaned markdown.
fn render(
    transcription: Transcription,
    format: ResponseFormat,
    range: PageRange,
) -> Result<(String, Transcription), TranscriptionError> {
    let text = match format {
        ResponseFormat::Structured => render_structured(&transcription.text, range)?,
        ResponseFormat::Markdown => transcription.text.clone(),
    };
    Ok((clean_text(&text), transcription))
}

fn cancelled(range: PageRange, attempts: u32, start: Instant) -> ChunkResult {
    debug!("Pages {}: cancelled", range);
    ChunkResult {
        retries: attempts.saturating_sub(1),
        duration_ms: start.elapsed().as_millis() as u64,
        ..ChunkResult::failure(ChunkError::Cancelled { range })
    }
}
