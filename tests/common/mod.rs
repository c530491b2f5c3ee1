//! Shared helpers for the integration tests: an in-memory PDF builder and
//! scripted transcription backends. No network access is needed.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pdf2txt::{ChunkPayload, Transcriber, Transcription, TranscriptionError, TranscriptionRequest};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A PDF with `pages` pages; page `i` draws `Page i`.
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for i in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {i}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub fn write_pdf(dir: &Path, name: &str, pages: usize) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, sample_pdf(pages)).unwrap();
    path
}

/// Answers `pages A-B` for every chunk. Later chunks answer sooner, so
/// completion order is the reverse of page order.
pub struct ReverseEcho;

#[async_trait]
impl Transcriber for ReverseEcho {
    fn name(&self) -> &str {
        "reverse-echo"
    }

    async fn transcribe(
        &self,
        payload: &ChunkPayload,
        _request: &TranscriptionRequest,
    ) -> Result<Transcription, TranscriptionError> {
        let delay = 40u64.saturating_sub(payload.range.start as u64 * 5);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(Transcription::text(format!("pages {}", payload.range)))
    }
}

/// Fails with an authentication error for chunks starting at the given
/// page indices and echoes the range otherwise.
pub struct FailAt {
    pub starts: HashSet<usize>,
}

impl FailAt {
    pub fn new(starts: impl IntoIterator<Item = usize>) -> Self {
        Self {
            starts: starts.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Transcriber for FailAt {
    fn name(&self) -> &str {
        "fail-at"
    }

    async fn transcribe(
        &self,
        payload: &ChunkPayload,
        _request: &TranscriptionRequest,
    ) -> Result<Transcription, TranscriptionError> {
        if self.starts.contains(&payload.range.start) {
            return Err(TranscriptionError::Auth {
                detail: "bad key".into(),
            });
        }
        Ok(Transcription::text(format!("pages {}", payload.range)))
    }
}

/// Returns a structured JSON answer with one paragraph per page of the
/// chunk, using chunk-relative page indices.
pub struct StructuredEcho;

#[async_trait]
impl Transcriber for StructuredEcho {
    fn name(&self) -> &str {
        "structured-echo"
    }

    async fn transcribe(
        &self,
        payload: &ChunkPayload,
        _request: &TranscriptionRequest,
    ) -> Result<Transcription, TranscriptionError> {
        let data: Vec<serde_json::Value> = (0..payload.range.len())
            .map(|i| {
                serde_json::json!({
                    "type": "paragraph",
                    "page_index": i,
                    "content": format!("Text of page {}", payload.range.start + i + 1),
                    "is_incomplete": false,
                })
            })
            .collect();
        let body = serde_json::json!({ "data": data }).to_string();
        Ok(Transcription::text(format!("```json\n{body}\n```")))
    }
}

/// Fails with a server error on the first call per chunk, then succeeds.
#[derive(Default)]
pub struct FlakyOnce {
    pub calls: AtomicUsize,
    seen: std::sync::Mutex<HashSet<usize>>,
}

#[async_trait]
impl Transcriber for FlakyOnce {
    fn name(&self) -> &str {
        "flaky-once"
    }

    async fn transcribe(
        &self,
        payload: &ChunkPayload,
        _request: &TranscriptionRequest,
    ) -> Result<Transcription, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = self.seen.lock().unwrap().insert(payload.range.start);
        if first {
            return Err(TranscriptionError::Server {
                status: 503,
                detail: "overloaded".into(),
            });
        }
        Ok(Transcription::text(format!("pages {}", payload.range)))
    }
}
