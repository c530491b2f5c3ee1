//! Structured responses: JSON page elements rendered to markdown.
//!
//! The backend returns one element per content block with a chunk-relative
//! page index. Rendering rebases the indices onto the document, keeps the
//! backend's order within a page and writes a `[page_index: N]` line
//! whenever the page changes, so the assembled transcript can be mapped back
//! to physical pages.

use crate::error::TranscriptionError;
use crate::pipeline::postprocess::strip_code_fence;
use crate::plan::PageRange;
use serde::Deserialize;
use tracing::debug;

/// The JSON document requested by the structured prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StructuredResponse {
    #[serde(default)]
    pub data: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Element {
    /// `"sub_title"`, `"paragraph"` or `"table"`. Unknown kinds render as
    /// paragraphs.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub page_index: usize,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_incomplete: bool,
}

impl Element {
    fn is_paragraph(&self) -> bool {
        !matches!(self.kind.as_str(), "sub_title" | "table")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Wrapped(StructuredResponse),
    Bare(Vec<Element>),
}

impl StructuredResponse {
    /// Parse backend text, tolerating a surrounding code fence and a bare
    /// top-level array.
    pub fn parse(text: &str) -> Result<Self, TranscriptionError> {
        let body = strip_code_fence(text).trim();
        let envelope: Envelope =
            serde_json::from_str(body).map_err(|e| TranscriptionError::MalformedResponse {
                detail: format!("invalid structured JSON: {e}"),
            })?;
        Ok(match envelope {
            Envelope::Wrapped(response) => response,
            Envelope::Bare(data) => StructuredResponse { data },
        })
    }

    /// Shift chunk-relative page indices onto the source document and sort
    /// by page. The sort is stable, so reading order within a page is kept.
    ///
    /// An index that cannot be shifted without overflowing is a malformed
    /// response.
    pub fn rebase(mut self, range: PageRange) -> Result<Self, TranscriptionError> {
        for element in &mut self.data {
            if element.page_index >= range.len() {
                debug!(
                    "Pages {}: element page_index {} outside chunk",
                    range, element.page_index
                );
            }
            element.page_index = element.page_index.checked_add(range.start).ok_or_else(|| {
                TranscriptionError::MalformedResponse {
                    detail: format!("page_index {} out of bounds", element.page_index),
                }
            })?;
        }
        self.data.sort_by_key(|e| e.page_index);
        Ok(self)
    }

    /// Render to markdown blocks separated by blank lines.
    pub fn render(&self) -> String {
        let mut blocks: Vec<String> = Vec::with_capacity(self.data.len() * 2);
        let mut current_page: Option<usize> = None;
        // Text of the last paragraph when it was flagged incomplete.
        let mut pending: Option<String> = None;

        for element in &self.data {
            let content = element.content.trim();
            if content.is_empty() {
                continue;
            }

            let mut text = content.to_string();
            if element.is_paragraph() {
                if let Some(head) = pending.take() {
                    blocks.pop();
                    text = format!("{head} {text}");
                }
            } else {
                pending = None;
            }

            if current_page != Some(element.page_index) {
                blocks.push(format!("[page_index: {}]", element.page_index));
                current_page = Some(element.page_index);
            }

            let block = match element.kind.as_str() {
                "sub_title" => format!("## {text}"),
                _ => text.clone(),
            };
            blocks.push(block);

            if element.is_paragraph() && element.is_incomplete {
                pending = Some(text);
            }
        }

        blocks.join("\n\n")
    }
}

/// Parse, rebase and render one chunk's structured response.
pub fn render_structured(text: &str, range: PageRange) -> Result<String, TranscriptionError> {
    Ok(StructuredResponse::parse(text)?.rebase(range)?.render())
}
