//! Prompts sent with every chunk.
//!
//! Callers can override the prompt via
//! [`crate::config::ExtractionConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

use crate::config::ResponseFormat;

/// Prompt for [`ResponseFormat::Structured`].
///
/// The JSON schema here must stay in sync with
/// [`crate::pipeline::structured::StructuredResponse`].
pub const STRUCTURED_PROMPT: &str = r#"You are a document analyst. You read a PDF excerpt and return its content as JSON.

GOAL
Scan the document page by page, and within each page from top to bottom. Emit every content element as an entry of the JSON object described below. Follow the schema exactly.

RULES
1. Remove line breaks that split words or sentences so the text reads naturally.
2. Do not include running headers, running footers or page numbers.
3. A heading or sub title is emitted with type "sub_title" and its plain text as content.
4. Tables are emitted with type "table" and converted to a GitHub-flavoured markdown table.
5. If the last paragraph of a page ends mid-sentence and continues on the next page, set "is_incomplete" to true on it.

OUTPUT SCHEMA
{
  "data": [
    {
      "type": "sub_title" | "paragraph" | "table",
      "page_index": 0,
      "content": "extracted text, or a markdown table",
      "is_incomplete": false
    }
  ]
}

"page_index" is the zero-based physical page index within THIS excerpt. Output only the JSON object."#;

/// Prompt for [`ResponseFormat::Markdown`].
pub const MARKDOWN_PROMPT: &str = r###"You are an expert document converter. Transcribe the attached PDF excerpt to clean Markdown.

1. Preserve all text content in reading order, page by page.
2. Remove line breaks that split words or sentences.
3. Prefix headings and sub titles with "## ".
4. Convert tables to GitHub-flavoured markdown tables.
5. Do not include running headers, running footers or page numbers.
6. Output ONLY the Markdown. Do not wrap it in code fences and do not add commentary."###;

/// The built-in prompt for `format`.
pub fn default_prompt(format: ResponseFormat) -> &'static str {
    match format {
        ResponseFormat::Structured => STRUCTURED_PROMPT,
        ResponseFormat::Markdown => MARKDOWN_PROMPT,
    }
}
