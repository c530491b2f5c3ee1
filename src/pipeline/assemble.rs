//! Assembly of chunk results into the final transcript.

use crate::config::ChunkMarker;
use crate::error::ChunkError;
use crate::output::{ChunkResult, ChunkResults, Transcript};
use crate::plan::PageRange;

/// Concatenate chunk results in page order.
///
/// Each chunk contributes its marker line (if the marker style has one)
/// followed by its text; a failed chunk contributes a failure marker in
/// place of its text. Blocks are separated by one blank line and a
/// non-empty transcript ends with exactly one newline. The output depends
/// only on `results` and `marker`, never on completion order.
///
/// ```
/// use edgequake_pdf2txt::{assemble, ChunkMarker, ChunkResult, ChunkResults, PageRange};
///
/// let mut results = ChunkResults::new();
/// for (range, text) in [(PageRange::new(3, 4), "two"), (PageRange::new(0, 3), "one")] {
///     results.insert(range, ChunkResult::success(range, text.to_string()));
/// }
/// let transcript = assemble(&results, &ChunkMarker::None);
/// assert_eq!(transcript.text, "one\n\ntwo\n");
/// ```
pub fn assemble(results: &ChunkResults, marker: &ChunkMarker) -> Transcript {
    let mut ordered: Vec<&ChunkResult> = results.values().collect();
    ordered.sort_by_key(|r| r.range);

    let mut blocks: Vec<String> = Vec::with_capacity(ordered.len() * 2);
    let mut ranges = Vec::with_capacity(ordered.len());
    let mut failed_ranges = Vec::new();

    for result in ordered {
        if let Some(line) = marker.render(result.range) {
            blocks.push(line);
        }
        match result.error {
            None => {
                let text = result.markdown.trim_matches('\n');
                if !text.trim().is_empty() {
                    blocks.push(text.to_string());
                }
            }
            Some(ref err) => {
                blocks.push(failure_marker(result.range, err));
                failed_ranges.push(result.range);
            }
        }
        ranges.push(result.range);
    }

    let text = if blocks.is_empty() {
        String::new()
    } else {
        let mut text = blocks.join("\n\n");
        text.push('\n');
        text
    };

    Transcript {
        text,
        ranges,
        failed_ranges,
    }
}

/// `[transcription failed for pages 4-6: <cause>]`, always on one line.
pub fn failure_marker(range: PageRange, error: &ChunkError) -> String {
    let cause = error.cause().split_whitespace().collect::<Vec<_>>().join(" ");
    format!("[transcription failed for pages {range}: {cause}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscriptionError;

    fn ok(start: usize, end: usize, text: &str) -> ChunkResult {
        ChunkResult::success(PageRange::new(start, end), text.to_string())
    }

    fn failed(start: usize, end: usize) -> ChunkResult {
        ChunkResult::failure(ChunkError::Transcription {
            range: PageRange::new(start, end),
            attempts: 5,
            cause: TranscriptionError::Timeout { secs: 120 },
        })
    }

    fn collect(results: Vec<ChunkResult>) -> ChunkResults {
        results.into_iter().map(|r| (r.range, r)).collect()
    }

    #[test]
    fn orders_by_range_start_with_comment_markers() {
        let results = collect(vec![ok(6, 7, "C"), ok(0, 3, "A"), ok(3, 6, "B")]);
        let t = assemble(&results, &ChunkMarker::Comment);
        assert_eq!(
            t.text,
            "<!-- pages 1-3 -->\n\nA\n\n<!-- pages 4-6 -->\n\nB\n\n<!-- pages 7 -->\n\nC\n"
        );
        assert_eq!(
            t.ranges,
            vec![PageRange::new(0, 3), PageRange::new(3, 6), PageRange::new(6, 7)]
        );
        assert!(t.is_complete());
    }

    #[test]
    fn failed_chunk_gets_marker_in_place() {
        let results = collect(vec![ok(0, 3, "A"), failed(3, 6), ok(6, 9, "C")]);
        let t = assemble(&results, &ChunkMarker::None);
        assert_eq!(
            t.text,
            "A\n\n[transcription failed for pages 4-6: timed out after 120s]\n\nC\n"
        );
        assert_eq!(t.failed_ranges, vec![PageRange::new(3, 6)]);
    }

    #[test]
    fn failure_marker_emitted_with_heading_markers() {
        let results = collect(vec![failed(0, 2)]);
        let t = assemble(&results, &ChunkMarker::Heading);
        assert_eq!(
            t.text,
            "[pages 1-2]\n\n[transcription failed for pages 1-2: timed out after 120s]\n"
        );
    }

    #[test]
    fn empty_input_is_empty_transcript() {
        let t = assemble(&ChunkResults::new(), &ChunkMarker::Comment);
        assert_eq!(t.text, "");
        assert!(t.is_empty());
    }

    #[test]
    fn idempotent() {
        let results = collect(vec![ok(3, 6, "B\n"), failed(6, 7), ok(0, 3, "\nA")]);
        let first = assemble(&results, &ChunkMarker::Comment);
        let second = assemble(&results, &ChunkMarker::Comment);
        assert_eq!(first.text.as_bytes(), second.text.as_bytes());
        assert!(first.text.ends_with('\n') && !first.text.ends_with("\n\n"));
    }

    #[test]
    fn blank_chunk_text_keeps_only_its_marker() {
        let results = collect(vec![ok(0, 1, "   "), ok(1, 2, "B")]);
        let t = assemble(&results, &ChunkMarker::Heading);
        assert_eq!(t.text, "[pages 1]\n\n[pages 2]\n\nB\n");
    }

    #[test]
    fn multiline_causes_are_flattened() {
        let err = ChunkError::Extract {
            range: PageRange::new(0, 1),
            detail: "bad\nxref".into(),
        };
        assert_eq!(
            failure_marker(PageRange::new(0, 1), &err),
            "[transcription failed for pages 1: extraction failed: bad xref]"
        );
    }
}
