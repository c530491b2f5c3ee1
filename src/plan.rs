//! Chunk planning: split a document's pages into fixed-size contiguous ranges.
//!
//! A chunk is the unit of work sent to the transcription backend. Three pages
//! per chunk keeps each request small enough for fast, reliable responses
//! while amortising the per-request prompt overhead over several pages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of pages per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 3;

/// A contiguous, zero-based, end-exclusive range of page indices.
///
/// `PageRange { start: 3, end: 6 }` covers the fourth through sixth pages.
/// Ordering is by `start` first, which is what the assembler relies on to
/// restore document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of pages in the range.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, page_index: usize) -> bool {
        page_index >= self.start && page_index < self.end
    }

    /// First page as a 1-indexed page number.
    pub fn first_page(&self) -> usize {
        self.start + 1
    }

    /// Last page as a 1-indexed page number.
    pub fn last_page(&self) -> usize {
        self.end
    }
}

/// Displays the range the way a reader counts pages: `1-3`, or `7` for a
/// single-page range.
impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() == 1 {
            write!(f, "{}", self.first_page())
        } else {
            write!(f, "{}-{}", self.first_page(), self.last_page())
        }
    }
}

/// Plan the chunks for a document of `total_pages` pages.
///
/// Ranges are ordered, contiguous and non-overlapping, and together cover
/// `[0, total_pages)` exactly once. Only the last range may be shorter than
/// `chunk_size`. A zero chunk size is treated as 1.
///
/// ```
/// use edgequake_pdf2txt::{plan, PageRange};
///
/// assert_eq!(
///     plan(7, 3),
///     vec![PageRange::new(0, 3), PageRange::new(3, 6), PageRange::new(6, 7)]
/// );
/// assert!(plan(0, 3).is_empty());
/// ```
pub fn plan(total_pages: usize, chunk_size: usize) -> Vec<PageRange> {
    let step = chunk_size.max(1);
    (0..total_pages)
        .step_by(step)
        .map(|start| PageRange::new(start, (start + step).min(total_pages)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(ranges: &[PageRange], total: usize, chunk: usize) {
        let mut expected_start = 0;
        for r in ranges {
            assert_eq!(r.start, expected_start, "gap or overlap at {r:?}");
            assert!(!r.is_empty(), "empty range {r:?}");
            assert!(r.len() <= chunk, "range {r:?} longer than {chunk}");
            expected_start = r.end;
        }
        assert_eq!(expected_start, total, "ranges do not reach the last page");
    }

    #[test]
    fn seven_pages_in_threes() {
        assert_eq!(
            plan(7, 3),
            vec![PageRange::new(0, 3), PageRange::new(3, 6), PageRange::new(6, 7)]
        );
    }

    #[test]
    fn zero_pages_is_empty() {
        assert!(plan(0, 3).is_empty());
        assert!(plan(0, 1).is_empty());
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let ranges = plan(9, 3);
        assert_eq!(ranges.len(), 3);
        assert!(ranges.iter().all(|r| r.len() == 3));
    }

    #[test]
    fn chunk_larger_than_document() {
        assert_eq!(plan(2, 10), vec![PageRange::new(0, 2)]);
    }

    #[test]
    fn zero_chunk_size_degrades_to_single_pages() {
        assert_eq!(plan(3, 0).len(), 3);
    }

    #[test]
    fn coverage_holds_across_sizes() {
        for total in 0..=40 {
            for chunk in 1..=8 {
                let ranges = plan(total, chunk);
                assert_covers(&ranges, total, chunk);
                assert_eq!(ranges.len(), total.div_ceil(chunk));
            }
        }
    }

    #[test]
    fn display_is_one_based_inclusive() {
        assert_eq!(PageRange::new(0, 3).to_string(), "1-3");
        assert_eq!(PageRange::new(6, 7).to_string(), "7");
    }

    #[test]
    fn ordering_is_by_start() {
        let mut ranges = vec![PageRange::new(6, 7), PageRange::new(0, 3), PageRange::new(3, 6)];
        ranges.sort();
        assert_eq!(ranges, plan(7, 3));
    }
}
