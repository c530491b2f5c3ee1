//! Deterministic cleanup of backend text before assembly.
//!
//! Models ignore "no code fences" instructions often enough that the fix
//! lives here rather than in the prompt. The passes only touch layout, never
//! wording, so running them twice gives the same result as running them once.
//!
//! Order matters: line endings are normalised first (the fence regex
//! expects `\n`), invisible characters go before any whitespace pass so a
//! line holding only a zero-width space counts as blank, and blank-line
//! collapsing runs after the per-line trim for the same reason.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean one chunk's text. The result has no leading or trailing blank lines.
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = strip_code_fence(&s);
    let s = trim_trailing_whitespace(s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

// ── Code fences ──────────────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?```$").expect("static regex")
});

/// Remove a single code fence wrapping the whole input, whatever its
/// language tag. Inner fences are left alone.
pub(crate) fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(body) if !body.as_str().contains("\n```") => body.as_str(),
        _ => input,
    }
}

// ── Whitespace ───────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Runs of two or more blank lines become one.
fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        assert_eq!(strip_code_fence("```markdown\n# Hello\nWorld\n```"), "# Hello\nWorld");
    }

    #[test]
    fn strips_bare_and_json_fences() {
        assert_eq!(strip_code_fence("```\nabc\n```"), "abc");
        assert_eq!(strip_code_fence("```json\n{\"data\":[]}\n```\n"), "{\"data\":[]}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fence("plain text"), "plain text");
    }

    #[test]
    fn keeps_inner_fences() {
        let input = "Intro\n```rust\nfn main() {}\n```\nOutro";
        assert_eq!(strip_code_fence(input), input);
        let two = "```\na\n```\n\n```\nb\n```";
        assert_eq!(strip_code_fence(two), two);
    }

    #[test]
    fn normalises_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb\n\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn removes_invisible_characters() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c\u{00AD}d"), "abcd");
    }

    #[test]
    fn full_cleanup() {
        let raw = "```markdown\r\n## Title   \r\n\r\n\r\n\r\nBody\u{200B} text\t\r\n```\r\n";
        assert_eq!(clean_text(raw), "## Title\n\nBody text");
    }

    #[test]
    fn whitespace_only_lines_count_as_blank() {
        assert_eq!(clean_text("a\n   \n \t \n\nb"), "a\n\nb");
    }

    #[test]
    fn invisible_only_lines_count_as_blank() {
        let once = clean_text("a\n\n\u{200B}\n\nb");
        assert_eq!(once, "a\n\nb");
        assert_eq!(clean_text(&once), once);
        assert_eq!(clean_text("\u{FEFF}```\nx\n```"), "x");
    }

    #[test]
    fn idempotent() {
        let raw = "```\n\n\nA  \n\n\n\nB\r\n```";
        let once = clean_text(raw);
        assert_eq!(clean_text(&once), once);
    }
}
