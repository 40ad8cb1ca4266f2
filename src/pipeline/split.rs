//! Page splitting: partition placeholdered Markdown into page-sized texts.
//!
//! Two mutually exclusive modes, chosen once per document:
//!
//! * **Marker mode** — the author placed at least one explicit page break
//!   in its exact form (`<!-- PAGE_BREAK -->`, `<!-- NEWPAGE -->`,
//!   `<!-- 换页 -->`, `<!-- 分页 -->`). The text is then cut at every
//!   marker, including case and spacing variants, and nothing else. A
//!   variant alone does not switch modes; it is stripped at assembly.
//! * **Heuristic mode** — no markers. Lines accumulate into a page until a
//!   top-level heading arrives after at least `min_page_chars`, or the page
//!   has grown past `max_page_chars` and the current line is a heading or
//!   blank.
//!
//! The minimum keeps every `# Heading` from becoming its own near-empty
//! page; the maximum bounds page size for downstream layout. The order of
//! the two heuristic triggers matters for the resulting page-size
//! distribution and is kept exactly as documented on [`split_heuristic`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pages shorter than this never end at a top-level heading.
pub const DEFAULT_MIN_PAGE_CHARS: usize = 300;

/// Pages longer than this end at the next heading or blank line.
pub const DEFAULT_MAX_PAGE_CHARS: usize = 1500;

/// Keywords recognised inside a page-break comment.
pub const MARKER_KEYWORDS: [&str; 4] = ["PAGE_BREAK", "NEWPAGE", "换页", "分页"];

/// Page-break markers as written by authors; any of these enables marker mode.
pub const MARKER_FORMS: [&str; 4] = [
    "<!-- PAGE_BREAK -->",
    "<!-- NEWPAGE -->",
    "<!-- 换页 -->",
    "<!-- 分页 -->",
];

/// A page-break comment: keyword case-insensitive, inner whitespace optional.
pub(crate) static RE_PAGE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<!--\s*(?:PAGE_BREAK|NEWPAGE|换页|分页)\s*-->").unwrap()
});

/// How a document was split into pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Cut at explicit page-break markers.
    Markers,
    /// Cut by length and structure.
    Heuristic,
}

/// Length thresholds for heuristic mode, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitLimits {
    pub min_page_chars: usize,
    pub max_page_chars: usize,
}

impl Default for SplitLimits {
    fn default() -> Self {
        Self {
            min_page_chars: DEFAULT_MIN_PAGE_CHARS,
            max_page_chars: DEFAULT_MAX_PAGE_CHARS,
        }
    }
}

/// True when `text` contains at least one marker in its exact form.
pub fn has_page_break_markers(text: &str) -> bool {
    MARKER_FORMS.iter().any(|marker| text.contains(marker))
}

/// The mode [`split_pages`] will use for `text`.
pub fn detect_mode(text: &str) -> SplitMode {
    if has_page_break_markers(text) {
        SplitMode::Markers
    } else {
        SplitMode::Heuristic
    }
}

/// Split `text` into trimmed, non-empty page texts.
pub fn split_pages(text: &str, limits: &SplitLimits) -> Vec<String> {
    split_with_mode(text, limits).1
}

/// Split `text`, also reporting which mode was used.
///
/// Empty or whitespace-only input yields no pages; any other input yields
/// at least one, so a document made only of markers is a single page.
pub fn split_with_mode(text: &str, limits: &SplitLimits) -> (SplitMode, Vec<String>) {
    let mode = detect_mode(text);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return (mode, Vec::new());
    }

    let mut pages = match mode {
        SplitMode::Markers => split_on_markers(text),
        SplitMode::Heuristic => split_heuristic(text, limits),
    };
    if pages.is_empty() {
        pages.push(trimmed.to_string());
    }
    debug!("Split into {} page(s) using {:?} mode", pages.len(), mode);
    (mode, pages)
}

/// Cut at every marker; drop empty segments and bare marker keywords.
fn split_on_markers(text: &str) -> Vec<String> {
    RE_PAGE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && !is_marker_keyword(segment))
        .map(str::to_string)
        .collect()
}

fn is_marker_keyword(segment: &str) -> bool {
    let upper = segment.to_uppercase();
    MARKER_KEYWORDS.iter().any(|k| *k == upper)
}

/// Length/structure-based splitting.
///
/// Per line, in priority order:
///
/// 1. `# ` heading, page non-empty and longer than `min_page_chars`:
///    close the page; the heading opens the next one.
/// 2. page longer than `max_page_chars`, line is any heading or blank,
///    page non-empty: close the page; a heading opens the next one, a blank
///    line is dropped.
///
/// Every other line is appended and counts its length plus one for the
/// newline.
fn split_heuristic(text: &str, limits: &SplitLimits) -> Vec<String> {
    let mut pages: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let blank = line.trim().is_empty();

        if line.starts_with("# ") && !current.is_empty() && current_len > limits.min_page_chars {
            flush(&mut pages, &current);
            current = vec![line];
            current_len = line_len;
            continue;
        }

        if current_len > limits.max_page_chars
            && (line.starts_with('#') || blank)
            && !current.is_empty()
        {
            flush(&mut pages, &current);
            if blank {
                current = Vec::new();
                current_len = 0;
            } else {
                current = vec![line];
                current_len = line_len;
            }
            continue;
        }

        current.push(line);
        current_len += line_len + 1;
    }

    if !current.is_empty() {
        flush(&mut pages, &current);
    }

    pages
}

fn flush(pages: &mut Vec<String>, lines: &[&str]) {
    let page = lines.join("\n");
    let page = page.trim();
    if !page.is_empty() {
        pages.push(page.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        split_pages(text, &SplitLimits::default())
    }

    #[test]
    fn marker_example() {
        assert_eq!(split("# A\n<!-- PAGE_BREAK -->\n# B"), vec!["# A", "# B"]);
    }

    #[test]
    fn marker_variants_alone_stay_heuristic() {
        let text = "one\n<!--page_break-->\ntwo";
        assert!(!has_page_break_markers(text));
        assert_eq!(detect_mode(text), SplitMode::Heuristic);
        assert_eq!(split(text), vec![text]);
    }

    #[test]
    fn exact_marker_enables_cutting_at_variants() {
        let text = "one<!--page_break-->two<!--   NewPage   -->three<!-- PAGE_BREAK -->four";
        assert_eq!(detect_mode(text), SplitMode::Markers);
        assert_eq!(split(text), vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn marker_only_document_is_one_page() {
        assert_eq!(split("<!-- PAGE_BREAK -->"), vec!["<!-- PAGE_BREAK -->"]);
        let text = "<!-- NEWPAGE -->\nnewpage\n<!-- NEWPAGE -->";
        assert_eq!(split(text), vec![text]);
    }

    #[test]
    fn localized_markers() {
        let text = "甲\n<!-- 换页 -->\n乙\n<!-- 分页 -->\n丙";
        assert_eq!(split(text), vec!["甲", "乙", "丙"]);
    }

    #[test]
    fn marker_mode_drops_empty_segments() {
        let text = "<!-- PAGE_BREAK -->\n\n# A\n<!-- NEWPAGE -->\n   \n<!-- NEWPAGE -->\n# B\n<!-- PAGE_BREAK -->";
        assert_eq!(split(text), vec!["# A", "# B"]);
    }

    #[test]
    fn marker_mode_drops_keyword_only_segments() {
        let text = "# A\n<!-- PAGE_BREAK -->\nnewpage\n<!-- PAGE_BREAK -->\n# B";
        assert_eq!(split(text), vec!["# A", "# B"]);
    }

    #[test]
    fn marker_mode_ignores_thresholds() {
        let long = "x".repeat(5000);
        let text = format!("{long}\n<!-- PAGE_BREAK -->\nshort");
        let pages = split(&text);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), 5000);
    }

    #[test]
    fn empty_input_has_no_pages() {
        assert!(split("").is_empty());
        assert!(split("  \n\t\n").is_empty());
    }

    #[test]
    fn short_document_with_heading_is_one_page() {
        let text = "# Title\n\nA short paragraph.\n\n# Second\n\nAnother.";
        assert_eq!(split(text).len(), 1);
    }

    #[test]
    fn top_level_heading_breaks_after_min() {
        let para = "p".repeat(350);
        let text = format!("# One\n{para}\n# Two\nbody");
        let pages = split(&text);
        assert_eq!(pages.len(), 2);
        assert!(pages[1].starts_with("# Two"));
    }

    #[test]
    fn subheading_does_not_use_min_trigger() {
        let para = "p".repeat(350);
        let text = format!("# One\n{para}\n## Two\nbody");
        assert_eq!(split(&text).len(), 1);
    }

    #[test]
    fn max_trigger_on_blank_line() {
        let line = "a".repeat(99);
        let mut text = String::new();
        for _ in 0..20 {
            text.push_str(&line);
            text.push_str("\n\n");
        }
        let pages = split(&text);
        assert!(pages.len() > 1);
        for page in &pages {
            // A page may overshoot the limit by the line that crossed it.
            assert!(page.chars().count() <= 1700, "page too long: {}", page.len());
        }
    }

    #[test]
    fn max_trigger_on_subheading_keeps_heading() {
        let line = "b".repeat(99);
        let mut text = String::new();
        for _ in 0..16 {
            text.push_str(&line);
            text.push('\n');
        }
        text.push_str("### Next\nmore");
        let pages = split(&text);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1], "### Next\nmore");
    }

    #[test]
    fn long_text_without_boundaries_stays_together() {
        let text = "c".repeat(4000);
        assert_eq!(split(&text), vec![text.clone()]);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // 200 CJK characters are 600 bytes but only 200 characters.
        let para = "字".repeat(200);
        let text = format!("# 一\n{para}\n# 二\nbody");
        assert_eq!(split(&text).len(), 1);
    }

    #[test]
    fn custom_limits() {
        let limits = SplitLimits {
            min_page_chars: 5,
            max_page_chars: 50,
        };
        let pages = split_pages("# A\nabcdefgh\n# B\nxyz", &limits);
        assert_eq!(pages, vec!["# A\nabcdefgh", "# B\nxyz"]);
    }
}
