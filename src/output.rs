//! Output types returned by the pagination entry points.

use crate::config::PageSeparator;
use crate::error::PageDiagnostic;
use crate::pipeline::split::SplitMode;
use crate::pipeline::tables::TableRecord;
use serde::{Deserialize, Serialize};

/// Complete result of paginating one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationOutput {
    /// Pages in document order, numbered from 1.
    pub pages: Vec<RenderedPage>,
    /// Tables lifted out before splitting, in discovery order.
    pub tables: Vec<TableRecord>,
    pub stats: PaginationStats,
}

impl PaginationOutput {
    /// Concatenate every page's HTML, `separator` between pages.
    ///
    /// With [`PageSeparator::None`] pages are joined by a blank line.
    pub fn joined(&self, separator: &PageSeparator) -> String {
        let mut out = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            if i > 0 {
                out.push_str(&separator.render(page.page_num));
            }
            out.push_str(page.html.trim_end());
        }
        out
    }

    /// HTML of every page, in order.
    pub fn html_pages(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.html.as_str()).collect()
    }

    /// True when no page recorded a diagnostic.
    pub fn is_clean(&self) -> bool {
        self.pages.iter().all(|p| p.diagnostics.is_empty())
    }
}

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPage {
    /// 1-indexed page number.
    pub page_num: usize,

    /// Page Markdown with its tables restored.
    pub markdown: String,

    /// Rendered page body (an HTML fragment).
    pub html: String,

    /// Standalone HTML document for this page, when a style is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,

    /// Length of the page's (placeholdered) Markdown in characters.
    pub char_len: usize,

    /// Non-fatal problems found while assembling this page.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<PageDiagnostic>,
}

impl RenderedPage {
    /// The standalone document if there is one, else the fragment.
    pub fn best_html(&self) -> &str {
        self.document.as_deref().unwrap_or(&self.html)
    }
}

/// Run-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationStats {
    pub total_pages: usize,
    pub tables_extracted: usize,
    pub split_mode: SplitMode,
    /// Pages with at least one diagnostic.
    pub pages_with_diagnostics: usize,
    /// Characters in the source document (after any enhancement).
    pub source_chars: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, html: &str) -> RenderedPage {
        RenderedPage {
            page_num: n,
            markdown: String::new(),
            html: html.to_string(),
            document: None,
            char_len: 0,
            diagnostics: vec![],
        }
    }

    fn output(pages: Vec<RenderedPage>) -> PaginationOutput {
        PaginationOutput {
            stats: PaginationStats {
                total_pages: pages.len(),
                tables_extracted: 0,
                split_mode: SplitMode::Heuristic,
                pages_with_diagnostics: 0,
                source_chars: 0,
                duration_ms: 0,
            },
            pages,
            tables: vec![],
        }
    }

    #[test]
    fn joined_with_comment_separator() {
        let out = output(vec![page(1, "<p>a</p>\n"), page(2, "<p>b</p>\n")]);
        assert_eq!(
            out.joined(&PageSeparator::Comment),
            "<p>a</p>\n\n<!-- page 2 -->\n\n<p>b</p>"
        );
    }

    #[test]
    fn joined_default_is_blank_line() {
        let out = output(vec![page(1, "<p>a</p>"), page(2, "<p>b</p>")]);
        assert_eq!(out.joined(&PageSeparator::None), "<p>a</p>\n\n<p>b</p>");
    }

    #[test]
    fn best_html_prefers_document() {
        let mut p = page(1, "<p>x</p>");
        assert_eq!(p.best_html(), "<p>x</p>");
        p.document = Some("<!DOCTYPE html>".into());
        assert_eq!(p.best_html(), "<!DOCTYPE html>");
    }

    #[test]
    fn serialises_without_empty_fields() {
        let json = serde_json::to_string(&page(1, "<p>x</p>")).unwrap();
        assert!(!json.contains("diagnostics"));
        assert!(!json.contains("document"));
    }
}
