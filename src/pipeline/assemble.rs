//! Page assembly: render each page and resolve its table placeholders.
//!
//! For every page, in order:
//!
//! 1. render the page Markdown through the renderer adapter
//! 2. replace each `[TABLE_PLACEHOLDER_<n>]` with the HTML of table `n`,
//!    rendered by the same renderer (never the raw Markdown); a placeholder
//!    with no table becomes the empty string
//! 3. strip any page-break comment that survived into the page body
//!
//! A `<table>` cannot live inside a paragraph, so a paragraph holding a
//! placeholder is closed before the table and reopened after it. Text on
//! either side keeps its own `<p>`; a side left empty is dropped.

use crate::error::PageDiagnostic;
use crate::pipeline::render::{render_guarded, RenderMarkdown};
use crate::pipeline::tables::{lookup, TableRecord, RE_PLACEHOLDER};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// A rendered paragraph (body in group 1), or a bare placeholder (index in
/// group 2) sitting outside any paragraph.
static RE_PARAGRAPH_OR_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<p>(.*?)</p>\n?|\[TABLE_PLACEHOLDER_(0|[1-9][0-9]*)\]").unwrap()
});

/// Whitespace and line breaks at either end of a paragraph fragment.
static RE_EDGE_BREAKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\s|<br />)+|(?:\s|<br />)+$").unwrap());

/// Marker comments, as raw HTML or escaped into text.
static RE_MARKER_RESIDUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<!--\s*(?:PAGE_BREAK|NEWPAGE|换页|分页)\s*-->|&lt;!--\s*(?:PAGE_BREAK|NEWPAGE|换页|分页)\s*--&gt;",
    )
    .unwrap()
});

/// Paragraphs left empty once a marker is gone.
static RE_EMPTY_PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p>\s*</p>\n?").unwrap());

/// One assembled page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPage {
    pub html: String,
    pub diagnostics: Vec<PageDiagnostic>,
}

/// Render `pages` and resolve their placeholders against `tables`.
///
/// Output order matches input order; no page is dropped or merged.
pub fn assemble_pages(
    pages: &[String],
    tables: &[TableRecord],
    renderer: &dyn RenderMarkdown,
) -> Vec<String> {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| assemble_page(i + 1, page, tables, renderer).html)
        .collect()
}

/// Assemble a single 1-indexed page, keeping its diagnostics.
pub fn assemble_page(
    page_num: usize,
    markdown: &str,
    tables: &[TableRecord],
    renderer: &dyn RenderMarkdown,
) -> AssembledPage {
    let mut diagnostics = Vec::new();

    let rendered = render_guarded(renderer, markdown);
    if let Some(e) = rendered.error {
        diagnostics.push(PageDiagnostic::RenderFailed {
            page: page_num,
            detail: e.to_string(),
        });
    }

    let html = RE_PARAGRAPH_OR_PLACEHOLDER.replace_all(&rendered.html, |caps: &regex::Captures<'_>| {
        let Some(body) = caps.get(1).map(|m| m.as_str()) else {
            // Outside a paragraph: list item, heading or cell.
            let index = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            return resolve_table(page_num, index, tables, renderer, &mut diagnostics)
                .trim_end()
                .to_string();
        };
        if !RE_PLACEHOLDER.is_match(body) {
            return caps[0].to_string();
        }

        let mut out = String::new();
        let mut last = 0;
        for m in RE_PLACEHOLDER.captures_iter(body) {
            let Some(whole) = m.get(0) else { continue };
            push_paragraph(&mut out, &body[last..whole.start()]);
            out.push_str(&resolve_table(page_num, &m[1], tables, renderer, &mut diagnostics));
            last = whole.end();
        }
        push_paragraph(&mut out, &body[last..]);
        out
    });

    let html = strip_marker_residue(&html);

    AssembledPage { html, diagnostics }
}

/// Rendered HTML for the table a placeholder names, or `""` if there is none.
fn resolve_table(
    page_num: usize,
    index: &str,
    tables: &[TableRecord],
    renderer: &dyn RenderMarkdown,
    diagnostics: &mut Vec<PageDiagnostic>,
) -> String {
    match lookup(tables, index) {
        Some(table) => {
            debug!("Page {}: resolving table {}", page_num, index);
            let table_html = render_guarded(renderer, &table.raw_markdown);
            if let Some(e) = table_html.error {
                diagnostics.push(PageDiagnostic::RenderFailed {
                    page: page_num,
                    detail: format!("table {index}: {e}"),
                });
            }
            table_html.html
        }
        None => {
            warn!("Page {}: no table for placeholder {}", page_num, index);
            diagnostics.push(PageDiagnostic::UnresolvedPlaceholder {
                page: page_num,
                index: index.to_string(),
            });
            String::new()
        }
    }
}

fn push_paragraph(out: &mut String, fragment: &str) {
    let fragment = RE_EDGE_BREAKS.replace_all(fragment, "");
    if !fragment.is_empty() {
        out.push_str("<p>");
        out.push_str(&fragment);
        out.push_str("</p>\n");
    }
}

/// Remove page-break comments (and paragraphs they leave empty).
pub fn strip_marker_residue(html: &str) -> String {
    if !RE_MARKER_RESIDUE.is_match(html) {
        return html.to_string();
    }
    let stripped = RE_MARKER_RESIDUE.replace_all(html, "");
    RE_EMPTY_PARAGRAPH.replace_all(&stripped, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::pipeline::render::{MarkdownRenderer, RENDER_FAILED_HTML};
    use crate::pipeline::tables::extract_tables;

    struct TableHater;
    impl RenderMarkdown for TableHater {
        fn render(&self, markdown: &str) -> Result<String, RenderError> {
            if markdown.contains('|') {
                Err(RenderError::Engine("tables unsupported".into()))
            } else {
                Ok(format!("<p>{markdown}</p>\n"))
            }
        }
    }

    fn table(index: usize, raw: &str) -> TableRecord {
        TableRecord {
            index,
            raw_markdown: raw.to_string(),
        }
    }

    #[test]
    fn placeholder_replaced_with_rendered_table() {
        let renderer = MarkdownRenderer::default();
        let tables = vec![table(0, "| A | B |\n|---|---|\n| 1 | 2 |")];
        let page = assemble_page(1, "[TABLE_PLACEHOLDER_0]", &tables, &renderer);
        assert!(page.html.contains("<table>"), "{}", page.html);
        assert!(!page.html.contains("TABLE_PLACEHOLDER"));
        assert!(!page.html.contains("<p><table>"));
        assert!(page.diagnostics.is_empty());
    }

    #[test]
    fn placeholder_inside_paragraph() {
        let renderer = MarkdownRenderer::default();
        let ex = extract_tables("Lead in\n| A |\n|---|\n| 1 |");
        let page = assemble_page(1, &ex.text, &ex.tables, &renderer);
        assert!(page.html.contains("Lead in"));
        assert!(page.html.contains("<table>"), "{}", page.html);
        assert!(!page.html.contains("TABLE_PLACEHOLDER"));
        assert!(page.html.starts_with("<p>Lead in</p>\n<table>"), "{}", page.html);
    }

    #[test]
    fn paragraph_split_around_table() {
        let tables = vec![table(0, "| A |\n|---|\n| 1 |")];
        let page = assemble_page(
            1,
            "before\n[TABLE_PLACEHOLDER_0]\nafter",
            &tables,
            &MarkdownRenderer::default(),
        );
        let html = &page.html;
        let table_at = html.find("<table>").expect("table rendered");
        let close_at = html.find("</table>").expect("table closed");
        assert!(html[..table_at].ends_with("<p>before</p>\n"), "{html}");
        assert!(html[close_at..].contains("<p>after</p>"), "{html}");
        // No paragraph is open while the table is emitted.
        assert_eq!(html[..table_at].matches("<p>").count(), html[..table_at].matches("</p>").count());
    }

    #[test]
    fn placeholder_in_list_item() {
        let tables = vec![table(0, "| A |\n|---|\n| 1 |")];
        let page = assemble_page(1, "- [TABLE_PLACEHOLDER_0]", &tables, &MarkdownRenderer::default());
        assert!(page.html.contains("<li><table>"), "{}", page.html);
        assert!(page.diagnostics.is_empty());
    }

    #[test]
    fn unresolved_placeholder_is_empty() {
        let renderer = MarkdownRenderer::default();
        let page = assemble_page(3, "before\n\n[TABLE_PLACEHOLDER_4]\n\nafter", &[], &renderer);
        assert!(!page.html.contains("TABLE_PLACEHOLDER"));
        assert!(page.html.contains("before") && page.html.contains("after"));
        assert_eq!(
            page.diagnostics,
            vec![PageDiagnostic::UnresolvedPlaceholder {
                page: 3,
                index: "4".into()
            }]
        );
    }

    #[test]
    fn table_render_failure_is_contained() {
        let tables = vec![table(0, "| A |\n|---|")];
        let page = assemble_page(1, "[TABLE_PLACEHOLDER_0]", &tables, &TableHater);
        assert!(page.html.contains(RENDER_FAILED_HTML), "{}", page.html);
        assert_eq!(page.diagnostics.len(), 1);
    }

    #[test]
    fn marker_residue_stripped() {
        let renderer = MarkdownRenderer::default();
        let page = assemble_page(1, "text\n\n<!-- NEWPAGE -->\n\nmore", &[], &renderer);
        assert!(!page.html.contains("NEWPAGE"), "{}", page.html);
        assert!(page.html.contains("more"));
    }

    #[test]
    fn escaped_marker_residue_stripped() {
        let html = "<p>&lt;!-- PAGE_BREAK --&gt;</p>\n<p>x</p>\n";
        assert_eq!(strip_marker_residue(html), "<p>x</p>\n");
    }

    #[test]
    fn assemble_keeps_order_and_count() {
        let renderer = MarkdownRenderer::default();
        let pages = vec!["# One".to_string(), "# Two".to_string(), "# Three".to_string()];
        let html = assemble_pages(&pages, &[], &renderer);
        assert_eq!(html.len(), 3);
        assert!(html[0].contains("One"));
        assert!(html[2].contains("Three"));
    }
}
