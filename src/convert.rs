//! Eager (full-document) pagination entry points.
//!
//! [`paginate`] is the pure core: Markdown string in, every page out. It
//! never fails. [`convert`] adds the I/O edges around it (input loading and
//! the optional AI enhancement pass) and [`convert_to_dir`] writes one file
//! per page. Use [`crate::stream::paginate_stream`] to receive pages one at
//! a time instead.

use crate::config::{EnhanceTask, PaginationConfig};
use crate::error::Md2PagesError;
use crate::output::{PaginationOutput, PaginationStats, RenderedPage};
use crate::pipeline::assemble::assemble_page;
use crate::pipeline::enhance::EnhanceClient;
use crate::pipeline::render::{MarkdownRenderer, RenderMarkdown};
use crate::pipeline::split::{split_with_mode, SplitMode};
use crate::pipeline::tables::{extract_tables, restore_tables, TableRecord};
use crate::pipeline::input;
use crate::style::{wrap_page, StyleConfig};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Paginate a Markdown document.
///
/// Tables are lifted out first so no page boundary can cut through one,
/// the placeholdered text is split into pages, and each page is rendered
/// with its tables put back as HTML. Problems on a page are recorded in
/// [`RenderedPage::diagnostics`] rather than returned as errors.
///
/// # Example
/// ```rust
/// use md2pages::{paginate, PaginationConfig};
///
/// let out = paginate("# A\n<!-- PAGE_BREAK -->\n# B", &PaginationConfig::default());
/// assert_eq!(out.pages.len(), 2);
/// ```
pub fn paginate(markdown: &str, config: &PaginationConfig) -> PaginationOutput {
    let start = Instant::now();
    let prepared = prepare(markdown, config);
    let renderer = resolve_renderer(config);
    let total = prepared.pages.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_pagination_start(total);
    }

    let pages: Vec<RenderedPage> = prepared
        .pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            build_page(
                i + 1,
                total,
                page,
                &prepared.tables,
                renderer.as_ref(),
                config,
            )
        })
        .collect();

    let pages_with_diagnostics = pages.iter().filter(|p| !p.diagnostics.is_empty()).count();

    if let Some(ref cb) = config.progress_callback {
        cb.on_pagination_complete(total, total - pages_with_diagnostics);
    }

    let stats = PaginationStats {
        total_pages: total,
        tables_extracted: prepared.tables.len(),
        split_mode: prepared.mode,
        pages_with_diagnostics,
        source_chars: markdown.chars().count(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Paginated {} chars into {} page(s) ({:?} mode, {} table(s)) in {}ms",
        stats.source_chars,
        stats.total_pages,
        stats.split_mode,
        stats.tables_extracted,
        stats.duration_ms
    );

    PaginationOutput {
        pages,
        tables: prepared.tables,
        stats,
    }
}

/// Load Markdown from a path, `-` (stdin) or URL, enhance it if configured,
/// then paginate it.
///
/// # Errors
/// Returns `Err(Md2PagesError)` only for fatal errors:
/// - File not found / permission denied / not UTF-8
/// - Download failure or timeout
/// - An enhancement task failed
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &PaginationConfig,
) -> Result<PaginationOutput, Md2PagesError> {
    let input_str = input_str.as_ref();
    info!("Starting pagination: {}", input_str);

    let loaded = input::load_input(input_str, config.download_timeout_secs).await?;
    let (markdown, config) = apply_enhancements(loaded.text, config).await?;

    Ok(paginate(&markdown, &config))
}

/// Paginate and write each page to `dir` as `page-001.html`, `page-002.html`, …
///
/// Pages are standalone documents when a style is configured, fragments
/// otherwise. Each file is written atomically (temp file + rename).
pub async fn convert_to_dir(
    input_str: impl AsRef<str>,
    dir: impl AsRef<Path>,
    config: &PaginationConfig,
) -> Result<PaginationStats, Md2PagesError> {
    let output = convert(input_str, config).await?;
    write_pages(&output.pages, dir.as_ref()).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &PaginationConfig,
) -> Result<PaginationOutput, Md2PagesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PagesError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// File name for a 1-indexed page.
pub fn page_file_name(page_num: usize) -> String {
    format!("page-{:03}.html", page_num)
}

/// Write every page into `dir`, creating it if needed.
pub async fn write_pages(pages: &[RenderedPage], dir: &Path) -> Result<Vec<PathBuf>, Md2PagesError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Md2PagesError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(pages.len());
    for page in pages {
        let path = dir.join(page_file_name(page.page_num));
        write_atomic(&path, page.best_html()).await?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }
    info!("Wrote {} page file(s) to {}", written.len(), dir.display());
    Ok(written)
}

/// Write to a sibling temp file, then rename over `path`.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), Md2PagesError> {
    let tmp_path = path.with_extension("html.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| Md2PagesError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Md2PagesError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// A document after table extraction and splitting, before rendering.
pub(crate) struct Prepared {
    pub tables: Vec<TableRecord>,
    pub mode: SplitMode,
    pub pages: Vec<String>,
}

pub(crate) fn prepare(markdown: &str, config: &PaginationConfig) -> Prepared {
    let extraction = extract_tables(markdown);
    let (mode, pages) = split_with_mode(&extraction.text, &config.split_limits());
    debug!(
        "{} table(s) extracted, {} page(s) in {:?} mode",
        extraction.tables.len(),
        pages.len(),
        mode
    );
    Prepared {
        tables: extraction.tables,
        mode,
        pages,
    }
}

/// The configured renderer, or one built from the render options.
pub(crate) fn resolve_renderer(config: &PaginationConfig) -> Arc<dyn RenderMarkdown> {
    match config.renderer {
        Some(ref renderer) => Arc::clone(renderer),
        None => Arc::new(MarkdownRenderer::with_options(config.render)),
    }
}

/// Render one page and fire its progress events.
pub(crate) fn build_page(
    page_num: usize,
    total: usize,
    markdown: &str,
    tables: &[TableRecord],
    renderer: &dyn RenderMarkdown,
    config: &PaginationConfig,
) -> RenderedPage {
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total);
    }

    let assembled = assemble_page(page_num, markdown, tables, renderer);

    if let Some(ref cb) = config.progress_callback {
        if assembled.diagnostics.is_empty() {
            cb.on_page_complete(page_num, total, assembled.html.len());
        } else {
            let detail = assembled
                .diagnostics
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            cb.on_page_error(page_num, total, &detail);
        }
    }

    let document = config
        .style
        .as_ref()
        .map(|style| wrap_page(&assembled.html, page_num, total, style));

    RenderedPage {
        page_num,
        markdown: restore_tables(markdown, tables),
        html: assembled.html,
        document,
        char_len: markdown.chars().count(),
        diagnostics: assembled.diagnostics,
    }
}

/// Run the configured enhancement tasks in order.
///
/// Document-rewriting tasks replace the text; `auto_css_style` output is
/// appended to the style's custom CSS (creating a default style if none is
/// configured). Returns the final text and the config to paginate with.
pub(crate) async fn apply_enhancements<'c>(
    markdown: String,
    config: &'c PaginationConfig,
) -> Result<(String, Cow<'c, PaginationConfig>), Md2PagesError> {
    let enhance = match config.enhance {
        Some(ref e) if !e.tasks.is_empty() => e,
        _ => return Ok((markdown, Cow::Borrowed(config))),
    };

    let client = EnhanceClient::new(enhance.clone())?;
    let mut text = markdown;
    let mut style: Option<StyleConfig> = config.style.clone();

    for task in &enhance.tasks {
        match task {
            EnhanceTask::AutoCssStyle => {
                let hints = style.clone().unwrap_or_default().css_hints();
                let css = client.enhance(*task, &text, Some(&hints)).await?;
                style.get_or_insert_with(StyleConfig::default).push_custom_css(&css);
                info!("Applied {} ({} chars of CSS)", task, css.len());
            }
            _ => {
                text = client.enhance(*task, &text, None).await?;
                info!("Applied {} ({} chars)", task, text.chars().count());
            }
        }
    }

    let mut config = config.clone();
    config.style = style;
    Ok((text, Cow::Owned(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::RENDER_FAILED_HTML;
    use crate::error::RenderError;

    struct Broken;
    impl RenderMarkdown for Broken {
        fn render(&self, _markdown: &str) -> Result<String, RenderError> {
            Err(RenderError::Engine("offline".into()))
        }
    }

    #[test]
    fn paginate_empty_document() {
        let out = paginate("   \n", &PaginationConfig::default());
        assert!(out.pages.is_empty());
        assert_eq!(out.stats.total_pages, 0);
    }

    #[test]
    fn paginate_numbers_pages_from_one() {
        let out = paginate("a\n<!-- NEWPAGE -->\nb\n<!-- NEWPAGE -->\nc", &PaginationConfig::default());
        let nums: Vec<usize> = out.pages.iter().map(|p| p.page_num).collect();
        assert_eq!(nums, vec![1, 2, 3]);
        assert_eq!(out.stats.split_mode, SplitMode::Markers);
    }

    #[test]
    fn page_markdown_has_tables_restored() {
        let md = "# T\n\n| A |\n|---|\n| 1 |\n";
        let out = paginate(md, &PaginationConfig::default());
        assert_eq!(out.pages.len(), 1);
        assert!(out.pages[0].markdown.contains("| 1 |"));
        assert!(!out.pages[0].markdown.contains("TABLE_PLACEHOLDER"));
        assert_eq!(out.stats.tables_extracted, 1);
    }

    #[test]
    fn custom_renderer_is_used() {
        let config = PaginationConfig::builder()
            .renderer(Arc::new(Broken))
            .build()
            .unwrap();
        let out = paginate("# x", &config);
        assert_eq!(out.pages[0].html, RENDER_FAILED_HTML);
        assert_eq!(out.stats.pages_with_diagnostics, 1);
        assert!(!out.is_clean());
    }

    #[test]
    fn style_produces_documents() {
        let config = PaginationConfig::builder()
            .style(StyleConfig::default())
            .build()
            .unwrap();
        let out = paginate("# x", &config);
        let doc = out.pages[0].document.as_deref().unwrap();
        assert!(doc.contains("<title>Page 1 of 1</title>"));
    }

    #[test]
    fn page_file_names_are_padded() {
        assert_eq!(page_file_name(1), "page-001.html");
        assert_eq!(page_file_name(1234), "page-1234.html");
    }

    #[tokio::test]
    async fn no_tasks_borrows_config() {
        let config = PaginationConfig::default();
        let (text, cfg) = apply_enhancements("# x".into(), &config).await.unwrap();
        assert_eq!(text, "# x");
        assert!(matches!(cfg, Cow::Borrowed(_)));
    }
}
