//! Streaming pagination API: emit pages one at a time.
//!
//! Extraction and splitting happen up front (they are cheap and need the
//! whole document), but each page is only rendered when the stream is
//! polled for it. Callers exporting pages one by one never hold more than
//! one rendered page they have not consumed yet. Pages arrive in order.

use crate::config::PaginationConfig;
use crate::convert::{apply_enhancements, build_page, prepare, resolve_renderer};
use crate::error::Md2PagesError;
use crate::output::RenderedPage;
use crate::pipeline::input;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use tracing::info;

/// A boxed stream of rendered pages.
pub type PageStream = Pin<Box<dyn Stream<Item = RenderedPage> + Send>>;

/// Paginate `markdown`, rendering each page lazily.
///
/// # Example
/// ```rust
/// use futures::StreamExt;
/// use md2pages::{paginate_stream, PaginationConfig};
///
/// # tokio_test::block_on(async {
/// let mut pages = paginate_stream("# A\n<!-- PAGE_BREAK -->\n# B", &PaginationConfig::default());
/// while let Some(page) = pages.next().await {
///     println!("page {}: {} bytes", page.page_num, page.html.len());
/// }
/// # });
/// ```
pub fn paginate_stream(markdown: &str, config: &PaginationConfig) -> PageStream {
    let prepared = prepare(markdown, config);
    let renderer = resolve_renderer(config);
    let config = config.clone();
    let total = prepared.pages.len();
    let tables = prepared.tables;

    if let Some(ref cb) = config.progress_callback {
        cb.on_pagination_start(total);
        if total == 0 {
            cb.on_pagination_complete(0, 0);
        }
    }

    let mut clean = 0usize;
    let s = stream::iter(prepared.pages.into_iter().enumerate()).map(move |(i, page)| {
        let page_num = i + 1;
        let rendered = build_page(page_num, total, &page, &tables, renderer.as_ref(), &config);
        if rendered.diagnostics.is_empty() {
            clean += 1;
        }
        if page_num == total {
            if let Some(ref cb) = config.progress_callback {
                cb.on_pagination_complete(total, clean);
            }
        }
        rendered
    });

    Box::pin(s)
}

/// Load and enhance `input` like [`crate::convert::convert`], then stream
/// its pages.
pub async fn convert_stream(
    input_str: impl AsRef<str>,
    config: &PaginationConfig,
) -> Result<PageStream, Md2PagesError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming pagination: {}", input_str);

    let loaded = input::load_input(input_str, config.download_timeout_secs).await?;
    let (markdown, config) = apply_enhancements(loaded.text, config).await?;
    Ok(paginate_stream(&markdown, &config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::PaginationProgressCallback;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn stream_yields_pages_in_order() {
        let pages: Vec<RenderedPage> = paginate_stream(
            "one\n<!-- PAGE_BREAK -->\ntwo\n<!-- PAGE_BREAK -->\nthree",
            &PaginationConfig::default(),
        )
        .collect()
        .await;
        let nums: Vec<usize> = pages.iter().map(|p| p.page_num).collect();
        assert_eq!(nums, vec![1, 2, 3]);
        assert!(pages[2].html.contains("three"));
    }

    #[tokio::test]
    async fn stream_matches_eager() {
        let md = "# A\n\n| x | y |\n|---|---|\n| 1 | 2 |\n<!-- NEWPAGE -->\n# B";
        let config = PaginationConfig::default();
        let streamed: Vec<RenderedPage> = paginate_stream(md, &config).collect().await;
        let eager = crate::convert::paginate(md, &config);
        assert_eq!(streamed, eager.pages);
    }

    #[tokio::test]
    async fn empty_document_streams_nothing() {
        let mut s = paginate_stream("", &PaginationConfig::default());
        assert!(s.next().await.is_none());
    }

    #[derive(Default)]
    struct Completions {
        calls: Mutex<Vec<(usize, usize)>>,
    }

    impl PaginationProgressCallback for Completions {
        fn on_pagination_complete(&self, total_pages: usize, clean_pages: usize) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((total_pages, clean_pages));
            }
        }
    }

    fn completion_calls(cb: &Completions) -> Vec<(usize, usize)> {
        cb.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    #[tokio::test]
    async fn completion_fires_once_like_eager() {
        for md in ["", "one\n<!-- PAGE_BREAK -->\ntwo"] {
            let streamed = Arc::new(Completions::default());
            let config = PaginationConfig::builder()
                .progress_callback(streamed.clone())
                .build()
                .unwrap();
            let _pages: Vec<RenderedPage> = paginate_stream(md, &config).collect().await;

            let eager = Arc::new(Completions::default());
            let config = PaginationConfig::builder()
                .progress_callback(eager.clone())
                .build()
                .unwrap();
            crate::convert::paginate(md, &config);

            assert_eq!(completion_calls(&streamed).len(), 1, "document {md:?}");
            assert_eq!(completion_calls(&streamed), completion_calls(&eager));
        }
    }
}
