//! Progress-callback trait for per-page pagination events.
//!
//! Inject an [`Arc<dyn PaginationProgressCallback>`] via
//! [`crate::config::PaginationConfigBuilder::progress_callback`] to receive
//! events as each page is assembled. The CLI drives its progress bar from
//! this trait; library callers can forward events wherever they like.
//!
//! # Example
//!
//! ```rust
//! use md2pages::{PaginationProgressCallback, PaginationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl PaginationProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, html_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} bytes)", page_num, total_pages, html_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = PaginationConfig::builder()
//!     .progress_callback(counter as Arc<dyn PaginationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pagination pipeline as it assembles each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are assembled in order, one at a time.
pub trait PaginationProgressCallback: Send + Sync {
    /// Called once after splitting, before any page is rendered.
    fn on_pagination_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is rendered.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the document
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page rendered cleanly.
    ///
    /// # Arguments
    /// * `html_len` — byte length of the page HTML
    fn on_page_complete(&self, page_num: usize, total_pages: usize, html_len: usize) {
        let _ = (page_num, total_pages, html_len);
    }

    /// Called when a page degraded: a render fallback or an unresolved
    /// placeholder. The page is still produced.
    fn on_page_error(&self, page_num: usize, total_pages: usize, detail: &str) {
        let _ = (page_num, total_pages, detail);
    }

    /// Called once after every page has been assembled.
    ///
    /// # Arguments
    /// * `clean_pages` — pages without diagnostics
    fn on_pagination_complete(&self, total_pages: usize, clean_pages: usize) {
        let _ = (total_pages, clean_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PaginationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PaginationConfig`].
pub type ProgressCallback = Arc<dyn PaginationProgressCallback>;
