//! # md2pages
//!
//! Split Markdown documents into page-sized, styled HTML without ever
//! tearing a table across two pages.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Input     local file, stdin or HTTP(S) URL
//!  ├─ 2. Enhance   optional AI service pass (segmentation, CSS, …)
//!  ├─ 3. Tables    each table block → [TABLE_PLACEHOLDER_n]
//!  ├─ 4. Split     explicit <!-- PAGE_BREAK --> markers, else length/heading heuristic
//!  ├─ 5. Render    pulldown-cmark with classed markup, failures contained
//!  └─ 6. Assemble  placeholders → table HTML, optional standalone documents
//! ```
//!
//! Steps 3–6 never fail: problems become per-page diagnostics.
//!
//! ## Quick Start
//!
//! ```rust
//! use md2pages::{paginate, PaginationConfig};
//!
//! let markdown = "# Intro\n\n| a | b |\n|---|---|\n| 1 | 2 |\n<!-- PAGE_BREAK -->\n# Next";
//! let output = paginate(markdown, &PaginationConfig::default());
//! assert_eq!(output.pages.len(), 2);
//! assert!(output.pages[0].html.contains("<table>"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pages` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2pages = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;
pub mod style;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AiSettings, EnhanceConfig, EnhanceTask, PageSeparator, PaginationConfig,
    PaginationConfigBuilder,
};
pub use convert::{convert, convert_sync, convert_to_dir, page_file_name, paginate, write_pages};
pub use error::{Md2PagesError, PageDiagnostic, RenderError};
pub use output::{PaginationOutput, PaginationStats, RenderedPage};
pub use pipeline::assemble::{assemble_pages, AssembledPage};
pub use pipeline::enhance::EnhanceClient;
pub use pipeline::render::{
    render_markdown_to_html, MarkdownRenderer, RenderMarkdown, RenderOptions, RenderRules,
    RuleArgs, RuleTag, RENDER_FAILED_HTML,
};
pub use pipeline::split::{split_pages, SplitLimits, SplitMode};
pub use pipeline::tables::{extract_tables, placeholder, restore_tables, Extraction, TableRecord};
pub use progress::{NoopProgressCallback, PaginationProgressCallback, ProgressCallback};
pub use stream::{convert_stream, paginate_stream, PageStream};
pub use style::{wrap_page, BackgroundSize, StyleConfig};
