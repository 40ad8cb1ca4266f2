//! Pipeline stages for Markdown pagination.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ enhance ──▶ tables ──▶ split ──▶ render + assemble
//! (file/URL)  (AI, opt)  (extract)  (pages)   (HTML per page)
//! ```
//!
//! 1. [`input`]    — load Markdown from a file, stdin or URL
//! 2. [`enhance`]  — optional calls to the AI enhancement service; the only
//!    stage besides `input` with network I/O
//! 3. [`tables`]   — swap tables for single-line placeholders
//! 4. [`split`]    — cut the placeholdered text into page texts
//! 5. [`render`]   — Markdown → HTML behind a never-failing adapter
//! 6. [`assemble`] — render each page and put its tables back as HTML
//!
//! Stages 3–6 are synchronous, pure and hold no shared state.

pub mod assemble;
pub mod enhance;
pub mod input;
pub mod render;
pub mod split;
pub mod tables;
