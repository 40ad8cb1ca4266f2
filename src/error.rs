//! Error types for the md2pages library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Md2PagesError`] — **Fatal**: a run cannot proceed at all (input file
//!   missing, download failed, enhancement service rejected the request,
//!   output directory not writable). Only the I/O edges return it; the
//!   pagination core itself never fails.
//!
//! * [`RenderError`] — a Markdown engine failed on one piece of text. It is
//!   caught at the renderer-adapter boundary and turned into inline
//!   diagnostic HTML; callers never see it as an `Err`.
//!
//! * [`PageDiagnostic`] — **Non-fatal**: something on one page degraded
//!   (render fallback, placeholder without a table). Stored inside
//!   [`crate::output::RenderedPage`] so callers can surface it.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2pages library.
#[derive(Debug, Error)]
pub enum Md2PagesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input could not be decoded as UTF-8 text.
    #[error("Input '{input}' is not valid UTF-8 text: {detail}")]
    InvalidInput { input: String, detail: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Enhancement errors ────────────────────────────────────────────────
    /// The request never produced a usable HTTP response.
    #[error("Enhancement request to '{url}' failed: {reason}")]
    EnhanceRequestFailed { url: String, reason: String },

    /// The enhancement service did not answer within the configured timeout.
    #[error("Enhancement request to '{url}' timed out after {secs}s")]
    EnhanceTimeout { url: String, secs: u64 },

    /// The service answered but reported failure for the task.
    #[error("Enhancement task '{task}' failed: {message}")]
    EnhanceRejected { task: String, message: String },

    /// Content or settings were refused before any request was sent.
    #[error("Enhancement input rejected: {0}")]
    EnhanceInvalid(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output page file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A Markdown engine failure on a single piece of text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The engine reported an error.
    #[error("markdown engine failed: {0}")]
    Engine(String),

    /// The engine (or a custom template) panicked.
    #[error("markdown engine panicked: {0}")]
    Panicked(String),
}

/// A non-fatal finding recorded against one page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageDiagnostic {
    /// The page (or a table on it) fell back to the diagnostic fragment.
    #[error("Page {page}: rendering failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// A placeholder referenced a table that this run never extracted.
    #[error("Page {page}: placeholder for table {index} has no table")]
    UnresolvedPlaceholder { page: usize, index: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_display() {
        let e = Md2PagesError::FileNotFound {
            path: PathBuf::from("notes.md"),
        };
        assert!(e.to_string().contains("notes.md"));
    }

    #[test]
    fn enhance_rejected_display() {
        let e = Md2PagesError::EnhanceRejected {
            task: "segment_text".into(),
            message: "quota exceeded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("segment_text"), "got: {msg}");
        assert!(msg.contains("quota exceeded"), "got: {msg}");
    }

    #[test]
    fn enhance_timeout_display() {
        let e = Md2PagesError::EnhanceTimeout {
            url: "http://localhost:8000/enhance".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn diagnostic_display_names_page() {
        let d = PageDiagnostic::UnresolvedPlaceholder {
            page: 2,
            index: "7".into(),
        };
        assert_eq!(d.to_string(), "Page 2: placeholder for table 7 has no table");
    }

    #[test]
    fn diagnostic_serialises() {
        let d = PageDiagnostic::RenderFailed {
            page: 1,
            detail: "boom".into(),
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("RenderFailed"));
    }
}
