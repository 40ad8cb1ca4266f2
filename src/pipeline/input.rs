//! Input resolution: load Markdown from a file, stdin or an HTTP(S) URL.
//!
//! Whatever the source, the result is UTF-8 text with any byte-order mark
//! removed and line endings normalised to `\n`, which is what the table
//! scanner and page splitter expect.

use crate::error::Md2PagesError;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Input name that selects standard input.
pub const STDIN: &str = "-";

/// Markdown loaded from some source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedInput {
    /// The path, URL or `-` the text came from.
    pub source: String,
    pub text: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the Markdown text named by `input`.
///
/// `-` reads stdin to the end, an `http(s)://` URL is downloaded, anything
/// else is read as a local file path.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<LoadedInput, Md2PagesError> {
    let bytes = if input == STDIN {
        read_stdin().await?
    } else if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };

    let text = decode_text(input, bytes)?;
    debug!("Loaded {} chars from {}", text.chars().count(), input);

    Ok(LoadedInput {
        source: input.to_string(),
        text,
    })
}

/// Decode bytes as UTF-8, dropping a BOM and normalising line endings.
pub fn decode_text(input: &str, bytes: Vec<u8>) -> Result<String, Md2PagesError> {
    let text = String::from_utf8(bytes).map_err(|e| Md2PagesError::InvalidInput {
        input: input.to_string(),
        detail: e.utf8_error().to_string(),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    Ok(normalise_line_endings(text))
}

fn normalise_line_endings(input: &str) -> String {
    if input.contains('\r') {
        input.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        input.to_string()
    }
}

async fn read_stdin() -> Result<Vec<u8>, Md2PagesError> {
    let mut buf = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut buf)
        .await
        .map_err(|e| Md2PagesError::InvalidInput {
            input: STDIN.to_string(),
            detail: e.to_string(),
        })?;
    Ok(buf)
}

/// Read a local file, mapping I/O failures to input errors.
async fn read_local(path_str: &str) -> Result<Vec<u8>, Md2PagesError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read local file: {}", path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Md2PagesError::PermissionDenied { path })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Md2PagesError::FileNotFound { path })
        }
        Err(e) => Err(Md2PagesError::InvalidInput {
            input: path_str.to_string(),
            detail: e.to_string(),
        }),
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, Md2PagesError> {
    info!("Downloading Markdown from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Md2PagesError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            Md2PagesError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Md2PagesError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(Md2PagesError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_err)?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/notes.md"));
        assert!(is_url("http://example.com/notes.md"));
        assert!(!is_url("/tmp/notes.md"));
        assert!(!is_url("notes.md"));
        assert!(!is_url("-"));
        assert!(!is_url(""));
    }

    #[test]
    fn decode_strips_bom_and_crlf() {
        let bytes = b"\xef\xbb\xbf# T\r\nbody\r\n".to_vec();
        assert_eq!(decode_text("x.md", bytes).unwrap(), "# T\nbody\n");
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let err = decode_text("bad.md", vec![0x66, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Md2PagesError::InvalidInput { ref input, .. } if input == "bad.md"));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = load_input("/definitely/not/here.md", 5).await.unwrap_err();
        assert!(matches!(err, Md2PagesError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Hello\n").unwrap();
        let loaded = load_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(loaded.text, "# Hello\n");
    }
}
