//! Table extraction: swap every Markdown table for an inert placeholder.
//!
//! The page splitter works line by line and the renderer parses line by
//! line, so a table left in the text could be cut between two pages or
//! have its rows misread as headings and blank-line boundaries. Before
//! either stage runs, each table block is lifted out verbatim and replaced
//! by a single-line token `[TABLE_PLACEHOLDER_<n>]`. A one-line token can
//! never be split, and the assembler later swaps it for the table's own
//! rendered HTML.
//!
//! ## Detection
//!
//! A table block is a maximal run of lines:
//!
//! 1. a header line containing at least one `|`
//! 2. directly followed by a separator line made only of `|`, `:`, `-` and
//!    whitespace, with at least one `-`
//! 3. then every following line that contains a `|`
//!
//! A body line that is itself directly followed by a separator line is the
//! header of the next table, so back-to-back tables stay separate.
//!
//! The scan is a three-state machine rather than a multiline regex: it
//! gives exact control over those edge cases and runs in linear time.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One table lifted out of a document, indexed by discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    /// Zero-based position in discovery order; contiguous within one pass.
    pub index: usize,
    /// The table lines exactly as they appeared in the source.
    pub raw_markdown: String,
}

/// Result of [`extract_tables`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Extracted tables; `tables[i].index == i`.
    pub tables: Vec<TableRecord>,
    /// The input with every table replaced by its placeholder token.
    pub text: String,
}

/// Matches a well-formed placeholder and captures its index.
///
/// Indices carry no leading zeros, so `[TABLE_PLACEHOLDER_01]` is not a
/// placeholder and is left alone.
pub(crate) static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[TABLE_PLACEHOLDER_(0|[1-9][0-9]*)\]").unwrap());

/// Build the placeholder token for table `index`.
pub fn placeholder(index: usize) -> String {
    format!("[TABLE_PLACEHOLDER_{index}]")
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    SeekingHeader,
    ConfirmingSeparator { header: usize },
    ConsumingBody { start: usize },
}

/// Lift every table block out of `text`.
///
/// Pure and idempotent: running it again on [`Extraction::text`] finds no
/// further tables, because placeholder lines contain no pipes.
pub fn extract_tables(text: &str) -> Extraction {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut tables: Vec<TableRecord> = Vec::new();
    let mut state = ScanState::SeekingHeader;
    let mut i = 0;

    let mut close_table = |start: usize, end: usize, out: &mut Vec<String>| {
        let index = tables.len();
        tables.push(TableRecord {
            index,
            raw_markdown: lines[start..end].join("\n"),
        });
        out.push(placeholder(index));
    };

    while i < lines.len() {
        let line = lines[i];
        match state {
            ScanState::SeekingHeader => {
                if has_pipe(line) {
                    state = ScanState::ConfirmingSeparator { header: i };
                } else {
                    out.push(line.to_string());
                }
                i += 1;
            }
            ScanState::ConfirmingSeparator { header } => {
                if is_separator_line(line) {
                    state = ScanState::ConsumingBody { start: header };
                    i += 1;
                } else {
                    // Not a table after all; the current line may still
                    // start one, so re-examine it without advancing.
                    out.push(lines[header].to_string());
                    state = ScanState::SeekingHeader;
                }
            }
            ScanState::ConsumingBody { start } => {
                let next_is_separator = lines.get(i + 1).is_some_and(|n| is_separator_line(n));
                if has_pipe(line) && !next_is_separator {
                    i += 1;
                } else {
                    close_table(start, i, &mut out);
                    state = ScanState::SeekingHeader;
                }
            }
        }
    }

    match state {
        ScanState::SeekingHeader => {}
        ScanState::ConfirmingSeparator { header } => out.push(lines[header].to_string()),
        ScanState::ConsumingBody { start } => close_table(start, lines.len(), &mut out),
    }

    debug!("Extracted {} table(s)", tables.len());

    Extraction {
        tables,
        text: out.join("\n"),
    }
}

/// Put each table's raw Markdown back in place of its placeholder.
///
/// Placeholders with no matching table are left untouched.
pub fn restore_tables(text: &str, tables: &[TableRecord]) -> String {
    RE_PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match lookup(tables, &caps[1]) {
                Some(table) => table.raw_markdown.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Find the table a placeholder index refers to.
pub(crate) fn lookup<'t>(tables: &'t [TableRecord], index: &str) -> Option<&'t TableRecord> {
    let n: usize = index.parse().ok()?;
    tables.get(n).filter(|t| t.index == n)
}

fn has_pipe(line: &str) -> bool {
    line.contains('|')
}

fn is_separator_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| c == '|' || c == ':' || c == '-' || c.is_whitespace())
}
