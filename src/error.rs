use std::path::PathBuf;

use thiserror::Error;

/// Text could not be read as JSON. Always fatal, whatever the policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub offset: Option<usize>,
}

impl ParseError {
    pub fn empty() -> Self {
        Self {
            message: "Empty JSON content".to_string(),
            line: None,
            column: None,
            offset: None,
        }
    }

    /// Builds from a `serde_json` error, resolving line/column to a byte offset
    /// within `text`.
    pub fn from_json(err: &serde_json::Error, text: &str) -> Self {
        let line = err.line();
        let column = err.column();
        let offset = if line == 0 {
            None
        } else {
            byte_offset(text, line, column)
        };
        Self {
            message: format!("Invalid JSON: {err}"),
            line: (line > 0).then_some(line),
            column: (line > 0).then_some(column),
            offset,
        }
    }

    /// Builds from a failed UTF-8 decode of `bytes`, pointing at the first
    /// invalid byte.
    pub fn from_utf8(err: &std::str::Utf8Error, bytes: &[u8]) -> Self {
        let offset = err.valid_up_to();
        let valid = &bytes[..offset.min(bytes.len())];
        let line = valid.iter().filter(|b| **b == b'\n').count() + 1;
        let line_start = valid
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |i| i + 1);
        Self {
            message: format!("Invalid UTF-8: {err}"),
            line: Some(line),
            column: Some(offset - line_start + 1),
            offset: Some(offset),
        }
    }
}

fn byte_offset(text: &str, line: usize, column: usize) -> Option<usize> {
    let mut start = 0usize;
    for (idx, l) in text.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let col = column.saturating_sub(1).min(l.len());
            return Some(start + col);
        }
        start += l.len();
    }
    None
}

/// A collaborator (summarizer, telemetry transport) failed. Never escapes the
/// engine boundary; it becomes a notice plus fallback data.
#[derive(Debug, Error)]
pub enum UpstreamFailure {
    #[error("upstream transport failed: {0}")]
    Transport(String),
    #[error("upstream response was malformed: {0}")]
    Malformed(String),
    #[error("failed to read upstream response: {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
