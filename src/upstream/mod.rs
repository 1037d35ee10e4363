//! Summarization collaborator contract.
//!
//! The summarizer is opaque: it takes a validated payload and returns JSON in
//! one of several historical layouts. [`SummaryView`] reads that JSON through
//! the ordered-precedence accessor so every alias resolves the same way.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::DatasetPayload;
use crate::core::precedence::{first_present, first_text, path};
use crate::error::UpstreamFailure;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeOptions {
    #[serde(rename = "rewriteWithAI")]
    pub rewrite_with_ai: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<String>,
}

pub trait Summarizer {
    fn summarize(
        &self,
        payload: &DatasetPayload,
        options: &SummarizeOptions,
    ) -> Result<Value, UpstreamFailure>;
}

/// Replays a response previously captured to disk. The payload is ignored.
#[derive(Debug, Clone)]
pub struct ResponseFileSummarizer {
    path: PathBuf,
}

impl ResponseFileSummarizer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Summarizer for ResponseFileSummarizer {
    fn summarize(
        &self,
        _payload: &DatasetPayload,
        _options: &SummarizeOptions,
    ) -> Result<Value, UpstreamFailure> {
        let text = fs::read_to_string(&self.path).map_err(|source| UpstreamFailure::Io {
            path: self.path.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| UpstreamFailure::Malformed(format!("{}: {e}", self.path.display())))?;
        if !value.is_object() {
            return Err(UpstreamFailure::Malformed(format!(
                "{}: expected a JSON object",
                self.path.display()
            )));
        }
        Ok(value)
    }
}

/// Alias-resolved view of a summarizer response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryView {
    /// Raw risk records, still to be consolidated.
    pub risks: Vec<Value>,
    pub key_findings: Vec<String>,
    pub next_actions: Vec<String>,
    pub overview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview_llm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_json: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viz_payload: Option<Value>,
}

impl SummaryView {
    pub fn from_response(resp: &Value) -> Self {
        let risks = first_present(resp, &["risks", "key_risks"])
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Self {
            risks,
            key_findings: labels(first_present(resp, &["key_findings"])),
            next_actions: labels(first_present(resp, &["next_actions", "recommendations"])),
            overview: first_text(resp, &["overview", "overview_deterministic", "summary"])
                .unwrap_or_default(),
            overview_llm: first_text(resp, &["overview_llm"]),
            valid_json: path(resp, "meta.valid_json").and_then(Value::as_bool),
            viz_payload: first_present(resp, &["viz_payload"]).cloned(),
        }
    }
}

/// Strings are kept; objects contribute their `title` (or `id`).
fn labels(v: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(_) => first_text(item, &["title", "id"]),
            _ => None,
        })
        .collect()
}
