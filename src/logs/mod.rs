use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{DatasetShape, FixTelemetry, Policy};

pub const TELEMETRY_EVENT: &str = "validation.telemetry";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub policy: Policy,
    pub errors_count: usize,
    pub warnings_count: usize,
    pub fixed_fields: FixTelemetry,
    pub blocked: bool,
    pub request_id: Option<String>,
}

/// Destination for gate telemetry. Implementations must return promptly;
/// callers ignore the error.
pub trait TelemetrySink {
    fn emit(&self, record: &TelemetryRecord) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn emit(&self, _record: &TelemetryRecord) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl TelemetrySink for MemorySink {
    fn emit(&self, record: &TelemetryRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("telemetry buffer poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// Appends one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
struct TelemetryLine<'a> {
    schema_version: &'static str,
    tool_version: &'static str,
    event: &'static str,
    emitted_at: String,
    #[serde(flatten)]
    record: &'a TelemetryRecord,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_home(home_dir: &Path) -> Self {
        Self::new(logs_dir(home_dir).join("telemetry.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for JsonlSink {
    fn emit(&self, record: &TelemetryRecord) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("failed to create log directory: {}", dir.display())
            })?;
        }
        let line = TelemetryLine {
            schema_version: "1.0",
            tool_version: env!("CARGO_PKG_VERSION"),
            event: TELEMETRY_EVENT,
            emitted_at: format_ts(OffsetDateTime::now_utc()),
            record,
        };
        let mut buf = serde_json::to_vec(&line).context("failed to serialize telemetry")?;
        buf.push(b'\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open telemetry log: {}", self.path.display()))?;
        file.write_all(&buf)
            .with_context(|| format!("failed to write telemetry log: {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AutofixLog<'a> {
    schema_version: &'static str,
    tool_version: &'static str,
    command: &'static str,
    finished_at: String,
    policy: Policy,
    shape: DatasetShape,
    items: usize,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    fixed_fields: &'a FixTelemetry,
}

pub fn logs_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/riskgate/logs")
}

/// What one `fix` run changed.
#[derive(Debug, Clone, Copy)]
pub struct AutofixRun<'a> {
    pub finished_at: OffsetDateTime,
    pub policy: Policy,
    pub shape: DatasetShape,
    pub items: usize,
    pub source: &'a Path,
    pub output: Option<&'a Path>,
    pub fixed_fields: &'a FixTelemetry,
}

/// Records an applied autofix run as a standalone JSON file.
pub fn write_autofix_log(home_dir: &Path, run: &AutofixRun<'_>) -> Result<PathBuf> {
    let dir = logs_dir(home_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = run.finished_at.unix_timestamp_nanos();
    let path = dir.join(format!("autofix-{pid}-{ts}.json"));

    let log = AutofixLog {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION"),
        command: "fix",
        finished_at: format_ts(run.finished_at),
        policy: run.policy,
        shape: run.shape,
        items: run.items,
        source: mask_home(run.source, home_dir),
        output: run.output.map(|p| mask_home(p, home_dir)),
        fixed_fields: run.fixed_fields,
    };

    let buf = serde_json::to_vec_pretty(&log).context("failed to serialize autofix log")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write log: {}", path.display()))?;
    Ok(path)
}

fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

fn mask_home(path: &Path, home_dir: &Path) -> String {
    let Ok(stripped) = path.strip_prefix(home_dir) else {
        return path.display().to_string();
    };
    let stripped = stripped.display().to_string();
    if stripped.is_empty() {
        "~".to_string()
    } else {
        format!("~/{stripped}")
    }
}
