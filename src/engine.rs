use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::core::{
    DatasetPayload, Filter, GateAction, GateDecision, Policy, RiskItem, Stats, ValidationResult,
};
use crate::error::ParseError;
use crate::logs::{NullSink, TelemetrySink};
use crate::store::{DEFAULT_FIXED_TTL, Store};
use crate::upstream::{SummarizeOptions, Summarizer, SummaryView};
use crate::validate::Limits;

pub const SUMMARIZE_FAILED_NOTICE: &str = "Summarize failed — using fallback data";

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub limits: Limits,
    pub save_fixed_copy: bool,
    pub fixed_ttl: Duration,
    /// Where fixed copies go. `None` disables caching.
    pub store_path: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            save_fixed_copy: true,
            fixed_ttl: DEFAULT_FIXED_TTL,
            store_path: None,
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    opts: EngineOptions,
    sink: Arc<dyn TelemetrySink + Send + Sync>,
}

/// Outcome of the input side: validation, optional autofix and the gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Checked {
    pub result: ValidationResult,
    pub decision: GateDecision,
    /// Canonical payload as submitted. `None` when the text never decoded.
    #[serde(skip)]
    pub payload: Option<DatasetPayload>,
}

impl Checked {
    /// Payload to hand to the summarizer. Fixes are only used once the caller
    /// has confirmed them.
    pub fn payload_to_submit(&self, fixes_confirmed: bool) -> Option<&DatasetPayload> {
        match self.decision.action {
            GateAction::Block => None,
            GateAction::Proceed => self.payload.as_ref(),
            GateAction::ProceedWithFixes if fixes_confirmed => {
                self.result.fixed.as_ref().or(self.payload.as_ref())
            }
            GateAction::ProceedWithFixes => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub view: SummaryView,
    /// Consolidated and filtered.
    pub risks: Vec<RiskItem>,
    /// Consolidated count before filtering.
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl Engine {
    pub fn new(opts: EngineOptions, sink: Arc<dyn TelemetrySink + Send + Sync>) -> Self {
        Self { opts, sink }
    }

    /// Engine with default limits, no telemetry and no cache.
    pub fn offline() -> Self {
        Self::new(EngineOptions::default(), Arc::new(NullSink))
    }

    pub fn options(&self) -> &EngineOptions {
        &self.opts
    }

    /// Like [`Engine::check_text`], for raw file contents. Bytes that are not
    /// UTF-8 fail the parse gate instead of erroring.
    pub fn check_bytes(&self, bytes: &[u8], policy: Policy, request_id: Option<&str>) -> Checked {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.check_text(text, policy, request_id),
            Err(err) => {
                let err = ParseError::from_utf8(&err, bytes);
                tracing::debug!(offset = ?err.offset, "input is not utf-8");
                let result = crate::validate::parse_failure(&err, policy, bytes.len() as u64);
                self.finish(result, None, request_id)
            }
        }
    }

    pub fn check_text(&self, text: &str, policy: Policy, request_id: Option<&str>) -> Checked {
        let approx_bytes = text.len() as u64;
        match crate::validate::parse_dataset(text) {
            Ok(value) => self.check_value(&value, policy, request_id),
            Err(err) => {
                tracing::debug!(line = ?err.line, column = ?err.column, "parse gate failed");
                let result = crate::validate::parse_failure(&err, policy, approx_bytes);
                self.finish(result, None, request_id)
            }
        }
    }

    pub fn check_value(&self, value: &Value, policy: Policy, request_id: Option<&str>) -> Checked {
        if policy == Policy::Off {
            let payload = DatasetPayload::decode_or_wrap(value);
            let stats = Stats {
                items: payload.len() as u64,
                approx_bytes: serde_json::to_vec(value).map(|v| v.len() as u64).unwrap_or(0),
                ..Stats::default()
            };
            let result = ValidationResult::from_issues(policy, Vec::new(), stats);
            return self.finish(result, Some(payload), request_id);
        }

        let mut result = crate::validate::validate(value, policy, &self.opts.limits);
        let payload = DatasetPayload::decode(value).ok();

        if result.fatal_errors.is_empty()
            && let Some(original) = &payload
            && let Some(outcome) = crate::autofix::apply(original, &result.issues)
        {
            if outcome.changed() {
                self.save_fixed_copy(&outcome.fixed);
            }
            result.autofix_applied = outcome.changed();
            result.telemetry = outcome.telemetry;
            result.fixed = Some(outcome.fixed);
        }

        self.finish(result, payload, request_id)
    }

    fn finish(
        &self,
        result: ValidationResult,
        payload: Option<DatasetPayload>,
        request_id: Option<&str>,
    ) -> Checked {
        let decision = crate::gate::decide(&result, self.sink.as_ref(), request_id);
        Checked {
            result,
            decision,
            payload,
        }
    }

    fn save_fixed_copy(&self, fixed: &DatasetPayload) {
        if !self.opts.save_fixed_copy {
            return;
        }
        let Some(path) = &self.opts.store_path else {
            return;
        };
        let saved = Store::open(path).and_then(|mut store| {
            store.save_fixed(fixed, OffsetDateTime::now_utc(), self.opts.fixed_ttl)
        });
        if let Err(err) = saved {
            tracing::warn!(error = %err, "failed to cache fixed copy");
        }
    }

    /// Summarize, consolidate, filter. Upstream failures become a notice and
    /// an empty view.
    pub fn present(
        &self,
        summarizer: &dyn Summarizer,
        payload: &DatasetPayload,
        options: &SummarizeOptions,
        filters: &[Filter],
    ) -> Presentation {
        self.present_or(summarizer, payload, options, filters, &SummaryView::default())
    }

    pub fn present_or(
        &self,
        summarizer: &dyn Summarizer,
        payload: &DatasetPayload,
        options: &SummarizeOptions,
        filters: &[Filter],
        fallback: &SummaryView,
    ) -> Presentation {
        let (view, notice) = match summarizer.summarize(payload, options) {
            Ok(resp) => (SummaryView::from_response(&resp), None),
            Err(err) => {
                tracing::warn!(error = %err, "summarizer failed; using fallback");
                (fallback.clone(), Some(SUMMARIZE_FAILED_NOTICE.to_string()))
            }
        };
        Self::present_view(view, filters, notice)
    }

    /// Consolidates and filters an already-fetched view.
    pub fn present_view(
        view: SummaryView,
        filters: &[Filter],
        notice: Option<String>,
    ) -> Presentation {
        let consolidated = crate::consolidate::consolidate(&view.risks);
        let total = consolidated.len();
        let risks = crate::filter::apply(&consolidated, filters)
            .into_iter()
            .cloned()
            .collect();
        Presentation {
            view,
            risks,
            total,
            notice,
        }
    }
}
