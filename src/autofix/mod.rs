//! Deterministic, idempotent repair of a dataset.
//!
//! Every coercion reshapes a value that is already there; nothing is invented
//! and nothing is dropped except duplicate CVE strings. Running the pass over
//! its own output changes nothing and reports no fixes.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::core::{DatasetPayload, FixCategory, FixTelemetry, Issue, Severity};
use crate::validate::contracts::{self, FieldKind};

#[derive(Debug, Clone, PartialEq)]
pub struct AutofixOutcome {
    pub fixed: DatasetPayload,
    pub telemetry: FixTelemetry,
}

impl AutofixOutcome {
    pub fn changed(&self) -> bool {
        !self.telemetry.is_empty()
    }

    pub fn total_fixes(&self) -> u64 {
        self.telemetry.values().sum()
    }
}

/// Repairs `payload` when the validator reported at least one fixable issue.
pub fn apply(payload: &DatasetPayload, issues: &[Issue]) -> Option<AutofixOutcome> {
    if !issues.iter().any(Issue::fixable) {
        return None;
    }
    Some(normalize(payload))
}

/// Unconditional normalization pass.
pub fn normalize(payload: &DatasetPayload) -> AutofixOutcome {
    let mut fixed = payload.clone();
    let mut counts = Counts::default();
    for record in fixed.items_mut() {
        if let Value::Object(map) = record {
            fix_object(map, &mut counts);
        }
    }
    let telemetry = counts.into_telemetry();
    tracing::debug!(fixes = telemetry.values().sum::<u64>(), "autofix pass finished");
    AutofixOutcome { fixed, telemetry }
}

#[derive(Default)]
struct Counts(BTreeMap<FixCategory, u64>);

impl Counts {
    fn bump(&mut self, category: FixCategory, n: u64) {
        if n > 0 {
            *self.0.entry(category).or_default() += n;
        }
    }

    fn into_telemetry(self) -> FixTelemetry {
        self.0
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v))
            .collect()
    }
}

fn fix_object(map: &mut Map<String, Value>, counts: &mut Counts) {
    for (key, value) in map.iter_mut() {
        fix_field(key, value, counts);
    }
}

fn fix_field(key: &str, value: &mut Value, counts: &mut Counts) {
    if value.is_null() {
        return;
    }
    match contracts::field_kind(key) {
        FieldKind::Numeric => {
            if let Value::String(s) = value
                && let Some(n) = contracts::number_from_str(s)
            {
                *value = Value::Number(n);
                counts.bump(FixCategory::NumbersCoerced, 1);
            }
        }
        FieldKind::Boolean => {
            if let Value::String(s) = value
                && let Some(b) = contracts::bool_from_str(s)
            {
                *value = Value::Bool(b);
                counts.bump(FixCategory::BooleansCoerced, 1);
            }
        }
        FieldKind::Severity => {
            if let Value::String(s) = value
                && let Some(sev) = Severity::normalize(s)
                && sev.as_str() != s.as_str()
            {
                *s = sev.as_str().to_string();
                counts.bump(FixCategory::SeverityNormalized, 1);
            }
        }
        FieldKind::Country => {
            fix_any(value, counts);
            if let Value::String(s) = value
                && contracts::needs_titlecase(s)
            {
                *s = contracts::titlecase(s);
                counts.bump(FixCategory::CountryTitlecased, 1);
            }
        }
        FieldKind::Ip => {
            if value.is_string() {
                fix_any(value, counts);
            }
        }
        FieldKind::CveList | FieldKind::NestedList => {
            if let Value::Array(items) = value {
                for item in items.iter_mut() {
                    fix_any(item, counts);
                }
                let removed = dedupe_cves(items);
                counts.bump(FixCategory::CveDeduped, removed as u64);
            }
        }
        FieldKind::Other => fix_any(value, counts),
    }
}

fn fix_any(value: &mut Value, counts: &mut Counts) {
    match value {
        Value::String(s) => {
            if contracts::has_outer_whitespace(s) {
                *s = s.trim().to_string();
                counts.bump(FixCategory::StringsTrimmed, 1);
            }
        }
        Value::Object(map) => fix_object(map, counts),
        Value::Array(items) => {
            for item in items.iter_mut() {
                fix_any(item, counts);
            }
        }
        _ => {}
    }
}

/// Drops string entries that repeat an earlier one (ignoring case), keeping
/// first-seen order. Non-string entries stay where they are.
fn dedupe_cves(items: &mut Vec<Value>) -> usize {
    let before = items.len();
    let mut seen: Vec<String> = Vec::new();
    items.retain(|item| {
        let Value::String(s) = item else {
            return true;
        };
        let key = s.trim().to_ascii_uppercase();
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
    before - items.len()
}
