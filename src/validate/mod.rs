//! Schema validation for pasted or uploaded datasets.
//!
//! The validator never fails: every problem becomes an [`Issue`] classified as
//! fatal, error, strict blocker or warning, and the caller branches on the
//! resulting [`ValidationResult`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::{
    DatasetPayload, DatasetShape, Issue, IssueCode, IssueLevel, Policy, Severity, ShapeError,
    Stats, ValidationResult, kind_name,
};
use crate::error::ParseError;

pub(crate) mod contracts;

use contracts::FieldKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limits {
    pub max_bytes: u64,
    pub max_records: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
            max_records: 50_000,
        }
    }
}

/// The parse gate. Runs before validation and is independent of policy.
pub fn parse_dataset(text: &str) -> Result<Value, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::empty());
    }
    serde_json::from_str(text).map_err(|err| ParseError::from_json(&err, text))
}

/// Result for text that never made it to the validator.
pub fn parse_failure(err: &ParseError, policy: Policy, approx_bytes: u64) -> ValidationResult {
    let message = match (err.line, err.column) {
        (Some(line), Some(column)) => format!("{} (line {line}, column {column})", err.message),
        _ => err.message.clone(),
    };
    ValidationResult::from_issues(
        policy,
        vec![Issue::new(
            IssueLevel::Fatal,
            IssueCode::ParseFailed,
            "$",
            message,
        )],
        Stats {
            approx_bytes,
            ..Stats::default()
        },
    )
}

pub fn validate(value: &Value, policy: Policy, limits: &Limits) -> ValidationResult {
    let approx_bytes = serde_json::to_vec(value)
        .map(|v| v.len() as u64)
        .unwrap_or(0);

    let payload = match DatasetPayload::decode(value) {
        Ok(payload) => payload,
        Err(err) => {
            let issue = shape_issue(&err);
            return ValidationResult::from_issues(
                policy,
                vec![issue],
                Stats {
                    approx_bytes,
                    ..Stats::default()
                },
            );
        }
    };

    let mut issues = Vec::new();
    let items = payload.len() as u64;
    if approx_bytes > limits.max_bytes {
        issues.push(Issue::new(
            IssueLevel::Fatal,
            IssueCode::PayloadTooLarge,
            "$",
            format!(
                "Payload too large ({approx_bytes} bytes > {} bytes limit)",
                limits.max_bytes
            ),
        ));
    }
    if items > limits.max_records {
        issues.push(Issue::new(
            IssueLevel::Fatal,
            IssueCode::TooManyRecords,
            "$",
            format!("Too many records ({items} > {} limit)", limits.max_records),
        ));
    }

    let shape = payload.shape();
    for (idx, record) in payload.items().iter().enumerate() {
        check_record(shape, idx, record, &mut issues);
    }

    let stats = Stats {
        items,
        approx_bytes,
        kev_count: payload.items().iter().map(count_kev).sum(),
        cvss_high_count: payload.items().iter().map(count_cvss_high).sum(),
    };

    let result = ValidationResult::from_issues(policy, issues, stats);
    tracing::debug!(
        shape = %shape,
        items,
        fatal = result.fatal_errors.len(),
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        strict_blockers = result.strict_blockers.len(),
        "dataset validated"
    );
    result
}

fn shape_issue(err: &ShapeError) -> Issue {
    let path = match err {
        ShapeError::Unrecognized(_) => "$".to_string(),
        ShapeError::NotASequence { key, .. } => format!("$.{key}"),
    };
    Issue::new(
        IssueLevel::Fatal,
        IssueCode::UnrecognizedShape,
        path,
        err.to_string(),
    )
}

fn check_record(shape: DatasetShape, idx: usize, record: &Value, issues: &mut Vec<Issue>) {
    let path = format!("{}[{idx}]", shape.key());
    let Value::Object(map) = record else {
        issues.push(Issue::new(
            IssueLevel::Error,
            IssueCode::RecordNotObject,
            &path,
            format!("record {idx} must be an object, found {}", kind_name(record)),
        ));
        return;
    };

    if shape == DatasetShape::Hosts {
        for key in map.keys() {
            if !contracts::HOST_KEYS.contains(&key.as_str()) {
                issues.push(Issue::new(
                    IssueLevel::StrictBlocker,
                    IssueCode::UnknownKey,
                    format!("{path}.{key}"),
                    format!("unknown key at record {idx}: {key}"),
                ));
            }
        }
    }

    check_object(&path, map, issues);
}

fn check_object(path: &str, map: &Map<String, Value>, issues: &mut Vec<Issue>) {
    for (key, value) in map {
        check_field(&format!("{path}.{key}"), key, value, issues);
    }
}

fn check_field(path: &str, key: &str, value: &Value, issues: &mut Vec<Issue>) {
    if value.is_null() {
        return;
    }
    match contracts::field_kind(key) {
        FieldKind::Numeric => check_numeric(path, key, value, issues),
        FieldKind::Boolean => check_boolean(path, key, value, issues),
        FieldKind::Severity => check_severity(path, value, issues),
        FieldKind::Country => {
            check_any(path, value, issues);
            if let Value::String(s) = value
                && contracts::needs_titlecase(s)
            {
                issues.push(Issue::new(
                    IssueLevel::Warning,
                    IssueCode::CountryCase,
                    path,
                    format!("{path}: country is not title-cased ({s:?})"),
                ));
            }
        }
        FieldKind::Ip => {
            if value.is_string() {
                check_any(path, value, issues);
            } else {
                issues.push(Issue::new(
                    IssueLevel::Error,
                    IssueCode::NotAString,
                    path,
                    format!("{path}: ip must be a string, found {}", kind_name(value)),
                ));
            }
        }
        FieldKind::CveList | FieldKind::NestedList => {
            let Value::Array(items) = value else {
                issues.push(Issue::new(
                    IssueLevel::Error,
                    IssueCode::NotASequence,
                    path,
                    format!("{path}: {key} must be an array, found {}", kind_name(value)),
                ));
                return;
            };
            let dups = contracts::duplicate_cve_count(items);
            if dups > 0 {
                issues.push(Issue::new(
                    IssueLevel::Warning,
                    IssueCode::DuplicateCve,
                    path,
                    format!("{path}: {dups} duplicate CVE entr{}", plural_y(dups)),
                ));
            }
            for (idx, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{idx}]");
                if key == "services" {
                    check_service(&item_path, item, issues);
                } else {
                    check_any(&item_path, item, issues);
                }
            }
        }
        FieldKind::Other => check_any(path, value, issues),
    }
}

fn check_service(path: &str, service: &Value, issues: &mut Vec<Issue>) {
    let Value::Object(map) = service else {
        issues.push(Issue::new(
            IssueLevel::Error,
            IssueCode::RecordNotObject,
            path,
            format!("{path}: service must be an object, found {}", kind_name(service)),
        ));
        return;
    };
    if map.get("port").is_none_or(Value::is_null) {
        issues.push(Issue::new(
            IssueLevel::Error,
            IssueCode::PortMissing,
            format!("{path}.port"),
            format!("{path}.port missing"),
        ));
    }
    check_object(path, map, issues);
}

/// Untyped values: recurse into containers, flag padded strings.
fn check_any(path: &str, value: &Value, issues: &mut Vec<Issue>) {
    match value {
        Value::String(s) => {
            if contracts::has_outer_whitespace(s) {
                issues.push(Issue::new(
                    IssueLevel::Warning,
                    IssueCode::Whitespace,
                    path,
                    format!("{path}: leading/trailing whitespace"),
                ));
            }
        }
        Value::Object(map) => check_object(path, map, issues),
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                check_any(&format!("{path}[{idx}]"), item, issues);
            }
        }
        _ => {}
    }
}

fn check_numeric(path: &str, key: &str, value: &Value, issues: &mut Vec<Issue>) {
    let number = match value {
        Value::Number(n) => n.clone(),
        Value::String(s) => match contracts::number_from_str(s) {
            Some(n) => {
                issues.push(Issue::new(
                    IssueLevel::Error,
                    IssueCode::NumericString,
                    path,
                    format!("{path}: {key} should be a number, found string {s:?}"),
                ));
                n
            }
            None => {
                issues.push(Issue::new(
                    IssueLevel::Error,
                    IssueCode::NotNumeric,
                    path,
                    format!("{path}: {key} must be numeric, found {s:?}"),
                ));
                return;
            }
        },
        other => {
            issues.push(Issue::new(
                IssueLevel::Error,
                IssueCode::NotNumeric,
                path,
                format!("{path}: {key} must be numeric, found {}", kind_name(other)),
            ));
            return;
        }
    };
    if key == "port" && !contracts::port_in_range(&number) {
        issues.push(Issue::new(
            IssueLevel::Error,
            IssueCode::PortOutOfRange,
            path,
            format!("{path}: port {number} out of range 1..65535"),
        ));
    }
}

fn check_boolean(path: &str, key: &str, value: &Value, issues: &mut Vec<Issue>) {
    match value {
        Value::Bool(_) => {}
        Value::String(s) if contracts::bool_from_str(s).is_some() => {
            issues.push(Issue::new(
                IssueLevel::Error,
                IssueCode::BooleanString,
                path,
                format!("{path}: {key} should be a boolean, found string {s:?}"),
            ));
        }
        other => {
            issues.push(Issue::new(
                IssueLevel::Error,
                IssueCode::NotBoolean,
                path,
                format!("{path}: {key} must be a boolean, found {other}"),
            ));
        }
    }
}

fn check_severity(path: &str, value: &Value, issues: &mut Vec<Issue>) {
    let Value::String(s) = value else {
        issues.push(Issue::new(
            IssueLevel::Error,
            IssueCode::SeverityUnknown,
            path,
            format!("{path}: severity must be a string, found {}", kind_name(value)),
        ));
        return;
    };
    match Severity::normalize(s) {
        Some(sev) if sev.as_str() == s.as_str() => {}
        Some(sev) => issues.push(Issue::new(
            IssueLevel::Warning,
            IssueCode::SeverityVariant,
            path,
            format!("{path}: severity {s:?} normalizes to {sev}"),
        )),
        None => issues.push(Issue::new(
            IssueLevel::Error,
            IssueCode::SeverityUnknown,
            path,
            format!("{path}: unrecognized severity {s:?}"),
        )),
    }
}

fn count_kev(value: &Value) -> u64 {
    match value {
        Value::Object(map) => {
            let own = contracts::KEV_FIELDS
                .iter()
                .filter_map(|k| map.get(*k))
                .any(|v| contracts::loose_bool(v) == Some(true));
            u64::from(own) + map.values().map(count_kev).sum::<u64>()
        }
        Value::Array(items) => items.iter().map(count_kev).sum(),
        _ => 0,
    }
}

fn count_cvss_high(value: &Value) -> u64 {
    match value {
        Value::Object(map) => {
            let own = contracts::CVSS_FIELDS
                .iter()
                .filter_map(|k| map.get(*k))
                .filter_map(contracts::loose_f64)
                .any(|score| score >= 7.0);
            u64::from(own) + map.values().map(count_cvss_high).sum::<u64>()
        }
        Value::Array(items) => items.iter().map(count_cvss_high).sum(),
        _ => 0,
    }
}

fn plural_y(n: usize) -> &'static str {
    if n == 1 { "y" } else { "ies" }
}
