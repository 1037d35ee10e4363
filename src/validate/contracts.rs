//! Field contracts shared by the validator and the autofix pass. Both sides
//! must agree on what "already normalized" means, so the field tables and the
//! coercions live here and nowhere else.

use serde_json::{Number, Value};

pub const NUMERIC_FIELDS: &[&str] = &[
    "port",
    "cvss",
    "cvss_score",
    "cvss_max",
    "epss",
    "asn",
    "service_count",
];

pub const BOOLEAN_FIELDS: &[&str] = &[
    "kev",
    "kev_present",
    "tls_enabled",
    "auth_required",
    "authentication_required",
    "self_signed",
    "cert_self_signed",
];

pub const CVE_LIST_FIELDS: &[&str] = &["cves", "related_cves", "cve_ids"];

/// Sequences of nested entries. `vulns`/`vulnerabilities` may hold CVE strings.
pub const NESTED_LIST_FIELDS: &[&str] = &["services", "vulns", "vulnerabilities"];

pub const CVSS_FIELDS: &[&str] = &["cvss", "cvss_score", "cvss_max"];

pub const KEV_FIELDS: &[&str] = &["kev", "kev_present"];

pub const HOST_KEYS: &[&str] = &[
    "ip",
    "location",
    "autonomous_system",
    "labels",
    "services",
    "other",
    "kev_present",
    "dns",
    "operating_system",
    "service_count",
    "country",
    "severity",
    "kev",
    "cves",
    "cvss",
    "cvss_max",
    "epss",
    "last_updated_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Boolean,
    Severity,
    Country,
    Ip,
    CveList,
    NestedList,
    Other,
}

pub fn field_kind(key: &str) -> FieldKind {
    if NUMERIC_FIELDS.contains(&key) {
        FieldKind::Numeric
    } else if BOOLEAN_FIELDS.contains(&key) {
        FieldKind::Boolean
    } else if CVE_LIST_FIELDS.contains(&key) {
        FieldKind::CveList
    } else if NESTED_LIST_FIELDS.contains(&key) {
        FieldKind::NestedList
    } else {
        match key {
            "severity" => FieldKind::Severity,
            "country" => FieldKind::Country,
            "ip" => FieldKind::Ip,
            _ => FieldKind::Other,
        }
    }
}

/// Parses a numeric-looking string. Integers stay integers.
pub fn number_from_str(s: &str) -> Option<Number> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        return Some(Number::from(n));
    }
    if let Ok(n) = s.parse::<u64>() {
        return Some(Number::from(n));
    }
    let f = s.parse::<f64>().ok()?;
    if !f.is_finite() {
        return None;
    }
    Number::from_f64(f)
}

pub fn bool_from_str(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Reads a number that may still be carried as a numeric string.
pub fn loose_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => number_from_str(s).and_then(|n| n.as_f64()),
        _ => None,
    }
}

pub fn loose_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => bool_from_str(s),
        _ => None,
    }
}

pub fn has_outer_whitespace(s: &str) -> bool {
    s.trim().len() != s.len()
}

pub fn needs_titlecase(s: &str) -> bool {
    titlecase(s) != s
}

/// Uppercases the first letter of every word, leaving the rest untouched.
pub fn titlecase(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            at_word_start = false;
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Number of string entries that repeat an earlier one, ignoring case.
pub fn duplicate_cve_count(items: &[Value]) -> usize {
    let mut seen: Vec<String> = Vec::new();
    let mut dups = 0;
    for item in items {
        let Value::String(s) = item else { continue };
        let key = s.trim().to_ascii_uppercase();
        if seen.contains(&key) {
            dups += 1;
        } else {
            seen.push(key);
        }
    }
    dups
}

pub fn port_in_range(n: &Number) -> bool {
    n.as_u64().is_some_and(|p| (1..=65535).contains(&p))
}
