//! Turns the loosely structured risk list returned by the summarizer into
//! canonical, de-duplicated [`RiskItem`]s.
//!
//! Passes run in a fixed order: normalize, aggregate low-severity port noise,
//! then title-pattern merges. Each pass is total; a malformed record is
//! defaulted in place and never aborts the run.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::core::precedence::{first_present, first_text};
use crate::core::{RiskItem, Severity, extend_unique_cves};
use crate::validate::contracts::loose_bool;

pub const STANDARD_PORTS: [u32; 5] = [80, 443, 22, 21, 3306];
pub const UNCOMMON_PORTS_ID: &str = "risk:uncommon-web-admin-ports";
pub const UNCOMMON_PORTS_TITLE: &str = "Uncommon web/admin ports";
pub const MAX_MERGED_EVIDENCE: usize = 6;

const UNCOMMON_PORTS_WHY: &str =
    "Uncommon ports increase scan and exposure surface; often unauthenticated admin UIs.";
const UNCOMMON_PORTS_FIX: &str =
    "Restrict by IP, require auth, put behind reverse proxy/Web Application Firewall.";

static EXPOSED_PORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Service exposed on port\s+(\d+)").expect("valid port pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRule {
    pub kind: &'static str,
    /// Lowercase substring matched against lowercased titles.
    pub needle: &'static str,
    pub title: &'static str,
    pub why_it_matters: &'static str,
    pub recommended_fix: &'static str,
}

impl MergeRule {
    pub fn merged_id(&self) -> String {
        format!("risk:{}:merged", self.kind)
    }

    pub fn matches(&self, title: &str) -> bool {
        title.to_lowercase().contains(self.needle)
    }
}

pub const MERGE_RULES: &[MergeRule] = &[
    MergeRule {
        kind: "ssh-exposure",
        needle: "openssh exposure",
        title: "OpenSSH exposure",
        why_it_matters: "Common brute-force surface; outdated versions carry critical CVEs.",
        recommended_fix: "Keys+MFA, fail2ban; patch to latest LTS; restrict via bastion.",
    },
    MergeRule {
        kind: "ftp-detected",
        needle: "ftp service detected",
        title: "FTP service detected",
        why_it_matters: "Legacy protocol; cleartext creds/files common.",
        recommended_fix: "Disable or migrate to SFTP/FTPS; scope to internal.",
    },
];

pub fn consolidate(raw: &[Value]) -> Vec<RiskItem> {
    let items: Vec<RiskItem> = raw.iter().map(normalize_risk).collect();
    let before = items.len();
    let items = aggregate_uncommon_ports(items);
    let items = merge_by_title(items, MERGE_RULES);
    tracing::debug!(before, after = items.len(), "risks consolidated");
    items
}

/// Reads one upstream record with alternate field names.
pub fn normalize_risk(raw: &Value) -> RiskItem {
    let title = first_text(raw, &["title", "context", "id"]).unwrap_or_default();
    let id = first_text(raw, &["id", "title", "context"]).unwrap_or_default();
    let severity = Severity::normalize_or_low(raw.get("severity").and_then(Value::as_str));

    let mut related_cves = Vec::new();
    extend_unique_cves(&mut related_cves, text_list(raw.get("related_cves")));

    RiskItem {
        id,
        title,
        severity,
        evidence: text_list(raw.get("evidence")),
        related_cves,
        why_it_matters: first_text(raw, &["why_it_matters", "context"]).unwrap_or_default(),
        recommended_fix: first_text(raw, &["recommended_fix"]).unwrap_or_default(),
        kev: raw.get("kev").is_some_and(truthy),
        cvss: raw.get("cvss").and_then(Value::as_f64),
        epss: raw.get("epss").and_then(Value::as_f64),
        details: first_present(raw, &["details"]).cloned(),
    }
}

/// Folds two or more LOW "Service exposed on port N" items into one card
/// listing the non-standard ports. Nothing changes when fewer than two items
/// match or every matched port is standard.
pub fn aggregate_uncommon_ports(items: Vec<RiskItem>) -> Vec<RiskItem> {
    let exposed_port = |item: &RiskItem| -> Option<u32> {
        if item.severity != Severity::Low {
            return None;
        }
        let caps = EXPOSED_PORT.captures(&item.title)?;
        caps.get(1)?.as_str().parse::<u32>().ok()
    };

    let matched: Vec<u32> = items.iter().filter_map(exposed_port).collect();
    if matched.len() < 2 {
        return items;
    }

    let mut ports: Vec<u32> = matched
        .into_iter()
        .filter(|p| !STANDARD_PORTS.contains(p))
        .collect();
    ports.sort_unstable();
    ports.dedup();
    if ports.is_empty() {
        return items;
    }

    let mut out: Vec<RiskItem> = items
        .into_iter()
        .filter(|item| exposed_port(item).is_none())
        .collect();

    let mut card = RiskItem::new(UNCOMMON_PORTS_ID, UNCOMMON_PORTS_TITLE, Severity::Low);
    card.evidence = ports.iter().map(|p| format!("port {p}")).collect();
    card.why_it_matters = UNCOMMON_PORTS_WHY.to_string();
    card.recommended_fix = UNCOMMON_PORTS_FIX.to_string();
    out.push(card);
    out
}

/// Applies each rule once, in order. A rule with two or more matching items
/// replaces them with one merged item at the front of the list.
pub fn merge_by_title(mut items: Vec<RiskItem>, rules: &[MergeRule]) -> Vec<RiskItem> {
    for rule in rules {
        let matches = items.iter().filter(|item| rule.matches(&item.title)).count();
        if matches < 2 {
            continue;
        }
        let (group, rest): (Vec<RiskItem>, Vec<RiskItem>) =
            items.into_iter().partition(|item| rule.matches(&item.title));
        let merged = merge_group(rule, &group);
        items = Vec::with_capacity(rest.len() + 1);
        items.push(merged);
        items.extend(rest);
    }
    items
}

fn merge_group(rule: &MergeRule, group: &[RiskItem]) -> RiskItem {
    let severity = group
        .iter()
        .map(|item| item.severity)
        .max()
        .unwrap_or_default();

    let mut merged = RiskItem::new(rule.merged_id(), rule.title, severity);
    merged.evidence = group
        .iter()
        .flat_map(|item| item.evidence.iter().cloned())
        .take(MAX_MERGED_EVIDENCE)
        .collect();
    for item in group {
        extend_unique_cves(&mut merged.related_cves, &item.related_cves);
    }
    merged.why_it_matters = group
        .iter()
        .map(|item| item.why_it_matters.as_str())
        .find(|s| !s.is_empty())
        .unwrap_or(rule.why_it_matters)
        .to_string();
    merged.recommended_fix = group
        .iter()
        .map(|item| item.recommended_fix.as_str())
        .find(|s| !s.is_empty())
        .unwrap_or(rule.recommended_fix)
        .to_string();
    merged.kev = group.iter().any(|item| item.kev);
    merged.cvss = max_defined(group.iter().map(|item| item.cvss));
    merged.epss = max_defined(group.iter().map(|item| item.epss));
    merged
}

/// Maximum over the values that are actually defined; `None` when none are.
fn max_defined(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| match acc {
        Some(m) if m >= v => Some(m),
        _ => Some(v),
    })
}

fn text_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        other => loose_bool(other) == Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn port_item(port: u32) -> Value {
        json!({
            "id": format!("risk:port-{port}"),
            "title": format!("Service exposed on port {port}"),
            "severity": "LOW",
            "evidence": [format!("10.0.0.1:{port}")],
        })
    }

    #[test]
    fn normalize_uses_title_precedence_and_defaults() {
        let item = normalize_risk(&json!({"context": "Weak TLS", "severity": "bogus"}));
        assert_eq!(item.title, "Weak TLS");
        assert_eq!(item.id, "Weak TLS");
        assert_eq!(item.why_it_matters, "Weak TLS");
        assert_eq!(item.severity, Severity::Low);
        assert!(item.evidence.is_empty());
        assert!(item.related_cves.is_empty());
        assert_eq!(item.cvss, None);

        let item = normalize_risk(&json!({"id": "r1", "title": "", "severity": " high "}));
        assert_eq!(item.title, "r1");
        assert_eq!(item.severity, Severity::High);
    }

    #[test]
    fn normalize_coerces_scalar_lists_and_dedupes_cves() {
        let item = normalize_risk(&json!({
            "title": "x",
            "evidence": "1.2.3.4:22",
            "related_cves": ["CVE-2024-1", "cve-2024-1", "CVE-2024-2"],
            "kev": "true",
            "cvss": 9.8,
            "epss": "0.4",
        }));
        assert_eq!(item.evidence, vec!["1.2.3.4:22"]);
        assert_eq!(item.related_cves, vec!["CVE-2024-1", "CVE-2024-2"]);
        assert!(item.kev);
        assert_eq!(item.cvss, Some(9.8));
        assert_eq!(item.epss, None);
    }

    #[test]
    fn malformed_records_are_defaulted_not_dropped() {
        let out = consolidate(&[json!(null), json!("text"), json!(42)]);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.severity == Severity::Low));
    }

    #[test]
    fn uncommon_ports_are_aggregated() {
        let raw = [port_item(22), port_item(80), port_item(8080), port_item(9090)];
        let out = consolidate(&raw);
        assert_eq!(out.len(), 1);
        let card = &out[0];
        assert_eq!(card.id, UNCOMMON_PORTS_ID);
        assert_eq!(card.severity, Severity::Low);
        assert_eq!(card.evidence, vec!["port 8080", "port 9090"]);
        assert!(!card.why_it_matters.is_empty());
        assert!(!card.recommended_fix.is_empty());
    }

    #[test]
    fn port_number_is_read_whole() {
        let out = consolidate(&[port_item(123456), port_item(8080)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].evidence, vec!["port 8080", "port 123456"]);
    }

    #[test]
    fn single_port_item_is_left_alone() {
        let raw = [
            json!({"id": "a", "title": "Weak cipher", "severity": "HIGH"}),
            port_item(8443),
        ];
        let before: Vec<RiskItem> = raw.iter().map(normalize_risk).collect();
        assert_eq!(consolidate(&raw), before);
    }

    #[test]
    fn only_standard_ports_never_creates_empty_card() {
        let raw = [port_item(22), port_item(443), port_item(80)];
        let before: Vec<RiskItem> = raw.iter().map(normalize_risk).collect();
        assert_eq!(consolidate(&raw), before);
    }

    #[test]
    fn non_low_port_items_are_not_aggregated() {
        let mut high = port_item(8080);
        high["severity"] = json!("HIGH");
        let raw = [high, port_item(9090)];
        let out = consolidate(&raw);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.id != UNCOMMON_PORTS_ID));
    }

    #[test]
    fn aggregate_card_goes_last_and_dedupes_ports() {
        let raw = [
            port_item(9090),
            json!({"id": "a", "title": "Weak cipher", "severity": "HIGH"}),
            port_item(8080),
            port_item(9090),
        ];
        let out = consolidate(&raw);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "a");
        assert_eq!(out[1].evidence, vec!["port 8080", "port 9090"]);
    }

    #[test]
    fn openssh_items_merge_to_front_with_max_severity() {
        let raw = [
            json!({"id": "other", "title": "Expired certificate", "severity": "MEDIUM"}),
            json!({"id": "s1", "title": "OpenSSH exposure on 10.0.0.1", "severity": "MEDIUM",
                   "evidence": ["10.0.0.1:22"], "related_cves": ["CVE-2024-6387"]}),
            json!({"id": "s2", "title": "openssh EXPOSURE", "severity": "HIGH",
                   "evidence": ["10.0.0.2:22"], "related_cves": ["cve-2024-6387", "CVE-2023-1"],
                   "kev": true}),
        ];
        let out = consolidate(&raw);
        assert_eq!(out.len(), 2);
        let merged = &out[0];
        assert_eq!(merged.id, "risk:ssh-exposure:merged");
        assert_eq!(merged.title, "OpenSSH exposure");
        assert_eq!(merged.severity, Severity::High);
        assert_eq!(merged.evidence, vec!["10.0.0.1:22", "10.0.0.2:22"]);
        assert_eq!(merged.related_cves, vec!["CVE-2024-6387", "CVE-2023-1"]);
        assert!(merged.kev);
        assert_eq!(merged.why_it_matters, MERGE_RULES[0].why_it_matters);
        assert_eq!(out[1].id, "other");
    }

    #[test]
    fn merged_scores_stay_undefined_when_no_member_has_them() {
        let raw = [
            json!({"title": "FTP service detected on a", "severity": "LOW"}),
            json!({"title": "FTP service detected on b", "severity": "MEDIUM"}),
        ];
        let out = consolidate(&raw);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "risk:ftp-detected:merged");
        assert_eq!(out[0].cvss, None);
        assert_eq!(out[0].epss, None);
    }

    #[test]
    fn merged_scores_take_max_of_defined_values() {
        let raw = [
            json!({"title": "FTP service detected", "cvss": 5.3}),
            json!({"title": "FTP service detected", "epss": 0.02}),
            json!({"title": "FTP service detected", "cvss": 7.5,
                   "why_it_matters": "plaintext creds seen"}),
        ];
        let out = consolidate(&raw);
        assert_eq!(out[0].cvss, Some(7.5));
        assert_eq!(out[0].epss, Some(0.02));
        assert_eq!(out[0].why_it_matters, "plaintext creds seen");
        assert_eq!(out[0].recommended_fix, MERGE_RULES[1].recommended_fix);
    }

    #[test]
    fn merged_evidence_is_capped() {
        let raw: Vec<Value> = (0..4)
            .map(|i| json!({"title": "OpenSSH exposure", "evidence": [format!("a{i}"), format!("b{i}")]}))
            .collect();
        let out = consolidate(&raw);
        assert_eq!(out[0].evidence.len(), MAX_MERGED_EVIDENCE);
        assert_eq!(out[0].evidence[..2], ["a0", "b0"]);
    }

    #[test]
    fn both_rules_fire_and_ftp_ends_up_first() {
        let raw = [
            json!({"title": "OpenSSH exposure"}),
            json!({"title": "OpenSSH exposure"}),
            json!({"title": "FTP service detected"}),
            json!({"title": "FTP service detected"}),
        ];
        let ids: Vec<String> = consolidate(&raw).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["risk:ftp-detected:merged", "risk:ssh-exposure:merged"]);
    }
}
