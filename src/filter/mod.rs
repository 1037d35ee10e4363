//! Filter evaluation and presentation helpers over consolidated risks.
//!
//! Filters are ANDed, including filters of the same type, so two different
//! severities always produce an empty view.

use std::sync::LazyLock;

use regex::Regex;

use crate::consolidate::UNCOMMON_PORTS_TITLE;
use crate::core::{Filter, FilterKind, RiskItem};

static GENERIC_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"port\s+\d+").expect("valid port pattern"));

static PORT_EVIDENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^port\s+\d+$").expect("valid port evidence pattern"));

/// Returns the risks matching every filter, in input order.
pub fn apply<'a>(risks: &'a [RiskItem], filters: &[Filter]) -> Vec<&'a RiskItem> {
    risks
        .iter()
        .filter(|risk| filters.iter().all(|f| matches(risk, f)))
        .collect()
}

pub fn matches(risk: &RiskItem, filter: &Filter) -> bool {
    let value = filter.value.trim();
    match filter.kind {
        FilterKind::Severity => risk.severity.as_str().eq_ignore_ascii_case(value),
        FilterKind::Port => risk.evidence.iter().any(|e| evidence_has_port(e, value)),
        FilterKind::Country => {
            let needle = value.to_lowercase();
            risk.evidence
                .iter()
                .any(|e| e.to_lowercase().contains(&needle))
        }
    }
}

/// `host:PORT` followed by whitespace or end of text, or any `port N` phrase
/// that also mentions the value.
fn evidence_has_port(evidence: &str, port: &str) -> bool {
    if port.is_empty() {
        return false;
    }
    let delimited = evidence.match_indices(':').any(|(at, _)| {
        let rest = &evidence[at + 1..];
        rest.strip_prefix(port)
            .is_some_and(|tail| tail.chars().next().is_none_or(char::is_whitespace))
    });
    delimited || (GENERIC_PORT.is_match(evidence) && evidence.contains(port))
}

/// Title as shown to the analyst. The aggregated ports card gets its port count.
pub fn display_title(risk: &RiskItem) -> String {
    if risk.title.eq_ignore_ascii_case(UNCOMMON_PORTS_TITLE) {
        let ports = risk
            .evidence
            .iter()
            .filter(|e| PORT_EVIDENCE.is_match(e))
            .count();
        if ports > 0 {
            return format!("{UNCOMMON_PORTS_TITLE} ({ports})");
        }
    }
    risk.title.clone()
}

/// Stable sort, most severe first.
pub fn rank_by_severity(risks: &mut [&RiskItem]) {
    risks.sort_by(|a, b| b.severity.cmp(&a.severity));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;

    fn risk(id: &str, severity: Severity, evidence: &[&str]) -> RiskItem {
        let mut r = RiskItem::new(id, id, severity);
        r.evidence = evidence.iter().map(|s| s.to_string()).collect();
        r
    }

    fn mixed() -> Vec<RiskItem> {
        let sevs = [
            Severity::High,
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
            Severity::Low,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Critical,
        ];
        sevs.iter()
            .enumerate()
            .map(|(i, s)| risk(&format!("r{i}"), *s, &[]))
            .collect()
    }

    #[test]
    fn severity_filter_keeps_only_that_severity() {
        let risks = mixed();
        let out = apply(&risks, &[Filter::severity("high")]);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.severity == Severity::High));
    }

    #[test]
    fn conflicting_severities_yield_nothing() {
        let risks = mixed();
        let out = apply(&risks, &[Filter::severity("HIGH"), Filter::severity("LOW")]);
        assert!(out.is_empty());
    }

    #[test]
    fn no_filters_returns_everything() {
        let risks = mixed();
        assert_eq!(apply(&risks, &[]).len(), risks.len());
    }

    #[test]
    fn port_filter_requires_delimiter_boundary() {
        let risks = vec![
            risk("a", Severity::Low, &["10.0.0.1:8080"]),
            risk("b", Severity::Low, &["10.0.0.1:80801"]),
            risk("c", Severity::Low, &["port 8080"]),
            risk("d", Severity::Low, &["10.0.0.1:8080 (http)"]),
            risk("e", Severity::Low, &["8080 only"]),
        ];
        let ids: Vec<&str> = apply(&risks, &[Filter::port("8080")])
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
    }

    #[test]
    fn country_filter_is_case_insensitive_substring() {
        let risks = vec![
            risk("a", Severity::Low, &["1.2.3.4 (United States)"]),
            risk("b", Severity::Low, &["5.6.7.8 (Germany)"]),
        ];
        let out = apply(&risks, &[Filter::country("united")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn filtering_does_not_mutate_input() {
        let risks = mixed();
        let copy = risks.clone();
        let _ = apply(&risks, &[Filter::severity("LOW")]);
        assert_eq!(risks, copy);
    }

    #[test]
    fn uncommon_ports_title_shows_count() {
        let card = RiskItem {
            evidence: vec!["port 8080".into(), "port 9090".into()],
            ..RiskItem::new("risk:uncommon-web-admin-ports", UNCOMMON_PORTS_TITLE, Severity::Low)
        };
        assert_eq!(display_title(&card), "Uncommon web/admin ports (2)");

        let plain = risk("Weak TLS", Severity::High, &["port 443"]);
        assert_eq!(display_title(&plain), "Weak TLS");
    }

    #[test]
    fn ranking_is_stable_and_most_severe_first() {
        let risks = mixed();
        let mut view = apply(&risks, &[]);
        rank_by_severity(&mut view);
        let ids: Vec<&str> = view.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["r4", "r9", "r0", "r3", "r6", "r2", "r7", "r1", "r5", "r8"]
        );
    }
}
