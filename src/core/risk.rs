use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Severity;

/// A canonical risk finding as shown to an analyst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskItem {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub evidence: Vec<String>,
    /// Case-insensitively unique, first-seen order.
    pub related_cves: Vec<String>,
    pub why_it_matters: String,
    pub recommended_fix: String,
    pub kev: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cvss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub epss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<Value>,
}

impl RiskItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            severity,
            evidence: Vec::new(),
            related_cves: Vec::new(),
            why_it_matters: String::new(),
            recommended_fix: String::new(),
            kev: false,
            cvss: None,
            epss: None,
            details: None,
        }
    }
}

/// Appends `cves` to `out`, skipping values already present (ignoring case).
pub fn extend_unique_cves<I, S>(out: &mut Vec<String>, cves: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for cve in cves {
        let cve = cve.as_ref();
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(cve)) {
            out.push(cve.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cve_union_ignores_case_and_keeps_first_seen() {
        let mut out = vec!["CVE-2023-0001".to_string()];
        extend_unique_cves(&mut out, ["cve-2023-0001", "CVE-2024-1111", "CVE-2024-1111"]);
        assert_eq!(out, vec!["CVE-2023-0001", "CVE-2024-1111"]);
    }

    #[test]
    fn optional_scores_are_omitted_when_unknown() {
        let item = RiskItem::new("r-1", "Example", Severity::High);
        let v = serde_json::to_value(&item).expect("serialize");
        assert!(v.get("cvss").is_none());
        assert!(v.get("epss").is_none());
        assert_eq!(v["severity"], "HIGH");
    }
}
