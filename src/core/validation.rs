use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{DatasetPayload, Policy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueLevel {
    Fatal,
    Error,
    StrictBlocker,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    ParseFailed,
    UnrecognizedShape,
    PayloadTooLarge,
    TooManyRecords,
    RecordNotObject,
    NotASequence,
    NotAString,
    PortMissing,
    PortOutOfRange,
    NumericString,
    NotNumeric,
    BooleanString,
    NotBoolean,
    SeverityVariant,
    SeverityUnknown,
    CountryCase,
    DuplicateCve,
    Whitespace,
    UnknownKey,
}

impl IssueCode {
    /// The autofix category that repairs this issue, if any.
    pub const fn fix(self) -> Option<FixCategory> {
        match self {
            IssueCode::NumericString => Some(FixCategory::NumbersCoerced),
            IssueCode::BooleanString => Some(FixCategory::BooleansCoerced),
            IssueCode::SeverityVariant => Some(FixCategory::SeverityNormalized),
            IssueCode::CountryCase => Some(FixCategory::CountryTitlecased),
            IssueCode::DuplicateCve => Some(FixCategory::CveDeduped),
            IssueCode::Whitespace => Some(FixCategory::StringsTrimmed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixCategory {
    SeverityNormalized,
    CountryTitlecased,
    CveDeduped,
    NumbersCoerced,
    BooleansCoerced,
    StringsTrimmed,
}

impl FixCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            FixCategory::SeverityNormalized => "severity_normalized",
            FixCategory::CountryTitlecased => "country_titlecased",
            FixCategory::CveDeduped => "cve_deduped",
            FixCategory::NumbersCoerced => "numbers_coerced",
            FixCategory::BooleansCoerced => "booleans_coerced",
            FixCategory::StringsTrimmed => "strings_trimmed",
        }
    }
}

impl fmt::Display for FixCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fix counts keyed by category name. Only non-zero categories appear.
pub type FixTelemetry = BTreeMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub level: IssueLevel,
    pub code: IssueCode,
    pub path: String,
    pub message: String,
    #[serde(default)]
    pub fixable: bool,
}

impl Issue {
    pub fn new(
        level: IssueLevel,
        code: IssueCode,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            code,
            path: path.into(),
            message: message.into(),
            fixable: code.fix().is_some(),
        }
    }

    pub fn fixable(&self) -> bool {
        self.fixable
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub items: u64,
    pub approx_bytes: u64,
    pub kev_count: u64,
    pub cvss_high_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub policy: Policy,
    pub valid: bool,
    pub parse_failed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub fatal_errors: Vec<String>,
    pub strict_blockers: Vec<String>,
    pub issues: Vec<Issue>,
    pub stats: Stats,
    pub autofix_applied: bool,
    pub fixed: Option<DatasetPayload>,
    pub telemetry: FixTelemetry,
}

impl ValidationResult {
    /// Builds a result from classified issues, deriving the message lists and
    /// `valid` for the given policy.
    pub fn from_issues(policy: Policy, issues: Vec<Issue>, stats: Stats) -> Self {
        let mut out = Self {
            policy,
            valid: false,
            parse_failed: issues.iter().any(|i| i.code == IssueCode::ParseFailed),
            errors: Vec::new(),
            warnings: Vec::new(),
            fatal_errors: Vec::new(),
            strict_blockers: Vec::new(),
            issues: Vec::new(),
            stats,
            autofix_applied: false,
            fixed: None,
            telemetry: FixTelemetry::new(),
        };
        for issue in &issues {
            let bucket = match issue.level {
                IssueLevel::Fatal => &mut out.fatal_errors,
                IssueLevel::Error => &mut out.errors,
                IssueLevel::StrictBlocker => &mut out.strict_blockers,
                IssueLevel::Warning => &mut out.warnings,
            };
            bucket.push(issue.message.clone());
        }
        out.issues = issues;
        out.valid = out.compute_valid();
        out
    }

    fn compute_valid(&self) -> bool {
        if !self.fatal_errors.is_empty() {
            return false;
        }
        match self.policy {
            Policy::Strict => self.errors.is_empty() && self.strict_blockers.is_empty(),
            Policy::Lenient | Policy::Off => true,
        }
    }

    pub fn has_fixable(&self) -> bool {
        self.issues.iter().any(Issue::fixable)
    }

    pub fn blocking_count(&self) -> usize {
        self.fatal_errors.len() + self.errors.len() + self.strict_blockers.len()
    }
}
