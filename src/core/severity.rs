use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Maps a free-form severity string onto a canonical bucket.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace. A few
    /// common aliases are folded in; anything else is `None`.
    pub fn normalize(s: &str) -> Option<Severity> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" | "INFO" | "INFORMATIONAL" | "NONE" => Some(Severity::Low),
            "MEDIUM" | "MODERATE" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Like [`Severity::normalize`] but unknown or missing input becomes `Low`.
    pub fn normalize_or_low(s: Option<&str>) -> Severity {
        s.and_then(Severity::normalize).unwrap_or(Severity::Low)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::normalize(s).ok_or_else(|| {
            format!(
                "unknown severity: {} (expected LOW|MEDIUM|HIGH|CRITICAL)",
                s.trim()
            )
        })
    }
}
