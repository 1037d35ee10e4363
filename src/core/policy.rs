use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    #[default]
    Lenient,
    Strict,
    Off,
}

impl Policy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Policy::Lenient => "lenient",
            Policy::Strict => "strict",
            Policy::Off => "off",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Policy::Lenient),
            "strict" => Ok(Policy::Strict),
            "off" => Ok(Policy::Off),
            other => Err(format!(
                "unknown validation policy: {other} (expected lenient|strict|off)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateAction {
    Proceed,
    ProceedWithFixes,
    Block,
}

impl GateAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            GateAction::Proceed => "PROCEED",
            GateAction::ProceedWithFixes => "PROCEED_WITH_FIXES",
            GateAction::Block => "BLOCK",
        }
    }

    pub const fn requires_confirmation(self) -> bool {
        matches!(self, GateAction::ProceedWithFixes)
    }
}

impl fmt::Display for GateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub policy: Policy,
    pub action: GateAction,
    pub message: String,
    pub blocking_count: usize,
    pub warnings_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub advisories: Vec<String>,
}
