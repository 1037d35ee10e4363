use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Severity,
    Port,
    Country,
}

impl FilterKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            FilterKind::Severity => "severity",
            FilterKind::Port => "port",
            FilterKind::Country => "country",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub value: String,
}

impl Filter {
    pub fn new(kind: FilterKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn severity(value: impl Into<String>) -> Self {
        Self::new(FilterKind::Severity, value)
    }

    pub fn port(value: impl Into<String>) -> Self {
        Self::new(FilterKind::Port, value)
    }

    pub fn country(value: impl Into<String>) -> Self {
        Self::new(FilterKind::Country, value)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.value)
    }
}

/// Parses `type=value`, e.g. `severity=HIGH` or `port=8080`.
impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, value)) = s.split_once('=') else {
            return Err(format!("filter must look like type=value: {s}"));
        };
        let kind = match kind.trim().to_ascii_lowercase().as_str() {
            "severity" => FilterKind::Severity,
            "port" => FilterKind::Port,
            "country" => FilterKind::Country,
            other => {
                return Err(format!(
                    "unknown filter type: {other} (expected severity|port|country)"
                ));
            }
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("filter value is empty: {s}"));
        }
        Ok(Filter::new(kind, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_value_pairs() {
        assert_eq!("severity=HIGH".parse::<Filter>(), Ok(Filter::severity("HIGH")));
        assert_eq!(" Port = 8080".parse::<Filter>(), Ok(Filter::port("8080")));
        assert!("asn=123".parse::<Filter>().is_err());
        assert!("country=".parse::<Filter>().is_err());
        assert!("country".parse::<Filter>().is_err());
    }

    #[test]
    fn serializes_kind_as_type() {
        let v = serde_json::to_value(Filter::country("France")).expect("serialize");
        assert_eq!(v, serde_json::json!({"type": "country", "value": "France"}));
    }
}
