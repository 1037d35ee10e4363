use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::Policy;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub validation: ValidationConfig,
    pub autofix: AutofixConfig,
    pub telemetry: TelemetryConfig,
    pub watch: WatchConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationConfig {
    pub policy: Policy,
    pub max_bytes: u64,
    pub max_records: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutofixConfig {
    pub save_fixed_copy: bool,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchConfig {
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            validation: ValidationConfig {
                policy: Policy::Lenient,
                max_bytes: 100 * 1024 * 1024,
                max_records: 50_000,
            },
            autofix: AutofixConfig {
                save_fixed_copy: true,
                ttl_secs: 60 * 60,
            },
            telemetry: TelemetryConfig { enabled: true },
            watch: WatchConfig { debounce_ms: 250 },
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            config_path: None,
        }
    }
}

impl EffectiveConfig {
    pub fn limits(&self) -> crate::validate::Limits {
        crate::validate::Limits {
            max_bytes: self.validation.max_bytes,
            max_records: self.validation.max_records,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    validation: Option<RawValidationConfig>,
    autofix: Option<RawAutofixConfig>,
    telemetry: Option<RawTelemetryConfig>,
    watch: Option<RawWatchConfig>,
    ui: Option<RawUiConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawValidationConfig {
    policy: Option<Policy>,
    max_bytes: Option<u64>,
    max_records: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAutofixConfig {
    save_fixed_copy: Option<bool>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTelemetryConfig {
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWatchConfig {
    debounce_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

pub fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("HOME is not set"))
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/riskgate/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s).context("failed to parse config file (TOML)")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if config_path.is_some() {
        anyhow::bail!("config file not found: {}", path.display());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(validation) = raw.validation {
        if let Some(policy) = validation.policy {
            cfg.validation.policy = policy;
        }
        if let Some(max_bytes) = validation.max_bytes {
            cfg.validation.max_bytes = max_bytes;
        }
        if let Some(max_records) = validation.max_records {
            cfg.validation.max_records = max_records;
        }
    }

    if let Some(autofix) = raw.autofix {
        if let Some(save_fixed_copy) = autofix.save_fixed_copy {
            cfg.autofix.save_fixed_copy = save_fixed_copy;
        }
        if let Some(ttl_secs) = autofix.ttl_secs {
            cfg.autofix.ttl_secs = ttl_secs;
        }
    }

    if let Some(telemetry) = raw.telemetry
        && let Some(enabled) = telemetry.enabled
    {
        cfg.telemetry.enabled = enabled;
    }

    if let Some(watch) = raw.watch
        && let Some(debounce_ms) = watch.debounce_ms
    {
        cfg.watch.debounce_ms = debounce_ms;
    }

    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("RISKGATE_VALIDATION_POLICY") {
        cfg.validation.policy = v
            .parse::<Policy>()
            .map_err(anyhow::Error::msg)
            .with_context(|| "RISKGATE_VALIDATION_POLICY")?;
    }
    if let Ok(v) = std::env::var("RISKGATE_VALIDATION_MAX_BYTES") {
        cfg.validation.max_bytes = parse_number(&v).with_context(|| "RISKGATE_VALIDATION_MAX_BYTES")?;
    }
    if let Ok(v) = std::env::var("RISKGATE_VALIDATION_MAX_RECORDS") {
        cfg.validation.max_records =
            parse_number(&v).with_context(|| "RISKGATE_VALIDATION_MAX_RECORDS")?;
    }
    if let Ok(v) = std::env::var("RISKGATE_AUTOFIX_SAVE_FIXED_COPY") {
        cfg.autofix.save_fixed_copy =
            parse_bool(&v).with_context(|| "RISKGATE_AUTOFIX_SAVE_FIXED_COPY")?;
    }
    if let Ok(v) = std::env::var("RISKGATE_AUTOFIX_TTL_SECS") {
        cfg.autofix.ttl_secs = parse_number(&v).with_context(|| "RISKGATE_AUTOFIX_TTL_SECS")?;
    }
    if let Ok(v) = std::env::var("RISKGATE_TELEMETRY_ENABLED") {
        cfg.telemetry.enabled = parse_bool(&v).with_context(|| "RISKGATE_TELEMETRY_ENABLED")?;
    }
    if let Ok(v) = std::env::var("RISKGATE_WATCH_DEBOUNCE_MS") {
        cfg.watch.debounce_ms = parse_number(&v).with_context(|| "RISKGATE_WATCH_DEBOUNCE_MS")?;
    }
    if let Ok(v) = std::env::var("RISKGATE_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "RISKGATE_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("RISKGATE_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "RISKGATE_UI_MAX_TABLE_ROWS")?;
    }

    Ok(())
}

fn parse_number(s: &str) -> Result<u64> {
    s.trim()
        .parse::<u64>()
        .map_err(|_| anyhow::anyhow!("invalid number: {}", s.trim()))
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for s in ["1", "true", "YES", " on "] {
            assert!(parse_bool(s).expect("truthy"));
        }
        for s in ["0", "false", "No", "off"] {
            assert!(!parse_bool(s).expect("falsy"));
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn raw_config_overrides_only_present_keys() {
        let raw: RawConfig = toml::from_str(
            r#"
[validation]
policy = "strict"

[watch]
debounce_ms = 500
"#,
        )
        .expect("toml");
        let mut cfg = EffectiveConfig::default();
        apply_raw_config(&mut cfg, raw);
        assert_eq!(cfg.validation.policy, Policy::Strict);
        assert_eq!(cfg.validation.max_records, 50_000);
        assert_eq!(cfg.watch.debounce_ms, 500);
        assert!(cfg.telemetry.enabled);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(toml::from_str::<RawConfig>("[scan]\ndeep = true\n").is_err());
    }

    #[test]
    fn limits_follow_validation_section() {
        let mut cfg = EffectiveConfig::default();
        cfg.validation.max_records = 3;
        assert_eq!(cfg.limits().max_records, 3);
        assert_eq!(cfg.limits().max_bytes, 104_857_600);
    }
}
