//! Maps a validation result and the configured strictness to an action.

use crate::core::{GateAction, GateDecision, Policy, ValidationResult};
use crate::logs::{TelemetryRecord, TelemetrySink};

pub const HIGH_RISK_ADVISORY: &str =
    "High-risk content found (KEV/CVSS>=7). Strict is recommended.";

/// Pure decision under the policy `result` was validated with. No telemetry.
pub fn evaluate(result: &ValidationResult) -> GateDecision {
    let policy = result.policy;
    let warnings_count = result.warnings.len();
    let fatal = result.fatal_errors.len();
    let errors = result.errors.len();
    let blockers = result.strict_blockers.len();

    let decision = |action, message: String, blocking_count, advisories| GateDecision {
        policy,
        action,
        message,
        blocking_count,
        warnings_count,
        advisories,
    };

    match policy {
        Policy::Off => {
            if result.parse_failed {
                decision(
                    GateAction::Block,
                    format!(
                        "JSON does not parse yet. Fix parse errors and try again: {}",
                        first_blocking(result)
                    ),
                    fatal,
                    Vec::new(),
                )
            } else {
                decision(
                    GateAction::Proceed,
                    "Parsed OK (validation skipped)".to_string(),
                    0,
                    Vec::new(),
                )
            }
        }
        Policy::Lenient => {
            if fatal > 0 {
                return decision(
                    GateAction::Block,
                    format!(
                        "Found {fatal} fatal issue(s). Please fix and retry: {}",
                        first_blocking(result)
                    ),
                    fatal,
                    Vec::new(),
                );
            }
            let mut advisories = Vec::new();
            if result.stats.kev_count > 0 || result.stats.cvss_high_count > 0 {
                advisories.push(HIGH_RISK_ADVISORY.to_string());
            }
            if blockers > 0 {
                advisories.push(format!(
                    "{blockers} strict-only issue(s) not enforced under lenient policy"
                ));
            }
            if errors > 0 {
                let hint = if result.has_fixable() {
                    "autofix available"
                } else {
                    "review before continuing"
                };
                decision(
                    GateAction::ProceedWithFixes,
                    format!(
                        "{errors} error(s) • {warnings_count} warning(s) ({hint}): {}",
                        result.errors[0]
                    ),
                    0,
                    advisories,
                )
            } else {
                let message = if warnings_count > 0 {
                    format!("Proceeding with {warnings_count} warning(s)")
                } else {
                    "No errors or warnings".to_string()
                };
                decision(GateAction::Proceed, message, 0, advisories)
            }
        }
        Policy::Strict => {
            let total = fatal + errors + blockers;
            if total > 0 {
                decision(
                    GateAction::Block,
                    format!(
                        "Found {total} blocking validation error(s) • {warnings_count} warning(s): {}",
                        first_blocking(result)
                    ),
                    total,
                    Vec::new(),
                )
            } else if warnings_count > 0 {
                decision(
                    GateAction::Proceed,
                    format!("No blocking issues • {warnings_count} warning(s)"),
                    0,
                    Vec::new(),
                )
            } else {
                decision(
                    GateAction::Proceed,
                    "No blocking issues".to_string(),
                    0,
                    Vec::new(),
                )
            }
        }
    }
}

/// Decides, then reports the decision to `sink`. A failing sink is logged and
/// otherwise ignored.
pub fn decide(
    result: &ValidationResult,
    sink: &dyn TelemetrySink,
    request_id: Option<&str>,
) -> GateDecision {
    let decision = evaluate(result);
    let record = telemetry_record(result, &decision, request_id);
    if let Err(err) = sink.emit(&record) {
        tracing::warn!(error = %err, "telemetry emit failed");
    }
    tracing::debug!(
        policy = %result.policy,
        action = %decision.action,
        blocking = decision.blocking_count,
        "gate decided"
    );
    decision
}

pub fn telemetry_record(
    result: &ValidationResult,
    decision: &GateDecision,
    request_id: Option<&str>,
) -> TelemetryRecord {
    let strict_extra = if decision.policy == Policy::Strict {
        result.strict_blockers.len()
    } else {
        0
    };
    TelemetryRecord {
        policy: decision.policy,
        errors_count: result.errors.len() + result.fatal_errors.len() + strict_extra,
        warnings_count: result.warnings.len(),
        fixed_fields: result.telemetry.clone(),
        blocked: decision.action == GateAction::Block,
        request_id: request_id.map(str::to_string),
    }
}

fn first_blocking(result: &ValidationResult) -> &str {
    result
        .fatal_errors
        .iter()
        .chain(&result.errors)
        .chain(&result.strict_blockers)
        .map(String::as_str)
        .next()
        .unwrap_or("")
}
