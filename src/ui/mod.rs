use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{FixTelemetry, GateAction, Issue, IssueLevel, RiskItem, Severity};
use crate::engine::{Checked, Presentation};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdin_is_tty: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for details");
    let _ = writeln!(stderr, "  - see `riskgate --help` for commands and options");
}

pub fn print_checked(label: &str, checked: &Checked, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    write_checked(&mut out, label, checked, cfg);
}

pub fn write_checked(out: &mut dyn Write, label: &str, checked: &Checked, cfg: &UiConfig) {
    let result = &checked.result;
    let decision = &checked.decision;
    let stats = &result.stats;

    let _ = writeln!(
        out,
        "{label}: {}  policy={}  items={}  size={}  kev={}  cvss>=7={}",
        format_action(decision.action, cfg.color),
        decision.policy,
        stats.items,
        format_bytes(stats.approx_bytes),
        stats.kev_count,
        stats.cvss_high_count,
    );
    let _ = writeln!(out, "  {}", decision.message);
    for advisory in &decision.advisories {
        let _ = writeln!(out, "  ! {advisory}");
    }

    if !result.issues.is_empty() {
        let rows = cfg.max_table_rows.min(result.issues.len());
        let _ = writeln!(out);
        if result.issues.len() > rows {
            let _ = writeln!(out, "Issues (showing {rows} of {}):", result.issues.len());
        } else {
            let _ = writeln!(out, "Issues:");
        }
        write_issue_table(out, &result.issues, rows, cfg.color);
    }

    if result.autofix_applied {
        let _ = writeln!(out);
        let _ = writeln!(out, "Autofix: {}", format_fix_counts(&result.telemetry));
        if decision.action.requires_confirmation() {
            let _ = writeln!(out, "  confirm with `riskgate fix --yes` to use the fixed copy");
        }
    }
}

pub fn format_fix_counts(telemetry: &FixTelemetry) -> String {
    if telemetry.is_empty() {
        return "no changes".to_string();
    }
    telemetry
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn print_presentation(p: &Presentation, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }
    let mut out = io::stdout().lock();
    write_presentation(&mut out, p, &p.risks.iter().collect::<Vec<_>>(), cfg);
}

/// `risks` is the view to render; it may be a re-ranked slice of `p.risks`.
pub fn write_presentation(
    out: &mut dyn Write,
    p: &Presentation,
    risks: &[&RiskItem],
    cfg: &UiConfig,
) {
    if let Some(notice) = &p.notice {
        let _ = writeln!(out, "! {notice}");
    }
    if !p.view.overview.is_empty() {
        let _ = writeln!(out, "Overview: {}", p.view.overview);
    }
    if let Some(valid) = p.view.valid_json {
        let _ = writeln!(out, "Upstream JSON valid: {valid}");
    }

    let rows = cfg.max_table_rows.min(risks.len());
    let _ = writeln!(out);
    if risks.len() > rows || risks.len() < p.total {
        let _ = writeln!(
            out,
            "Risks (showing {rows} of {}, {} before filters):",
            risks.len(),
            p.total
        );
    } else {
        let _ = writeln!(out, "Risks:");
    }
    if risks.is_empty() {
        let _ = writeln!(out, "  (none)");
    } else {
        write_risk_table(out, risks, rows, cfg.color);
    }

    if !p.view.next_actions.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Next actions:");
        for action in &p.view.next_actions {
            let _ = writeln!(out, "- {action}");
        }
    }
}

fn write_issue_table(out: &mut dyn Write, issues: &[Issue], rows: usize, color: bool) {
    let label_level = "LEVEL";
    let label_path = "PATH";
    let label_message = "MESSAGE";

    let level_w = issues
        .iter()
        .take(rows)
        .map(|i| level_label(i.level).len())
        .max()
        .unwrap_or(0)
        .max(label_level.len());
    let path_w = issues
        .iter()
        .take(rows)
        .map(|i| visible_width_ansi(&truncate_middle(&i.path, 40)))
        .max()
        .unwrap_or(0)
        .max(label_path.len());

    let _ = writeln!(
        out,
        "{}  {}  {}",
        pad_end_display(label_level, level_w),
        pad_end_display(label_path, path_w),
        label_message
    );
    let _ = writeln!(
        out,
        "{}  {}  {}",
        "-".repeat(level_w),
        "-".repeat(path_w),
        "-".repeat(label_message.len())
    );
    for issue in issues.iter().take(rows) {
        let level = pad_end_ansi(&format_level(issue.level, color), level_w);
        let path = pad_end_display(&truncate_middle(&issue.path, 40), path_w);
        let fix = if issue.fixable() { " (fixable)" } else { "" };
        let _ = writeln!(out, "{level}  {path}  {}{fix}", issue.message);
    }
}

fn write_risk_table(out: &mut dyn Write, risks: &[&RiskItem], rows: usize, color: bool) {
    let label_sev = "SEVERITY";
    let label_flags = "KEV/CVSS";
    let label_title = "TITLE";

    let sev_w = label_sev.len();
    let flags_w = risks
        .iter()
        .take(rows)
        .map(|r| risk_flags(r).len())
        .max()
        .unwrap_or(0)
        .max(label_flags.len());

    let _ = writeln!(
        out,
        "{}  {}  {}",
        pad_end_display(label_sev, sev_w),
        pad_end_display(label_flags, flags_w),
        label_title
    );
    let _ = writeln!(
        out,
        "{}  {}  {}",
        "-".repeat(sev_w),
        "-".repeat(flags_w),
        "-".repeat(label_title.len())
    );
    for risk in risks.iter().take(rows) {
        let sev = pad_end_ansi(&format_severity(risk.severity, color), sev_w);
        let flags = pad_end_display(&risk_flags(risk), flags_w);
        let _ = writeln!(out, "{sev}  {flags}  {}", crate::filter::display_title(risk));
        for evidence in risk.evidence.iter().take(3) {
            let _ = writeln!(
                out,
                "{}  {}    {}",
                " ".repeat(sev_w),
                " ".repeat(flags_w),
                truncate_middle(evidence, 60)
            );
        }
    }
}

fn risk_flags(risk: &RiskItem) -> String {
    let kev = if risk.kev { "KEV" } else { "-" };
    match risk.cvss {
        Some(cvss) => format!("{kev} {cvss:.1}"),
        None => kev.to_string(),
    }
}

fn level_label(level: IssueLevel) -> &'static str {
    match level {
        IssueLevel::Fatal => "FATAL",
        IssueLevel::Error => "ERROR",
        IssueLevel::StrictBlocker => "STRICT",
        IssueLevel::Warning => "WARN",
    }
}

fn format_level(level: IssueLevel, color: bool) -> String {
    let s = level_label(level);
    if !color {
        return s.to_string();
    }
    let code = match level {
        IssueLevel::Fatal => "31;1",
        IssueLevel::Error => "31",
        IssueLevel::StrictBlocker => "35",
        IssueLevel::Warning => "33",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

pub fn format_severity(severity: Severity, color: bool) -> String {
    let s = severity.as_str();
    if !color {
        return s.to_string();
    }
    let code = match severity {
        Severity::Low => "90",
        Severity::Medium => "33",
        Severity::High => "31",
        Severity::Critical => "31;1",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

pub fn format_action(action: GateAction, color: bool) -> String {
    let s = action.as_str();
    if !color {
        return s.to_string();
    }
    let code = match action {
        GateAction::Proceed => "32",
        GateAction::ProceedWithFixes => "33",
        GateAction::Block => "31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let left = keep / 2;
    let right = keep.saturating_sub(left);

    let prefix: String = s.chars().take(left).collect();
    let suffix: String = s.chars().skip(len - right).collect();
    format!("{prefix}...{suffix}")
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_end_display(s: &str, width: usize) -> String {
    pad_end_ansi(s, width)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        return format!("{bytes} B");
    }
    if b < MB {
        return format!("{:.1} KiB", b / KB);
    }
    if b < GB {
        return format!("{:.1} MiB", b / MB);
    }
    format!("{:.1} GiB", b / GB)
}
