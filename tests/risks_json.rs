use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn riskgate_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_riskgate"));
    cmd.env("HOME", home);
    cmd.env_remove("RISKGATE_CONFIG");
    cmd.env_remove("RISKGATE_LOG");
    cmd.env_remove("RISKGATE_VALIDATION_POLICY");
    cmd.env_remove("RISKGATE_VALIDATION_MAX_BYTES");
    cmd.env_remove("RISKGATE_VALIDATION_MAX_RECORDS");
    cmd.env_remove("RISKGATE_AUTOFIX_SAVE_FIXED_COPY");
    cmd.env_remove("RISKGATE_AUTOFIX_TTL_SECS");
    cmd.env_remove("RISKGATE_TELEMETRY_ENABLED");
    cmd.env_remove("RISKGATE_WATCH_DEBOUNCE_MS");
    cmd.env_remove("RISKGATE_UI_COLOR");
    cmd.env_remove("RISKGATE_UI_MAX_TABLE_ROWS");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    riskgate_cmd(home).args(args).output().expect("run riskgate")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);

    let temp = std::env::temp_dir();
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let uniq = format!("riskgate-risks-test-{}-{seq}", std::process::id());
    let home = temp.join(uniq);
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

const RESPONSE: &str = r#"{
  "key_risks": [
    {"title": "Service exposed on port 8080", "severity": "LOW", "evidence": ["10.0.0.9"]},
    {"title": "Service exposed on port 9090", "severity": "LOW"},
    {"title": "OpenSSH exposure", "severity": "MEDIUM", "evidence": ["10.0.0.1:22"]},
    {"context": "OpenSSH exposure on bastion", "severity": "HIGH", "evidence": ["10.0.0.2:22"]},
    {"title": "TLS certificate expired", "severity": "HIGH", "evidence": ["10.0.0.3:443"]}
  ],
  "recommendations": ["Rotate certificates"],
  "summary": "Five findings across three hosts."
}"#;

fn write_response(home: &Path) -> PathBuf {
    let path = home.join("response.json");
    std::fs::write(&path, RESPONSE).expect("write response");
    path
}

fn risks_json(home: &Path, response: &Path, extra: &[&str]) -> serde_json::Value {
    let mut args = vec!["risks", response.to_str().expect("utf8 path"), "--json"];
    args.extend_from_slice(extra);
    let out = run(home, &args);
    assert!(out.status.success());
    serde_json::from_slice(&out.stdout).expect("parse json")
}

fn ids(v: &serde_json::Value) -> Vec<String> {
    v["risks"]
        .as_array()
        .expect("risks array")
        .iter()
        .map(|r| r["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn consolidates_ports_and_ssh_findings() {
    let home = make_temp_home();
    let response = write_response(&home);
    let v = risks_json(&home, &response, &[]);

    assert_eq!(v["total"], 3);
    assert_eq!(
        ids(&v),
        vec![
            "risk:ssh-exposure:merged",
            "TLS certificate expired",
            "risk:uncommon-web-admin-ports",
        ]
    );
    assert_eq!(v["risks"][0]["severity"], "HIGH");
    assert_eq!(
        v["risks"][2]["evidence"],
        serde_json::json!(["port 8080", "port 9090"])
    );
    assert_eq!(v["view"]["next_actions"], serde_json::json!(["Rotate certificates"]));
    assert_eq!(v["view"]["overview"], "Five findings across three hosts.");
    assert!(v.get("notice").is_none());
}

#[test]
fn filters_are_anded() {
    let home = make_temp_home();
    let response = write_response(&home);

    let v = risks_json(&home, &response, &["--filter", "severity=high"]);
    assert_eq!(v["total"], 3);
    assert_eq!(
        ids(&v),
        vec!["risk:ssh-exposure:merged", "TLS certificate expired"]
    );

    let v = risks_json(&home, &response, &["--filter", "port=8080"]);
    assert_eq!(ids(&v), vec!["risk:uncommon-web-admin-ports"]);

    let v = risks_json(
        &home,
        &response,
        &["--filter", "severity=HIGH", "--filter", "port=443"],
    );
    assert_eq!(ids(&v), vec!["TLS certificate expired"]);

    let v = risks_json(
        &home,
        &response,
        &["--filter", "severity=HIGH", "--filter", "severity=LOW"],
    );
    assert!(ids(&v).is_empty());
}

#[test]
fn rank_orders_by_severity() {
    let home = make_temp_home();
    let path = home.join("response.json");
    std::fs::write(
        &path,
        r#"{"risks": [
            {"id": "a", "severity": "LOW"},
            {"id": "b", "severity": "CRITICAL"},
            {"id": "c", "severity": "MEDIUM"}
        ]}"#,
    )
    .expect("write response");

    let v = risks_json(&home, &path, &["--rank"]);
    assert_eq!(ids(&v), vec!["b", "c", "a"]);
}

#[test]
fn unreadable_response_falls_back_with_notice() {
    let home = make_temp_home();
    let missing = home.join("missing.json");
    let v = risks_json(&home, &missing, &[]);
    assert_eq!(v["total"], 0);
    assert!(v["notice"].as_str().is_some_and(|n| n.starts_with("Summarize failed")));
}

#[test]
fn bad_filter_is_invalid_args() {
    let home = make_temp_home();
    let response = write_response(&home);
    let out = run(
        &home,
        &[
            "risks",
            response.to_str().expect("utf8 path"),
            "--filter",
            "asn=123",
        ],
    );
    assert_eq!(out.status.code(), Some(2));
}
