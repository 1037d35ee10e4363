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
    let uniq = format!("riskgate-config-test-{}-{seq}", std::process::id());
    let home = temp.join(uniq);
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

fn policy_show(home: &Path, extra: &[&str]) -> serde_json::Value {
    let mut args = vec!["policy", "show", "--json"];
    args.extend_from_slice(extra);
    let out = run(home, &args);
    assert!(out.status.success());
    serde_json::from_slice(&out.stdout).expect("parse json")
}

const FIXABLE: &[u8] = br#"{"hosts":[{"ip":"10.0.0.1","severity":"high","services":[{"port":"8080"}]}]}"#;

#[test]
fn config_file_policy_applies() {
    let home = make_temp_home();
    write_file(
        home.join(".config/riskgate/config.toml").as_path(),
        br#"
[validation]
policy = "strict"
"#,
    );
    let file = home.join("fixable.json");
    write_file(&file, FIXABLE);

    let out = run(&home, &["validate", file.to_str().expect("utf8 path")]);
    assert_eq!(out.status.code(), Some(3));

    let v = policy_show(&home, &[]);
    assert_eq!(v["policy"], "strict");
    assert_eq!(v["source"], "config");
}

#[test]
fn stored_policy_beats_config_and_flag_beats_store() {
    let home = make_temp_home();
    write_file(
        home.join(".config/riskgate/config.toml").as_path(),
        br#"
[validation]
policy = "strict"
"#,
    );

    let out = run(&home, &["policy", "set", "off"]);
    assert!(out.status.success());
    assert!(home.join(".config/riskgate/store.json").exists());

    let v = policy_show(&home, &[]);
    assert_eq!(v["policy"], "off");
    assert_eq!(v["source"], "store");

    let v = policy_show(&home, &["--policy", "lenient"]);
    assert_eq!(v["policy"], "lenient");
    assert_eq!(v["source"], "flag");
}

#[test]
fn unknown_config_key_is_invalid_args() {
    let home = make_temp_home();
    write_file(
        home.join(".config/riskgate/config.toml").as_path(),
        br#"
[validation]
mode = "strict"
"#,
    );
    let out = run(&home, &["config", "--show"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn explicit_missing_config_is_invalid_args() {
    let home = make_temp_home();
    let missing = home.join("nope.toml");
    let out = run(
        &home,
        &["config", "--show", "--config", missing.to_str().expect("utf8 path")],
    );
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn telemetry_is_appended_unless_disabled() {
    let home = make_temp_home();
    let file = home.join("fixable.json");
    write_file(&file, FIXABLE);
    let log = home.join(".config/riskgate/logs/telemetry.jsonl");

    let out = run(
        &home,
        &["validate", file.to_str().expect("utf8 path"), "--request-id", "req-7"],
    );
    assert!(out.status.success());
    let text = std::fs::read_to_string(&log).expect("read telemetry");
    let line = text.lines().last().expect("one record");
    let v: serde_json::Value = serde_json::from_str(line).expect("parse record");
    assert_eq!(v["request_id"], "req-7");
    assert_eq!(v["blocked"], false);
    assert_eq!(v["fixed_fields"]["numbers_coerced"], 1);

    std::fs::remove_file(&log).expect("remove telemetry");
    write_file(
        home.join(".config/riskgate/config.toml").as_path(),
        br#"
[telemetry]
enabled = false
"#,
    );
    let out = run(&home, &["validate", file.to_str().expect("utf8 path")]);
    assert!(out.status.success());
    assert!(!log.exists());
}

#[test]
fn fixed_copy_is_cached_then_cleared() {
    let home = make_temp_home();
    let file = home.join("fixable.json");
    write_file(&file, FIXABLE);

    let out = run(&home, &["fix", file.to_str().expect("utf8 path"), "--yes"]);
    assert!(out.status.success());
    let written = std::fs::read_to_string(home.join("fixable.fixed.json")).expect("fixed copy");
    let v: serde_json::Value = serde_json::from_str(&written).expect("parse fixed copy");
    assert_eq!(v["hosts"][0]["services"][0]["port"], 8080);
    assert_eq!(v["hosts"][0]["severity"], "HIGH");

    let out = run(&home, &["cache", "show", "--json"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["shape"], "hosts");
    assert_eq!(v["items"], 1);

    let out = run(&home, &["cache", "clear", "--json"]);
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["cleared"], true);

    let out = run(&home, &["cache", "show", "--json"]);
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert!(v.is_null());
}

#[test]
fn cached_fixed_copy_can_be_printed_and_run() {
    let home = make_temp_home();
    let file = home.join("fixable.json");
    let response = home.join("response.json");
    write_file(&file, FIXABLE);
    write_file(&response, br#"{"risks":[]}"#);

    let out = run(&home, &["fix", file.to_str().expect("utf8 path"), "--yes"]);
    assert!(out.status.success());

    let out = run(&home, &["cache", "show", "--payload"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse payload");
    assert_eq!(v["hosts"][0]["services"][0]["port"], 8080);

    let out = run(
        &home,
        &[
            "--json",
            "run",
            "--use-cached",
            "--response",
            response.to_str().expect("utf8 path"),
        ],
    );
    assert_eq!(out.status.code(), Some(0));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["checked"]["decision"]["action"], "PROCEED");
    assert_eq!(v["presentation"]["total"], 0);
}

#[test]
fn expired_fixed_copy_is_purged_and_unusable() {
    let home = make_temp_home();
    let file = home.join("fixable.json");
    let response = home.join("response.json");
    write_file(&file, FIXABLE);
    write_file(&response, br#"{"risks":[]}"#);

    let out = riskgate_cmd(&home)
        .env("RISKGATE_AUTOFIX_TTL_SECS", "0")
        .args(["fix", file.to_str().expect("utf8 path"), "--yes"])
        .output()
        .expect("run riskgate");
    assert!(out.status.success());
    let store = home.join(".config/riskgate/store.json");
    let before = std::fs::read_to_string(&store).expect("store written");
    assert!(before.contains("\"fixed\""));

    let out = run(&home, &["cache", "show", "--payload", "--json"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert!(v.is_null());
    let after = std::fs::read_to_string(&store).expect("store kept");
    assert!(!after.contains("\"fixed\""));

    let out = run(
        &home,
        &[
            "run",
            "--use-cached",
            "--response",
            response.to_str().expect("utf8 path"),
        ],
    );
    assert_eq!(out.status.code(), Some(2));
}
