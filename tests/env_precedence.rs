use std::path::{Path, PathBuf};
use std::process::Command;
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

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);

    let temp = std::env::temp_dir();
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let uniq = format!("riskgate-env-test-{}-{seq}", std::process::id());
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

#[test]
fn env_overrides_config_file() {
    let home = make_temp_home();
    write_file(
        home.join(".config/riskgate/config.toml").as_path(),
        br#"
[validation]
policy = "lenient"
max_records = 10

[ui]
max_table_rows = 5
"#,
    );

    let out = riskgate_cmd(&home)
        .env("RISKGATE_VALIDATION_POLICY", "strict")
        .env("RISKGATE_UI_MAX_TABLE_ROWS", "7")
        .env("RISKGATE_TELEMETRY_ENABLED", "off")
        .args(["config", "--show", "--json"])
        .output()
        .expect("run riskgate");
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["validation"]["policy"], "strict");
    assert_eq!(v["validation"]["max_records"], 10);
    assert_eq!(v["ui"]["max_table_rows"], 7);
    assert_eq!(v["telemetry"]["enabled"], false);
}

#[test]
fn env_config_path_is_used() {
    let home = make_temp_home();
    let alt = home.join("alt.toml");
    write_file(
        &alt,
        br#"
[autofix]
ttl_secs = 60
"#,
    );

    let out = riskgate_cmd(&home)
        .env("RISKGATE_CONFIG", &alt)
        .args(["config", "--show", "--json"])
        .output()
        .expect("run riskgate");
    assert!(out.status.success());

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("parse json");
    assert_eq!(v["autofix"]["ttl_secs"], 60);
}

#[test]
fn record_limit_from_env_blocks() {
    let home = make_temp_home();
    let file = home.join("two.json");
    write_file(&file, br#"[{"ip":"10.0.0.1"},{"ip":"10.0.0.2"}]"#);

    let out = riskgate_cmd(&home)
        .env("RISKGATE_VALIDATION_MAX_RECORDS", "1")
        .args(["validate", file.to_str().expect("utf8 path")])
        .output()
        .expect("run riskgate");
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn invalid_bool_env_is_invalid_args() {
    let home = make_temp_home();
    let out = riskgate_cmd(&home)
        .env("RISKGATE_UI_COLOR", "maybe")
        .args(["config", "--show"])
        .output()
        .expect("run riskgate");
    assert_eq!(out.status.code(), Some(2));
}
