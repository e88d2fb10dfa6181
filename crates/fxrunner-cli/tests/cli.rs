use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use fxrunner_contracts::SPAWN_PLAN_SCHEMA_VERSION;
use serde_json::Value;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_config(json: &str) -> PathBuf {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("fxrunner_cli_{}_{n}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let path = dir.join("config.json");
    std::fs::write(&path, json).expect("write config");
    path
}

fn run_fxrunner(args: &[&str]) -> std::process::Output {
    let exe = env!("CARGO_BIN_EXE_fxrunner");
    Command::new(exe)
        .args(args)
        .env_remove("TXHOST_FXS_PATH")
        .env("TXHOST_LUA_COM_TOKEN", "cli-secret")
        .output()
        .expect("run fxrunner")
}

fn stdout(out: &std::process::Output) -> String {
    String::from_utf8(out.stdout.clone()).expect("utf8 stdout")
}

fn path_arg(p: &Path) -> &str {
    p.to_str().expect("utf8 path")
}

const CONFIG: &str = r#"{
  "general": { "language": "en" },
  "server": { "dataPath": "/srv/txData/default" },
  "fxserver": { "pureLevel": 2, "poolSizes": [{ "poolName": "TxdStore", "increase": 60000 }] }
}"#;

#[test]
fn encode_replaces_semicolons() {
    let out = run_fxrunner(&["encode", "say", "--args", r#"["hello;world"]"#]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout(&out), "say \"hello\u{037e}world\"\n");
}

#[test]
fn encode_rejects_non_array_args() {
    let out = run_fxrunner(&["encode", "say", "--args", "{}"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("JSON array"));
}

#[test]
fn convars_runtime_lines() {
    let cfg = temp_config(CONFIG);
    let out = run_fxrunner(&["convars", "--config", path_arg(&cfg)]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert!(text.lines().any(|l| l == r#"set "sv_pureLevel" "2""#));
    assert!(text
        .lines()
        .any(|l| l == r#"set "increase_pool_size" "\"TxdStore\" 60000""#));
}

#[test]
fn convars_boot_tokens() {
    let cfg = temp_config(CONFIG);
    let out = run_fxrunner(&["convars", "--config", path_arg(&cfg), "--boot"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out).lines().next(), Some("+setr locale en"));
}

#[cfg(unix)]
#[test]
fn plan_json_is_redacted() {
    let cfg = temp_config(CONFIG);
    let out = run_fxrunner(&[
        "plan",
        "--config",
        path_arg(&cfg),
        "--fxs-path",
        "/opt/fx/alpine/opt/cfx-server",
        "--target",
        "linux",
        "--json",
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let v: Value = serde_json::from_slice(&out.stdout).expect("parse stdout JSON");
    assert_eq!(v["schema_version"], SPAWN_PLAN_SCHEMA_VERSION);
    assert_eq!(v["target"], "linux");
    let argv: Vec<&str> = v["argv"]
        .as_array()
        .expect("argv")
        .iter()
        .map(|a| a.as_str().expect("string arg"))
        .collect();
    assert_eq!(argv[2], "--");
    assert_eq!(argv.last().copied(), Some("server.cfg"));
    assert!(!argv.contains(&"cli-secret"));
}

#[test]
fn plan_without_binaries_path_fails() {
    let cfg = temp_config(CONFIG);
    let out = run_fxrunner(&["plan", "--config", path_arg(&cfg)]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("TXHOST_FXS_PATH"));
}

#[test]
fn plan_without_data_path_fails() {
    let cfg = temp_config("{}");
    let out = run_fxrunner(&["plan", "--config", path_arg(&cfg), "--fxs-path", "/opt/fx"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("data path"));
}
