//! End-to-end tests for the `ledger-sync` binary.
//!
//! stdout is a pipe here, so every command answers in JSON.

use assert_cmd::Command;
use std::path::Path;

const TENANT: &str = "7d444840-9dc0-11d1-b245-5ffdce74fad2";

fn ledger(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ledger-sync").unwrap();
    // -q keeps log lines out of stderr so errors parse as JSON
    cmd.arg("-q")
        .arg("--data-dir")
        .arg(data_dir)
        .env_remove("LEDGER_SYNC_DB")
        .env_remove("LEDGER_SYNC_REMOTE_URL")
        .env_remove("LEDGER_SYNC_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap()
}

#[test]
fn version_reports_package_version() {
    let dir = tempfile::tempdir().unwrap();
    let out = ledger(dir.path()).arg("version").output().unwrap();
    assert!(out.status.success());
    assert_eq!(json(&out.stdout)["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn commands_before_init_fail_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let out = ledger(dir.path()).arg("list").output().unwrap();
    assert_eq!(out.status.code(), Some(2));
    let err = json(&out.stderr);
    assert_eq!(err["error"]["code"], "NOT_INITIALIZED");
}

#[test]
fn record_without_company_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    ledger(dir.path()).arg("init").assert().success();

    let out = ledger(dir.path())
        .args(["record", "income", "10", "invoice"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert_eq!(json(&out.stderr)["error"]["code"], "NO_TENANT_RESOLVED");
}

#[test]
fn record_list_delete_offline() {
    let dir = tempfile::tempdir().unwrap();
    ledger(dir.path()).arg("init").assert().success();
    ledger(dir.path()).args(["tenant", "set", TENANT]).assert().success();

    let out = ledger(dir.path())
        .args(["record", "expense", "15.50", "office", "chairs", "--date", "2026-02-01"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let recorded = json(&out.stdout);
    assert_eq!(recorded["dirty"], true);
    assert_eq!(recorded["record"]["amount_minor_units"], 1550);
    let id = recorded["record"]["id"].as_str().unwrap().to_string();

    let out = ledger(dir.path()).args(["list", "--pending"]).output().unwrap();
    let listed = json(&out.stdout);
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["tenant"], TENANT);

    let out = ledger(dir.path()).arg("status").output().unwrap();
    assert_eq!(json(&out.stdout)["pending_count"], 1);

    ledger(dir.path()).args(["delete", &id]).assert().success();
    let out = ledger(dir.path()).arg("list").output().unwrap();
    assert_eq!(json(&out.stdout)["count"], 0);

    let out = ledger(dir.path()).args(["history", &id]).output().unwrap();
    let events = json(&out.stdout);
    assert_eq!(events[0]["event"], "record_deleted");
    assert_eq!(events[1]["event"], "record_created");
}

#[test]
fn invalid_amount_exits_with_validation_code() {
    let dir = tempfile::tempdir().unwrap();
    ledger(dir.path()).arg("init").assert().success();
    ledger(dir.path()).args(["tenant", "set", TENANT]).assert().success();

    let out = ledger(dir.path())
        .args(["record", "income", "12.345"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(4));
    assert_eq!(json(&out.stderr)["error"]["code"], "INVALID_ARGUMENT");
}

#[test]
fn sync_without_remote_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    ledger(dir.path()).arg("init").assert().success();

    let out = ledger(dir.path()).arg("sync").output().unwrap();
    assert_eq!(out.status.code(), Some(7));
}
