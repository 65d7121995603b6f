//! End-to-end install, upgrade, repair and uninstall through the binary.

#![allow(clippy::expect_used)]

use std::fs::OpenOptions;

use predicates::prelude::*;

use crate::fixture::{Fixture, agent_script};

#[test]
fn test_status_of_fresh_host_is_absent() {
    let fx = Fixture::new();
    fx.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Absent"))
        .stdout(predicate::str::contains("(missing)"));
    assert!(!fx.lock_path.exists(), "status must be read-only");
}

#[test]
fn test_install_status_uninstall_roundtrip() {
    let fx = Fixture::new();
    fx.publish("1.0.0");

    fx.cmd()
        .arg("install")
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed tynkerbase-agent 1.0.0"));
    assert_eq!(fx.entry_contents(), Some(agent_script("1.0.0")));

    let (code, status) = fx.json(&["status"]);
    assert_eq!(code, 0);
    assert_eq!(status["state"], "Installed");
    assert_eq!(status["artifact"]["version"], "1.0.0");
    assert_eq!(status["link"]["kind"], "points");
    assert_eq!(status["staging_present"], false);

    fx.cmd()
        .arg("uninstall")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed tynkerbase-agent 1.0.0"));
    assert_eq!(fx.state(), "Absent");
    assert!(!fx.install_root.exists());
    assert!(fx.entry_contents().is_none());
}

#[test]
fn test_install_json_reports_artifact() {
    let fx = Fixture::new();
    fx.publish("1.2.3");

    let (code, value) = fx.json(&["install"]);

    assert_eq!(code, 0);
    assert_eq!(value["result"], "installed");
    assert_eq!(value["artifact"]["version"], "1.2.3");
    assert_eq!(
        value["artifact"]["checksum"].as_str().expect("checksum").len(),
        64
    );
}

#[test]
fn test_second_install_is_already_installed() {
    let fx = Fixture::new();
    fx.publish("1.0.0");
    fx.cmd().arg("install").assert().success();

    let (code, value) = fx.json(&["install"]);

    assert_eq!(code, 0);
    assert_eq!(value["result"], "already_installed");
}

#[test]
fn test_upgrade_then_up_to_date() {
    let fx = Fixture::new();
    fx.publish("1.0.0");
    fx.cmd().arg("install").assert().success();
    fx.publish("1.1.0");

    fx.cmd()
        .arg("upgrade")
        .assert()
        .success()
        .stdout(predicate::str::contains("1.0.0 → 1.1.0"));
    assert_eq!(fx.entry_contents(), Some(agent_script("1.1.0")));

    let (code, value) = fx.json(&["upgrade"]);
    assert_eq!(code, 0);
    assert_eq!(value["result"], "up_to_date");
}

#[test]
fn test_upgrade_without_install_exits_three() {
    let fx = Fixture::new();
    fx.publish("1.0.0");

    let (code, value) = fx.json(&["upgrade"]);

    assert_eq!(code, 3);
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "not_installed");
    assert_eq!(value["state"], "Absent");
}

#[test]
fn test_corrupt_bundle_exits_one_and_keeps_running_version() {
    let fx = Fixture::new();
    fx.publish("1.0.0");
    fx.cmd().arg("install").assert().success();
    fx.publish_corrupt("2.0.0");

    let (code, value) = fx.json(&["upgrade"]);

    assert_eq!(code, 1);
    assert_eq!(value["code"], "integrity_error");
    assert_eq!(value["state"], "Installed");
    assert_eq!(fx.entry_contents(), Some(agent_script("1.0.0")));
}

#[test]
fn test_missing_release_is_a_fetch_error() {
    let fx = Fixture::new();

    fx.cmd()
        .args(["install", "--version", "9.9.9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("fetch failed"))
        .stderr(predicate::str::contains("Absent"));
}

#[test]
fn test_held_lock_exits_one() {
    let fx = Fixture::new();
    fx.publish("1.0.0");
    std::fs::create_dir_all(fx.lock_path.parent().expect("parent")).expect("dir");
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&fx.lock_path)
        .expect("lock file");
    let mut lock = fd_lock::RwLock::new(file);
    let _held = lock.try_write().expect("hold lock");

    let (code, value) = fx.json(&["install"]);

    assert_eq!(code, 1);
    assert_eq!(value["code"], "lock_contention");
    assert!(!fx.install_root.exists());
}

#[test]
fn test_interrupted_install_needs_repair_and_exits_two() {
    let fx = Fixture::new();
    fx.publish("1.0.0");
    fx.cmd().arg("install").assert().success();
    // Simulate a crash between committing and linking.
    std::fs::remove_file(&fx.entry_point).expect("unlink");
    assert_eq!(fx.state(), "FailedPartial");

    fx.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("tyb-deploy repair"));

    let (code, value) = fx.json(&["upgrade"]);
    assert_eq!(code, 2);
    assert_eq!(value["code"], "repair_required");
    assert_eq!(value["state"], "FailedPartial");

    fx.cmd()
        .arg("repair")
        .assert()
        .success()
        .stdout(predicate::str::contains("entry point now runs 1.0.0"));
    assert_eq!(fx.state(), "Installed");
    assert_eq!(fx.entry_contents(), Some(agent_script("1.0.0")));
}

#[test]
fn test_repair_of_healthy_host_is_a_no_op() {
    let fx = Fixture::new();
    let (code, value) = fx.json(&["repair"]);
    assert_eq!(code, 0);
    assert_eq!(value["result"], "healthy");
    assert_eq!(value["state"], "Absent");
}

// --- workspace ---

fn with_project(fx: &Fixture) {
    let project = fx.workspace_root.join("web-api");
    std::fs::create_dir_all(&project).expect("project");
    std::fs::write(project.join("main.py"), "print('hi')\n").expect("file");
}

#[test]
fn test_uninstall_keeps_workspace_by_default() {
    let fx = Fixture::new();
    fx.publish("1.0.0");
    fx.cmd().arg("install").assert().success();
    with_project(&fx);

    fx.cmd().arg("uninstall").assert().success();

    assert!(fx.workspace_root.join("web-api/main.py").is_file());
}

#[test]
fn test_purge_without_terminal_or_yes_exits_three() {
    let fx = Fixture::new();
    fx.publish("1.0.0");
    fx.cmd().arg("install").assert().success();
    with_project(&fx);

    let (code, value) = fx.json(&["uninstall", "--purge-workspace"]);

    assert_eq!(code, 3);
    assert_eq!(value["code"], "confirmation_required");
    assert_eq!(value["state"], "Installed");
    assert!(fx.workspace_root.join("web-api").is_dir());
    assert_eq!(fx.entry_contents(), Some(agent_script("1.0.0")));
}

#[test]
fn test_purge_with_yes_removes_workspace() {
    let fx = Fixture::new();
    fx.publish("1.0.0");
    fx.cmd().arg("install").assert().success();
    with_project(&fx);

    let (code, value) = fx.json(&["uninstall", "--purge-workspace", "--yes"]);

    assert_eq!(code, 0);
    assert_eq!(value["workspace_removed"], true);
    assert_eq!(value["removed_version"], "1.0.0");
    assert!(!fx.workspace_root.exists());
}

#[test]
fn test_uninstall_twice_succeeds() {
    let fx = Fixture::new();
    fx.cmd()
        .arg("uninstall")
        .assert()
        .success()
        .stdout(predicate::str::contains("not installed"));
    fx.cmd().arg("uninstall").assert().success();
}

#[test]
fn test_quiet_suppresses_success_output() {
    let fx = Fixture::new();
    fx.publish("1.0.0");
    fx.cmd()
        .args(["install", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
