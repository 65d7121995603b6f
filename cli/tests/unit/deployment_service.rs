//! Tests for the deployment manager against a real temporary filesystem.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tyb_deploy::application::ports::TransitionLock;
use tyb_deploy::application::services::deployment::{
    InstallOutcome, RepairOutcome, UpgradeOutcome, UpgradeRequest, WorkspaceRemoval,
};
use tyb_deploy::domain::artifact::MANIFEST_FILE;
use tyb_deploy::domain::error::{EXIT_INVALID_INVOCATION, EXIT_RECOVERABLE, EXIT_REPAIR_NEEDED};
use tyb_deploy::domain::{DeployError, DeploymentState, LinkStatus, RetryPolicy, VersionSelector};
use tyb_deploy::infra::interrupt::InterruptFlag;
use tyb_deploy::infra::lock::InstallLock;

use crate::helpers::{
    FlakySource, Host, NoInterrupt, ObstructEntryPoint, RecordingReporter, StalledSource,
    agent_script, sha256_hex, tarball,
};

fn latest() -> UpgradeRequest {
    UpgradeRequest {
        selector: VersionSelector::Latest,
        allow_downgrade: false,
    }
}

fn state_of(host: &Host) -> DeploymentState {
    host.manager(NoInterrupt).status().expect("status").state
}

async fn installed(host: &Host, version: &str) {
    host.publish(version);
    host.manager(NoInterrupt)
        .install(&host.provider(), &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect("install");
}

// ── status ───────────────────────────────────────────────────────────────────

#[test]
fn test_status_of_fresh_host_is_absent_and_touches_nothing() {
    let host = Host::new();
    let report = host.manager(NoInterrupt).status().expect("status");

    assert_eq!(report.state, DeploymentState::Absent);
    assert!(report.artifact.is_none());
    assert_eq!(report.link, LinkStatus::Missing);
    assert!(!report.staging_present);
    assert!(!report.workspace.present);
    assert!(!host.lock_path.exists(), "status must not create the lock file");
    assert!(!host.install_root.exists());
}

#[tokio::test]
async fn test_status_lists_workspace_projects() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    host.add_projects(&["web-api", "crawler"]);
    std::fs::create_dir_all(host.workspace_root.join(".cache")).expect("hidden dir");

    let report = host.manager(NoInterrupt).status().expect("status");

    assert_eq!(report.state, DeploymentState::Installed);
    assert!(report.workspace.present);
    assert_eq!(report.workspace.projects, vec!["crawler", "web-api"]);
    assert_eq!(
        report.artifact.expect("artifact").version,
        "1.0.0".to_string()
    );
}

// ── install ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_install_links_entry_point_to_committed_release() {
    let host = Host::new();
    host.publish("1.0.0");
    let mut manager = host.manager(NoInterrupt);

    let outcome = manager
        .install(&host.provider(), &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect("install");

    let InstallOutcome::Installed(artifact) = outcome else {
        panic!("expected a fresh install, got {outcome:?}");
    };
    assert_eq!(artifact.version, "1.0.0");
    assert_eq!(artifact.checksum, sha256_hex(&crate::helpers::bundle("1.0.0")));
    assert_eq!(host.entry_target(), Some(artifact.executable.clone()));
    assert_eq!(host.entry_contents(), Some(agent_script("1.0.0")));
    assert_eq!(host.release_dirs(), vec!["1.0.0"]);
    assert!(host.staging_dirs().is_empty());
    assert_eq!(state_of(&host), DeploymentState::Installed);
}

#[tokio::test]
async fn test_install_exact_version_ignores_latest() {
    let host = Host::new();
    host.publish("1.0.0");
    host.publish("1.1.0");

    let outcome = host
        .manager(NoInterrupt)
        .install(
            &host.provider(),
            &VersionSelector::Exact("1.0.0".to_string()),
            &RecordingReporter::default(),
        )
        .await
        .expect("install");

    assert_eq!(outcome.artifact().version, "1.0.0");
    assert_eq!(host.entry_contents(), Some(agent_script("1.0.0")));
}

#[tokio::test]
async fn test_install_twice_is_a_no_op() {
    let host = Host::new();
    host.publish("1.0.0");
    let mut manager = host.manager(NoInterrupt);
    let reporter = RecordingReporter::default();

    let first = manager
        .install(&host.provider(), &VersionSelector::Latest, &reporter)
        .await
        .expect("first install");
    host.publish("1.1.0");
    let second = manager
        .install(&host.provider(), &VersionSelector::Latest, &reporter)
        .await
        .expect("second install");

    assert!(matches!(second, InstallOutcome::AlreadyInstalled(_)));
    assert_eq!(second.artifact(), first.artifact());
    assert_eq!(host.entry_contents(), Some(agent_script("1.0.0")));
}

#[tokio::test]
async fn test_install_clears_stale_staging_first() {
    let host = Host::new();
    host.publish("1.0.0");
    std::fs::create_dir_all(host.install_root.join(".staging-leftover")).expect("staging");
    assert_eq!(state_of(&host), DeploymentState::Staged);

    host.manager(NoInterrupt)
        .install(&host.provider(), &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect("install");

    assert!(host.staging_dirs().is_empty());
    assert_eq!(state_of(&host), DeploymentState::Installed);
}

#[tokio::test]
async fn test_install_rejects_bundle_without_executable() {
    let host = Host::new();
    let data = tarball(&[("share/README", b"no binary here\n")]);
    host.publish_raw("1.0.0", &data, &sha256_hex(&data));

    let failure = host
        .manager(NoInterrupt)
        .install(&host.provider(), &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect_err("bundle is incomplete");

    assert!(matches!(failure.error, DeployError::Integrity(_)), "{failure:?}");
    assert_eq!(failure.state, DeploymentState::Absent);
    assert_eq!(failure.exit_code(), EXIT_RECOVERABLE);
    assert!(host.entry_target().is_none());
    assert!(host.release_dirs().is_empty());
    assert!(host.staging_dirs().is_empty());
}

#[tokio::test]
async fn test_install_of_other_version_warns_and_points_to_upgrade() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    host.publish("2.0.0");
    let reporter = RecordingReporter::default();

    let outcome = host
        .manager(NoInterrupt)
        .install(
            &host.provider(),
            &VersionSelector::Exact("2.0.0".to_string()),
            &reporter,
        )
        .await
        .expect("install");

    assert!(matches!(outcome, InstallOutcome::AlreadyInstalled(ref a) if a.version == "1.0.0"));
    let warnings = reporter.warnings();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("upgrade --version 2.0.0"), "{warnings:?}");
    assert_eq!(host.entry_contents(), Some(agent_script("1.0.0")));
}

#[tokio::test]
async fn test_install_of_installed_version_does_not_warn() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    let reporter = RecordingReporter::default();

    host.manager(NoInterrupt)
        .install(
            &host.provider(),
            &VersionSelector::Exact("1.0.0".to_string()),
            &reporter,
        )
        .await
        .expect("install");

    assert!(reporter.warnings().is_empty());
}

fn damage_manifest(host: &Host, version: &str) {
    let manifest = host.install_root.join("releases").join(version).join(MANIFEST_FILE);
    std::fs::write(manifest, "").expect("truncate manifest");
}

#[tokio::test]
async fn test_install_recovers_from_damaged_release_manifest() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    damage_manifest(&host, "1.0.0");
    assert_eq!(state_of(&host), DeploymentState::FailedPartial);

    let outcome = host
        .manager(NoInterrupt)
        .install(&host.provider(), &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect("reinstall over damaged release");

    assert!(matches!(outcome, InstallOutcome::Installed(ref a) if a.version == "1.0.0"));
    assert_eq!(state_of(&host), DeploymentState::Installed);
    assert_eq!(host.entry_contents(), Some(agent_script("1.0.0")));
    assert_eq!(host.release_dirs(), vec!["1.0.0"]);
}

#[tokio::test]
async fn test_repair_then_install_recovers_from_damaged_release_manifest() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    damage_manifest(&host, "1.0.0");
    let reporter = RecordingReporter::default();

    let repaired = host.manager(NoInterrupt).repair(&reporter).expect("repair");
    assert!(matches!(repaired, RepairOutcome::Unlinked), "{repaired:?}");
    assert_eq!(state_of(&host), DeploymentState::Absent);

    host.manager(NoInterrupt)
        .install(&host.provider(), &VersionSelector::Latest, &reporter)
        .await
        .expect("install");
    assert_eq!(state_of(&host), DeploymentState::Installed);
    assert_eq!(host.entry_contents(), Some(agent_script("1.0.0")));
}

// ── entry point cannot be linked ─────────────────────────────────────────────

#[tokio::test]
async fn test_install_link_failure_after_commit_needs_repair() {
    let host = Host::new();
    host.publish("1.0.0");
    std::fs::create_dir_all(host.entry_point.join("occupied")).expect("obstruct entry point");
    assert_eq!(state_of(&host), DeploymentState::Absent);
    let reporter = RecordingReporter::default();

    let failure = host
        .manager(NoInterrupt)
        .install(&host.provider(), &VersionSelector::Latest, &reporter)
        .await
        .expect_err("entry point is a directory");

    assert!(matches!(failure.error, DeployError::Link { .. }), "{failure:?}");
    assert_eq!(failure.error.code(), "link_error");
    assert_eq!(failure.state, DeploymentState::FailedPartial);
    assert_eq!(failure.exit_code(), EXIT_REPAIR_NEEDED);
    assert_eq!(host.release_dirs(), vec!["1.0.0"]);

    std::fs::remove_dir_all(&host.entry_point).expect("clear obstruction");
    let outcome = host.manager(NoInterrupt).repair(&reporter).expect("repair");
    assert!(matches!(outcome, RepairOutcome::Relinked(ref a) if a.version == "1.0.0"));
    assert_eq!(host.entry_contents(), Some(agent_script("1.0.0")));
}

#[tokio::test]
async fn test_upgrade_link_failure_keeps_old_release_until_repair() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    host.publish("2.0.0");
    let reporter = RecordingReporter::default();

    let failure = host
        .manager(ObstructEntryPoint(host.entry_point.clone()))
        .upgrade(&host.provider(), &latest(), &reporter)
        .await
        .expect_err("entry point is a directory");

    assert!(matches!(failure.error, DeployError::Link { .. }), "{failure:?}");
    assert_eq!(failure.state, DeploymentState::FailedPartial);
    assert_eq!(failure.exit_code(), EXIT_REPAIR_NEEDED);
    assert_eq!(host.release_dirs(), vec!["1.0.0", "2.0.0"]);

    std::fs::remove_dir_all(&host.entry_point).expect("clear obstruction");
    let outcome = host.manager(NoInterrupt).repair(&reporter).expect("repair");

    assert!(matches!(outcome, RepairOutcome::Relinked(ref a) if a.version == "2.0.0"));
    assert_eq!(host.entry_contents(), Some(agent_script("2.0.0")));
    assert_eq!(host.release_dirs(), vec!["2.0.0"]);
}

// ── fetch: retry, timeout, cancellation ─────────────────────────────────────

#[tokio::test]
async fn test_transient_fetch_failures_are_retried() {
    let host = Host::new();
    host.publish("1.0.0");
    let source = FlakySource::new(host.provider(), 2);

    let outcome = host
        .manager(NoInterrupt)
        .install(&source, &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect("third attempt succeeds");

    assert_eq!(outcome.artifact().version, "1.0.0");
    assert_eq!(source.fetch_calls(), 3);
    assert!(host.staging_dirs().is_empty());
}

#[tokio::test]
async fn test_persistent_fetch_failure_gives_up_cleanly() {
    let host = Host::new();
    host.publish("1.0.0");
    let source = FlakySource::new(host.provider(), u32::MAX);

    let failure = host
        .manager(NoInterrupt)
        .install(&source, &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect_err("source is down");

    assert!(matches!(failure.error, DeployError::Fetch(_)), "{failure:?}");
    assert_eq!(failure.error.code(), "fetch_error");
    assert_eq!(source.fetch_calls(), 3);
    assert_eq!(failure.state, DeploymentState::Absent);
    assert_eq!(failure.exit_code(), EXIT_RECOVERABLE);
    assert!(host.staging_dirs().is_empty());
}

#[tokio::test]
async fn test_stalled_fetch_times_out_and_discards_staging() {
    let host = Host::new();
    let mut manager = host
        .manager(NoInterrupt)
        .with_retry(RetryPolicy::none())
        .with_fetch_timeout(Duration::from_millis(50));

    let failure = manager
        .install(&StalledSource, &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect_err("fetch never completes");

    assert!(matches!(failure.error, DeployError::Timeout(_)), "{failure:?}");
    assert_eq!(failure.state, DeploymentState::Absent);
    assert_eq!(failure.exit_code(), EXIT_RECOVERABLE);
    assert!(host.staging_dirs().is_empty());
}

#[tokio::test]
async fn test_interrupt_during_fetch_cancels_without_side_effects() {
    let host = Host::new();
    let flag = InterruptFlag::new();
    let trigger = flag.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger();
    });

    let failure = host
        .manager(flag)
        .install(&StalledSource, &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect_err("interrupted");

    assert!(matches!(failure.error, DeployError::Cancelled(_)), "{failure:?}");
    assert_eq!(failure.state, DeploymentState::Absent);
    assert!(host.staging_dirs().is_empty());
    assert!(host.entry_target().is_none());
}

#[tokio::test]
async fn test_interrupt_requested_before_start_stops_immediately() {
    let host = Host::new();
    host.publish("1.0.0");
    let flag = InterruptFlag::new();
    flag.trigger();

    let failure = host
        .manager(flag)
        .install(&host.provider(), &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect_err("cancelled");

    assert_eq!(failure.error.code(), "cancelled");
    assert_eq!(state_of(&host), DeploymentState::Absent);
}

// ── locking ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_operation_is_rejected_by_the_lock() {
    let host = Host::new();
    host.publish("1.0.0");
    let mut holder = InstallLock::new(host.lock_path.clone());
    let _held = holder.try_acquire().expect("first holder");

    let failure = host
        .manager(NoInterrupt)
        .install(&host.provider(), &VersionSelector::Latest, &RecordingReporter::default())
        .await
        .expect_err("lock is held");

    assert!(
        matches!(failure.error, DeployError::LockContention { .. }),
        "{failure:?}"
    );
    assert_eq!(failure.state, DeploymentState::Absent);
    assert_eq!(failure.exit_code(), EXIT_RECOVERABLE);
    assert!(!host.install_root.exists(), "nothing may change without the lock");
}

#[tokio::test]
async fn test_lock_is_released_after_a_transition() {
    let host = Host::new();
    installed(&host, "1.0.0").await;

    let mut other = InstallLock::new(host.lock_path.clone());
    assert!(other.try_acquire().is_ok());
}

// ── upgrade ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_upgrade_switches_entry_point_and_prunes_old_release() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    host.publish("2.0.0");

    let outcome = host
        .manager(NoInterrupt)
        .upgrade(&host.provider(), &latest(), &RecordingReporter::default())
        .await
        .expect("upgrade");

    let UpgradeOutcome::Upgraded { from, to } = outcome else {
        panic!("expected an upgrade, got {outcome:?}");
    };
    assert_eq!(from.version, "1.0.0");
    assert_eq!(to.version, "2.0.0");
    assert_eq!(host.entry_target(), Some(to.executable));
    assert_eq!(host.entry_contents(), Some(agent_script("2.0.0")));
    assert_eq!(host.release_dirs(), vec!["2.0.0"]);
    assert!(host.staging_dirs().is_empty());
}

#[tokio::test]
async fn test_upgrade_to_installed_version_is_up_to_date() {
    let host = Host::new();
    installed(&host, "1.0.0").await;

    let outcome = host
        .manager(NoInterrupt)
        .upgrade(&host.provider(), &latest(), &RecordingReporter::default())
        .await
        .expect("upgrade");

    assert!(matches!(outcome, UpgradeOutcome::UpToDate(ref a) if a.version == "1.0.0"));
}

#[tokio::test]
async fn test_upgrade_with_bad_checksum_keeps_previous_version() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    host.publish_raw("2.0.0", &crate::helpers::bundle("2.0.0"), &"0".repeat(64));

    let failure = host
        .manager(NoInterrupt)
        .upgrade(&host.provider(), &latest(), &RecordingReporter::default())
        .await
        .expect_err("checksum mismatch");

    assert!(
        matches!(failure.error, DeployError::ChecksumMismatch { .. }),
        "{failure:?}"
    );
    assert_eq!(failure.error.code(), "integrity_error");
    assert_eq!(failure.state, DeploymentState::Installed);
    assert_eq!(failure.exit_code(), EXIT_RECOVERABLE);
    assert_eq!(host.entry_contents(), Some(agent_script("1.0.0")));
    assert_eq!(host.release_dirs(), vec!["1.0.0"]);
    assert!(host.staging_dirs().is_empty());
}

#[tokio::test]
async fn test_upgrade_refuses_downgrade_unless_allowed() {
    let host = Host::new();
    installed(&host, "2.0.0").await;
    host.publish("1.5.0");
    let mut manager = host.manager(NoInterrupt);
    let reporter = RecordingReporter::default();

    let failure = manager
        .upgrade(&host.provider(), &latest(), &reporter)
        .await
        .expect_err("downgrade refused");
    assert!(matches!(failure.error, DeployError::Downgrade { .. }), "{failure:?}");
    assert_eq!(failure.state, DeploymentState::Installed);
    assert_eq!(failure.exit_code(), EXIT_INVALID_INVOCATION);
    assert_eq!(host.entry_contents(), Some(agent_script("2.0.0")));

    let request = UpgradeRequest {
        allow_downgrade: true,
        ..latest()
    };
    let outcome = manager
        .upgrade(&host.provider(), &request, &reporter)
        .await
        .expect("downgrade allowed");
    assert!(matches!(outcome, UpgradeOutcome::Upgraded { ref to, .. } if to.version == "1.5.0"));
}

#[tokio::test]
async fn test_upgrade_without_install_is_invalid_invocation() {
    let host = Host::new();
    host.publish("1.0.0");

    let failure = host
        .manager(NoInterrupt)
        .upgrade(&host.provider(), &latest(), &RecordingReporter::default())
        .await
        .expect_err("nothing to upgrade");

    assert!(matches!(failure.error, DeployError::NotInstalled));
    assert_eq!(failure.state, DeploymentState::Absent);
    assert_eq!(failure.exit_code(), EXIT_INVALID_INVOCATION);
}

#[tokio::test]
async fn test_entry_point_stays_runnable_during_upgrade() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    host.publish("2.0.0");

    let stop = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicU32::new(0));
    let reader = {
        let (stop, reads) = (Arc::clone(&stop), Arc::clone(&reads));
        let entry = host.entry_point.clone();
        let (old, new) = (agent_script("1.0.0"), agent_script("2.0.0"));
        std::thread::spawn(move || {
            let mut broken = Vec::new();
            while !stop.load(Ordering::SeqCst) {
                match std::fs::read_to_string(&entry) {
                    Ok(body) if body == old || body == new => {}
                    other => broken.push(format!("{other:?}")),
                }
                reads.fetch_add(1, Ordering::SeqCst);
            }
            broken
        })
    };
    while reads.load(Ordering::SeqCst) == 0 {
        std::thread::yield_now();
    }

    let result = host
        .manager(NoInterrupt)
        .upgrade(&host.provider(), &latest(), &RecordingReporter::default())
        .await;
    stop.store(true, Ordering::SeqCst);
    let broken = reader.join().expect("reader thread");

    result.expect("upgrade");
    assert!(broken.is_empty(), "entry point was unusable: {broken:?}");
    assert_eq!(host.entry_contents(), Some(agent_script("2.0.0")));
}

// ── uninstall ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_uninstall_is_idempotent() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    let mut manager = host.manager(NoInterrupt);
    let reporter = RecordingReporter::default();

    let first = manager
        .uninstall(WorkspaceRemoval::Keep, &reporter)
        .expect("uninstall");
    assert_eq!(first.previous_state, DeploymentState::Installed);
    assert_eq!(first.removed_version.as_deref(), Some("1.0.0"));
    assert!(!first.workspace_removed);
    assert!(host.entry_target().is_none());
    assert!(!host.install_root.exists());

    let second = manager
        .uninstall(WorkspaceRemoval::Keep, &reporter)
        .expect("second uninstall");
    assert_eq!(second.previous_state, DeploymentState::Absent);
    assert_eq!(second.removed_version, None);
    assert_eq!(state_of(&host), DeploymentState::Absent);
}

#[tokio::test]
async fn test_uninstall_keeps_workspace_by_default() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    host.add_projects(&["web-api"]);

    host.manager(NoInterrupt)
        .uninstall(WorkspaceRemoval::Keep, &RecordingReporter::default())
        .expect("uninstall");

    assert!(host.workspace_root.join("web-api/main.py").is_file());
}

#[tokio::test]
async fn test_unconfirmed_purge_changes_nothing() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    host.add_projects(&["web-api"]);

    let failure = host
        .manager(NoInterrupt)
        .uninstall(
            WorkspaceRemoval::Purge { confirmed: false },
            &RecordingReporter::default(),
        )
        .expect_err("confirmation required");

    assert!(
        matches!(failure.error, DeployError::ConfirmationRequired { .. }),
        "{failure:?}"
    );
    assert_eq!(failure.state, DeploymentState::Installed);
    assert_eq!(failure.exit_code(), EXIT_INVALID_INVOCATION);
    assert_eq!(host.entry_contents(), Some(agent_script("1.0.0")));
    assert!(host.workspace_root.join("web-api").is_dir());
}

#[tokio::test]
async fn test_confirmed_purge_removes_workspace() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    host.add_projects(&["web-api", "crawler"]);

    let outcome = host
        .manager(NoInterrupt)
        .uninstall(
            WorkspaceRemoval::Purge { confirmed: true },
            &RecordingReporter::default(),
        )
        .expect("uninstall");

    assert!(outcome.workspace_removed);
    assert!(!host.workspace_root.exists());
    assert_eq!(state_of(&host), DeploymentState::Absent);
}

#[test]
fn test_purge_of_absent_workspace_needs_no_confirmation() {
    let host = Host::new();

    let outcome = host
        .manager(NoInterrupt)
        .uninstall(
            WorkspaceRemoval::Purge { confirmed: false },
            &RecordingReporter::default(),
        )
        .expect("nothing to confirm");

    assert!(!outcome.workspace_removed);
    assert_eq!(outcome.previous_state, DeploymentState::Absent);
}

// ── repair ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_repair_of_healthy_install_changes_nothing() {
    let host = Host::new();
    installed(&host, "1.0.0").await;

    let outcome = host
        .manager(NoInterrupt)
        .repair(&RecordingReporter::default())
        .expect("repair");

    assert!(matches!(outcome, RepairOutcome::Healthy(DeploymentState::Installed)));
    assert_eq!(host.entry_contents(), Some(agent_script("1.0.0")));
}

#[test]
fn test_repair_removes_dangling_entry_point() {
    let host = Host::new();
    std::fs::create_dir_all(host.entry_point.parent().expect("parent")).expect("bin dir");
    std::os::unix::fs::symlink(host.tmp.path().join("gone/agent"), &host.entry_point)
        .expect("dangling link");
    assert_eq!(state_of(&host), DeploymentState::FailedPartial);

    let outcome = host
        .manager(NoInterrupt)
        .repair(&RecordingReporter::default())
        .expect("repair");

    assert!(matches!(outcome, RepairOutcome::Unlinked));
    assert!(host.entry_target().is_none());
    assert_eq!(state_of(&host), DeploymentState::Absent);
}

#[test]
fn test_repair_clears_stale_staging() {
    let host = Host::new();
    std::fs::create_dir_all(host.install_root.join(".staging-abc123/tree")).expect("staging");

    let outcome = host
        .manager(NoInterrupt)
        .repair(&RecordingReporter::default())
        .expect("repair");

    assert!(matches!(outcome, RepairOutcome::ClearedStaging));
    assert!(host.staging_dirs().is_empty());
    assert_eq!(state_of(&host), DeploymentState::Absent);
}

#[tokio::test]
async fn test_upgrade_refuses_to_run_over_partial_state() {
    let host = Host::new();
    installed(&host, "1.0.0").await;
    std::fs::remove_file(&host.entry_point).expect("unlink entry point");
    host.publish("2.0.0");

    let failure = host
        .manager(NoInterrupt)
        .upgrade(&host.provider(), &latest(), &RecordingReporter::default())
        .await
        .expect_err("repair first");

    assert!(matches!(failure.error, DeployError::RepairRequired));
    assert_eq!(failure.state, DeploymentState::FailedPartial);
    assert_eq!(failure.exit_code(), 2);
}
