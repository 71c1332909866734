//! Integration tests for the `dispatch` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to exercise the scan, slots
//! and reschedule subcommands through the actual binary, including config
//! loading, JSON output, snapshot file updates, and error handling.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: path to the snapshot.json fixture.
fn snapshot_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/snapshot.json")
}

/// Helper: path to the chicago.json config fixture.
fn chicago_config_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/chicago.json")
}

/// Helper: a private copy of the snapshot fixture that a test may modify.
fn scratch_snapshot(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dispatch-cli-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir must be writable");
    let path = dir.join(format!("{name}.json"));
    std::fs::copy(snapshot_path(), &path).expect("snapshot.json fixture must exist");
    path
}

/// Helper: the stored (date, time) of a job in a snapshot file.
fn stored_schedule(path: &PathBuf, job_id: &str) -> (String, String) {
    let json = std::fs::read_to_string(path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let job = value["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|job| job["id"] == job_id)
        .unwrap();
    (
        job["scheduled_date"].as_str().unwrap().to_string(),
        job["scheduled_time"].as_str().unwrap().to_string(),
    )
}

fn dispatch() -> Command {
    Command::cargo_bin("dispatch").unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Scan subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn scan_reports_no_conflicts_for_free_slot() {
    dispatch()
        .args(["scan", "-s", snapshot_path(), "--job", "J1"])
        .args(["--date", "2024-03-05", "--time", "10:30"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No conflicts for job J1 on 2024-03-05 10:30",
        ));
}

#[test]
fn scan_reports_job_overlap() {
    dispatch()
        .args(["scan", "-s", snapshot_path(), "--job", "J1"])
        .args(["--date", "2024-03-04", "--time", "10:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 conflict(s) for job J1"))
        .stdout(predicate::str::contains("[Job overlap] J2"))
        // J4 is cancelled.
        .stdout(predicate::str::contains("J4").not());
}

#[test]
fn scan_back_to_back_is_clean() {
    dispatch()
        .args(["scan", "-s", snapshot_path(), "--job", "J1"])
        .args(["--date", "2024-03-04", "--time", "11:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No conflicts"));
}

#[test]
fn scan_json_reports_leave() {
    let output = dispatch()
        .args(["scan", "-s", snapshot_path(), "--job", "J1"])
        .args(["--date", "2024-03-07", "--time", "10:00", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["job_id"], "J1");
    assert_eq!(report["time"], "10:00");
    let conflicts = report["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["kind"], "leave_overlap");
    assert_eq!(conflicts[0]["entity_id"], "L1");
    assert_eq!(conflicts[0]["overlap_minutes"], 60);
}

#[test]
fn scan_closed_period_for_unstaffed_job() {
    let output = dispatch()
        .args(["scan", "-s", snapshot_path(), "--job", "J3"])
        .args(["--date", "2024-12-25", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    // No --time: J3 keeps its stored 13:00.
    assert_eq!(report["time"], "13:00");
    assert_eq!(report["conflicts"][0]["kind"], "closed_period_overlap");
}

#[test]
fn scan_uses_configured_timezone() {
    // 19:00 in Chicago on Christmas Eve is already Christmas in UTC.
    dispatch()
        .args(["scan", "-s", snapshot_path(), "--job", "J3"])
        .args(["--date", "2024-12-24", "--time", "19:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No conflicts"));

    dispatch()
        .args(["scan", "-s", snapshot_path(), "--job", "J3"])
        .args(["--date", "2024-12-24", "--time", "19:00"])
        .args(["--config", chicago_config_path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("[Business closed] C1"));
}

#[test]
fn scan_unknown_job_fails() {
    dispatch()
        .args(["scan", "-s", snapshot_path(), "--job", "J9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Job J9 not found"));
}

#[test]
fn scan_malformed_time_fails() {
    dispatch()
        .args(["scan", "-s", snapshot_path(), "--job", "J1"])
        .args(["--date", "2024-03-05", "--time", "half past ten"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid target time"));
}

#[test]
fn scan_missing_snapshot_fails() {
    dispatch()
        .args(["scan", "-s", "/nonexistent/snapshot.json", "--job", "J1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read snapshot"));
}

#[test]
fn invalid_config_fails() {
    let path = std::env::temp_dir().join(format!("dispatch-bad-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"timezone":"Nowhere/Special"}"#).unwrap();

    dispatch()
        .args(["scan", "-s", snapshot_path(), "--job", "J1"])
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timezone: Nowhere/Special"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Slots subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn slots_skip_busy_hours() {
    dispatch()
        .args(["slots", "-s", snapshot_path(), "--job", "J1", "--date", "2024-03-04"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Free start times for job J1 on 2024-03-04"))
        .stdout(predicate::str::contains("  08:00"))
        .stdout(predicate::str::contains("  11:00"))
        .stdout(predicate::str::contains("  09:00").not())
        .stdout(predicate::str::contains("  10:00").not());
}

#[test]
fn slots_none_while_on_leave() {
    dispatch()
        .args(["slots", "-s", snapshot_path(), "--job", "J1", "--date", "2024-03-07"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No free start times"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Reschedule subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn reschedule_without_yes_does_not_save() {
    let path = scratch_snapshot("dry-run");
    let before = std::fs::read_to_string(&path).unwrap();

    dispatch()
        .args(["reschedule", "--job", "J1", "--date", "2024-03-05", "--time", "10:30"])
        .arg("-s")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Job J1: 2024-03-01 09:00 -> 2024-03-05 10:00",
        ))
        .stdout(predicate::str::contains("Not saved"));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn reschedule_saves_snapped_time() {
    let path = scratch_snapshot("clean-save");

    dispatch()
        .args(["reschedule", "--job", "J1", "--date", "2024-03-05", "--time", "10:30", "--yes"])
        .arg("-s")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Saved: job J1 now scheduled 2024-03-05 10:00",
        ));

    assert_eq!(
        stored_schedule(&path, "J1"),
        ("2024-03-05".to_string(), "10:00".to_string())
    );
}

#[test]
fn reschedule_with_conflicts_needs_proceed_anyway() {
    let path = scratch_snapshot("conflict-refused");
    let before = std::fs::read_to_string(&path).unwrap();

    dispatch()
        .args(["reschedule", "--job", "J1", "--date", "2024-03-04", "--time", "10:00", "--yes"])
        .arg("-s")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 conflict(s):"))
        .stderr(predicate::str::contains("--proceed-anyway"));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn reschedule_proceed_anyway_saves_over_conflicts() {
    let path = scratch_snapshot("conflict-accepted");

    dispatch()
        .args(["reschedule", "--job", "J1", "--date", "2024-03-04", "--time", "10:00"])
        .args(["--yes", "--proceed-anyway"])
        .arg("-s")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[Job overlap] J2"))
        .stdout(predicate::str::contains("Saved: job J1"));

    assert_eq!(
        stored_schedule(&path, "J1"),
        ("2024-03-04".to_string(), "10:00".to_string())
    );
}

#[test]
fn reschedule_to_same_slot_is_refused() {
    let path = scratch_snapshot("no-op");

    dispatch()
        .args(["reschedule", "--job", "J1", "--date", "2024-03-01", "--time", "09:15", "--yes"])
        .arg("-s")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already scheduled"));

    assert_eq!(
        stored_schedule(&path, "J1"),
        ("2024-03-01".to_string(), "09:00:00".to_string())
    );
}

#[test]
fn reschedule_notify_requires_technicians() {
    let path = scratch_snapshot("notify-unstaffed");

    dispatch()
        .args(["reschedule", "--job", "J3", "--date", "2024-03-02", "--notify", "--yes"])
        .arg("-s")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no assigned technicians"));
}

#[test]
fn reschedule_notify_logs_message() {
    let path = scratch_snapshot("notify");

    dispatch()
        .args(["reschedule", "--job", "J1", "--date", "2024-03-05", "--time", "14:00"])
        .args(["--yes", "--notify", "-v"])
        .arg("-s")
        .arg(&path)
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stdout(predicate::str::contains("Technicians notified"))
        .stderr(predicate::str::contains(
            "Job J1 has been rescheduled to 2024-03-05 at 14:00",
        ));
}
