//! Corruption recovery tests for medrem.
//!
//! These tests verify the system can handle:
//! - Corrupted registry files (refused, left untouched)
//! - Corrupted or partially written dose logs
//! - Bad config and export files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use tempfile::TempDir;

fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("medrem"));
    cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(temp_dir.path().join("data"))
        .arg("--now")
        .arg("2024-03-05 08:00");
    cmd
}

fn setup_test_dir() -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::create_dir_all(temp_dir.path().join("data")).unwrap();
    temp_dir
}

#[test]
fn test_corrupted_registry_is_refused() {
    let temp_dir = setup_test_dir();
    let registry_path = temp_dir.path().join("data/registry.json");
    fs::write(&registry_path, "{ invalid json }}}}").unwrap();

    cli(&temp_dir)
        .arg("next")
        .assert()
        .failure()
        .stderr(predicate::str::contains("corrupted"));

    // Writes are refused too, so the file survives for manual recovery
    cli(&temp_dir)
        .args(["medicine", "add", "--name", "Aspirin", "--dosage", "81mg"])
        .assert()
        .failure();

    assert_eq!(
        fs::read_to_string(&registry_path).unwrap(),
        "{ invalid json }}}}"
    );
}

#[test]
fn test_corrupted_dose_log_lines_ignored() {
    let temp_dir = setup_test_dir();
    fs::write(
        temp_dir.path().join("data/doses.jsonl"),
        "{ invalid json }\n{ more invalid }",
    )
    .unwrap();

    cli(&temp_dir)
        .arg("next")
        .assert()
        .success()
        .stdout(predicate::str::contains("Today: 0 taken, 0 missed"));
}

#[test]
fn test_partial_dose_log_line() {
    let temp_dir = setup_test_dir();
    let log_path = temp_dir.path().join("data/doses.jsonl");

    let mut file = fs::File::create(&log_path).unwrap();
    writeln!(
        file,
        r#"{{"id":"00000000-0000-0000-0000-000000000001","reminder_id":"00000000-0000-0000-0000-000000000002","medicine_ids":[],"time":"2024-03-05T07:00:00","taken":true,"created_at":"2024-03-05T07:00:00Z"}}"#
    )
    .unwrap();
    // Simulated crash mid-write
    write!(file, r#"{{"id":"00000000-0000-0000"#).unwrap();
    drop(file);

    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-03-05 07:00  taken"));

    // Purging rewrites the log without the broken tail
    cli(&temp_dir)
        .args(["purge", "--older-than-days", "1"])
        .assert()
        .success();

    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.ends_with('\n'));
}

#[test]
fn test_empty_files() {
    let temp_dir = setup_test_dir();
    fs::write(temp_dir.path().join("data/doses.jsonl"), "").unwrap();

    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No doses logged"));
}

#[test]
fn test_invalid_config_file() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[history\nretention_days = ").unwrap();

    cli(&temp_dir)
        .arg("--config")
        .arg(&config_path)
        .arg("next")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Toml"));
}

#[test]
fn test_timezone_time_format_rejected() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("tz.toml");
    fs::write(&config_path, "[display]\ntime_format = \"%Y-%m-%d %H:%M %z\"\n").unwrap();

    cli(&temp_dir)
        .arg("--config")
        .arg(&config_path)
        .arg("next")
        .assert()
        .failure()
        .stderr(predicate::str::contains("time_format"))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn test_import_rejects_invalid_rule() {
    let temp_dir = setup_test_dir();
    let import_path = temp_dir.path().join("bad_rule.json");
    fs::write(
        &import_path,
        r#"{
  "version": "1.0",
  "medicines": [{
    "id": "00000000-0000-0000-0000-00000000000a",
    "name": "Amoxicillin",
    "dosage": "250mg",
    "created_at": "2024-01-01T00:00:00Z",
    "updated_at": "2024-01-01T00:00:00Z"
  }],
  "reminders": [{
    "id": "00000000-0000-0000-0000-00000000000b",
    "medicine_ids": ["00000000-0000-0000-0000-00000000000a"],
    "rule": {
      "kind": "fixed_times_per_day",
      "reference_time": "2024-01-01T08:00:00",
      "times_per_day": 3,
      "interval_hours": 0
    },
    "created_at": "2024-01-01T00:00:00Z",
    "updated_at": "2024-01-01T00:00:00Z"
  }]
}"#,
    )
    .unwrap();

    cli(&temp_dir)
        .arg("import")
        .arg(&import_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval hours"));

    assert!(!temp_dir.path().join("data/registry.json").exists());
}

#[test]
fn test_import_rejects_unknown_version() {
    let temp_dir = setup_test_dir();
    let import_path = temp_dir.path().join("future.json");
    fs::write(
        &import_path,
        r#"{"version":"2.0","medicines":[],"reminders":[],"records":[]}"#,
    )
    .unwrap();

    cli(&temp_dir)
        .arg("import")
        .arg(&import_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("UnsupportedVersion"));

    assert!(!temp_dir.path().join("data/registry.json").exists());
}

#[test]
fn test_import_rejects_malformed_json() {
    let temp_dir = setup_test_dir();
    let import_path = temp_dir.path().join("broken.json");
    fs::write(&import_path, "not json").unwrap();

    cli(&temp_dir)
        .arg("import")
        .arg(&import_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Json"));
}
