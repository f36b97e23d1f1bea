//! Integration tests for the kiosk CLI
//!
//! These tests run the actual binary from a scratch directory so no stray
//! kiosk.yaml or Message.txt is picked up.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get the binary to test
fn kiosk_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kiosk").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("KIOSK_EXECUTABLE")
        .env_remove("KIOSK_SCRIPT");
    cmd
}

const TRANSCRIPT: &str = r#"# one visitor, one message
#capture
[[CAPTURE_DONE]]
[[OLLAMA_START]]
[[CREDIT]] Test (Role: narrator)
[[CHARACTER]] Aria
HTTP Request: POST https://api.deepseek.com/chat/completions "HTTP/1.1 200 OK"
[[MESSAGE]] Hello visitor
#duration 1
#wait 3
#wait 5
"#;

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    kiosk_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("replay"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("history"));
}

// ============================================================================
// Replay
// ============================================================================

#[test]
fn test_replay_prints_transitions() {
    let dir = TempDir::new().unwrap();
    let transcript = dir.path().join("visit.txt");
    fs::write(&transcript, TRANSCRIPT).unwrap();

    kiosk_cmd(&dir)
        .args(["replay", "visit.txt"])
        .env("NO_COLOR", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("waiting -> scanning"))
        .stdout(predicate::str::contains("scan_complete -> message"))
        .stdout(predicate::str::contains("end -> waiting"))
        .stdout(predicate::str::contains("CAPTURE 0"))
        .stdout(predicate::str::contains("by Aria｜Test"))
        .stdout(predicate::str::contains("Hello visitor"));
}

#[test]
fn test_replay_skip_scan_complete() {
    let dir = TempDir::new().unwrap();
    let transcript = dir.path().join("visit.txt");
    fs::write(&transcript, TRANSCRIPT).unwrap();

    kiosk_cmd(&dir)
        .args(["replay", "visit.txt", "--skip-scan-complete"])
        .env("NO_COLOR", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("scanning -> message"))
        .stdout(predicate::str::contains("scan_complete").not());
}

#[test]
fn test_replay_bad_directive() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bad.txt"), "#capture\n#teleport now\n").unwrap();

    kiosk_cmd(&dir)
        .args(["replay", "bad.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KIOSK-030"))
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_replay_missing_transcript() {
    let dir = TempDir::new().unwrap();
    kiosk_cmd(&dir)
        .args(["replay", "nope.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

// ============================================================================
// Validate
// ============================================================================

#[test]
fn test_validate_good_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("kiosk.yaml");
    fs::write(
        &config,
        r#"
process:
  executable: python3
  script: oracle.py
flow:
  message_secs: 12
  skip_end: true
router:
  api_host: api.example.com
"#,
    )
    .unwrap();

    kiosk_cmd(&dir)
        .args(["validate", "kiosk.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("oracle.py"))
        .stdout(predicate::str::contains("api.example.com"));
}

#[test]
fn test_validate_rejects_zero_duration() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("kiosk.yaml"), "flow:\n  end_secs: 0\n").unwrap();

    kiosk_cmd(&dir)
        .args(["validate", "kiosk.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KIOSK-020"))
        .stderr(predicate::str::contains("flow.end_secs"));
}

#[test]
fn test_validate_missing_file() {
    let dir = TempDir::new().unwrap();
    kiosk_cmd(&dir)
        .args(["validate", "missing.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KIOSK-021"))
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn test_validate_bad_yaml() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("kiosk.yaml"), "flow: [unclosed\n").unwrap();

    kiosk_cmd(&dir)
        .args(["validate", "kiosk.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YAML parse error"));
}

// ============================================================================
// History
// ============================================================================

#[test]
fn test_history_empty() {
    let dir = TempDir::new().unwrap();
    kiosk_cmd(&dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No messages"));
}

#[test]
fn test_history_lists_and_clears() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("Message.txt");
    fs::write(
        &log,
        "[[INFO]] Hello visitor (by Aria｜Test)\n[[INFO]] Second\n",
    )
    .unwrap();

    kiosk_cmd(&dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello visitor"))
        .stdout(predicate::str::contains("by Aria｜Test"))
        .stdout(predicate::str::contains("2 message(s)"));

    kiosk_cmd(&dir)
        .args(["history", "--clear"])
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&log).unwrap(), "");
}

#[test]
fn test_history_uses_config_path() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("custom.yaml"),
        "storage:\n  message_log: archive.txt\n",
    )
    .unwrap();
    fs::write(dir.path().join("archive.txt"), "[[INFO]] From config\n").unwrap();

    kiosk_cmd(&dir)
        .args(["history", "--config", "custom.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("From config"));
}

// ============================================================================
// Purge
// ============================================================================

#[test]
fn test_purge_removes_media_only() {
    let dir = TempDir::new().unwrap();
    let capture = dir.path().join("capture");
    let voice = dir.path().join("voice");
    fs::create_dir(&capture).unwrap();
    fs::create_dir(&voice).unwrap();
    fs::write(capture.join("frame.jpg"), b"x").unwrap();
    fs::write(capture.join("notes.txt"), b"keep").unwrap();
    fs::write(voice.join("reply.wav"), b"x").unwrap();

    kiosk_cmd(&dir)
        .arg("purge")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 file(s)"));

    assert!(!capture.join("frame.jpg").exists());
    assert!(!voice.join("reply.wav").exists());
    assert!(capture.join("notes.txt").exists());
}
