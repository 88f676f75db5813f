use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn reconcile_cmd(tmp: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("snapsweep");
    cmd.current_dir(tmp)
        .env("SWEEP_HOME", tmp.join("home"))
        .arg("reconcile");
    cmd
}

#[test]
fn reconcile_deletes_later_duplicates_and_ignores_noise() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("captures");
    fs::create_dir_all(&dir).expect("mkdir captures");

    fs::write(dir.join("1.jpg"), "content-x").expect("write 1");
    fs::write(dir.join("2.jpg"), "content-y").expect("write 2");
    fs::write(dir.join("3.jpg"), "content-x").expect("write 3");
    fs::write(dir.join("4.jpg"), "content-x").expect("write 4");
    // Noise the sweep must never touch.
    fs::write(dir.join("notes.txt"), "keep me").expect("write notes");
    fs::write(dir.join("cover.jpg"), "content-x").expect("write cover");
    fs::write(dir.join("9.gif"), "content-x").expect("write gif");

    reconcile_cmd(tmp.path())
        .arg("--out-dir")
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("observed=4"))
        .stdout(predicate::str::contains("distinct=2"))
        .stdout(predicate::str::contains("kept=2"))
        .stdout(predicate::str::contains("deleted=2"))
        .stdout(predicate::str::contains("delete_failures=0"));

    assert!(dir.join("1.jpg").exists());
    assert!(dir.join("2.jpg").exists());
    assert!(!dir.join("3.jpg").exists());
    assert!(!dir.join("4.jpg").exists());
    assert!(dir.join("notes.txt").exists());
    assert!(dir.join("cover.jpg").exists());
    assert!(dir.join("9.gif").exists());
}

#[test]
fn reconcile_refuses_a_missing_directory() {
    let tmp = tempdir().expect("tempdir");

    reconcile_cmd(tmp.path())
        .arg("--out-dir")
        .arg(tmp.path().join("never-created"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn reconcile_emits_a_json_report_on_request() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("captures");
    fs::create_dir_all(&dir).expect("mkdir captures");
    fs::write(dir.join("1.jpg"), "same").expect("write 1");
    fs::write(dir.join("2.jpg"), "same").expect("write 2");

    let assert = reconcile_cmd(tmp.path())
        .arg("--out-dir")
        .arg(&dir)
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON report");
    assert_eq!(report["command"], "reconcile");
    assert_eq!(report["ok"], true);
    let details = report["details"].as_array().expect("details array");
    assert!(
        details
            .iter()
            .any(|d| d.as_str() == Some("kept=1"))
    );
    assert!(
        details
            .iter()
            .any(|d| d.as_str() == Some("deleted=1"))
    );

    assert!(dir.join("1.jpg").exists());
    assert!(!dir.join("2.jpg").exists());
}

#[test]
fn reconcile_warns_on_extension_collisions_and_leaves_both_files() {
    let tmp = tempdir().expect("tempdir");
    let dir = tmp.path().join("captures");
    fs::create_dir_all(&dir).expect("mkdir captures");
    fs::write(dir.join("1.jpg"), "one").expect("write jpg");
    fs::write(dir.join("1.png"), "two").expect("write png");
    fs::write(dir.join("2.jpg"), "three").expect("write 2");

    reconcile_cmd(tmp.path())
        .arg("--out-dir")
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("collisions=1"))
        .stdout(predicate::str::contains("observed=1"))
        .stderr(predicate::str::contains("EXTENSION_COLLISION"));

    assert!(dir.join("1.jpg").exists());
    assert!(dir.join("1.png").exists());
    assert!(dir.join("2.jpg").exists());
}
