use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn config_cmd(tmp: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("snapsweep");
    cmd.current_dir(tmp)
        .env("SWEEP_HOME", tmp.join("home"))
        .arg("config");
    cmd
}

#[test]
fn config_shows_defaults_and_the_env_allowlist() {
    let tmp = tempdir().expect("tempdir");

    config_cmd(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("session.output_dir=<unset>"))
        .stdout(predicate::str::contains("session.source_command=<unset>"))
        .stdout(predicate::str::contains("session.max_items=1000"))
        .stdout(predicate::str::contains("session.inter_action_delay_ms=200"))
        .stdout(predicate::str::contains("session.save_confirm_attempts=3"))
        .stdout(predicate::str::contains("detect.repeat_threshold=2"))
        .stdout(predicate::str::contains("detect.appear_timeout_ms=10000"))
        .stdout(predicate::str::contains("detect.poll_interval_ms=500"))
        .stdout(predicate::str::contains("watcher.scan_interval_ms=1000"))
        .stdout(predicate::str::contains("watcher.extensions=jpeg,jpg,png"))
        .stdout(predicate::str::contains("config_file_exists=false"))
        .stdout(predicate::str::contains("SWEEP_OUT_DIR"))
        .stdout(predicate::str::contains("SWEEP_REPEAT_THRESHOLD"));
}

#[test]
fn environment_overrides_defaults() {
    let tmp = tempdir().expect("tempdir");

    config_cmd(tmp.path())
        .env("SWEEP_MAX_ITEMS", "7")
        .env("SWEEP_EXTENSIONS", ".PNG,png,gif")
        .env("SWEEP_OUT_DIR", "/tmp/captures")
        .assert()
        .success()
        .stdout(predicate::str::contains("session.max_items=7"))
        .stdout(predicate::str::contains("watcher.extensions=gif,png"))
        .stdout(predicate::str::contains("session.output_dir=/tmp/captures"));
}

#[test]
fn file_config_merges_and_environment_wins_over_it() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("home");
    fs::create_dir_all(&home).expect("mkdir home");
    fs::write(
        home.join("config.toml"),
        "[session]\nmax_items = 5\n\n[detect]\nrepeat_threshold = 4\n",
    )
    .expect("write config file");

    config_cmd(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("session.max_items=5"))
        .stdout(predicate::str::contains("detect.repeat_threshold=4"))
        .stdout(predicate::str::contains("config_file_exists=true"));

    config_cmd(tmp.path())
        .env("SWEEP_MAX_ITEMS", "9")
        .assert()
        .success()
        .stdout(predicate::str::contains("session.max_items=9"))
        .stdout(predicate::str::contains("detect.repeat_threshold=4"));
}

#[test]
fn an_invalid_repeat_threshold_is_rejected() {
    let tmp = tempdir().expect("tempdir");

    config_cmd(tmp.path())
        .env("SWEEP_REPEAT_THRESHOLD", "1")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid repeat threshold"));
}

#[test]
fn an_invalid_extension_list_is_rejected() {
    let tmp = tempdir().expect("tempdir");

    config_cmd(tmp.path())
        .env("SWEEP_EXTENSIONS", "jp g")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid watcher extension"));
}
