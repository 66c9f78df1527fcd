use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn warpcrawler(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("warpcrawler").unwrap();
    cmd.current_dir(dir).env_remove("WARPCRAWLER_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn init_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("warpcrawler.toml");
    warpcrawler(dir)
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config initialized at"));
    path
}

#[test]
fn help_lists_commands() {
    let tmp = tempfile::tempdir().unwrap();
    warpcrawler(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("crawl"))
        .stdout(predicate::str::contains("bootstrap"))
        .stdout(predicate::str::contains("publish"));
}

#[test]
fn config_show_prints_resolved_config() {
    let tmp = tempfile::tempdir().unwrap();
    let config = init_config(tmp.path());

    warpcrawler(tmp.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[snapshot]"))
        .stdout(predicate::str::contains("20250408214013"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let tmp = tempfile::tempdir().unwrap();
    let config = init_config(tmp.path());

    warpcrawler(tmp.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn missing_explicit_config_fails() {
    let tmp = tempfile::tempdir().unwrap();
    warpcrawler(tmp.path())
        .args(["--config", "nope.toml", "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn crawl_outside_snapshot_exits_one() {
    let tmp = tempfile::tempdir().unwrap();
    let config = init_config(tmp.path());
    let out = tmp.path().join("mirror");

    warpcrawler(tmp.path())
        .arg("--config")
        .arg(&config)
        .arg("crawl")
        .arg("https://web.archive.org/web/20190101000000/https://jamstash.io/")
        .arg(&out)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("crawler failed with exit code 1"));

    assert!(!out.exists());
}

#[test]
fn crawl_rejects_malformed_timestamp() {
    let tmp = tempfile::tempdir().unwrap();
    let config = init_config(tmp.path());

    warpcrawler(tmp.path())
        .arg("--config")
        .arg(&config)
        .args(["crawl", "--timestamp", "2025"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("14 digits"));

    assert!(!tmp.path().join("jamstash_site").exists());
}

#[test]
fn crawl_timestamp_override_derives_start_url() {
    let tmp = tempfile::tempdir().unwrap();
    let config = tmp.path().join("warpcrawler.toml");
    // Nothing listens on the discard port, so the start page fails to fetch
    std::fs::write(
        &config,
        "[snapshot]\narchive_origin = \"http://127.0.0.1:9\"\noutput_dir = \"mirror\"\n\n[crawl]\ndelay_ms = 0\ntimeout_secs = 2\n",
    )
    .unwrap();

    warpcrawler(tmp.path())
        .arg("--config")
        .arg(&config)
        .args(["crawl", "--timestamp", "20240101000000", "--no-manifest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Done. Open"))
        .stdout(predicate::str::contains("jamstash.io"));

    assert!(tmp.path().join("mirror").exists());
}
