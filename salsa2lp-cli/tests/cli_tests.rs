use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn salsa2lp_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("salsa2lp-sync"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config_file(home: &Path, name: &str, contents: &str) {
    let dir = home.join(".config").join("salsa2lp-sync");
    fs::create_dir_all(&dir).expect("create config dir");
    fs::write(dir.join(name), contents).expect("write config file");
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().expect("home");
    salsa2lp_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("sync"))
        .stdout(contains("login"))
        .stdout(contains("packages"))
        .stdout(contains("Change Anything"));
}

#[test]
fn sync_help_documents_batch_flags() {
    let home = TempDir::new().expect("home");
    salsa2lp_cmd(home.path())
        .args(["sync", "--help"])
        .assert()
        .success()
        .stdout(contains("--jobs"))
        .stdout(contains("--team"))
        .stdout(contains("--ppa"))
        .stdout(contains("--series"))
        .stdout(contains("[PROJECT]"));
}

#[test]
fn unknown_subcommand_fails() {
    let home = TempDir::new().expect("home");
    salsa2lp_cmd(home.path())
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(contains("unrecognized subcommand"));
}

#[test]
fn non_numeric_jobs_is_rejected() {
    let home = TempDir::new().expect("home");
    salsa2lp_cmd(home.path())
        .args(["sync", "--jobs", "many"])
        .assert()
        .failure()
        .stderr(contains("invalid value"));
}

#[test]
fn overrides_only_lists_packages_file_entries() {
    let home = TempDir::new().expect("home");
    write_config_file(
        home.path(),
        "Packages.txt",
        "# extra packages\nlomiri-ui-toolkit ubports-team/core\n\nqtmir ubports-team\n",
    );

    salsa2lp_cmd(home.path())
        .args(["packages", "--overrides-only"])
        .assert()
        .success()
        .stdout(contains("lomiri-ui-toolkit"))
        .stdout(contains("ubports-team/core"))
        .stdout(contains("qtmir"))
        .stdout(contains("2 package(s)"));
}

#[test]
fn overrides_only_without_file_is_empty() {
    let home = TempDir::new().expect("home");
    salsa2lp_cmd(home.path())
        .args(["packages", "--overrides-only"])
        .assert()
        .success()
        .stdout(contains("No packages."));
}

#[test]
fn malformed_packages_file_reports_line() {
    let home = TempDir::new().expect("home");
    write_config_file(home.path(), "Packages.txt", "qtmir\n");

    salsa2lp_cmd(home.path())
        .args(["packages", "--overrides-only"])
        .assert()
        .failure()
        .stderr(contains("Packages.txt").and(contains(":1")));
}

#[test]
fn malformed_config_fails_before_any_network_access() {
    let home = TempDir::new().expect("home");
    write_config_file(home.path(), "config.yaml", "jobs: [not, a, number]\n");

    salsa2lp_cmd(home.path())
        .args(["packages", "--overrides-only"])
        .assert()
        .failure()
        .stderr(contains("failed to load configuration"));
}

#[test]
fn empty_team_flag_is_rejected() {
    let home = TempDir::new().expect("home");
    salsa2lp_cmd(home.path())
        .args(["packages", "--overrides-only", "--team", " "])
        .assert()
        .failure()
        .stderr(contains("team"));
}
