//! Smoke tests -- verify the binary runs and key subcommands parse.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("seatsniper")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Time-triggered auto-registration"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("seatsniper")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("seatsniper"));
}

#[test]
fn test_watch_subcommand_exists() {
    Command::cargo_bin("seatsniper")
        .unwrap()
        .args(["watch", "--help"])
        .assert()
        .success();
}

#[test]
fn test_schedule_set_subcommand_exists() {
    Command::cargo_bin("seatsniper")
        .unwrap()
        .args(["schedule", "set", "--help"])
        .assert()
        .success()
        .stdout(predicates::str::contains("--millis"));
}

#[test]
fn test_priority_subcommand_exists() {
    Command::cargo_bin("seatsniper")
        .unwrap()
        .args(["priority", "--help"])
        .assert()
        .success();
}

#[test]
fn test_scrape_subcommand_exists() {
    Command::cargo_bin("seatsniper")
        .unwrap()
        .args(["scrape", "--help"])
        .assert()
        .success();
}
