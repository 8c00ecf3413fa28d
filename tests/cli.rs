//! Command line behaviour of the `glm-regrid` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn glm_regrid() -> Command {
    Command::cargo_bin("glm-regrid").unwrap()
}

#[test]
fn help_lists_subcommands() {
    glm_regrid()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("regrid").and(contains("assemble")).and(contains("compare")));
}

#[test]
fn missing_config_file_is_reported() {
    glm_regrid()
        .args(["--config", "/nonexistent/glm.yaml", "regrid", "x.nc"])
        .assert()
        .failure()
        .stderr(contains("Failed to load config"));
}

#[test]
fn invalid_dates_are_rejected_by_the_parser() {
    glm_regrid()
        .args(["assemble", "--start", "yesterday", "--end", "2018-157", "-o", "out.nc"])
        .assert()
        .failure()
        .stderr(contains("Invalid date"));
}

#[test]
fn unknown_satellite_is_rejected() {
    glm_regrid()
        .args(["--satellite", "himawari8", "regrid", "x.nc"])
        .assert()
        .failure()
        .stderr(contains("Unsupported satellite"));
}

#[test]
fn assemble_lists_missing_days() {
    let tmp = TempDir::new().unwrap();
    glm_regrid()
        .arg("--raw-root")
        .arg(tmp.path().join("raw"))
        .arg("--regrid-root")
        .arg(tmp.path().join("regrid"))
        .args(["assemble", "--start", "2018-156T05", "--end", "2018-157T03"])
        .arg("--output")
        .arg(tmp.path().join("series.nc"))
        .assert()
        .failure()
        .stderr(contains("2 day(s)").and(contains("2018-156")).and(contains("2018-157")));
}

#[test]
fn regrid_reports_bad_files_and_fails() {
    let tmp = TempDir::new().unwrap();
    let bad = tmp.path().join("not_a_glm_file.nc");
    std::fs::write(&bad, b"").unwrap();

    glm_regrid()
        .arg("--regrid-root")
        .arg(tmp.path().join("regrid"))
        .args(["regrid", "--no-progress"])
        .arg(&bad)
        .assert()
        .failure()
        .stdout(contains("failed: 1"))
        .stderr(contains("1 file(s) failed"));
}

#[test]
fn regrid_of_empty_directory_fails() {
    let tmp = TempDir::new().unwrap();
    glm_regrid()
        .args(["regrid", "--no-progress"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(contains("No raw files found"));
}

#[test]
fn log_file_receives_output() {
    let tmp = TempDir::new().unwrap();
    let log = tmp.path().join("run.log");
    glm_regrid()
        .arg("--log")
        .arg(&log)
        .args(["regrid", "--no-progress"])
        .arg(tmp.path())
        .assert()
        .failure();
    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("Starting glm-regrid"));
}

#[test]
fn resolution_override_must_fit_grid_minimums() {
    glm_regrid()
        .args(["--resolution", "1", "regrid", "x.nc"])
        .assert()
        .failure()
        .stderr(contains("does not fit lat_min = -89.75"));

    let tmp = TempDir::new().unwrap();
    glm_regrid()
        .args(["--resolution", "0.5", "regrid", "--no-progress"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(contains("No raw files found"));
}
