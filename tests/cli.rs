mod common;

use std::fs;

use assert_cmd::Command;
use claims_prep::config::CleaningConfig;
use common::{TestWorkspace, fixture_path, read_output};
use predicates::str::contains;

fn claims_prep() -> Command {
    Command::cargo_bin("claims-prep").expect("binary exists")
}

#[test]
fn clean_writes_output_and_report() {
    let workspace = TestWorkspace::new();
    let output = workspace.path().join("out").join("cleaned.csv");
    let report = workspace.path().join("out").join("report.json");
    claims_prep()
        .args([
            "clean",
            "-i",
            fixture_path("claims_sample.txt").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
            "--chunk-size",
            "4",
        ])
        .assert()
        .success()
        .stdout(contains("quality_filter: totalpremium > 0"))
        .stdout(contains("drop_high_missing_rows"));

    let (headers, rows) = read_output(&output);
    assert!(headers.contains(&"loss_ratio".to_string()));
    assert_eq!(rows.len(), 22);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("read report"))
            .expect("parse report");
    assert_eq!(json["rows_loaded"], 25);
    assert_eq!(json["rows_final"], 22);
}

#[test]
fn clean_with_preview_prints_cleaned_rows() {
    let workspace = TestWorkspace::new();
    let output = workspace.path().join("cleaned.csv");
    claims_prep()
        .args([
            "clean",
            "-i",
            fixture_path("claims_sample.txt").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--delimiter",
            "pipe",
            "--preview",
            "3",
        ])
        .assert()
        .success()
        .stdout(contains("underwrittencoverid"))
        .stdout(contains("145001"));
}

#[test]
fn clean_fails_for_missing_input() {
    let workspace = TestWorkspace::new();
    let output = workspace.path().join("cleaned.csv");
    claims_prep()
        .args([
            "clean",
            "-i",
            workspace.path().join("absent.txt").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stdout(contains("failed"))
        .stderr(contains("did not produce"));
    assert!(!output.exists());
}

fn clean_fixture_with(workspace: &TestWorkspace, extra: &[&str]) -> Vec<Vec<String>> {
    let output = workspace.path().join("cleaned.csv");
    let mut args = vec![
        "clean".to_string(),
        "-i".to_string(),
        fixture_path("claims_sample.txt").display().to_string(),
        "-o".to_string(),
        output.display().to_string(),
    ];
    args.extend(extra.iter().map(|a| a.to_string()));
    claims_prep().args(&args).assert().success();
    read_output(&output).1
}

#[test]
fn clean_reads_yaml_config() {
    let workspace = TestWorkspace::new();
    let config = workspace.write("cleaning.yml", "quality_filters: []\n");
    let rows = clean_fixture_with(&workspace, &["--config", config.to_str().unwrap()]);
    assert_eq!(rows.len(), 24);
}

#[test]
fn missing_threshold_flag_overrides_config() {
    let workspace = TestWorkspace::new();
    let config = workspace.write(
        "cleaning.yml",
        "missing_threshold: 0\nquality_filters: []\n",
    );
    let rows = clean_fixture_with(
        &workspace,
        &[
            "--config",
            config.to_str().unwrap(),
            "--missing-threshold",
            "4",
        ],
    );
    assert_eq!(rows.len(), 25);
    assert!(rows.iter().any(|r| r[0] == "145023"));
}

#[test]
fn retention_and_chunk_flags_change_the_run() {
    let workspace = TestWorkspace::new();
    let rows = clean_fixture_with(
        &workspace,
        &["--retention-threshold", "1", "--chunk-size", "0"],
    );
    assert_eq!(rows.len(), 24, "no quality filter can keep more than every row");
    assert!(rows.iter().any(|r| r[0] == "145024"), "zero premium row kept");
}

#[test]
fn clean_rejects_out_of_range_retention_threshold() {
    let workspace = TestWorkspace::new();
    claims_prep()
        .args([
            "clean",
            "-i",
            fixture_path("claims_sample.txt").to_str().unwrap(),
            "-o",
            workspace.path().join("cleaned.csv").to_str().unwrap(),
            "--retention-threshold",
            "1.5",
        ])
        .assert()
        .failure();
}

#[test]
fn sniff_reports_detected_pipe() {
    claims_prep()
        .args([
            "sniff",
            "-i",
            fixture_path("claims_sample.txt").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("|\t(detected)"));
}

#[test]
fn sniff_falls_back_to_default_for_unreadable_input() {
    let workspace = TestWorkspace::new();
    claims_prep()
        .args([
            "sniff",
            "-i",
            workspace.path().join("absent.txt").to_str().unwrap(),
            "--default-delimiter",
            ";",
        ])
        .assert()
        .success()
        .stdout(contains(";\t(default:"));
}

#[test]
fn init_config_writes_loadable_yaml() {
    let workspace = TestWorkspace::new();
    let path = workspace.path().join("conf").join("cleaning.yml");
    claims_prep()
        .args(["init-config", "-o", path.to_str().unwrap()])
        .assert()
        .success();
    let loaded = CleaningConfig::load(&path).expect("load written config");
    assert_eq!(loaded, CleaningConfig::default());
}

#[test]
fn segments_summarize_cleaned_output_by_province() {
    let workspace = TestWorkspace::new();
    let output = workspace.path().join("cleaned.csv");
    claims_prep()
        .args([
            "clean",
            "-i",
            fixture_path("claims_sample.txt").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    claims_prep()
        .args([
            "segments",
            "-i",
            output.to_str().unwrap(),
            "--by",
            "province",
        ])
        .assert()
        .success()
        .stdout(contains("Gauteng"))
        .stdout(contains("Western Cape"))
        .stdout(contains("claim_frequency"));
}

#[test]
fn segments_reject_unknown_column() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("tiny.csv", "province,totalclaims\nGauteng,0\n");
    claims_prep()
        .args([
            "segments",
            "-i",
            path.to_str().unwrap(),
            "--by",
            "gender",
        ])
        .assert()
        .failure()
        .stderr(contains("gender"));
}
