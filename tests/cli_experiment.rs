//! `beat_cli` end-to-end tests

use std::fs;
use std::process::Command;

use beat_analysis::experiment::DatasetLayout;
use beat_analysis::testing::signals::{click_track, sine_wave, write_wav};
use serde_json::Value;

fn cli() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_beat_cli"));
    command.env("RUST_LOG", "warn");
    command
}

#[test]
fn experiment_without_folders_exits_with_layout_help() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("beats");

    let output = cli()
        .args(["experiment", missing.to_str().unwrap()])
        .output()
        .expect("run experiment");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("├── train/"), "stderr was: {stderr}");
    assert!(stderr.contains("good/"));
}

#[test]
fn experiment_with_partial_layout_exits_with_status_one() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("train/good")).unwrap();
    fs::create_dir_all(dir.path().join("train/bad")).unwrap();

    let output = cli()
        .args(["experiment", dir.path().to_str().unwrap()])
        .output()
        .expect("run experiment");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn experiment_on_empty_layout_reports_counts_and_fails() {
    let dir = tempfile::tempdir().unwrap();
    for relative in DatasetLayout::REQUIRED {
        fs::create_dir_all(dir.path().join(relative)).unwrap();
    }

    let output = cli()
        .args(["experiment", dir.path().to_str().unwrap()])
        .output()
        .expect("run experiment");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Training - Good: 0, Bad: 0"), "stdout was: {stdout}");
    assert!(stdout.contains("Warning: You need both good and bad beats in training!"));
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn analyze_prints_result_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, &sine_wave(440.0, 22050, 22050 * 3, 0.5), 22050).unwrap();

    let output = cli()
        .args(["analyze", path.to_str().unwrap()])
        .output()
        .expect("run analyze");
    assert!(output.status.success(), "analyze exited with {:?}", output.status.code());

    let json: Value = serde_json::from_slice(&output.stdout).expect("JSON on stdout");
    assert_eq!(json["analysis_method"], "dsp");
    assert_eq!(json["sample_rate"], 22050);
    assert!(json["key"].as_str().unwrap_or("").starts_with('A'));
}

#[test]
fn extract_writes_json_and_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loop.wav");
    write_wav(&path, &click_track(120.0, 22050, 22050 * 2, 0.7), 22050).unwrap();
    let out_dir = dir.path().join("out");

    let output = cli()
        .args([
            "extract",
            path.to_str().unwrap(),
            "--output-dir",
            out_dir.to_str().unwrap(),
        ])
        .output()
        .expect("run extract");
    assert!(output.status.success(), "extract exited with {:?}", output.status.code());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Total Features: 366"));
    assert!(stdout.contains("MFCC Features: 180 features"), "stdout was: {stdout}");
    assert!(out_dir.join("extracted_features_loop.json").exists());
    assert!(out_dir.join("extracted_features_loop.csv").exists());
}

#[test]
fn fallback_config_refuses_extraction_but_still_analyzes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, &sine_wave(440.0, 22050, 22050, 0.5), 22050).unwrap();
    let config = dir.path().join("fallback.json");
    fs::write(&config, r#"{ "server": { "force_fallback": true } }"#).unwrap();

    let output = cli()
        .args(["--config", config.to_str().unwrap(), "extract", path.to_str().unwrap()])
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .output()
        .expect("run extract");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Audio decoder is not available"), "stderr was: {stderr}");
    assert!(!dir.path().join("out").exists());

    let output = cli()
        .args(["--config", config.to_str().unwrap(), "analyze", path.to_str().unwrap()])
        .output()
        .expect("run analyze");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("JSON on stdout");
    assert_eq!(json["analysis_method"], "fallback");
    assert_eq!(json["key"], "C Major");
}
