//! End-to-end fixture tests for viper-pe-rs.
//!
//! Each fixture bundles an evaluation configuration, annotation files and
//! the expected results of the evaluations it exercises.
//!
//! Run with: cargo test fixture

use approx::assert_relative_eq;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use viper_pe_rs::distances::FRAMESPAN;
use viper_pe_rs::{evaluate_all, EvaluationConfig, FileData, Report};

// ============================================================================
// Fixture JSON Schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct Fixture {
    config: EvaluationConfig,
    files: Vec<FileData>,
    expected: Expected,
}

#[derive(Debug, Deserialize)]
struct Expected {
    #[serde(default)]
    object: BTreeMap<String, ExpectedCounts>,
    #[serde(default)]
    tracking: Option<ExpectedTracking>,
    #[serde(default)]
    framewise: Option<ExpectedFramewise>,
}

#[derive(Debug, Deserialize)]
struct ExpectedCounts {
    targets_hit: u64,
    targets_missed: u64,
    candidates_hit: u64,
    candidates_missed: u64,
}

#[derive(Debug, Deserialize)]
struct ExpectedTracking {
    tracks: usize,
    /// `attribute:metric` to the value averaged over tracks.
    values: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct ExpectedFramewise {
    frame_count: u64,
    detected_frames: u64,
    missed_frames: u64,
    false_frames: u64,
    values: Vec<Option<f64>>,
}

// ============================================================================
// Test Helpers
// ============================================================================

fn find_testdata_dir() -> PathBuf {
    let candidates = [
        PathBuf::from("testdata/fixtures"),
        PathBuf::from("../testdata/fixtures"),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/fixtures"),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return candidate.clone();
        }
    }
    panic!("Could not find testdata/fixtures directory");
}

fn load_fixture(scenario: &str) -> Fixture {
    let path = find_testdata_dir().join(format!("fixture_{}.json", scenario));

    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture file {:?}: {}", path, e));

    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture file {:?}: {}", path, e))
}

fn check_object(scenario: &str, fixture: &Fixture) {
    let evaluation = fixture.config.object_evaluation().expect("object evaluation");
    let info = evaluate_all(&evaluation, &fixture.files, &mut Report::new()).expect("object evaluation run");

    for (name, expected) in &fixture.expected.object {
        let actual = info
            .get(name)
            .unwrap_or_else(|| panic!("{}: no counts for {}", scenario, name));
        assert_eq!(actual.targets_hit, expected.targets_hit, "{}: {} targets hit", scenario, name);
        assert_eq!(actual.targets_missed, expected.targets_missed, "{}: {} targets missed", scenario, name);
        assert_eq!(actual.candidates_hit, expected.candidates_hit, "{}: {} candidates hit", scenario, name);
        assert_eq!(
            actual.candidates_missed, expected.candidates_missed,
            "{}: {} candidates missed",
            scenario, name
        );
    }
}

fn check_tracking(scenario: &str, fixture: &Fixture, expected: &ExpectedTracking) {
    let evaluation = fixture.config.tracking_evaluation().expect("tracking evaluation");
    let info = evaluate_all(&evaluation, &fixture.files, &mut Report::new()).expect("tracking evaluation run");

    assert_eq!(info.ids().len(), expected.tracks, "{}: track count", scenario);
    for (key, value) in &expected.values {
        let (attribute, metric) = key.split_once(':').expect("attribute:metric key");
        let attribute = if attribute == "framespan" { FRAMESPAN } else { attribute };
        let actual = info
            .value(attribute, metric)
            .unwrap_or_else(|| panic!("{}: no value for {}", scenario, key));
        assert_relative_eq!(actual, *value, epsilon = 1e-9);
    }
}

fn check_framewise(scenario: &str, fixture: &Fixture, expected: &ExpectedFramewise) {
    let evaluation = fixture.config.framewise_evaluation().expect("framewise evaluation");
    let info = evaluate_all(&evaluation, &fixture.files, &mut Report::new()).expect("framewise evaluation run");

    assert_eq!(info.frame_count(), expected.frame_count, "{}: frame count", scenario);
    assert_eq!(info.detected_frames(), expected.detected_frames, "{}: detected", scenario);
    assert_eq!(info.missed_frames(), expected.missed_frames, "{}: missed", scenario);
    assert_eq!(info.false_frames(), expected.false_frames, "{}: false", scenario);
    for (i, value) in expected.values.iter().enumerate() {
        match (info.value(i), value) {
            (Some(actual), Some(value)) => assert_relative_eq!(actual, *value, epsilon = 1e-9),
            (None, None) => {}
            (actual, value) => panic!("{}: column {} is {:?}, expected {:?}", scenario, i, actual, value),
        }
    }
}

fn run_fixture(scenario: &str) {
    let fixture = load_fixture(scenario);
    fixture.config.validate().expect("fixture config should validate");

    if !fixture.expected.object.is_empty() {
        check_object(scenario, &fixture);
    }
    if let Some(expected) = &fixture.expected.tracking {
        check_tracking(scenario, &fixture, expected);
    }
    if let Some(expected) = &fixture.expected.framewise {
        check_framewise(scenario, &fixture, expected);
    }
}

// ============================================================================
// Fixture Tests
// ============================================================================

#[test]
fn test_fixture_people() {
    run_fixture("people");
}

#[test]
fn test_fixture_faces() {
    run_fixture("faces");
}

#[test]
fn test_fixture_files_round_trip() {
    let fixture = load_fixture("people");
    let json = serde_json::to_string(&fixture.files).unwrap();
    let back: Vec<FileData> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, fixture.files);
}

// ============================================================================
// Raw Report Stream
// ============================================================================

#[test]
fn test_fixture_raw_report_written_to_file() {
    let fixture = load_fixture("people");
    let evaluation = fixture.config.object_evaluation().unwrap();
    let mut report = Report::new();
    evaluate_all(&evaluation, &fixture.files, &mut report).unwrap();

    let file = tempfile::NamedTempFile::new().unwrap();
    report.write_raw(file.as_file()).unwrap();

    let reader = BufReader::new(fs::File::open(file.path()).unwrap());
    let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();

    assert_eq!(lines.len(), 5, "unexpected report:\n{}", lines.join("\n"));
    assert_eq!(lines[0], "#LEVEL 0");
    assert!(lines[1].starts_with("OBJECT PERSON 13 "));
    assert!(lines[1].ends_with(" FALSE 0"));
    assert_eq!(lines[2], "#LEVEL 1C");
    assert!(lines[3].starts_with("OBJECT PERSON 1 ") && lines[3].contains(" DETECT 1 "));
    assert!(lines[4].starts_with("OBJECT PERSON 2 ") && lines[4].contains(" DETECT 1 "));
}
