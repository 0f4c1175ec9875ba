//! Scenario: the `tally` binary validates and compares results files.
//!
//! # Invariants under test
//!
//! 1. A balanced entry validates without violations; stdout is JSON.
//! 2. An unbalanced voters section reports F201 by code.
//! 3. Reconciling equal files is definitive; one changed count is reported
//!    by field path.
//! 4. Bad input exits non-zero with a message on stderr.
//! 5. Blocking codes in a reconcile report cover every section of the
//!    station's plan, including the optional investigation section.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

const CONFIG: &str = r#"
election:
  election_id: 1
  layout:
    extra_investigation: false
    counting_differences: false
  political_groups:
    - number: 1
      name: "Lijst A"
      candidates:
        - { number: 1, name: "Jansen" }
        - { number: 2, name: "De Vries" }
polling_stations:
  - { id: 1, election_id: 1, number: 33, name: "Op Rolletjes" }
  - { id: 2, election_id: 1, number: 34, name: "Testschool", previous_session_id: 4 }
"#;

fn results(total_admitted: u32, first_candidate: u32) -> Value {
    json!({
        "voters_counts": {
            "poll_card_count": 90,
            "proxy_certificate_count": 10,
            "voter_card_count": 0,
            "total_admitted_voters_count": total_admitted
        },
        "votes_counts": {
            "votes_candidates_count": 100,
            "blank_votes_count": 0,
            "invalid_votes_count": 0,
            "total_votes_cast_count": 100
        },
        "differences_counts": {
            "more_ballots_count": 0,
            "fewer_ballots_count": 0,
            "unreturned_ballots_count": 0,
            "too_few_ballots_handed_out_count": 0,
            "too_many_ballots_handed_out_count": 0,
            "other_explanation_count": 0,
            "no_explanation_count": 0
        },
        "political_group_votes": [
            {"number": 1, "total": 100, "candidate_votes": [
                {"number": 1, "votes": first_candidate},
                {"number": 2, "votes": 100 - first_candidate}
            ]}
        ]
    })
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn tally() -> Command {
    let mut cmd = Command::cargo_bin("tally").unwrap();
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn stdout_json(output: std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn balanced_entry_has_no_violations() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "election.yaml", CONFIG);
    let data = write(dir.path(), "entry.json", &results(100, 60).to_string());

    let output = tally()
        .args(["validate", "--config"])
        .arg(&cfg)
        .arg("--results")
        .arg(&data)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(output);
    let sections = json.as_object().unwrap();
    assert_eq!(sections.len(), 4);
    for (section, v) in sections {
        assert!(v["errors"].as_array().unwrap().is_empty(), "{section}");
        assert!(v["warnings"].as_array().unwrap().is_empty(), "{section}");
    }
}

#[test]
fn unbalanced_voters_report_f201() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "election.yaml", CONFIG);
    let data = write(dir.path(), "entry.json", &results(101, 60).to_string());

    let output = tally()
        .args(["validate", "--section", "voters_votes_counts", "--config"])
        .arg(&cfg)
        .arg("--results")
        .arg(&data)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(output);
    assert_eq!(json["voters_votes_counts"]["errors"][0]["code"], "F201");
}

#[test]
fn reconcile_reports_differing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "election.yaml", CONFIG);
    let a = write(dir.path(), "a.json", &results(100, 60).to_string());
    let b = write(dir.path(), "b.json", &results(100, 61).to_string());

    let output = tally()
        .args(["reconcile", "--config"])
        .arg(&cfg)
        .arg("--first")
        .arg(&a)
        .arg("--second")
        .arg(&a)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(output)["definitive"], true);

    let output = tally()
        .args(["reconcile", "--config"])
        .arg(&cfg)
        .arg("--first")
        .arg(&a)
        .arg("--second")
        .arg(&b)
        .output()
        .unwrap();
    let json = stdout_json(output);
    assert_eq!(json["definitive"], false);
    assert_eq!(json["differences"].as_array().unwrap().len(), 2);
}

#[test]
fn previous_session_station_starts_with_investigation() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "election.yaml", CONFIG);

    let output = tally()
        .args(["sections", "--polling-station", "2", "--config"])
        .arg(&cfg)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(output);
    assert_eq!(json[0], "extra_investigation");
    assert_eq!(json.as_array().unwrap().last().unwrap(), "save");
}

#[test]
fn config_hash_is_printed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "election.yaml", CONFIG);

    tally()
        .arg("config-hash")
        .arg(&cfg)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("config_hash="));
}

#[test]
fn unknown_section_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "election.yaml", CONFIG);
    let data = write(dir.path(), "entry.json", &results(100, 60).to_string());

    tally()
        .args(["validate", "--section", "nonsense", "--config"])
        .arg(&cfg)
        .arg("--results")
        .arg(&data)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--section nonsense"));
}

#[test]
fn missing_results_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "election.yaml", CONFIG);

    tally()
        .args(["validate", "--results", "/nonexistent/entry.json", "--config"])
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("read results"));
}

#[test]
fn reconcile_reports_investigation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let with_investigation = CONFIG.replace(
        "extra_investigation: false",
        "extra_investigation: true",
    );
    let cfg = write(dir.path(), "election.yaml", &with_investigation);

    // Only one of the two investigation questions answered: F101.
    let mut half_answered = results(100, 60);
    half_answered["extra_investigation"] = json!({
        "extra_investigation_other_reason": {"yes": true, "no": false},
        "ballots_recounted_extra_investigation": {"yes": false, "no": false}
    });
    let a = write(dir.path(), "a.json", &half_answered.to_string());
    let b = write(dir.path(), "b.json", &results(100, 60).to_string());

    let output = tally()
        .args(["reconcile", "--polling-station", "1", "--config"])
        .arg(&cfg)
        .arg("--first")
        .arg(&a)
        .arg("--second")
        .arg(&b)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(output);
    assert_eq!(json["first_errors"], json!(["F101"]));
    assert_eq!(json["second_errors"], json!([]));
}
