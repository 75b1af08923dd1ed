use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use serde_json::Value;

const ONBOARDING_UNIT: &str = include_str!("../../unit-spec/tests/fixtures/onboarding_unit.json");
const SUMMARY_UNIT: &str = include_str!("../../unit-spec/tests/fixtures/summary_unit.json");

fn cli() -> Command {
    Command::cargo_bin("unit-progress").expect("binary built")
}

#[test]
fn validate_accepts_fixture() {
    let temp = TempDir::new().expect("tempdir");
    let unit = temp.child("unit.json");
    unit.write_str(ONBOARDING_UNIT).expect("write unit");

    let output = cli()
        .arg("validate")
        .arg("--unit")
        .arg(unit.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("Validation result: valid"));
}

#[test]
fn validate_reports_violations_and_fails() {
    let temp = TempDir::new().expect("tempdir");
    let unit = temp.child("unit.json");
    unit.write_str(
        r#"{
            "version": "1.0.0",
            "activity": { "id": "u" },
            "containers": [
                { "id": "bad id", "name": {}, "blocks": [{ "type": "html", "url": "a.html" }], "complete": true }
            ]
        }"#,
    )
    .expect("write unit");

    let assert = cli()
        .arg("validate")
        .arg("--unit")
        .arg(unit.path())
        .assert()
        .failure();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("invalid_container_id"));
}

#[test]
fn nodes_lists_structural_ids() {
    let temp = TempDir::new().expect("tempdir");
    let unit = temp.child("unit.json");
    unit.write_str(ONBOARDING_UNIT).expect("write unit");

    let assert = cli().arg("nodes").arg("--unit").arg(unit.path()).assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("containers/intro/blocks/2/tabs/1\ttab"));
    assert!(stdout.contains("containers/intro/blocks/0\tblock:video\thttps://example.com/units/onboarding/welcome-video"));
}

#[test]
fn replay_completes_summary_and_saves_session() {
    let temp = TempDir::new().expect("tempdir");
    let unit = temp.child("unit.json");
    unit.write_str(SUMMARY_UNIT).expect("write unit");
    let events = temp.child("events.json");
    events
        .write_str(
            r#"[
                { "target": "containers/summary", "at": 1, "kind": "visible" },
                { "target": "containers/summary/blocks/0", "at": 2, "kind": "visible" },
                { "target": "containers/summary/blocks/0", "at": 3, "kind": "played-to-end" }
            ]"#,
        )
        .expect("write events");
    let session = temp.child("session.cbor");

    let assert = cli()
        .arg("replay")
        .arg("--unit")
        .arg(unit.path())
        .arg("--events")
        .arg(events.path())
        .arg("--save")
        .arg(session.path())
        .arg("--format")
        .arg("json")
        .assert()
        .success();
    let output: Value = serde_json::from_slice(&assert.get_output().stdout).expect("json output");
    assert_eq!(output["status"], "completed");
    assert_eq!(output["rejected"], 1);
    assert!(session.path().exists());
}

#[test]
fn replay_resumes_stored_session() {
    let temp = TempDir::new().expect("tempdir");
    let unit = temp.child("unit.json");
    unit.write_str(SUMMARY_UNIT).expect("write unit");
    let first = temp.child("first.json");
    first
        .write_str(r#"[{ "target": "containers/summary", "at": 1, "kind": "visible" }]"#)
        .expect("write events");
    let second = temp.child("second.json");
    second
        .write_str(r#"[{ "target": "containers/summary/blocks/0", "at": 2, "kind": "visible" }]"#)
        .expect("write events");
    let session = temp.child("session.cbor");

    cli()
        .args(["replay", "--unit"])
        .arg(unit.path())
        .arg("--events")
        .arg(first.path())
        .arg("--save")
        .arg(session.path())
        .assert()
        .success();

    let assert = cli()
        .args(["replay", "--unit"])
        .arg(unit.path())
        .arg("--events")
        .arg(second.path())
        .arg("--resume")
        .arg(session.path())
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("Unit status: completed"));
}

#[test]
fn schema_prints_json() {
    let assert = cli().arg("schema").assert().success();
    let schema: Value = serde_json::from_slice(&assert.get_output().stdout).expect("schema json");
    assert!(schema.get("properties").is_some());
}
