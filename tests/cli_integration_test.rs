mod common;

use assert_cmd::Command;
use common::{add_entity, add_score, company, uniform_score};
use esgmap::core::{Entity, EntityKind, AGGREGATES};
use esgmap::store::{DocumentStore, Filter, MemoryStore};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

fn esgmap(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("esgmap").unwrap();
    cmd.current_dir(dir);
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn bundle(provider: &str, combined: f64) -> Value {
    json!({
        "entity_id": "acme",
        "provider": provider,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "confidence": 90,
        "esg_scores": {
            "environmental": combined,
            "social": combined,
            "governance": combined,
            "combined": combined
        }
    })
}

#[test]
fn test_init_writes_config_once() {
    let dir = tempfile::tempdir().unwrap();

    esgmap(dir.path()).arg("init").assert().success();
    let written = fs::read_to_string(dir.path().join(".esgmap.toml")).unwrap();
    assert!(written.contains("[propagation]"));

    esgmap(dir.path()).arg("init").assert().failure();
    esgmap(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn test_validate_exit_code_follows_quality() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.json");
    fs::write(&good, bundle("alpha", 75.0).to_string()).unwrap();

    let output = esgmap(dir.path())
        .args(["validate", "good.json", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let reports = stdout_json(&output);
    assert_eq!(reports[0]["level"], "Excellent");
    assert_eq!(reports[0]["is_valid"], true);

    let mut mock = bundle("alpha", 75.0);
    mock["is_mock"] = json!(true);
    mock["error"] = json!("upstream timeout");
    fs::write(dir.path().join("mock.json"), json!([mock]).to_string()).unwrap();
    esgmap(dir.path())
        .args(["validate", "mock.json", "-f", "json"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_reconcile_reports_consensus() {
    let dir = tempfile::tempdir().unwrap();
    let bundles = json!([bundle("alpha", 70.0), bundle("beta", 90.0)]);
    fs::write(dir.path().join("bundles.json"), bundles.to_string()).unwrap();

    let output = esgmap(dir.path())
        .args(["reconcile", "bundles.json", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["cross_validation_possible"], true);
    assert_eq!(report["consensus_scores"]["combined"], 80.0);
    assert_eq!(report["discrepancies"], json!([]));
}

#[test]
fn test_propagate_updates_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("store.json");

    let store = MemoryStore::new();
    add_entity(
        &store,
        Entity::new("fund", EntityKind::Fund).with_children(["c-high", "c-low"]),
    );
    add_entity(&store, company("c-high", "energy").with_parent("fund"));
    add_entity(&store, company("c-low", "retail").with_parent("fund"));
    add_score(&store, &uniform_score("c-high", 80.0, 90.0));
    add_score(&store, &uniform_score("c-low", 60.0, 30.0));
    store.save(&snapshot).unwrap();

    let dry = esgmap(dir.path())
        .args(["propagate", "--store", "store.json", "--dry-run", "-f", "json"])
        .output()
        .unwrap();
    assert!(dry.status.success());
    assert_eq!(stdout_json(&dry)["states"]["fund"], "propagated");
    let untouched = MemoryStore::load(&snapshot).unwrap();
    assert_eq!(untouched.len(AGGREGATES), 0);

    esgmap(dir.path())
        .args(["propagate", "--store", "store.json", "--root", "fund", "--no-parallel"])
        .assert()
        .success();

    let updated = MemoryStore::load(&snapshot).unwrap();
    let fund = updated
        .find_one(AGGREGATES, &Filter::new().eq("entity_id", "fund"))
        .unwrap()
        .unwrap();
    let composite = fund["composite"]["score"].as_f64().unwrap();
    assert!((composite - 75.0).abs() < 1e-9);
}

#[test]
fn test_score_unknown_entity_fails() {
    let dir = tempfile::tempdir().unwrap();
    esgmap(dir.path())
        .args(["score", "--store", "missing.json", "ghost"])
        .assert()
        .failure();
}
