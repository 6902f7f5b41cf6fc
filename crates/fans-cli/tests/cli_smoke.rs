//! End-to-end runs of the `fans-tutor` binary against a scratch store.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tutor(root: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("fans-tutor");
    cmd.current_dir(root)
        .env("FANS_LOG", "warn")
        .arg("--store")
        .arg(root.join("records.sqlite"))
        .arg("--work-dir")
        .arg(root.join("jobs"));
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().expect("tempdir");
    tutor(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("setup"))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("results"));
}

#[test]
fn setup_writes_yaml_and_prints_follow_up() {
    let dir = TempDir::new().expect("tempdir");
    tutor(dir.path())
        .args(["setup", "--out"])
        .arg(dir.path())
        .args(["computer", "--mpiprocs-per-machine", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("verdi computer setup --config"))
        .stdout(predicate::str::contains(
            "verdi computer configure core.local localhost",
        ));
    let yaml = fs::read_to_string(dir.path().join("setup-computer.yaml")).expect("yaml");
    assert!(yaml.contains("mpiprocs_per_machine: 2"));
    assert!(yaml.contains("work_dir: /tmp/aiida_run"));
}

#[test]
fn resolve_is_idempotent_across_invocations() {
    let dir = TempDir::new().expect("tempdir");
    tutor(dir.path())
        .args(["resolve", "--label", "n_it", "--value", "100"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("created integer"));
    tutor(dir.path())
        .args(["resolve", "--label", "n_it", "--value", "100"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("reused integer"));
    tutor(dir.path())
        .args(["resolve", "--label", "n_it", "--value", "200"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("created integer"));
}

#[test]
fn real_kind_widens_integer_literals() {
    let dir = TempDir::new().expect("tempdir");
    tutor(dir.path())
        .args(["resolve", "--label", "tolerance", "--value", "1", "--kind", "real"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("created real"));
    tutor(dir.path())
        .args(["resolve", "--label", "tolerance", "--value", "1.0"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("reused real"));
    tutor(dir.path())
        .args(["resolve", "--label", "method", "--value", "cg", "--kind", "integer"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("kind_mismatch"));
}

#[test]
fn null_value_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    tutor(dir.path())
        .args(["resolve", "--label", "macroscale_loading", "--value", "~"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported"));
}

#[test]
fn dry_run_study_records_jobs() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("sphere32.h5"), b"voxels").expect("microstructure");
    fs::write(
        dir.path().join("plan.yaml"),
        "label: sphere\ncode: FANS\ngroup: tutorial\nfiles:\n  microstructure: sphere32.h5\nfixed:\n  matmodel: LinearElasticIsotropic\nvary:\n  - - method: cg\n    - method: fp\n",
    )
    .expect("plan");

    tutor(dir.path()).args(["register", "computer"]).assert().success();
    tutor(dir.path())
        .args(["register", "code"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registered code FANS@localhost"));
    tutor(dir.path())
        .args(["submit", "--plan", "plan.yaml", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("submitted 2 jobs"));
    tutor(dir.path())
        .args(["jobs", "--group", "tutorial", "--status", "created"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sphere-000"))
        .stdout(predicate::str::contains("sphere-001"));
    tutor(dir.path())
        .args(["group", "list", "tutorial"])
        .assert()
        .success()
        .stdout(predicate::str::contains("job\t"));

    let export = dir.path().join("store.json");
    tutor(dir.path())
        .args(["export", "--out"])
        .arg(&export)
        .assert()
        .success();
    let snapshot: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&export).expect("export")).expect("json");
    assert_eq!(snapshot["jobs"].as_array().map(Vec::len), Some(2));
}
