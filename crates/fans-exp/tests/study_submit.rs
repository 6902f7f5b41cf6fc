use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use fans_core::{FansError, TaggedValue};
use fans_exp::{
    collect_results, materialize, register_code, register_computer, run_study, CodeSetup,
    ComputerSetup, Engine, JobRequest, LocalEngine, StudyPlan, INPUT_FILE,
};
use fans_store::{
    GroupMember, JobFilter, JobRecord, JobStatus, NewJob, NodeFilter, Session,
};
use tempfile::tempdir;

const PLAN: &str = "\
label: sphere
code: FANS
group: tutorial
files:
  microstructure: sphere32.h5
fixed:
  problem_type: mechanical
  matmodel: LinearElasticIsotropic
  n_it: 100
  error_parameters:
    measure: Linfinity
    type: absolute
    tolerance: 1.0e-10
vary:
  - - method: cg
    - method: fp
  - - n_it: 100
    - n_it: 200
";

fn registered_session(root: &Path) -> Session {
    let mut session = Session::in_memory(root.join("jobs")).expect("session");
    register_computer(&mut session, &ComputerSetup::default()).expect("computer");
    register_code(
        &mut session,
        &CodeSetup {
            with_mpi: false,
            ..CodeSetup::default()
        },
    )
    .expect("code");
    session
}

fn write_plan(root: &Path) -> StudyPlan {
    fs::write(root.join("sphere32.h5"), b"voxels").expect("microstructure");
    let path = root.join("plan.yaml");
    fs::write(&path, PLAN).expect("plan");
    StudyPlan::load(&path).expect("load plan")
}

#[test]
fn plan_file_paths_are_relative_to_the_plan() {
    let dir = tempdir().expect("tempdir");
    let plan = write_plan(dir.path());
    assert_eq!(plan.files["microstructure"], dir.path().join("sphere32.h5"));
    assert_eq!(plan.vary.len(), 2);
}

#[test]
fn materialize_resolves_each_distinct_value_once() {
    let dir = tempdir().expect("tempdir");
    let mut session = registered_session(dir.path());
    let plan = write_plan(dir.path());
    let study = materialize(&mut session, &plan).expect("materialize");
    assert_eq!(study.space.len(), 4);
    // n_it = 100 appears as a fixed value and as a varied one.
    assert_eq!(study.reused_nodes, 1);
    let n_it = session.find_nodes(&NodeFilter::label("n_it")).expect("nodes");
    assert_eq!(n_it.len(), 2);

    let again = materialize(&mut session, &plan).expect("again");
    assert_eq!(again.created_nodes, 0);
    assert_eq!(again.space, study.space);
}

#[test]
fn dry_run_records_created_jobs_in_group() {
    let dir = tempdir().expect("tempdir");
    let mut session = registered_session(dir.path());
    let plan = write_plan(dir.path());
    let mut engine = LocalEngine::dry_run();
    let report = run_study(&mut session, &mut engine, &plan).expect("study");

    assert_eq!(report.jobs.len(), 4);
    assert_eq!(report.group.as_deref(), Some("tutorial"));
    let labels: Vec<&str> = report.jobs.iter().map(|j| j.label.as_str()).collect();
    assert_eq!(labels, vec!["sphere-000", "sphere-001", "sphere-002", "sphere-003"]);
    for job in &report.jobs {
        assert_eq!(job.status, JobStatus::Created);
        let input = fs::read_to_string(Path::new(&job.work_dir).join(INPUT_FILE)).expect("input");
        let input: serde_json::Value = serde_json::from_str(&input).expect("json");
        assert_eq!(input["matmodel"], "LinearElasticIsotropic");
        assert!(input["microstructure"].as_str().expect("path").ends_with("sphere32.h5"));
    }

    let first: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(Path::new(&report.jobs[0].work_dir).join(INPUT_FILE)).expect("input"),
    )
    .expect("json");
    assert_eq!(first["method"], "cg");
    assert_eq!(first["n_it"], 100);

    let group = session.load_group("tutorial").expect("group");
    let members = session.group_members(group.id).expect("members");
    assert_eq!(members.len(), 4);
    assert!(members.iter().all(|m| matches!(m, GroupMember::Job(_))));
    let grouped = session
        .find_jobs(&JobFilter {
            group: Some("tutorial".to_string()),
            ..JobFilter::default()
        })
        .expect("jobs");
    assert_eq!(grouped.len(), 4);
}

#[test]
fn rerunning_a_study_reuses_every_input() {
    let dir = tempdir().expect("tempdir");
    let mut session = registered_session(dir.path());
    let plan = write_plan(dir.path());
    let mut engine = LocalEngine::dry_run();
    let first = run_study(&mut session, &mut engine, &plan).expect("first");
    let second = run_study(&mut session, &mut engine, &plan).expect("second");
    assert_eq!(first.plan_hash, second.plan_hash);
    assert_eq!(second.created_nodes, 0);
    assert_ne!(first.jobs[0].work_dir, second.jobs[0].work_dir);
    assert_eq!(first.jobs[0].inputs, second.jobs[0].inputs);
}

#[test]
fn plans_naming_different_files_get_their_own_inputs() {
    let dir = tempdir().expect("tempdir");
    let mut session = registered_session(dir.path());
    let small = write_plan(dir.path());
    fs::write(dir.path().join("sphere64.h5"), b"more voxels").expect("microstructure");
    let large_path = dir.path().join("large.yaml");
    fs::write(&large_path, PLAN.replace("sphere32.h5", "sphere64.h5")).expect("plan");
    let large = StudyPlan::load(&large_path).expect("load plan");

    let mut engine = LocalEngine::dry_run();
    run_study(&mut session, &mut engine, &small).expect("small study");
    let report = run_study(&mut session, &mut engine, &large).expect("large study");
    assert_eq!(report.created_nodes, 1);
    for job in &report.jobs {
        let input = fs::read_to_string(Path::new(&job.work_dir).join(INPUT_FILE)).expect("input");
        let input: serde_json::Value = serde_json::from_str(&input).expect("json");
        assert!(input["microstructure"].as_str().expect("path").ends_with("sphere64.h5"));
    }
    let files = session
        .find_nodes(&NodeFilter::label("microstructure"))
        .expect("nodes");
    assert_eq!(files.len(), 2);
}

struct RecordingEngine {
    requests: Vec<JobRequest>,
}

impl Engine for RecordingEngine {
    fn submit(
        &mut self,
        session: &mut Session,
        request: &JobRequest,
    ) -> Result<JobRecord, FansError> {
        self.requests.push(request.clone());
        let job = session.insert_job(&NewJob {
            label: request.label.clone(),
            code: request.code.clone(),
            inputs: request.input_ids(),
            work_dir: String::new(),
        })?;
        session.finish_job(job.id, JobStatus::Created, None, None, None)
    }
}

#[test]
fn varied_groups_override_fixed_ports() {
    let dir = tempdir().expect("tempdir");
    let mut session = registered_session(dir.path());
    let plan = write_plan(dir.path());
    let mut engine = RecordingEngine {
        requests: Vec::new(),
    };
    run_study(&mut session, &mut engine, &plan).expect("study");

    let n_its: Vec<TaggedValue> = engine
        .requests
        .iter()
        .map(|r| {
            r.inputs["n_it"]
                .payload
                .as_value()
                .cloned()
                .expect("value node")
        })
        .collect();
    assert_eq!(
        n_its,
        vec![
            TaggedValue::from(100_i64),
            TaggedValue::from(200_i64),
            TaggedValue::from(100_i64),
            TaggedValue::from(200_i64),
        ]
    );
    assert_eq!(engine.requests[0].inputs.len(), 6);
}

#[test]
fn unsupported_plan_value_stops_before_any_submission() {
    let dir = tempdir().expect("tempdir");
    let mut session = registered_session(dir.path());
    let mut plan = write_plan(dir.path());
    plan.fixed
        .insert("macroscale_loading".to_string(), serde_yaml::Value::Null);
    let mut engine = RecordingEngine {
        requests: Vec::new(),
    };
    let err = run_study(&mut session, &mut engine, &plan).expect_err("null rejected");
    assert!(matches!(err, FansError::UnsupportedKind(_)));
    assert_eq!(err.info().context.get("port").map(String::as_str), Some("macroscale_loading"));
    assert!(engine.requests.is_empty());
}

#[test]
fn unknown_code_fails_submission() {
    let dir = tempdir().expect("tempdir");
    let mut session = Session::in_memory(dir.path().join("jobs")).expect("session");
    let plan = write_plan(dir.path());
    let mut engine = LocalEngine::dry_run();
    let err = run_study(&mut session, &mut engine, &plan).expect_err("no code");
    assert!(matches!(err, FansError::NotFound(_)));
}

#[cfg(unix)]
#[test]
fn local_engine_captures_log_and_results() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().expect("tempdir");
    let script = dir.path().join("fake-fans.sh");
    fs::write(
        &script,
        "#!/bin/sh\n\
         echo \"# Effective Stress .. (1.0, 2.0)\"\n\
         echo \"# Effective Strain .. (0.01, 0.0)\"\n\
         touch \"$2\"\n",
    )
    .expect("script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

    let mut session = Session::in_memory(dir.path().join("jobs")).expect("session");
    register_computer(&mut session, &ComputerSetup::default()).expect("computer");
    register_code(
        &mut session,
        &CodeSetup {
            with_mpi: false,
            filepath_executable: script.display().to_string(),
            ..CodeSetup::default()
        },
    )
    .expect("code");
    let method = session
        .resolve_value("method", &TaggedValue::from("cg"))
        .expect("method")
        .into_record();
    let request = JobRequest {
        label: "single".to_string(),
        code: "FANS".to_string(),
        inputs: BTreeMap::from([("method".to_string(), method)]),
    };

    let job = LocalEngine::new().submit(&mut session, &request).expect("submit");
    assert_eq!(job.status, JobStatus::Finished);
    assert_eq!(job.exit_code, Some(0));

    let results = collect_results(&session, job.id).expect("results");
    assert!(results.results_file.is_some());
    let log = results.log.expect("log");
    assert_eq!(log.effective_stress, vec![".. (1.0, 2.0)".to_string()]);
    assert_eq!(log.effective_strain, vec![".. (0.01, 0.0)".to_string()]);
}

#[test]
fn missing_executable_marks_job_failed() {
    let dir = tempdir().expect("tempdir");
    let mut session = Session::in_memory(dir.path().join("jobs")).expect("session");
    register_computer(&mut session, &ComputerSetup::default()).expect("computer");
    register_code(
        &mut session,
        &CodeSetup {
            with_mpi: false,
            filepath_executable: dir.path().join("absent").display().to_string(),
            ..CodeSetup::default()
        },
    )
    .expect("code");
    let request = JobRequest {
        label: "broken".to_string(),
        code: "FANS".to_string(),
        inputs: BTreeMap::new(),
    };
    let err = LocalEngine::new()
        .submit(&mut session, &request)
        .expect_err("launch fails");
    assert!(matches!(err, FansError::Engine(_)));
    assert!(err.info().context.contains_key("job"));
    let jobs = session
        .find_jobs(&JobFilter {
            status: Some(JobStatus::Failed),
            ..JobFilter::default()
        })
        .expect("jobs");
    assert_eq!(jobs.len(), 1);
    let pending = session
        .find_jobs(&JobFilter {
            status: Some(JobStatus::Submitted),
            ..JobFilter::default()
        })
        .expect("jobs");
    assert!(pending.is_empty());
}
