//! Job execution seam.
//!
//! The [`Engine`] trait is the only place where submitted configurations leave
//! this crate. [`LocalEngine`] launches the registered executable on the local
//! machine and blocks until it exits.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use fans_core::errors::{ErrorInfo, FansError};
use fans_core::stable_hash_string;
use fans_store::{JobRecord, JobStatus, NewJob, NodeRecord, Session};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::input::write_input;
use crate::setup::{CodeSetup, ComputerSetup};

pub const LOG_FILE: &str = "fans.log";
pub const RESULTS_FILE: &str = "results.h5";

/// One fully materialized job submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRequest {
    pub label: String,
    /// Label of a registered code.
    pub code: String,
    /// Port name to stored input record.
    pub inputs: BTreeMap<String, NodeRecord>,
}

impl JobRequest {
    pub fn input_ids(&self) -> BTreeMap<String, i64> {
        self.inputs
            .iter()
            .map(|(port, node)| (port.clone(), node.id))
            .collect()
    }
}

pub trait Engine {
    /// Submits one job and blocks until the engine has accepted it.
    ///
    /// Implementations persist a job record before doing any work so that a
    /// failed launch still leaves a trace in the store.
    fn submit(
        &mut self,
        session: &mut Session,
        request: &JobRequest,
    ) -> Result<JobRecord, FansError>;
}

/// Runs jobs as child processes of the current process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEngine {
    /// Write inputs and record the job without launching the executable.
    pub dry_run: bool,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self { dry_run: false }
    }

    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn engine_error(code: &str, err: impl ToString, path: &Path) -> FansError {
    FansError::Engine(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

fn slug(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Fresh directory under the session work root, named after the label and inputs.
fn allocate_job_dir(root: &Path, request: &JobRequest) -> Result<PathBuf, FansError> {
    let digest = stable_hash_string(&(&request.label, &request.code, request.input_ids()))?;
    let stem = format!("{}-{}", slug(&request.label), &digest[..12]);
    let mut candidate = root.join(&stem);
    let mut attempt = 1;
    while candidate.exists() {
        attempt += 1;
        candidate = root.join(format!("{stem}-{attempt}"));
    }
    fs::create_dir_all(&candidate)
        .map_err(|err| engine_error("fans_exp.job_dir", err, &candidate))?;
    Ok(candidate)
}

fn decode<T: DeserializeOwned>(value: &serde_json::Value, what: &str) -> Result<T, FansError> {
    serde_json::from_value(value.clone()).map_err(|err| {
        FansError::Config(
            ErrorInfo::new("fans_exp.registration_decode", err.to_string())
                .with_context("record", what),
        )
    })
}

fn launcher(code: &CodeSetup, computer: &ComputerSetup, job_dir: &Path) -> Vec<String> {
    let mut argv = Vec::new();
    if code.with_mpi {
        argv.extend(computer.mpirun_argv(computer.mpiprocs_per_machine));
    }
    argv.push(code.filepath_executable.clone());
    argv.push(job_dir.join(crate::input::INPUT_FILE).display().to_string());
    argv.push(job_dir.join(RESULTS_FILE).display().to_string());
    argv
}

/// Runs `argv` in `job_dir` with stdout and stderr captured into `log_path`.
fn launch(argv: &[String], job_dir: &Path, log_path: &Path) -> Result<ExitStatus, FansError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| engine_error("fans_exp.launch", "empty launcher command", job_dir))?;
    let log = File::create(log_path)
        .map_err(|err| engine_error("fans_exp.log_create", err, log_path))?;
    let log_err = log
        .try_clone()
        .map_err(|err| engine_error("fans_exp.log_create", err, log_path))?;
    Command::new(program)
        .args(args)
        .current_dir(job_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .status()
        .map_err(|err| {
            FansError::Engine(
                ErrorInfo::new("fans_exp.launch", err.to_string())
                    .with_context("program", program.as_str())
                    .with_hint("check filepath_executable of the registered code"),
            )
        })
}

impl Engine for LocalEngine {
    fn submit(
        &mut self,
        session: &mut Session,
        request: &JobRequest,
    ) -> Result<JobRecord, FansError> {
        let code_record = session.load_code(&request.code)?;
        let computer_record = session.load_computer(&code_record.computer)?;
        let code: CodeSetup = decode(&code_record.config, "code")?;
        let computer: ComputerSetup = decode(&computer_record.config, "computer")?;

        let job_dir = allocate_job_dir(session.work_dir(), request)?;
        write_input(&request.inputs, &job_dir)?;
        let job = session.insert_job(&NewJob {
            label: request.label.clone(),
            code: request.code.clone(),
            inputs: request.input_ids(),
            work_dir: job_dir.display().to_string(),
        })?;
        info!(id = job.id, label = %job.label, dir = %job_dir.display(), "job submitted");

        if self.dry_run {
            return session.finish_job(job.id, JobStatus::Created, None, None, None);
        }

        let argv = launcher(&code, &computer, &job_dir);
        let log_path = job_dir.join(LOG_FILE);
        let status = match launch(&argv, &job_dir, &log_path) {
            Ok(status) => status,
            Err(err) => {
                warn!(id = job.id, error = %err, "launch failed");
                let log_text = log_path.exists().then(|| log_path.display().to_string());
                session.finish_job(job.id, JobStatus::Failed, None, log_text.as_deref(), None)?;
                return Err(match err {
                    FansError::Engine(info) => {
                        FansError::Engine(info.with_context("job", job.id.to_string()))
                    }
                    other => other,
                });
            }
        };
        let log_text = log_path.display().to_string();

        let results = job_dir.join(RESULTS_FILE);
        let results_text = results.exists().then(|| results.display().to_string());
        let outcome = if status.success() {
            JobStatus::Finished
        } else {
            JobStatus::Failed
        };
        info!(id = job.id, status = %outcome, exit = ?status.code(), "job completed");
        session.finish_job(
            job.id,
            outcome,
            status.code(),
            Some(&log_text),
            results_text.as_deref(),
        )
    }
}
