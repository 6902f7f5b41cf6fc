use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use fans_core::errors::{ErrorInfo, FansError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::schema::{now, store_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted by the engine, not yet terminal.
    Submitted,
    /// Inputs written but the executable was never launched (dry run).
    Created,
    /// Executable exited with status zero.
    Finished,
    /// Executable exited non-zero or was killed.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Created => "created",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Submitted)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = FansError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(JobStatus::Submitted),
            "created" => Ok(JobStatus::Created),
            "finished" => Ok(JobStatus::Finished),
            "failed" => Ok(JobStatus::Failed),
            other => Err(FansError::Config(
                ErrorInfo::new("fans_store.job_status", "unknown job status")
                    .with_context("status", other)
                    .with_hint("use submitted, created, finished or failed"),
            )),
        }
    }
}

/// Everything needed to insert a job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub label: String,
    pub code: String,
    /// Port name to node identifier.
    pub inputs: BTreeMap<String, i64>,
    pub work_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub label: String,
    pub code: String,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub inputs: BTreeMap<String, i64>,
    pub work_dir: String,
    pub results_path: Option<String>,
    pub log_path: Option<String>,
    pub submitted_at: String,
    pub finished_at: Option<String>,
}

pub(crate) const JOB_COLUMNS: &str = "jobs.id, jobs.label, jobs.code, jobs.status, jobs.exit_code, jobs.inputs, jobs.work_dir, jobs.results_path, jobs.log_path, jobs.submitted_at, jobs.finished_at";

pub(crate) fn read_job_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let status: String = row.get(3)?;
    let inputs: String = row.get(5)?;
    Ok(JobRecord {
        id: row.get(0)?,
        label: row.get(1)?,
        code: row.get(2)?,
        status: JobStatus::from_str(&status).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(err))
        })?,
        exit_code: row.get(4)?,
        inputs: serde_json::from_str(&inputs).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(err))
        })?,
        work_dir: row.get(6)?,
        results_path: row.get(7)?,
        log_path: row.get(8)?,
        submitted_at: row.get(9)?,
        finished_at: row.get(10)?,
    })
}

pub fn insert_job(conn: &Connection, job: &NewJob) -> Result<JobRecord, FansError> {
    let submitted_at = now();
    let inputs = fans_core::to_canonical_json_string(&job.inputs)?;
    conn.execute(
        "INSERT INTO jobs(label, code, status, inputs, work_dir, submitted_at) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            job.label,
            job.code,
            JobStatus::Submitted.as_str(),
            inputs,
            job.work_dir,
            submitted_at
        ],
    )
    .map_err(|err| store_error("fans_store.insert_job", err))?;
    Ok(JobRecord {
        id: conn.last_insert_rowid(),
        label: job.label.clone(),
        code: job.code.clone(),
        status: JobStatus::Submitted,
        exit_code: None,
        inputs: job.inputs.clone(),
        work_dir: job.work_dir.clone(),
        results_path: None,
        log_path: None,
        submitted_at,
        finished_at: None,
    })
}

/// Moves a submitted job to a terminal status. Terminal jobs are never updated again.
pub fn finish_job(
    conn: &Connection,
    id: i64,
    status: JobStatus,
    exit_code: Option<i32>,
    log_path: Option<&str>,
    results_path: Option<&str>,
) -> Result<JobRecord, FansError> {
    if !status.is_terminal() {
        return Err(FansError::Config(
            ErrorInfo::new("fans_store.job_transition", "finish requires a terminal status")
                .with_context("status", status.as_str()),
        ));
    }
    let changed = conn
        .execute(
            "UPDATE jobs SET status = ?, exit_code = ?, log_path = ?, results_path = ?, finished_at = ?
             WHERE id = ? AND status = ?",
            params![
                status.as_str(),
                exit_code,
                log_path,
                results_path,
                now(),
                id,
                JobStatus::Submitted.as_str()
            ],
        )
        .map_err(|err| store_error("fans_store.update_job", err))?;
    if changed == 0 {
        let current = load_job(conn, id)?;
        return Err(FansError::Store(
            ErrorInfo::new("fans_store.job_transition", "job is already terminal")
                .with_context("id", id.to_string())
                .with_context("status", current.status.as_str()),
        ));
    }
    load_job(conn, id)
}

pub fn load_job(conn: &Connection, id: i64) -> Result<JobRecord, FansError> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"),
        [id],
        read_job_row,
    )
    .optional()
    .map_err(|err| store_error("fans_store.query", err))?
    .ok_or_else(|| {
        FansError::NotFound(
            ErrorInfo::new("fans_store.job_missing", "no job with this identifier")
                .with_context("id", id.to_string()),
        )
    })
}
