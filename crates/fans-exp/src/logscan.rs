use std::fs;
use std::path::{Path, PathBuf};

use fans_core::errors::{ErrorInfo, FansError};
use fans_store::{JobRecord, Session};
use serde::{Deserialize, Serialize};

const STRESS_MARKER: &str = "Effective Stress";
const STRAIN_MARKER: &str = "Effective Strain";

/// Values scraped from a solver log, in the order they were printed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSummary {
    pub effective_stress: Vec<String>,
    pub effective_strain: Vec<String>,
}

impl LogSummary {
    /// Stress of the final load step, if any was logged.
    pub fn final_stress(&self) -> Option<&str> {
        self.effective_stress.last().map(String::as_str)
    }

    pub fn final_strain(&self) -> Option<&str> {
        self.effective_strain.last().map(String::as_str)
    }
}

fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let start = line.find(marker)? + marker.len();
    Some(
        line[start..]
            .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
            .trim_end(),
    )
}

/// Line-oriented scan for the effective stress and strain markers.
///
/// This is a text match, not a parse: everything up to and including the
/// marker plus any following colons or spaces is dropped, and the remainder of
/// the line is kept verbatim.
pub fn scan_log(text: &str) -> LogSummary {
    let mut summary = LogSummary::default();
    for line in text.lines() {
        if let Some(value) = after_marker(line, STRESS_MARKER) {
            summary.effective_stress.push(value.to_string());
        } else if let Some(value) = after_marker(line, STRAIN_MARKER) {
            summary.effective_strain.push(value.to_string());
        }
    }
    summary
}

/// Pulls every decimal number out of a scanned value string.
pub fn parse_numbers(text: &str) -> Vec<f64> {
    text.split(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .filter(|token| token.chars().any(|c| c.is_ascii_digit()))
        .filter_map(|token| token.parse::<f64>().ok())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResults {
    pub job: JobRecord,
    /// Present only when the results artifact exists on disk.
    pub results_file: Option<PathBuf>,
    /// `None` when the job never produced a log.
    pub log: Option<LogSummary>,
}

pub fn collect_results(session: &Session, job_id: i64) -> Result<JobResults, FansError> {
    let job = session.load_job(job_id)?;
    let results_file = job
        .results_path
        .as_ref()
        .map(PathBuf::from)
        .filter(|path| path.exists());
    let log = match &job.log_path {
        Some(path) if Path::new(path).exists() => {
            let text = fs::read_to_string(path).map_err(|err| {
                FansError::Serde(
                    ErrorInfo::new("fans_exp.log_read", err.to_string())
                        .with_context("path", path.as_str()),
                )
            })?;
            Some(scan_log(&text))
        }
        _ => None,
    };
    Ok(JobResults {
        job,
        results_file,
        log,
    })
}
