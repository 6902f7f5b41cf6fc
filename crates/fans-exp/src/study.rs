//! Study plans: a parameter space over solver inputs, submitted as one batch.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fans_core::errors::{ErrorInfo, FansError};
use fans_core::{from_yaml_str, stable_hash_string, TaggedValue};
use fans_store::{GroupMember, GroupRecord, JobRecord, NodeRecord, Resolution, Session};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{Engine, JobRequest};
use crate::space::{ParameterSpace, PartialConfig};

/// YAML description of a batch of solver runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlan {
    /// Prefix for job labels; job `i` is `<label>-<i:03>`.
    pub label: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Port name to file path, relative paths taken from the plan's directory.
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub fixed: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub vary: Vec<Vec<BTreeMap<String, serde_yaml::Value>>>,
}

impl StudyPlan {
    pub fn load(path: &Path) -> Result<Self, FansError> {
        let text = fs::read_to_string(path).map_err(|err| {
            FansError::Config(
                ErrorInfo::new("fans_exp.plan_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let mut plan: StudyPlan = from_yaml_str(&text)?;
        if let Some(base) = path.parent() {
            for file in plan.files.values_mut() {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }
        Ok(plan)
    }

    pub fn plan_hash(&self) -> Result<String, FansError> {
        stable_hash_string(self)
    }
}

/// A plan whose every input has been resolved to a stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedStudy {
    pub group: Option<GroupRecord>,
    pub space: ParameterSpace<NodeRecord>,
    pub created_nodes: usize,
    pub reused_nodes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyReport {
    pub plan_hash: String,
    pub group: Option<String>,
    pub jobs: Vec<JobRecord>,
    pub created_nodes: usize,
    pub reused_nodes: usize,
}

struct Tally {
    created: usize,
    reused: usize,
}

impl Tally {
    fn record(&mut self, resolution: Resolution<NodeRecord>) -> NodeRecord {
        if resolution.was_created() {
            self.created += 1;
        } else {
            self.reused += 1;
        }
        resolution.into_record()
    }
}

fn resolve_partial(
    session: &mut Session,
    partial: &BTreeMap<String, serde_yaml::Value>,
    tally: &mut Tally,
) -> Result<PartialConfig<NodeRecord>, FansError> {
    let mut resolved = PartialConfig::new();
    for (port, raw) in partial {
        let value = TaggedValue::try_from(raw.clone())
            .map_err(|err| with_port(err, port))?;
        let node = tally.record(session.resolve_value(port, &value)?);
        resolved.insert(port.clone(), node);
    }
    Ok(resolved)
}

fn with_port(err: FansError, port: &str) -> FansError {
    match err {
        FansError::UnsupportedKind(info) => {
            FansError::UnsupportedKind(info.with_context("port", port))
        }
        other => other,
    }
}

/// Resolves every plan input before anything is submitted.
///
/// Groups are ordered files, fixed, then each `vary` group, so a varied port
/// overrides a fixed one of the same name.
pub fn materialize(
    session: &mut Session,
    plan: &StudyPlan,
) -> Result<MaterializedStudy, FansError> {
    let mut tally = Tally {
        created: 0,
        reused: 0,
    };
    let mut space = ParameterSpace::new();

    let mut files = PartialConfig::new();
    for (port, path) in &plan.files {
        let node = tally.record(session.resolve_file(port, path)?);
        files.insert(port.clone(), node);
    }
    space.push_fixed(files);
    space.push_fixed(resolve_partial(session, &plan.fixed, &mut tally)?);
    for group in &plan.vary {
        let resolved = group
            .iter()
            .map(|partial| resolve_partial(session, partial, &mut tally))
            .collect::<Result<Vec<_>, _>>()?;
        space.push_group(resolved);
    }

    let group = match &plan.group {
        Some(name) => Some(session.resolve_group(name)?.into_record()),
        None => None,
    };
    Ok(MaterializedStudy {
        group,
        space,
        created_nodes: tally.created,
        reused_nodes: tally.reused,
    })
}

/// Materializes `plan` and submits one job per configuration in enumeration order.
///
/// A failing submission stops the batch; jobs already submitted stay recorded.
pub fn run_study<E: Engine>(
    session: &mut Session,
    engine: &mut E,
    plan: &StudyPlan,
) -> Result<StudyReport, FansError> {
    let plan_hash = plan.plan_hash()?;
    let study = materialize(session, plan)?;
    info!(
        label = %plan.label,
        configurations = study.space.len(),
        created = study.created_nodes,
        reused = study.reused_nodes,
        "study materialized"
    );

    let mut jobs = Vec::with_capacity(study.space.len());
    for (idx, inputs) in study.space.enumerate().into_iter().enumerate() {
        let request = JobRequest {
            label: format!("{}-{:03}", plan.label, idx),
            code: plan.code.clone(),
            inputs,
        };
        let job = engine.submit(session, &request)?;
        if let Some(group) = &study.group {
            session.add_to_group(group.id, &[GroupMember::Job(job.id)])?;
        }
        jobs.push(job);
    }

    Ok(StudyReport {
        plan_hash,
        group: study.group.map(|g| g.name),
        jobs,
        created_nodes: study.created_nodes,
        reused_nodes: study.reused_nodes,
    })
}
