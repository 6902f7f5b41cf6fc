use std::error::Error;

use clap::Args;
use fans_core::{to_canonical_json_string, TaggedValue};
use fans_store::{JobFilter, JobStatus, NodeFilter, Session};

#[derive(Args, Debug)]
pub struct JobsArgs {
    #[arg(long)]
    pub label: Option<String>,
    #[arg(long)]
    pub code: Option<String>,
    /// One of submitted, created, finished, failed
    #[arg(long)]
    pub status: Option<JobStatus>,
    #[arg(long)]
    pub group: Option<String>,
    #[arg(long)]
    pub limit: Option<usize>,
}

pub fn run(session: &mut Session, args: &JobsArgs) -> Result<(), Box<dyn Error>> {
    let filter = JobFilter {
        label: args.label.clone(),
        code: args.code.clone(),
        status: args.status,
        group: args.group.clone(),
        limit: args.limit,
    };
    for job in session.find_jobs(&filter)? {
        let exit = job
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{}\t{}\t{}\t{}", job.id, job.label, job.status, exit, job.work_dir);
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Node identifier
    #[arg(conflicts_with_all = ["label", "job"])]
    pub id: Option<i64>,
    /// Show the first node with this label
    #[arg(long)]
    pub label: Option<String>,
    /// Narrow `--label` to nodes holding this value (YAML)
    #[arg(long, requires = "label")]
    pub value: Option<String>,
    /// Show a job instead of a node
    #[arg(long)]
    pub job: Option<i64>,
}

pub fn show(session: &mut Session, args: &ShowArgs) -> Result<(), Box<dyn Error>> {
    let text = if let Some(id) = args.job {
        to_canonical_json_string(&session.load_job(id)?)?
    } else if let Some(id) = args.id {
        to_canonical_json_string(&session.load_node(id)?)?
    } else if let Some(label) = &args.label {
        let value = match &args.value {
            Some(raw) => Some(TaggedValue::try_from(serde_yaml::from_str::<serde_yaml::Value>(
                raw,
            )?)?),
            None => None,
        };
        let filter = NodeFilter {
            label: Some(label.clone()),
            kind: value.as_ref().map(|v| v.kind().as_str().to_string()),
            value,
            ..NodeFilter::default()
        };
        match session.first_node(&filter)? {
            Some(node) => to_canonical_json_string(&node)?,
            None => return Err(format!("no node labelled {label}").into()),
        }
    } else {
        return Err("pass a node id, --label or --job".into());
    };
    println!("{text}");
    Ok(())
}
