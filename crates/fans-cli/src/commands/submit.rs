use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use fans_core::to_canonical_json_bytes;
use fans_exp::{run_study, LocalEngine, StudyPlan};
use fans_store::Session;

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Study plan YAML
    #[arg(long)]
    pub plan: PathBuf,
    /// Write inputs and record jobs without launching the executable
    #[arg(long)]
    pub dry_run: bool,
    /// Optional path for the canonical JSON study report
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub fn run(session: &mut Session, args: &SubmitArgs) -> Result<(), Box<dyn Error>> {
    let plan = StudyPlan::load(&args.plan)?;
    let mut engine = LocalEngine {
        dry_run: args.dry_run,
    };
    let report = run_study(session, &mut engine, &plan)?;
    for job in &report.jobs {
        println!("{} {} {} {}", job.id, job.label, job.status, job.work_dir);
    }
    println!(
        "submitted {} jobs ({} new inputs, {} reused)",
        report.jobs.len(),
        report.created_nodes,
        report.reused_nodes
    );
    if let Some(path) = &args.report {
        fs::write(path, to_canonical_json_bytes(&report)?)?;
    }
    Ok(())
}
