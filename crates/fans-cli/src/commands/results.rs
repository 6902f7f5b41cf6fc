use std::error::Error;

use clap::Args;
use fans_exp::{collect_results, parse_numbers};
use fans_store::Session;

#[derive(Args, Debug)]
pub struct ResultsArgs {
    /// Job identifier
    pub job: i64,
    /// Print the full result record as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(session: &mut Session, args: &ResultsArgs) -> Result<(), Box<dyn Error>> {
    let results = collect_results(session, args.job)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    println!("job {} {} {}", results.job.id, results.job.label, results.job.status);
    if let Some(path) = &results.results_file {
        println!("results {}", path.display());
    }
    let Some(log) = &results.log else {
        println!("no log");
        return Ok(());
    };
    for (step, value) in log.effective_stress.iter().enumerate() {
        println!("stress[{step}] {:?}", parse_numbers(value));
    }
    for (step, value) in log.effective_strain.iter().enumerate() {
        println!("strain[{step}] {:?}", parse_numbers(value));
    }
    Ok(())
}
