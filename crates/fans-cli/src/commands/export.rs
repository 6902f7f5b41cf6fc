use std::error::Error;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use fans_store::{export_csv, export_json, ExportTable, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Whole store as canonical JSON
    Json,
    /// Value and file nodes as CSV
    Nodes,
    /// Jobs as CSV
    Jobs,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(session: &mut Session, args: &ExportArgs) -> Result<(), Box<dyn Error>> {
    let conn = session.conn();
    match args.format {
        ExportFormat::Json => export_json(conn, &args.out)?,
        ExportFormat::Nodes => export_csv(conn, ExportTable::Nodes, &args.out)?,
        ExportFormat::Jobs => export_csv(conn, ExportTable::Jobs, &args.out)?,
    }
    println!("exported {}", args.out.display());
    Ok(())
}
