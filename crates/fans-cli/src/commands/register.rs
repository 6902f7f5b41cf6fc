use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use fans_exp::{register_code, register_computer, CodeSetup, ComputerSetup, SetupDocument};
use fans_store::Session;

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[command(subcommand)]
    pub command: RegisterCommand,
}

#[derive(Subcommand, Debug)]
pub enum RegisterCommand {
    /// Register a computer from a setup YAML file, or the local defaults.
    Computer {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Register a code from a setup YAML file, or the tutorial defaults.
    Code {
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn load_or_default<D: SetupDocument + Default>(file: &Option<PathBuf>) -> Result<D, Box<dyn Error>> {
    Ok(match file {
        Some(path) => D::load(path)?,
        None => D::default(),
    })
}

pub fn run(session: &mut Session, args: &RegisterArgs) -> Result<(), Box<dyn Error>> {
    match &args.command {
        RegisterCommand::Computer { file } => {
            let setup: ComputerSetup = load_or_default(file)?;
            let resolution = register_computer(session, &setup)?;
            let verb = if resolution.was_created() { "registered" } else { "already registered" };
            println!("{verb} computer {} ({})", setup.label, resolution.record().id);
        }
        RegisterCommand::Code { file } => {
            let setup: CodeSetup = load_or_default(file)?;
            let resolution = register_code(session, &setup)?;
            let verb = if resolution.was_created() { "registered" } else { "already registered" };
            println!(
                "{verb} code {}@{} ({})",
                setup.label,
                setup.computer,
                resolution.record().id
            );
        }
    }
    Ok(())
}
