use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use fans_exp::{write_setup, CodeSetup, ComputerSetup, ProfileSetup, WrittenSetup};

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Directory the YAML file is written into
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
    #[command(subcommand)]
    pub command: SetupCommand,
}

#[derive(Subcommand, Debug)]
pub enum SetupCommand {
    Profile(ProfileArgs),
    Computer(ComputerArgs),
    Code(CodeArgs),
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[arg(long, default_value = "aiida-fans-tutorial")]
    pub profile_name: String,
    #[arg(long)]
    pub set_as_default: bool,
    #[arg(long, default_value = "John")]
    pub first_name: String,
    #[arg(long, default_value = "Doe")]
    pub last_name: String,
    #[arg(long, default_value = "MIB")]
    pub institution: String,
    #[arg(long)]
    pub use_rabbitmq: bool,
}

#[derive(Args, Debug)]
pub struct ComputerArgs {
    #[arg(long, default_value = "localhost")]
    pub label: String,
    #[arg(long, default_value = "localhost")]
    pub hostname: String,
    #[arg(long, default_value = "This computer")]
    pub description: String,
    #[arg(long, default_value = "core.local")]
    pub transport: String,
    #[arg(long, default_value = "core.direct")]
    pub scheduler: String,
    /// Scratch directory on the computer, written as `work_dir`
    #[arg(long, default_value = "/tmp/aiida_run")]
    pub remote_work_dir: String,
    #[arg(long, default_value = "mpirun -np {tot_num_mpiprocs}")]
    pub mpirun_command: String,
    #[arg(long, default_value_t = 1)]
    pub mpiprocs_per_machine: u32,
    #[arg(long)]
    pub default_memory_per_machine: Option<u64>,
    #[arg(long, default_value = "")]
    pub prepend_text: String,
    #[arg(long, default_value = "")]
    pub append_text: String,
}

#[derive(Args, Debug)]
pub struct CodeArgs {
    #[arg(long, default_value = "FANS")]
    pub label: String,
    #[arg(long, default_value = "The FANS executable")]
    pub description: String,
    #[arg(long, default_value = "localhost")]
    pub computer: String,
    #[arg(long, default_value = "FANS")]
    pub filepath_executable: String,
    /// Launch without the computer's mpirun command
    #[arg(long)]
    pub without_mpi: bool,
    #[arg(long, default_value = "")]
    pub prepend_text: String,
    #[arg(long, default_value = "")]
    pub append_text: String,
}

impl ProfileArgs {
    fn to_setup(&self) -> ProfileSetup {
        ProfileSetup {
            profile_name: self.profile_name.clone(),
            set_as_default: self.set_as_default,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            institution: self.institution.clone(),
            use_rabbitmq: self.use_rabbitmq,
            interactive: false,
        }
    }
}

impl ComputerArgs {
    fn to_setup(&self) -> ComputerSetup {
        ComputerSetup {
            label: self.label.clone(),
            hostname: self.hostname.clone(),
            description: self.description.clone(),
            transport: self.transport.clone(),
            scheduler: self.scheduler.clone(),
            work_dir: self.remote_work_dir.clone(),
            mpirun_command: self.mpirun_command.clone(),
            mpiprocs_per_machine: self.mpiprocs_per_machine,
            default_memory_per_machine: self.default_memory_per_machine,
            prepend_text: self.prepend_text.clone(),
            append_text: self.append_text.clone(),
            ..ComputerSetup::default()
        }
    }
}

impl CodeArgs {
    fn to_setup(&self) -> CodeSetup {
        CodeSetup {
            label: self.label.clone(),
            description: self.description.clone(),
            computer: self.computer.clone(),
            filepath_executable: self.filepath_executable.clone(),
            with_mpi: !self.without_mpi,
            prepend_text: self.prepend_text.clone(),
            append_text: self.append_text.clone(),
            ..CodeSetup::default()
        }
    }
}

pub fn run(args: &SetupArgs) -> Result<(), Box<dyn Error>> {
    let written = match &args.command {
        SetupCommand::Profile(form) => write_setup(&form.to_setup(), &args.out)?,
        SetupCommand::Computer(form) => write_setup(&form.to_setup(), &args.out)?,
        SetupCommand::Code(form) => write_setup(&form.to_setup(), &args.out)?,
    };
    report(&written);
    Ok(())
}

fn report(written: &WrittenSetup) {
    println!("wrote {}", written.path.display());
    println!("next:");
    for command in &written.commands {
        println!("  {command}");
    }
}
