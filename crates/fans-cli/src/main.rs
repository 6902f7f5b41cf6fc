use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fans_store::{Session, SessionConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::{
    export::{self, ExportArgs},
    group::{self, GroupArgs},
    jobs::{self, JobsArgs, ShowArgs},
    register::{self, RegisterArgs},
    resolve::{self, ResolveArgs},
    results::{self, ResultsArgs},
    setup::{self, SetupArgs},
    submit::{self, SubmitArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "fans-tutor", about = "FANS workflow tutorial driver")]
struct Cli {
    /// SQLite record store [default: .fans/records.sqlite]
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Root directory for per-job working directories [default: .fans/jobs]
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,
    /// YAML session file; --store and --work-dir take precedence over it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a profile, computer or code setup YAML file.
    Setup(SetupArgs),
    /// Register a computer or code in the record store.
    Register(RegisterArgs),
    /// Get or create a labelled value or file record.
    Resolve(ResolveArgs),
    /// Materialize a study plan and submit one job per configuration.
    Submit(SubmitArgs),
    /// List jobs, optionally filtered.
    Jobs(JobsArgs),
    /// Print a stored record.
    Show(ShowArgs),
    /// Print the status and scanned log values of a job.
    Results(ResultsArgs),
    /// Create, extend and list groups.
    Group(GroupArgs),
    /// Dump the record store as JSON or CSV.
    Export(ExportArgs),
}

impl Cli {
    fn session_config(&self) -> Result<SessionConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::default(),
        };
        if let Some(store) = &self.store {
            config.store = store.clone();
        }
        if let Some(work_dir) = &self.work_dir {
            config.work_dir = work_dir.clone();
        }
        Ok(config)
    }

    fn connect(&self) -> Result<Session, Box<dyn Error>> {
        let config = self.session_config()?;
        debug!(store = %config.store.display(), work_dir = %config.work_dir.display(), "opening session");
        Ok(Session::connect(config)?)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FANS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    match &cli.command {
        Command::Setup(args) => setup::run(args),
        Command::Register(args) => with_session(&cli, |session| register::run(session, args)),
        Command::Resolve(args) => with_session(&cli, |session| resolve::run(session, args)),
        Command::Submit(args) => with_session(&cli, |session| submit::run(session, args)),
        Command::Jobs(args) => with_session(&cli, |session| jobs::run(session, args)),
        Command::Show(args) => with_session(&cli, |session| jobs::show(session, args)),
        Command::Results(args) => with_session(&cli, |session| results::run(session, args)),
        Command::Group(args) => with_session(&cli, |session| group::run(session, args)),
        Command::Export(args) => with_session(&cli, |session| export::run(session, args)),
    }
}

/// Runs `body` against a fresh session and closes it afterwards, also on error.
fn with_session<F>(cli: &Cli, body: F) -> Result<(), Box<dyn Error>>
where
    F: FnOnce(&mut Session) -> Result<(), Box<dyn Error>>,
{
    let mut session = cli.connect()?;
    let outcome = body(&mut session);
    session.close()?;
    outcome
}
