//! Tutorial workflow for the FANS solver: setup documents, parameter space
//! studies, job submission and result scanning.

mod engine;
mod input;
mod logscan;
mod setup;
mod space;
mod study;

pub use engine::{Engine, JobRequest, LocalEngine, LOG_FILE, RESULTS_FILE};
pub use input::{build_input, write_input, INPUT_FILE};
pub use logscan::{collect_results, parse_numbers, scan_log, JobResults, LogSummary};
pub use setup::{
    register_code, register_computer, write_setup, CodeSetup, ComputerSetup, ProfileSetup,
    SetupDocument, WrittenSetup,
};
pub use space::{ParameterSpace, PartialConfig};
pub use study::{materialize, run_study, MaterializedStudy, StudyPlan, StudyReport};
