//! Configuration documents for the profile, computer and code setup steps.
//!
//! Each document is plain YAML with one key per form field, consumed later by
//! the workflow engine's own command line tool. Nothing here validates the
//! entered text beyond what YAML quoting requires.

use std::fs;
use std::path::{Path, PathBuf};

use fans_core::errors::{ErrorInfo, FansError};
use fans_core::{from_yaml_str, to_yaml_string};
use fans_store::{CodeRecord, ComputerRecord, Resolution, Session};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A setup form rendered to its own YAML file.
pub trait SetupDocument: Serialize + DeserializeOwned {
    /// File name written into the target directory.
    const FILE_NAME: &'static str;

    /// Shell commands the user runs next, given the written file.
    fn follow_up(&self, path: &Path) -> Vec<String>;

    fn render(&self) -> Result<String, FansError> {
        to_yaml_string(self)
    }

    fn load(path: &Path) -> Result<Self, FansError> {
        let text = fs::read_to_string(path).map_err(|err| {
            FansError::Config(
                ErrorInfo::new("fans_exp.setup_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        from_yaml_str(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSetup {
    pub profile_name: String,
    #[serde(default)]
    pub set_as_default: bool,
    pub first_name: String,
    pub last_name: String,
    pub institution: String,
    #[serde(default)]
    pub use_rabbitmq: bool,
    #[serde(default)]
    pub interactive: bool,
}

impl Default for ProfileSetup {
    fn default() -> Self {
        Self {
            profile_name: "aiida-fans-tutorial".to_string(),
            set_as_default: false,
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            institution: "MIB".to_string(),
            use_rabbitmq: false,
            interactive: false,
        }
    }
}

impl SetupDocument for ProfileSetup {
    const FILE_NAME: &'static str = "setup-profile.yaml";

    fn follow_up(&self, path: &Path) -> Vec<String> {
        vec![format!(
            "verdi profile setup core.sqlite_dos --config {}",
            path.display()
        )]
    }
}

/// Compute resource the solver runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerSetup {
    pub label: String,
    pub hostname: String,
    #[serde(default)]
    pub description: String,
    pub transport: String,
    pub scheduler: String,
    pub work_dir: String,
    /// `{tot_num_mpiprocs}` is replaced by the process count at launch.
    pub mpirun_command: String,
    pub mpiprocs_per_machine: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_memory_per_machine: Option<u64>,
    #[serde(default)]
    pub use_double_quotes: bool,
    #[serde(default)]
    pub prepend_text: String,
    #[serde(default)]
    pub append_text: String,
}

impl Default for ComputerSetup {
    fn default() -> Self {
        Self {
            label: "localhost".to_string(),
            hostname: "localhost".to_string(),
            description: "This computer".to_string(),
            transport: "core.local".to_string(),
            scheduler: "core.direct".to_string(),
            work_dir: "/tmp/aiida_run".to_string(),
            mpirun_command: "mpirun -np {tot_num_mpiprocs}".to_string(),
            mpiprocs_per_machine: 1,
            default_memory_per_machine: None,
            use_double_quotes: false,
            prepend_text: String::new(),
            append_text: String::new(),
        }
    }
}

impl ComputerSetup {
    /// Launcher argv with the process count substituted.
    pub fn mpirun_argv(&self, procs: u32) -> Vec<String> {
        self.mpirun_command
            .replace("{tot_num_mpiprocs}", &procs.to_string())
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

impl SetupDocument for ComputerSetup {
    const FILE_NAME: &'static str = "setup-computer.yaml";

    fn follow_up(&self, path: &Path) -> Vec<String> {
        vec![
            format!("verdi computer setup --config {}", path.display()),
            format!(
                "verdi computer configure {} {} --safe-interval 0 -n",
                self.transport, self.label
            ),
        ]
    }
}

/// Installed solver executable registered against a computer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSetup {
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub default_calc_job_plugin: String,
    pub computer: String,
    pub filepath_executable: String,
    #[serde(default)]
    pub use_double_quotes: bool,
    #[serde(default)]
    pub with_mpi: bool,
    #[serde(default)]
    pub prepend_text: String,
    #[serde(default)]
    pub append_text: String,
}

impl Default for CodeSetup {
    fn default() -> Self {
        Self {
            label: "FANS".to_string(),
            description: "The FANS executable".to_string(),
            default_calc_job_plugin: "fans".to_string(),
            computer: "localhost".to_string(),
            filepath_executable: "FANS".to_string(),
            use_double_quotes: false,
            with_mpi: true,
            prepend_text: String::new(),
            append_text: String::new(),
        }
    }
}

impl SetupDocument for CodeSetup {
    const FILE_NAME: &'static str = "setup-code.yaml";

    fn follow_up(&self, path: &Path) -> Vec<String> {
        vec![format!(
            "verdi code create core.code.installed --config {}",
            path.display()
        )]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenSetup {
    pub path: PathBuf,
    pub yaml: String,
    pub commands: Vec<String>,
}

/// Renders `doc` into `dir/<FILE_NAME>`, replacing any previous file.
pub fn write_setup<D: SetupDocument>(doc: &D, dir: &Path) -> Result<WrittenSetup, FansError> {
    let yaml = doc.render()?;
    fs::create_dir_all(dir).map_err(|err| {
        FansError::Serde(
            ErrorInfo::new("fans_exp.setup_dir", err.to_string())
                .with_context("path", dir.display().to_string()),
        )
    })?;
    let path = dir.join(D::FILE_NAME);
    fs::write(&path, &yaml).map_err(|err| {
        FansError::Serde(
            ErrorInfo::new("fans_exp.setup_write", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    let commands = doc.follow_up(&path);
    Ok(WrittenSetup {
        path,
        yaml,
        commands,
    })
}

fn to_config<T: Serialize>(doc: &T) -> Result<serde_json::Value, FansError> {
    serde_json::to_value(doc).map_err(|err| FansError::serde("fans_exp.setup_encode", err))
}

pub fn register_computer(
    session: &mut Session,
    setup: &ComputerSetup,
) -> Result<Resolution<ComputerRecord>, FansError> {
    session.resolve_computer(&setup.label, &setup.hostname, &to_config(setup)?)
}

pub fn register_code(
    session: &mut Session,
    setup: &CodeSetup,
) -> Result<Resolution<CodeRecord>, FansError> {
    session.resolve_code(
        &setup.label,
        &setup.computer,
        &setup.filepath_executable,
        &to_config(setup)?,
    )
}
