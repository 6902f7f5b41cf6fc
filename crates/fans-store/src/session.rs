//! Explicit store context replacing process-wide profile state.

use std::fs;
use std::path::{Path, PathBuf};

use fans_core::errors::{ErrorInfo, FansError};
use fans_core::{from_yaml_str, TaggedValue};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::jobs::{finish_job, insert_job, load_job, JobRecord, JobStatus, NewJob};
use crate::query::{find_jobs, find_nodes, first_node, JobFilter, NodeFilter};
use crate::resolve::{
    resolve_code, resolve_computer, resolve_file, resolve_group, resolve_value, Resolution,
};
use crate::schema::{
    add_group_members, group_members, init_schema, load_code, load_computer, load_group,
    load_node, CodeRecord, ComputerRecord, GroupMember, GroupRecord, NodeRecord,
};

/// Where a session keeps its database and job directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_store")]
    pub store: PathBuf,
    #[serde(default = "SessionConfig::default_work_dir")]
    pub work_dir: PathBuf,
}

impl SessionConfig {
    fn default_store() -> PathBuf {
        PathBuf::from(".fans/records.sqlite")
    }

    fn default_work_dir() -> PathBuf {
        PathBuf::from(".fans/jobs")
    }

    /// Reads a YAML session file; absent keys fall back to the defaults.
    pub fn load(path: &Path) -> Result<Self, FansError> {
        let text = fs::read_to_string(path).map_err(|err| {
            FansError::Config(
                ErrorInfo::new("fans_store.config_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        from_yaml_str(&text)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store: Self::default_store(),
            work_dir: Self::default_work_dir(),
        }
    }
}

/// An open connection to the record store.
///
/// Every operation that touches stored records goes through a session.
/// [`Session::close`] flushes and releases the database.
#[derive(Debug)]
pub struct Session {
    conn: Connection,
    config: SessionConfig,
}

impl Session {
    pub fn connect(config: SessionConfig) -> Result<Self, FansError> {
        if let Some(parent) = config.store.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    FansError::Store(
                        ErrorInfo::new("fans_store.create_dir", err.to_string())
                            .with_context("path", parent.display().to_string()),
                    )
                })?;
            }
        }
        let conn = Connection::open(&config.store).map_err(|err| {
            FansError::Store(
                ErrorInfo::new("fans_store.open", err.to_string())
                    .with_context("path", config.store.display().to_string()),
            )
        })?;
        init_schema(&conn)?;
        info!(store = %config.store.display(), "session connected");
        Ok(Self { conn, config })
    }

    /// Session backed by a private in-memory database; jobs still land in `work_dir`.
    pub fn in_memory(work_dir: impl Into<PathBuf>) -> Result<Self, FansError> {
        let conn =
            Connection::open_in_memory().map_err(|err| FansError::store("fans_store.open", err))?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            config: SessionConfig {
                store: PathBuf::from(":memory:"),
                work_dir: work_dir.into(),
            },
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn work_dir(&self) -> &Path {
        &self.config.work_dir
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn close(self) -> Result<(), FansError> {
        let store = self.config.store;
        self.conn
            .close()
            .map_err(|(_, err)| FansError::store("fans_store.close", err))?;
        info!(store = %store.display(), "session closed");
        Ok(())
    }

    pub fn resolve_value(
        &mut self,
        label: &str,
        value: &TaggedValue,
    ) -> Result<Resolution<NodeRecord>, FansError> {
        resolve_value(&mut self.conn, label, value)
    }

    pub fn resolve_file(
        &mut self,
        label: &str,
        path: &Path,
    ) -> Result<Resolution<NodeRecord>, FansError> {
        resolve_file(&mut self.conn, label, path)
    }

    pub fn resolve_group(&mut self, name: &str) -> Result<Resolution<GroupRecord>, FansError> {
        resolve_group(&mut self.conn, name)
    }

    pub fn resolve_computer(
        &mut self,
        label: &str,
        hostname: &str,
        config: &Value,
    ) -> Result<Resolution<ComputerRecord>, FansError> {
        resolve_computer(&mut self.conn, label, hostname, config)
    }

    pub fn resolve_code(
        &mut self,
        label: &str,
        computer: &str,
        executable: &str,
        config: &Value,
    ) -> Result<Resolution<CodeRecord>, FansError> {
        resolve_code(&mut self.conn, label, computer, executable, config)
    }

    pub fn load_node(&self, id: i64) -> Result<NodeRecord, FansError> {
        load_node(&self.conn, id)
    }

    pub fn find_nodes(&self, filter: &NodeFilter) -> Result<Vec<NodeRecord>, FansError> {
        find_nodes(&self.conn, filter)
    }

    pub fn first_node(&self, filter: &NodeFilter) -> Result<Option<NodeRecord>, FansError> {
        first_node(&self.conn, filter)
    }

    pub fn load_computer(&self, label: &str) -> Result<ComputerRecord, FansError> {
        load_computer(&self.conn, label)
    }

    pub fn load_code(&self, label: &str) -> Result<CodeRecord, FansError> {
        load_code(&self.conn, label)
    }

    pub fn load_group(&self, name: &str) -> Result<GroupRecord, FansError> {
        load_group(&self.conn, name)
    }

    pub fn add_to_group(&self, group_id: i64, members: &[GroupMember]) -> Result<(), FansError> {
        add_group_members(&self.conn, group_id, members)
    }

    pub fn group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, FansError> {
        group_members(&self.conn, group_id)
    }

    pub fn insert_job(&self, job: &NewJob) -> Result<JobRecord, FansError> {
        insert_job(&self.conn, job)
    }

    pub fn finish_job(
        &self,
        id: i64,
        status: JobStatus,
        exit_code: Option<i32>,
        log_path: Option<&str>,
        results_path: Option<&str>,
    ) -> Result<JobRecord, FansError> {
        finish_job(&self.conn, id, status, exit_code, log_path, results_path)
    }

    pub fn load_job(&self, id: i64) -> Result<JobRecord, FansError> {
        load_job(&self.conn, id)
    }

    pub fn find_jobs(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, FansError> {
        find_jobs(&self.conn, filter)
    }
}
