use std::fs;
use std::path::Path;

use fans_core::errors::{ErrorInfo, FansError};
use fans_core::to_canonical_json_bytes;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::jobs::JobRecord;
use crate::query::{find_jobs, JobFilter};
use crate::schema::{
    group_members, load_codes, load_computers, load_groups, load_nodes, CodeRecord,
    ComputerRecord, GroupMember, GroupRecord, NodePayload, NodeRecord,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub group: GroupRecord,
    pub members: Vec<GroupMember>,
}

/// Full dump of a store, ordered by identifier within each table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub nodes: Vec<NodeRecord>,
    pub groups: Vec<GroupSnapshot>,
    pub computers: Vec<ComputerRecord>,
    pub codes: Vec<CodeRecord>,
    pub jobs: Vec<JobRecord>,
}

impl StoreSnapshot {
    pub fn load(conn: &Connection) -> Result<Self, FansError> {
        let groups = load_groups(conn)?
            .into_iter()
            .map(|group| {
                let members = group_members(conn, group.id)?;
                Ok(GroupSnapshot { group, members })
            })
            .collect::<Result<Vec<_>, FansError>>()?;
        Ok(Self {
            nodes: load_nodes(conn)?,
            groups,
            computers: load_computers(conn)?,
            codes: load_codes(conn)?,
            jobs: find_jobs(conn, &JobFilter::default())?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportTable {
    Nodes,
    Jobs,
}

fn export_error(code: &str, err: impl ToString, path: &Path) -> FansError {
    FansError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

pub fn export_json(conn: &Connection, out_path: &Path) -> Result<(), FansError> {
    let snapshot = StoreSnapshot::load(conn)?;
    let bytes = to_canonical_json_bytes(&snapshot)?;
    fs::write(out_path, bytes).map_err(|err| export_error("fans_store.export", err, out_path))
}

pub fn export_csv(conn: &Connection, table: ExportTable, out_path: &Path) -> Result<(), FansError> {
    let mut wtr = csv::Writer::from_path(out_path)
        .map_err(|err| export_error("fans_store.export", err, out_path))?;
    match table {
        ExportTable::Nodes => {
            wtr.write_record(["id", "label", "kind", "value", "path", "created_at"])
                .map_err(|err| export_error("fans_store.export", err, out_path))?;
            for node in load_nodes(conn)? {
                let (value, path) = match &node.payload {
                    NodePayload::Value(value) => (value.canonical_text()?, String::new()),
                    NodePayload::File { path, .. } => (String::new(), path.clone()),
                };
                wtr.write_record([
                    node.id.to_string(),
                    node.label.clone(),
                    node.payload.kind_tag().to_string(),
                    value,
                    path,
                    node.created_at.clone(),
                ])
                .map_err(|err| export_error("fans_store.export", err, out_path))?;
            }
        }
        ExportTable::Jobs => {
            wtr.write_record(["id", "label", "code", "status", "exit_code", "work_dir", "submitted_at"])
                .map_err(|err| export_error("fans_store.export", err, out_path))?;
            for job in find_jobs(conn, &JobFilter::default())? {
                wtr.write_record([
                    job.id.to_string(),
                    job.label.clone(),
                    job.code.clone(),
                    job.status.to_string(),
                    job.exit_code.map(|code| code.to_string()).unwrap_or_default(),
                    job.work_dir.clone(),
                    job.submitted_at.clone(),
                ])
                .map_err(|err| export_error("fans_store.export", err, out_path))?;
            }
        }
    }
    wtr.flush()
        .map_err(|err| export_error("fans_store.export", err, out_path))
}
