use fans_core::errors::FansError;
use fans_core::TaggedValue;
use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::jobs::{read_job_row, JobRecord, JobStatus, JOB_COLUMNS};
use crate::schema::{read_node_row, store_error, NodeRecord, RawNode, NODE_COLUMNS};

/// Exact-match filter over nodes. Unset fields match everything.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFilter {
    #[serde(default)]
    pub label: Option<String>,
    /// Kind tag (`text`, `integer`, `real`, `sequence`, `mapping` or `file`).
    #[serde(default)]
    pub kind: Option<String>,
    /// Compared by kind and canonical text, so sequences and mappings match structurally.
    #[serde(default)]
    pub value: Option<TaggedValue>,
    /// Registered path of a file node, as stored.
    #[serde(default)]
    pub path: Option<String>,
    /// Content digest of a file node at registration.
    #[serde(default)]
    pub sha256: Option<String>,
}

impl NodeFilter {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// Only jobs that are members of this group.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// All nodes matching `filter`, ordered by identifier.
pub fn find_nodes(conn: &Connection, filter: &NodeFilter) -> Result<Vec<NodeRecord>, FansError> {
    let mut sql = format!("SELECT {NODE_COLUMNS} FROM nodes");
    let mut clauses = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(label) = &filter.label {
        clauses.push("label = ?");
        args.push(Box::new(label.clone()));
    }
    let kind = match (&filter.kind, &filter.value) {
        (_, Some(value)) => Some(value.kind().as_str().to_string()),
        (Some(kind), None) => Some(kind.clone()),
        (None, None) => None,
    };
    if let Some(kind) = kind {
        clauses.push("kind = ?");
        args.push(Box::new(kind));
    }
    if let Some(value) = &filter.value {
        clauses.push("value = ?");
        args.push(Box::new(value.canonical_text()?));
    }
    if let Some(path) = &filter.path {
        clauses.push("path = ?");
        args.push(Box::new(path.clone()));
    }
    if let Some(sha256) = &filter.sha256 {
        clauses.push("sha256 = ?");
        args.push(Box::new(sha256.clone()));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY id");
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|err| store_error("fans_store.query", err))?;
    let params = args.iter().map(|arg| arg.as_ref()).collect::<Vec<_>>();
    let rows = stmt
        .query_map(params.as_slice(), read_node_row)
        .map_err(|err| store_error("fans_store.query", err))?;
    let raws = rows
        .collect::<Result<Vec<RawNode>, _>>()
        .map_err(|err| store_error("fans_store.query", err))?;
    raws.into_iter().map(RawNode::decode).collect()
}

/// Lowest-identifier node matching `filter`, if any.
pub fn first_node(conn: &Connection, filter: &NodeFilter) -> Result<Option<NodeRecord>, FansError> {
    Ok(find_nodes(conn, filter)?.into_iter().next())
}

pub fn find_jobs(conn: &Connection, filter: &JobFilter) -> Result<Vec<JobRecord>, FansError> {
    let mut sql = format!("SELECT {JOB_COLUMNS} FROM jobs");
    let mut clauses = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(group) = &filter.group {
        sql.push_str(
            " JOIN group_members ON group_members.member_kind = 'job' AND group_members.member_id = jobs.id
              JOIN groups ON groups.id = group_members.group_id",
        );
        clauses.push("groups.name = ?");
        args.push(Box::new(group.clone()));
    }
    if let Some(label) = &filter.label {
        clauses.push("jobs.label = ?");
        args.push(Box::new(label.clone()));
    }
    if let Some(code) = &filter.code {
        clauses.push("jobs.code = ?");
        args.push(Box::new(code.clone()));
    }
    if let Some(status) = &filter.status {
        clauses.push("jobs.status = ?");
        args.push(Box::new(status.as_str()));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY jobs.id");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|err| store_error("fans_store.query", err))?;
    let params = args.iter().map(|arg| arg.as_ref()).collect::<Vec<_>>();
    let rows = stmt
        .query_map(params.as_slice(), read_job_row)
        .map_err(|err| store_error("fans_store.query", err))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|err| store_error("fans_store.query", err))
}
