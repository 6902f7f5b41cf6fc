//! Idempotent record resolution.
//!
//! Every resolver runs its lookup and its optional insert inside one
//! `BEGIN IMMEDIATE` transaction. SQLite takes the write lock before the
//! lookup, so two sessions resolving the same label against one database file
//! serialize instead of both observing "no match" and both inserting.
//!
//! Outcomes:
//!
//! - zero matches: a new record is created and returned as [`Resolution::Created`],
//! - one match: it is returned as [`Resolution::Existing`],
//! - more matches: [`FansError::Duplicate`]; the caller has to repair the store.

use fans_core::errors::{ErrorInfo, FansError};
use fans_core::{file_sha256, TaggedValue};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::query::{find_nodes, NodeFilter};
use crate::schema::{
    create_group, create_node, find_codes, find_computers, find_groups, insert_code,
    insert_computer, store_error, CodeRecord, ComputerRecord, GroupRecord, NodePayload,
    NodeRecord, FILE_KIND,
};

/// Result of a get-or-insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "record", rename_all = "lowercase")]
pub enum Resolution<T> {
    Created(T),
    Existing(T),
}

impl<T> Resolution<T> {
    pub fn record(&self) -> &T {
        match self {
            Resolution::Created(record) | Resolution::Existing(record) => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            Resolution::Created(record) | Resolution::Existing(record) => record,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Resolution::Created(_))
    }
}

fn check_label(what: &str, label: &str) -> Result<(), FansError> {
    if label.trim().is_empty() {
        return Err(FansError::Config(
            ErrorInfo::new("fans_store.empty_label", format!("{what} label must not be empty"))
                .with_hint("pass a non-empty identifying label"),
        ));
    }
    Ok(())
}

fn duplicate(what: &str, label: &str, ids: impl Iterator<Item = i64>) -> FansError {
    let ids = ids.map(|id| id.to_string()).collect::<Vec<_>>().join(",");
    FansError::Duplicate(
        ErrorInfo::new(
            format!("fans_store.duplicate_{what}"),
            format!("more than one {what} matches, resolution is ambiguous"),
        )
        .with_context("label", label)
        .with_context("ids", ids)
        .with_hint("remove the extra records from the store and rerun"),
    )
}

/// Runs `body` inside an immediate transaction and commits on success.
fn atomically<T>(
    conn: &mut Connection,
    body: impl FnOnce(&Connection) -> Result<T, FansError>,
) -> Result<T, FansError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| store_error("fans_store.transaction", err))?;
    let outcome = body(&*tx)?;
    tx.commit()
        .map_err(|err| store_error("fans_store.commit", err))?;
    Ok(outcome)
}

/// Returns the single value node with `label` and exactly `value`, creating it if absent.
pub fn resolve_value(
    conn: &mut Connection,
    label: &str,
    value: &TaggedValue,
) -> Result<Resolution<NodeRecord>, FansError> {
    check_label("value", label)?;
    // Encodes up front so an unsupported value never opens a transaction.
    value.canonical_text()?;
    let filter = NodeFilter {
        label: Some(label.to_string()),
        kind: Some(value.kind().as_str().to_string()),
        value: Some(value.clone()),
        ..NodeFilter::default()
    };
    atomically(conn, |tx| {
        let mut matches = find_nodes(tx, &filter)?;
        match matches.len() {
            0 => {
                let record = create_node(tx, label, &NodePayload::Value(value.clone()))?;
                info!(label, id = record.id, kind = %value.kind(), "created value node");
                Ok(Resolution::Created(record))
            }
            1 => {
                let record = matches.remove(0);
                debug!(label, id = record.id, "reusing value node");
                Ok(Resolution::Existing(record))
            }
            _ => Err(duplicate("node", label, matches.iter().map(|n| n.id))),
        }
    })
}

/// Returns the single file node for `label`, `path` and the file's current content.
///
/// The digest is part of the lookup: pointing a label at another file, or
/// rewriting the file in place, registers a new node instead of reusing the
/// old one.
pub fn resolve_file(
    conn: &mut Connection,
    label: &str,
    path: &Path,
) -> Result<Resolution<NodeRecord>, FansError> {
    check_label("file", label)?;
    let sha256 = file_sha256(path)?;
    let filter = NodeFilter {
        label: Some(label.to_string()),
        kind: Some(FILE_KIND.to_string()),
        path: Some(path.display().to_string()),
        sha256: Some(sha256.clone()),
        ..NodeFilter::default()
    };
    atomically(conn, |tx| {
        let mut matches = find_nodes(tx, &filter)?;
        match matches.len() {
            0 => {
                let payload = NodePayload::File {
                    path: path.display().to_string(),
                    sha256: sha256.clone(),
                };
                let record = create_node(tx, label, &payload)?;
                info!(label, id = record.id, path = %path.display(), "registered file node");
                Ok(Resolution::Created(record))
            }
            1 => {
                let record = matches.remove(0);
                debug!(label, id = record.id, "reusing file node");
                Ok(Resolution::Existing(record))
            }
            _ => Err(duplicate("node", label, matches.iter().map(|n| n.id))),
        }
    })
}

/// Returns the single group called `name`, creating it if absent.
pub fn resolve_group(
    conn: &mut Connection,
    name: &str,
) -> Result<Resolution<GroupRecord>, FansError> {
    check_label("group", name)?;
    atomically(conn, |tx| {
        let mut matches = find_groups(tx, name)?;
        match matches.len() {
            0 => {
                let group = create_group(tx, name)?;
                info!(name, id = group.id, "created group");
                Ok(Resolution::Created(group))
            }
            1 => Ok(Resolution::Existing(matches.remove(0))),
            _ => Err(duplicate("group", name, matches.iter().map(|g| g.id))),
        }
    })
}

fn conflicting(what: &str, label: &str) -> FansError {
    FansError::Config(
        ErrorInfo::new(
            format!("fans_store.{what}_conflict"),
            format!("{what} label already registered with a different configuration"),
        )
        .with_context("label", label)
        .with_hint(format!("choose a new {what} label")),
    )
}

/// Registers a computer under `label`, or returns the existing identical registration.
pub fn resolve_computer(
    conn: &mut Connection,
    label: &str,
    hostname: &str,
    config: &Value,
) -> Result<Resolution<ComputerRecord>, FansError> {
    check_label("computer", label)?;
    atomically(conn, |tx| {
        let mut matches = find_computers(tx, Some(label))?;
        match matches.len() {
            0 => {
                let record = insert_computer(tx, label, hostname, config)?;
                info!(label, hostname, "registered computer");
                Ok(Resolution::Created(record))
            }
            1 => {
                let record = matches.remove(0);
                if &record.config != config {
                    return Err(conflicting("computer", label));
                }
                Ok(Resolution::Existing(record))
            }
            _ => Err(duplicate("computer", label, matches.iter().map(|c| c.id))),
        }
    })
}

/// Registers a code under `label`, or returns the existing identical registration.
///
/// The referenced computer must already be registered.
pub fn resolve_code(
    conn: &mut Connection,
    label: &str,
    computer: &str,
    executable: &str,
    config: &Value,
) -> Result<Resolution<CodeRecord>, FansError> {
    check_label("code", label)?;
    atomically(conn, |tx| {
        if find_computers(tx, Some(computer))?.is_empty() {
            return Err(FansError::NotFound(
                ErrorInfo::new("fans_store.computer_missing", "code refers to unknown computer")
                    .with_context("computer", computer)
                    .with_hint("register the computer before the code"),
            ));
        }
        let mut matches = find_codes(tx, Some(label))?;
        match matches.len() {
            0 => {
                let record = insert_code(tx, label, computer, executable, config)?;
                info!(label, computer, executable, "registered code");
                Ok(Resolution::Created(record))
            }
            1 => {
                let record = matches.remove(0);
                if &record.config != config {
                    return Err(conflicting("code", label));
                }
                Ok(Resolution::Existing(record))
            }
            _ => Err(duplicate("code", label, matches.iter().map(|c| c.id))),
        }
    })
}
