use chrono::Utc;
use fans_core::errors::{ErrorInfo, FansError};
use fans_core::TaggedValue;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SCHEMA_VERSION: i64 = 1;

/// Kind tag used for file-backed nodes in the `nodes.kind` column.
pub const FILE_KIND: &str = "file";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodePayload {
    Value(TaggedValue),
    File { path: String, sha256: String },
}

impl NodePayload {
    pub fn kind_tag(&self) -> &'static str {
        match self {
            NodePayload::Value(value) => value.kind().as_str(),
            NodePayload::File { .. } => FILE_KIND,
        }
    }

    pub fn as_value(&self) -> Option<&TaggedValue> {
        match self {
            NodePayload::Value(value) => Some(value),
            NodePayload::File { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: i64,
    pub label: String,
    pub payload: NodePayload,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum GroupMember {
    Node(i64),
    Job(i64),
}

impl GroupMember {
    fn parts(&self) -> (&'static str, i64) {
        match self {
            GroupMember::Node(id) => ("node", *id),
            GroupMember::Job(id) => ("job", *id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputerRecord {
    pub id: i64,
    pub label: String,
    pub hostname: String,
    pub config: Value,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeRecord {
    pub id: i64,
    pub label: String,
    pub computer: String,
    pub executable: String,
    pub config: Value,
    pub created_at: String,
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn store_error(code: &str, err: impl ToString) -> FansError {
    FansError::store(code, err)
}

pub fn init_schema(conn: &Connection) -> Result<(), FansError> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS meta(version INTEGER NOT NULL);
        CREATE TABLE IF NOT EXISTS nodes(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            kind TEXT NOT NULL,
            value TEXT,
            path TEXT,
            sha256 TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS nodes_label ON nodes(label, kind);
        CREATE TABLE IF NOT EXISTS groups(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS group_members(
            group_id INTEGER NOT NULL,
            member_kind TEXT NOT NULL,
            member_id INTEGER NOT NULL,
            PRIMARY KEY(group_id, member_kind, member_id),
            FOREIGN KEY(group_id) REFERENCES groups(id)
        );
        CREATE TABLE IF NOT EXISTS computers(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            hostname TEXT NOT NULL,
            config TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS codes(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            computer TEXT NOT NULL,
            executable TEXT NOT NULL,
            config TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS jobs(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            code TEXT NOT NULL,
            status TEXT NOT NULL,
            exit_code INTEGER,
            inputs TEXT NOT NULL,
            work_dir TEXT NOT NULL,
            results_path TEXT,
            log_path TEXT,
            submitted_at TEXT NOT NULL,
            finished_at TEXT
        );
        COMMIT;",
    )
    .map_err(|err| store_error("fans_store.schema", err))?;
    set_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

fn set_version(conn: &Connection, version: i64) -> Result<(), FansError> {
    let existing: Option<i64> = conn
        .query_row("SELECT version FROM meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| store_error("fans_store.schema", err))?;
    match existing {
        Some(current) if current == version => Ok(()),
        Some(current) => Err(FansError::Store(
            ErrorInfo::new(
                "fans_store.schema_version",
                format!("store schema {current} incompatible with expected {version}"),
            )
            .with_hint("point --store at a fresh database"),
        )),
        None => {
            conn.execute("INSERT INTO meta(version) VALUES (?)", params![version])
                .map_err(|err| store_error("fans_store.schema", err))?;
            Ok(())
        }
    }
}

pub(crate) const NODE_COLUMNS: &str = "id, label, kind, value, path, sha256, created_at";

/// Decodes a `nodes` row selected with [`NODE_COLUMNS`].
///
/// Kind decoding happens after the row is read so that an unknown kind tag
/// surfaces as `UnsupportedKind` rather than a SQLite error.
pub(crate) fn read_node_row(row: &Row<'_>) -> rusqlite::Result<RawNode> {
    Ok(RawNode {
        id: row.get(0)?,
        label: row.get(1)?,
        kind: row.get(2)?,
        value: row.get(3)?,
        path: row.get(4)?,
        sha256: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub(crate) struct RawNode {
    id: i64,
    label: String,
    kind: String,
    value: Option<String>,
    path: Option<String>,
    sha256: Option<String>,
    created_at: String,
}

impl RawNode {
    pub(crate) fn decode(self) -> Result<NodeRecord, FansError> {
        let payload = if self.kind == FILE_KIND {
            NodePayload::File {
                path: self.path.unwrap_or_default(),
                sha256: self.sha256.unwrap_or_default(),
            }
        } else {
            let text = self.value.ok_or_else(|| {
                FansError::Store(
                    ErrorInfo::new("fans_store.node_value", "value node without value text")
                        .with_context("id", self.id.to_string()),
                )
            })?;
            NodePayload::Value(TaggedValue::from_parts(&self.kind, &text)?)
        };
        Ok(NodeRecord {
            id: self.id,
            label: self.label,
            payload,
            created_at: self.created_at,
        })
    }
}

/// Unconditionally persists a new node.
///
/// Prefer [`crate::resolve::resolve_value`] or [`crate::resolve::resolve_file`],
/// which only create a node when no matching one exists.
pub fn create_node(
    conn: &Connection,
    label: &str,
    payload: &NodePayload,
) -> Result<NodeRecord, FansError> {
    let created_at = now();
    let (value, path, sha256) = match payload {
        NodePayload::Value(value) => (Some(value.canonical_text()?), None, None),
        NodePayload::File { path, sha256 } => (None, Some(path.as_str()), Some(sha256.as_str())),
    };
    conn.execute(
        "INSERT INTO nodes(label, kind, value, path, sha256, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        params![label, payload.kind_tag(), value, path, sha256, created_at],
    )
    .map_err(|err| store_error("fans_store.insert_node", err))?;
    Ok(NodeRecord {
        id: conn.last_insert_rowid(),
        label: label.to_string(),
        payload: payload.clone(),
        created_at,
    })
}

pub fn load_node(conn: &Connection, id: i64) -> Result<NodeRecord, FansError> {
    let raw = conn
        .query_row(
            &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?"),
            [id],
            read_node_row,
        )
        .optional()
        .map_err(|err| store_error("fans_store.query", err))?;
    match raw {
        Some(raw) => raw.decode(),
        None => Err(FansError::NotFound(
            ErrorInfo::new("fans_store.node_missing", "no node with this identifier")
                .with_context("id", id.to_string()),
        )),
    }
}

pub fn load_nodes(conn: &Connection) -> Result<Vec<NodeRecord>, FansError> {
    let mut stmt = conn
        .prepare(&format!("SELECT {NODE_COLUMNS} FROM nodes ORDER BY id"))
        .map_err(|err| store_error("fans_store.query", err))?;
    let rows = stmt
        .query_map([], read_node_row)
        .map_err(|err| store_error("fans_store.query", err))?;
    let raws = rows
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| store_error("fans_store.query", err))?;
    raws.into_iter().map(RawNode::decode).collect()
}

/// Unconditionally persists a new group. See [`crate::resolve::resolve_group`].
pub fn create_group(conn: &Connection, name: &str) -> Result<GroupRecord, FansError> {
    let created_at = now();
    conn.execute(
        "INSERT INTO groups(name, created_at) VALUES (?, ?)",
        params![name, created_at],
    )
    .map_err(|err| store_error("fans_store.insert_group", err))?;
    Ok(GroupRecord {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        created_at,
    })
}

pub(crate) fn find_groups(conn: &Connection, name: &str) -> Result<Vec<GroupRecord>, FansError> {
    let mut stmt = conn
        .prepare("SELECT id, name, created_at FROM groups WHERE name = ? ORDER BY id")
        .map_err(|err| store_error("fans_store.query", err))?;
    let rows = stmt
        .query_map([name], |row| {
            Ok(GroupRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })
        .map_err(|err| store_error("fans_store.query", err))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|err| store_error("fans_store.query", err))
}

pub fn load_groups(conn: &Connection) -> Result<Vec<GroupRecord>, FansError> {
    let mut stmt = conn
        .prepare("SELECT id, name, created_at FROM groups ORDER BY id")
        .map_err(|err| store_error("fans_store.query", err))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(GroupRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })
        .map_err(|err| store_error("fans_store.query", err))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|err| store_error("fans_store.query", err))
}

/// Loads the single group with `name`, failing on zero or several matches.
pub fn load_group(conn: &Connection, name: &str) -> Result<GroupRecord, FansError> {
    let mut groups = find_groups(conn, name)?;
    match groups.len() {
        0 => Err(FansError::NotFound(
            ErrorInfo::new("fans_store.group_missing", "no group with this name")
                .with_context("name", name),
        )),
        1 => Ok(groups.remove(0)),
        count => Err(FansError::Duplicate(
            ErrorInfo::new("fans_store.duplicate_group", "several groups share this name")
                .with_context("name", name)
                .with_context("count", count.to_string()),
        )),
    }
}

/// Adds members to a group. Adding an existing member is a no-op.
pub fn add_group_members(
    conn: &Connection,
    group_id: i64,
    members: &[GroupMember],
) -> Result<(), FansError> {
    for member in members {
        let (kind, id) = member.parts();
        conn.execute(
            "INSERT OR IGNORE INTO group_members(group_id, member_kind, member_id) VALUES (?, ?, ?)",
            params![group_id, kind, id],
        )
        .map_err(|err| store_error("fans_store.insert_member", err))?;
    }
    Ok(())
}

pub fn group_members(conn: &Connection, group_id: i64) -> Result<Vec<GroupMember>, FansError> {
    let mut stmt = conn
        .prepare(
            "SELECT member_kind, member_id FROM group_members WHERE group_id = ? ORDER BY member_kind, member_id",
        )
        .map_err(|err| store_error("fans_store.query", err))?;
    let rows = stmt
        .query_map([group_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(|err| store_error("fans_store.query", err))?;
    let mut members = Vec::new();
    for row in rows {
        let (kind, id) = row.map_err(|err| store_error("fans_store.query", err))?;
        let member = match kind.as_str() {
            "node" => GroupMember::Node(id),
            "job" => GroupMember::Job(id),
            other => {
                return Err(FansError::Store(
                    ErrorInfo::new("fans_store.member_kind", "unknown group member kind")
                        .with_context("kind", other),
                ))
            }
        };
        members.push(member);
    }
    Ok(members)
}

fn decode_config(text: &str) -> rusqlite::Result<Value> {
    serde_json::from_str(text).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })
}

pub(crate) fn find_computers(
    conn: &Connection,
    label: Option<&str>,
) -> Result<Vec<ComputerRecord>, FansError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, label, hostname, config, created_at FROM computers
             WHERE (?1 IS NULL OR label = ?1) ORDER BY id",
        )
        .map_err(|err| store_error("fans_store.query", err))?;
    let rows = stmt
        .query_map(params![label], |row| {
            Ok(ComputerRecord {
                id: row.get(0)?,
                label: row.get(1)?,
                hostname: row.get(2)?,
                config: decode_config(&row.get::<_, String>(3)?)?,
                created_at: row.get(4)?,
            })
        })
        .map_err(|err| store_error("fans_store.query", err))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|err| store_error("fans_store.query", err))
}

pub(crate) fn find_codes(
    conn: &Connection,
    label: Option<&str>,
) -> Result<Vec<CodeRecord>, FansError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, label, computer, executable, config, created_at FROM codes
             WHERE (?1 IS NULL OR label = ?1) ORDER BY id",
        )
        .map_err(|err| store_error("fans_store.query", err))?;
    let rows = stmt
        .query_map(params![label], |row| {
            Ok(CodeRecord {
                id: row.get(0)?,
                label: row.get(1)?,
                computer: row.get(2)?,
                executable: row.get(3)?,
                config: decode_config(&row.get::<_, String>(4)?)?,
                created_at: row.get(5)?,
            })
        })
        .map_err(|err| store_error("fans_store.query", err))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|err| store_error("fans_store.query", err))
}

pub fn load_computers(conn: &Connection) -> Result<Vec<ComputerRecord>, FansError> {
    find_computers(conn, None)
}

pub fn load_codes(conn: &Connection) -> Result<Vec<CodeRecord>, FansError> {
    find_codes(conn, None)
}

fn single<T>(mut found: Vec<T>, what: &str, label: &str) -> Result<T, FansError> {
    match found.len() {
        0 => Err(FansError::NotFound(
            ErrorInfo::new(format!("fans_store.{what}_missing"), format!("no {what} with this label"))
                .with_context("label", label)
                .with_hint(format!("register the {what} first")),
        )),
        1 => Ok(found.remove(0)),
        count => Err(FansError::Duplicate(
            ErrorInfo::new(format!("fans_store.duplicate_{what}"), format!("several {what}s share this label"))
                .with_context("label", label)
                .with_context("count", count.to_string()),
        )),
    }
}

pub fn load_computer(conn: &Connection, label: &str) -> Result<ComputerRecord, FansError> {
    single(find_computers(conn, Some(label))?, "computer", label)
}

pub fn load_code(conn: &Connection, label: &str) -> Result<CodeRecord, FansError> {
    single(find_codes(conn, Some(label))?, "code", label)
}

pub(crate) fn insert_computer(
    conn: &Connection,
    label: &str,
    hostname: &str,
    config: &Value,
) -> Result<ComputerRecord, FansError> {
    let created_at = now();
    let text = fans_core::to_canonical_json_string(config)?;
    conn.execute(
        "INSERT INTO computers(label, hostname, config, created_at) VALUES (?, ?, ?, ?)",
        params![label, hostname, text, created_at],
    )
    .map_err(|err| store_error("fans_store.insert_computer", err))?;
    Ok(ComputerRecord {
        id: conn.last_insert_rowid(),
        label: label.to_string(),
        hostname: hostname.to_string(),
        config: config.clone(),
        created_at,
    })
}

pub(crate) fn insert_code(
    conn: &Connection,
    label: &str,
    computer: &str,
    executable: &str,
    config: &Value,
) -> Result<CodeRecord, FansError> {
    let created_at = now();
    let text = fans_core::to_canonical_json_string(config)?;
    conn.execute(
        "INSERT INTO codes(label, computer, executable, config, created_at) VALUES (?, ?, ?, ?, ?)",
        params![label, computer, executable, text, created_at],
    )
    .map_err(|err| store_error("fans_store.insert_code", err))?;
    Ok(CodeRecord {
        id: conn.last_insert_rowid(),
        label: label.to_string(),
        computer: computer.to_string(),
        executable: executable.to_string(),
        config: config.clone(),
        created_at,
    })
}
