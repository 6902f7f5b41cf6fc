//! Record store for FANS workflow sessions.
//!
//! Records live in a single SQLite database. Value records, file records,
//! groups, computers and codes are created through get-or-insert resolution
//! so that a label/value pair maps onto at most one stored record.

pub mod export;
pub mod jobs;
pub mod query;
pub mod resolve;
pub mod schema;
pub mod session;

pub use export::{export_csv, export_json, ExportTable, StoreSnapshot};
pub use jobs::{finish_job, insert_job, load_job, JobRecord, JobStatus, NewJob};
pub use query::{find_jobs, find_nodes, first_node, JobFilter, NodeFilter};
pub use resolve::{
    resolve_code, resolve_computer, resolve_file, resolve_group, resolve_value, Resolution,
};
pub use schema::{
    add_group_members, create_group, create_node, group_members, init_schema, load_code,
    load_computer, load_group, load_node, CodeRecord, ComputerRecord, GroupMember, GroupRecord,
    NodePayload, NodeRecord,
};
pub use session::{Session, SessionConfig};
