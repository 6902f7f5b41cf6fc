use std::collections::BTreeMap;

use fans_core::{FansError, TaggedValue, ValueKind};
use fans_store::{create_node, find_nodes, NodeFilter, NodePayload, Resolution, Session};
use serde_json::json;
use tempfile::tempdir;

fn session() -> Session {
    Session::in_memory(std::env::temp_dir()).expect("session")
}

fn sample(kind: ValueKind) -> TaggedValue {
    match kind {
        ValueKind::Text => TaggedValue::from("LinearElasticIsotropic"),
        ValueKind::Integer => TaggedValue::from(100_i64),
        ValueKind::Real => TaggedValue::from(1e-10_f64),
        ValueKind::Sequence => TaggedValue::Sequence(vec![json!(1.0), json!(1.0), json!(1.0)]),
        ValueKind::Mapping => {
            let mut map = BTreeMap::new();
            map.insert("measure".to_string(), json!("Linfinity"));
            map.insert("tolerance".to_string(), json!(1e-10));
            TaggedValue::Mapping(map)
        }
    }
}

#[test]
fn every_kind_is_created_once_then_reused() {
    let mut session = session();
    for kind in ValueKind::ALL {
        let label = format!("param_{kind}");
        let value = sample(kind);
        let first = session.resolve_value(&label, &value).expect("create");
        assert!(first.was_created(), "{kind} should be created");
        let second = session.resolve_value(&label, &value).expect("reuse");
        assert!(!second.was_created(), "{kind} should be reused");
        assert_eq!(first.record(), second.record());
        let stored = session.find_nodes(&NodeFilter::label(&label)).expect("find");
        assert_eq!(stored.len(), 1);
    }
}

#[test]
fn single_prior_match_is_returned_without_insert() {
    let mut session = session();
    let value = TaggedValue::from("cg");
    let seeded = create_node(session.conn(), "method", &NodePayload::Value(value.clone()))
        .expect("seed");
    let resolved = session.resolve_value("method", &value).expect("resolve");
    assert_eq!(resolved, Resolution::Existing(seeded));
    assert_eq!(session.find_nodes(&NodeFilter::label("method")).expect("find").len(), 1);
}

#[test]
fn two_prior_matches_are_ambiguous() {
    let mut session = session();
    let value = TaggedValue::from(100_i64);
    for _ in 0..2 {
        create_node(session.conn(), "n_it", &NodePayload::Value(value.clone())).expect("seed");
    }
    let err = session.resolve_value("n_it", &value).expect_err("ambiguous");
    match err {
        FansError::Duplicate(info) => assert_eq!(info.context.get("ids").map(String::as_str), Some("1,2")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn structural_equality_for_mappings() {
    let mut session = session();
    let a: TaggedValue = TaggedValue::try_from(json!({"type": "absolute", "measure": "Linfinity"}))
        .expect("mapping");
    let b: TaggedValue = TaggedValue::try_from(json!({"measure": "Linfinity", "type": "absolute"}))
        .expect("mapping");
    let first = session.resolve_value("error_parameters", &a).expect("create");
    let second = session.resolve_value("error_parameters", &b).expect("reuse");
    assert_eq!(first.record().id, second.record().id);
}

#[test]
fn n_it_scenario() {
    let mut session = session();
    let hundred = session
        .resolve_value("n_it", &TaggedValue::Integer(100))
        .expect("create 100");
    assert!(hundred.was_created());
    let again = session
        .resolve_value("n_it", &TaggedValue::Integer(100))
        .expect("reuse 100");
    assert_eq!(again, Resolution::Existing(hundred.record().clone()));
    let two_hundred = session
        .resolve_value("n_it", &TaggedValue::Integer(200))
        .expect("create 200");
    assert!(two_hundred.was_created());
    assert_ne!(two_hundred.record().id, hundred.record().id);
}

#[test]
fn unsupported_values_never_reach_the_store() {
    let mut session = session();
    let err = session
        .resolve_value("bad", &TaggedValue::Real(f64::INFINITY))
        .expect_err("unsupported");
    assert!(matches!(err, FansError::UnsupportedKind(_)));
    assert!(session.find_nodes(&NodeFilter::default()).expect("find").is_empty());
}

#[test]
fn empty_labels_are_rejected() {
    let mut session = session();
    let err = session
        .resolve_value("  ", &TaggedValue::from("x"))
        .expect_err("empty");
    assert!(matches!(err, FansError::Config(_)));
}

#[test]
fn same_file_under_same_label_is_reused() {
    let dir = tempdir().expect("dir");
    let path = dir.path().join("sphere32.h5");
    std::fs::write(&path, b"hdf5-bytes").expect("write");
    let mut session = session();
    let first = session.resolve_file("microstructure", &path).expect("register");
    assert!(first.was_created());
    let second = session.resolve_file("microstructure", &path).expect("reuse");
    assert_eq!(first.record().id, second.record().id);
    match &second.record().payload {
        NodePayload::File { sha256, .. } => assert_eq!(sha256.len(), 64),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn other_file_under_same_label_is_a_new_node() {
    let dir = tempdir().expect("dir");
    let small = dir.path().join("sphere32.h5");
    let large = dir.path().join("sphere64.h5");
    std::fs::write(&small, b"32 voxels").expect("write");
    std::fs::write(&large, b"64 voxels").expect("write");
    let mut session = session();
    let first = session.resolve_file("microstructure", &small).expect("first");
    let second = session.resolve_file("microstructure", &large).expect("second");
    assert!(second.was_created());
    assert_ne!(first.record().id, second.record().id);
    match &second.record().payload {
        NodePayload::File { path, .. } => assert_eq!(path, &large.display().to_string()),
        other => panic!("unexpected payload {other:?}"),
    }
    let again = session.resolve_file("microstructure", &small).expect("again");
    assert_eq!(again.record().id, first.record().id);
}

#[test]
fn rewritten_file_is_registered_again() {
    let dir = tempdir().expect("dir");
    let path = dir.path().join("sphere32.h5");
    std::fs::write(&path, b"before").expect("write");
    let mut session = session();
    let first = session.resolve_file("microstructure", &path).expect("first");
    std::fs::write(&path, b"after").expect("rewrite");
    let second = session.resolve_file("microstructure", &path).expect("second");
    assert!(second.was_created());
    assert_ne!(first.record().id, second.record().id);
}

#[test]
fn missing_file_is_not_registered() {
    let mut session = session();
    let err = session
        .resolve_file("microstructure", std::path::Path::new("/nonexistent/ms.h5"))
        .expect_err("missing");
    assert!(matches!(err, FansError::NotFound(_)));
    let nodes = find_nodes(session.conn(), &NodeFilter::default()).expect("find");
    assert!(nodes.is_empty());
}

#[test]
fn resolution_survives_reconnect() {
    let dir = tempdir().expect("dir");
    let config = fans_store::SessionConfig {
        store: dir.path().join("db/records.sqlite"),
        work_dir: dir.path().join("jobs"),
    };
    let mut first = Session::connect(config.clone()).expect("connect");
    let created = first
        .resolve_value("problem_type", &TaggedValue::from("mechanical"))
        .expect("create");
    first.close().expect("close");
    let mut second = Session::connect(config).expect("reconnect");
    let reused = second
        .resolve_value("problem_type", &TaggedValue::from("mechanical"))
        .expect("reuse");
    assert_eq!(reused, Resolution::Existing(created.into_record()));
}
