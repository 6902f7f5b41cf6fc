use std::collections::BTreeMap;

use fans_core::{FansError, TaggedValue, ValueKind};
use serde_json::json;

#[test]
fn json_values_map_onto_kinds() {
    let cases = [
        (json!("LinearElasticIsotropic"), ValueKind::Text),
        (json!(100), ValueKind::Integer),
        (json!(1e-10), ValueKind::Real),
        (json!([1.0, 1.0, 1.0]), ValueKind::Sequence),
        (json!({"measure": "Linfinity"}), ValueKind::Mapping),
    ];
    for (raw, kind) in cases {
        let value = TaggedValue::try_from(raw).expect("supported");
        assert_eq!(value.kind(), kind);
    }
}

#[test]
fn null_and_bool_are_unsupported() {
    for raw in [json!(null), json!(true)] {
        let err = TaggedValue::try_from(raw).expect_err("unsupported");
        assert!(matches!(err, FansError::UnsupportedKind(_)));
    }
}

#[test]
fn nested_tagged_yaml_is_unsupported() {
    for text in ["[!blob aGVsbG8=]", "{image: !blob aGVsbG8=}", "[[1, !custom x]]"] {
        let raw: serde_yaml::Value = serde_yaml::from_str(text).expect("yaml");
        let err = TaggedValue::try_from(raw).expect_err(text);
        assert!(matches!(err, FansError::UnsupportedKind(_)), "{text}");
    }
}

#[test]
fn non_finite_yaml_reals_are_named_as_such() {
    for text in [".nan", ".inf", "-.inf", "[1.0, .nan]"] {
        let raw: serde_yaml::Value = serde_yaml::from_str(text).expect("yaml");
        let err = TaggedValue::try_from(raw).expect_err(text);
        assert!(matches!(err, FansError::UnsupportedKind(_)), "{text}");
        assert_eq!(err.info().message, "non-finite real value", "{text}");
    }
}

#[test]
fn tagged_yaml_blob_is_unsupported() {
    let blob: serde_yaml::Value = serde_yaml::from_str("!blob aGVsbG8=").expect("yaml");
    let err = TaggedValue::try_from(blob).expect_err("unsupported");
    assert!(matches!(err, FansError::UnsupportedKind(_)));
}

#[test]
fn unknown_stored_kind_is_unsupported() {
    let err = TaggedValue::from_parts("bytes", "\"aGVsbG8=\"").expect_err("unsupported");
    assert!(matches!(err, FansError::UnsupportedKind(_)));
}

#[test]
fn non_finite_reals_have_no_canonical_text() {
    let err = TaggedValue::Real(f64::NAN).canonical_text().expect_err("nan");
    assert!(matches!(err, FansError::UnsupportedKind(_)));
}

#[test]
fn canonical_text_orders_mapping_keys() {
    let mut map = BTreeMap::new();
    map.insert("type".to_string(), json!("absolute"));
    map.insert("measure".to_string(), json!("Linfinity"));
    let value = TaggedValue::Mapping(map);
    assert_eq!(
        value.canonical_text().expect("text"),
        r#"{"measure":"Linfinity","type":"absolute"}"#
    );
}

#[test]
fn parts_rebuild_every_kind() {
    let values = [
        TaggedValue::from("cg"),
        TaggedValue::from(100_i64),
        TaggedValue::from(0.5_f64),
        TaggedValue::Sequence(vec![json!(1), json!("two")]),
        TaggedValue::Mapping([("a".to_string(), json!([1, 2]))].into_iter().collect()),
    ];
    for value in values {
        let text = value.canonical_text().expect("text");
        let back = TaggedValue::from_parts(value.kind().as_str(), &text).expect("decode");
        assert_eq!(back, value);
    }
}

#[test]
fn integer_and_real_are_distinct_identities() {
    let int = TaggedValue::from(100_i64);
    let real = TaggedValue::from(100.0_f64);
    assert_ne!(int.kind(), real.kind());
    assert_eq!(int.canonical_text().expect("int"), "100");
    assert_eq!(real.canonical_text().expect("real"), "100.0");
}
