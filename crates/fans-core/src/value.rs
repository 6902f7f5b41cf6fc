//! Closed set of value kinds that can back a tagged value record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ErrorInfo, FansError};
use crate::serde::to_canonical_json_string;

/// Discriminant of a [`TaggedValue`], persisted alongside the value text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// UTF-8 text.
    Text,
    /// Signed 64-bit integer.
    Integer,
    /// Finite double precision number.
    Real,
    /// Ordered sequence of JSON values.
    Sequence,
    /// String keyed mapping of JSON values.
    Mapping,
}

impl ValueKind {
    /// All supported kinds in declaration order.
    pub const ALL: [ValueKind; 5] = [
        ValueKind::Text,
        ValueKind::Integer,
        ValueKind::Real,
        ValueKind::Sequence,
        ValueKind::Mapping,
    ];

    /// Stable tag written to the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Real => "real",
            ValueKind::Sequence => "sequence",
            ValueKind::Mapping => "mapping",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = FansError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| unsupported(s, "unknown value kind tag"))
    }
}

/// A value with an explicit kind, constructed by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum TaggedValue {
    /// UTF-8 text.
    Text(String),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Finite double precision number.
    Real(f64),
    /// Ordered sequence of JSON values.
    Sequence(Vec<Value>),
    /// String keyed mapping of JSON values.
    Mapping(BTreeMap<String, Value>),
}

fn unsupported(found: &str, message: &str) -> FansError {
    FansError::UnsupportedKind(
        ErrorInfo::new("fans_core.unsupported_kind", message)
            .with_context("found", found)
            .with_hint("use text, integer, real, sequence or mapping"),
    )
}

impl TaggedValue {
    /// Returns the kind discriminant.
    pub fn kind(&self) -> ValueKind {
        match self {
            TaggedValue::Text(_) => ValueKind::Text,
            TaggedValue::Integer(_) => ValueKind::Integer,
            TaggedValue::Real(_) => ValueKind::Real,
            TaggedValue::Sequence(_) => ValueKind::Sequence,
            TaggedValue::Mapping(_) => ValueKind::Mapping,
        }
    }

    /// Plain JSON form of the value without the kind tag.
    pub fn to_json(&self) -> Value {
        match self {
            TaggedValue::Text(text) => Value::String(text.clone()),
            TaggedValue::Integer(int) => Value::from(*int),
            TaggedValue::Real(real) => Value::from(*real),
            TaggedValue::Sequence(items) => Value::Array(items.clone()),
            TaggedValue::Mapping(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
        }
    }

    /// Canonical JSON text used as the identity of the value in the store.
    ///
    /// Two values are the same record value iff their kinds and canonical texts match.
    pub fn canonical_text(&self) -> Result<String, FansError> {
        if let TaggedValue::Real(real) = self {
            if !real.is_finite() {
                return Err(unsupported(&real.to_string(), "non-finite real value"));
            }
        }
        to_canonical_json_string(&self.to_json())
    }

    /// Rebuilds a value from its persisted kind tag and canonical text.
    pub fn from_parts(kind: &str, text: &str) -> Result<Self, FansError> {
        let kind = ValueKind::from_str(kind)?;
        let raw: Value = serde_json::from_str(text)
            .map_err(|err| FansError::serde("fans_core.value_decode", err))?;
        let decoded = match (kind, raw) {
            (ValueKind::Text, Value::String(text)) => TaggedValue::Text(text),
            (ValueKind::Integer, Value::Number(num)) => match num.as_i64() {
                Some(int) => TaggedValue::Integer(int),
                None => return Err(unsupported(text, "integer exceeds signed 64-bit range")),
            },
            (ValueKind::Real, Value::Number(num)) => match num.as_f64() {
                Some(real) => TaggedValue::Real(real),
                None => return Err(unsupported(text, "real value out of range")),
            },
            (ValueKind::Sequence, Value::Array(items)) => TaggedValue::Sequence(items),
            (ValueKind::Mapping, Value::Object(map)) => {
                TaggedValue::Mapping(map.into_iter().collect())
            }
            (kind, other) => {
                return Err(FansError::Serde(
                    ErrorInfo::new("fans_core.value_shape", "stored text does not match kind")
                        .with_context("kind", kind.as_str())
                        .with_context("text", other.to_string()),
                ))
            }
        };
        Ok(decoded)
    }
}

impl fmt::Display for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaggedValue::Text(text) => write!(f, "{text}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for TaggedValue {
    fn from(value: &str) -> Self {
        TaggedValue::Text(value.to_string())
    }
}

impl From<String> for TaggedValue {
    fn from(value: String) -> Self {
        TaggedValue::Text(value)
    }
}

impl From<i64> for TaggedValue {
    fn from(value: i64) -> Self {
        TaggedValue::Integer(value)
    }
}

impl From<f64> for TaggedValue {
    fn from(value: f64) -> Self {
        TaggedValue::Real(value)
    }
}

impl TryFrom<Value> for TaggedValue {
    type Error = FansError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(TaggedValue::Text(text)),
            Value::Number(num) => {
                if let Some(int) = num.as_i64() {
                    Ok(TaggedValue::Integer(int))
                } else if num.is_u64() {
                    Err(unsupported(&num.to_string(), "integer exceeds signed 64-bit range"))
                } else {
                    num.as_f64()
                        .map(TaggedValue::Real)
                        .ok_or_else(|| unsupported(&num.to_string(), "unrepresentable number"))
                }
            }
            Value::Array(items) => Ok(TaggedValue::Sequence(items)),
            Value::Object(map) => Ok(TaggedValue::Mapping(map.into_iter().collect())),
            Value::Null => Err(unsupported("null", "null has no record kind")),
            Value::Bool(flag) => Err(unsupported(
                &flag.to_string(),
                "booleans have no record kind",
            )),
        }
    }
}

/// Rejects tagged nodes and non-finite floats anywhere in the tree; JSON has
/// no spelling for either.
fn check_yaml(value: &serde_yaml::Value) -> Result<(), FansError> {
    match value {
        serde_yaml::Value::Tagged(tagged) => Err(unsupported(
            &tagged.tag.to_string(),
            "tagged yaml scalars (binary blobs, custom types) have no record kind",
        )),
        serde_yaml::Value::Number(num) => match num.as_f64() {
            Some(real) if num.is_f64() && !real.is_finite() => {
                Err(unsupported(&num.to_string(), "non-finite real value"))
            }
            _ => Ok(()),
        },
        serde_yaml::Value::Sequence(items) => items.iter().try_for_each(check_yaml),
        serde_yaml::Value::Mapping(map) => map.iter().try_for_each(|(key, item)| {
            check_yaml(key)?;
            check_yaml(item)
        }),
        _ => Ok(()),
    }
}

impl TryFrom<serde_yaml::Value> for TaggedValue {
    type Error = FansError;

    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        check_yaml(&value)?;
        let json = serde_json::to_value(&value).map_err(|err| {
            unsupported(&err.to_string(), "yaml value is not representable as json")
        })?;
        TaggedValue::try_from(json)
    }
}
