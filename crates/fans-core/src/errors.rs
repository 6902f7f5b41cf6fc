//! Structured error types shared across the FANS workflow crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`FansError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (labels, identifiers, paths).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the FANS workflow crates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum FansError {
    /// Record store failures (SQLite, schema, transactions).
    #[error("store error: {0}")]
    Store(ErrorInfo),
    /// Ambiguous resolution: more than one record matched a lookup.
    #[error("duplicate records: {0}")]
    Duplicate(ErrorInfo),
    /// A value whose kind has no tagged record representation.
    #[error("unsupported kind: {0}")]
    UnsupportedKind(ErrorInfo),
    /// A record addressed by identifier or label does not exist.
    #[error("not found: {0}")]
    NotFound(ErrorInfo),
    /// Invalid user supplied configuration or plan.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Job execution failures raised by an engine.
    #[error("engine error: {0}")]
    Engine(ErrorInfo),
    /// Serialization and filesystem errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl FansError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            FansError::Store(info)
            | FansError::Duplicate(info)
            | FansError::UnsupportedKind(info)
            | FansError::NotFound(info)
            | FansError::Config(info)
            | FansError::Engine(info)
            | FansError::Serde(info) => info,
        }
    }

    /// Shorthand for a [`FansError::Store`] built from any displayable cause.
    pub fn store(code: &str, err: impl ToString) -> Self {
        FansError::Store(ErrorInfo::new(code, err.to_string()))
    }

    /// Shorthand for a [`FansError::Serde`] built from any displayable cause.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        FansError::Serde(ErrorInfo::new(code, err.to_string()))
    }

    /// Shorthand for a [`FansError::Config`] built from any displayable cause.
    pub fn config(code: &str, err: impl ToString) -> Self {
        FansError::Config(ErrorInfo::new(code, err.to_string()))
    }
}
