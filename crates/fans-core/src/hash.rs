//! Content hashing helpers.

use std::fs;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::{ErrorInfo, FansError};
use crate::serde::to_canonical_json_bytes;

/// Computes a stable hexadecimal hash for the provided serializable payload.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, FansError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(hex::encode(Sha256::digest(bytes)))
}

/// Hashes the content of a file on disk.
pub fn file_sha256(path: &Path) -> Result<String, FansError> {
    let bytes = fs::read(path).map_err(|err| {
        FansError::NotFound(
            ErrorInfo::new("fans_core.file_read", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    Ok(hex::encode(Sha256::digest(bytes)))
}
