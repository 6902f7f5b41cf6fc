#![deny(missing_docs)]
#![doc = "Core error taxonomy, tagged value model and canonical serialization helpers shared by the FANS workflow crates."]

pub mod errors;
pub mod hash;
pub mod serde;
pub mod value;

pub use errors::{ErrorInfo, FansError};
pub use hash::{file_sha256, stable_hash_string};
pub use self::serde::{
    from_json_slice, from_yaml_str, to_canonical_json_bytes, to_canonical_json_string,
    to_yaml_string,
};
pub use value::{TaggedValue, ValueKind};
