//! Content-addressed identifier utilities.
//!
//! Every hashed identifier in the crate (hashed gensyms, deterministic gensyms,
//! the `DeterministicUUID` binding) goes through [`content_uuid`], so two call
//! sites hashing the same bytes always agree.
//!
//! ## Scheme
//!
//! ```text
//! SHA-256(content) -> first 16 bytes -> UUID (hyphenated, lowercase)
//! ```
//!
//! Version/variant bits are left as produced by the digest, the same way a raw
//! digest is reinterpreted as a UUID elsewhere in the pipeline.

use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hash arbitrary content into a UUID string.
///
/// # Examples
/// ```
/// use tablegraph::utils::content_uuid;
///
/// let a = content_uuid("row-1");
/// let b = content_uuid("row-1");
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 36);
/// ```
pub fn content_uuid(content: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(content.as_ref());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).hyphenated().to_string()
}

/// Serialize a JSON value with object keys sorted at every level.
///
/// Dependency vectors are hashed in this form so that key insertion order
/// (preserved by `serde_json`'s `preserve_order`) never changes an identifier.
pub fn canonical_json(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}
