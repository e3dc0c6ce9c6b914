pub mod content_hash;

pub use content_hash::{canonical_json, content_uuid};
