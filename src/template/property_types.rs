//! Declared property types from a graph schema document.
//!
//! The schema is a JSON-LD style document whose `@graph` lists property
//! definitions. Every definition carrying a `rangeIncludes` edge contributes
//! `property → range` (both as names relative to the namespace). A schema that
//! cannot be fetched or parsed degrades to an empty index: every property is
//! then typed from its value's own shape.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::vocabulary::Vocabulary;

pub type PropertyTypeMap = HashMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyTypeIndex {
    types: PropertyTypeMap,
}

impl PropertyTypeIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a local path or an `http(s)://` URL. Never fails; problems
    /// are logged and yield an empty index.
    pub fn load(source: &str, vocabulary: &Vocabulary) -> Self {
        let document = if source.starts_with("http://") || source.starts_with("https://") {
            fetch_remote(source)
        } else if Path::new(source).exists() {
            read_local(source)
        } else {
            log::warn!("Schema source '{}' not found, using undeclared types", source);
            None
        };

        match document {
            Some(doc) => {
                let index = Self::from_document(&doc, vocabulary);
                log::info!("Loaded {} declared property types from {}", index.len(), source);
                index
            }
            None => Self::empty(),
        }
    }

    /// Extract declared ranges from an already-parsed schema document.
    pub fn from_document(document: &Value, vocabulary: &Vocabulary) -> Self {
        let range_key = vocabulary.expand("rangeIncludes");
        let mut types = PropertyTypeMap::new();

        let Some(graph) = document.get("@graph").and_then(Value::as_array) else {
            log::warn!("Schema document has no @graph array");
            return Self::empty();
        };

        for node in graph {
            let Some(id) = node.get("@id").and_then(Value::as_str) else {
                continue;
            };
            let Some(range) = node.get(&range_key).and_then(range_id) else {
                continue;
            };
            types.insert(
                vocabulary.local_name(id).to_string(),
                vocabulary.local_name(range).to_string(),
            );
        }

        PropertyTypeIndex { types }
    }

    pub fn declared_type(&self, property: &str) -> Option<&str> {
        self.types.get(property).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyTypeIndex {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        PropertyTypeIndex {
            types: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// `{"@id": ...}`, a list of those (first wins), or a bare string.
fn range_id(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("@id").and_then(Value::as_str),
        Value::Array(items) => items.iter().find_map(range_id),
        _ => None,
    }
}

fn read_local(path: &str) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::error!("Could not read schema file {}: {}", path, e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(doc) => Some(doc),
        Err(e) => {
            log::error!("Could not parse schema file {}: {}", path, e);
            None
        }
    }
}

fn fetch_remote(url: &str) -> Option<Value> {
    let response = reqwest::blocking::get(url).and_then(|r| r.error_for_status());
    match response.and_then(|r| r.json::<Value>()) {
        Ok(doc) => Some(doc),
        Err(e) => {
            log::error!("Could not retrieve schema from external server {}: {}", url, e);
            None
        }
    }
}
