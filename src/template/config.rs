use super::errors::TemplateError;
use crate::binding::Binding;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Dataset templates describe how each row of a source table becomes a set
/// of entities. They are written in JSON (or YAML) with this structure:
///
/// ```json
/// {
///   "TEMPLATE": [
///     ["Person", {"GENSYM": "p1", "name": ["name"], "GENSYM_a1": ["address"]}],
///     ["AddressLocation", {"GENSYM": "a1", "city": ["locationCity"]}]
///   ],
///   "SUBTEMPLATES": {
///     "pets": {
///       "TEMPLATE": [["Pet", {"GENSYM": "pet1", "pet": ["name"]}]],
///       "ITERABLE": [["BIND_pets", "pet"]]
///     }
///   },
///   "BIND": {
///     "BIND_pets": {"FUNCTION": "SplitColumn", "DATA": {"Column": "pets", "Delimiter": ";"}}
///   },
///   "OPTIONS": {"HASHED_IDS": true}
/// }
/// ```
///
/// Property keys inside an entry:
///
/// - `GENSYM` declares the entry's symbolic identifier
/// - `GENSYM_<name>` links to another entry's identifier
/// - `SUBTEMPLATE_<sub>.GENSYM_<name>` expands `<sub>` once per element of its
///   iterable column and links to the identifier `<name>` of each expansion
/// - anything else is a column name
///
/// Every key but `GENSYM` maps to the predicate(s) used for the statement.
///
/// # Usage
///
/// ```ignore
/// use tablegraph::template::TemplateSpec;
///
/// let spec = TemplateSpec::from_file("specs/people.json")?;
/// for entry in &spec.entries {
///     println!("{} -> {}", entry.gensym, entry.entity_type);
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSpec {
    /// Entries in declaration order
    pub entries: Vec<TemplateEntry>,
    pub subtemplates: HashMap<String, Subtemplate>,
    /// Bindings in declaration order
    pub bindings: Vec<NamedBinding>,
    pub options: SpecOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEntry {
    pub entity_type: String,
    pub gensym: String,
    /// Properties in declaration order, including the type declaration
    pub properties: Vec<PropertyRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRule {
    pub target: PropertyTarget,
    pub predicates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyTarget {
    /// The `GENSYM` key: emits the entity's type statement
    TypeDeclaration,
    /// Data column whose value becomes the object
    Column(String),
    /// Link to an identifier resolved in this scope or inherited from a parent
    Gensym(String),
    /// Repeated sub-entity
    Subtemplate { name: String, gensym: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedBinding {
    pub name: String,
    pub binding: Binding,
}

/// Nested template repeated once per element of `iteration.source`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtemplate {
    pub spec: TemplateSpec,
    pub iteration: Iteration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iteration {
    /// Column holding the collection to iterate
    pub source: String,
    /// Column name each element is bound to inside the subtemplate
    pub variable: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecOptions {
    /// Hash (sub-iteration, gensym, file, row) instead of minting random ids
    pub hashed_ids: bool,
    /// Enrich address entities through the geocoder
    pub geolookup: bool,
    /// Entity classes the geocoder is consulted for
    pub geolookup_classes: Vec<String>,
}

impl Default for SpecOptions {
    fn default() -> Self {
        SpecOptions {
            hashed_ids: false,
            geolookup: false,
            geolookup_classes: default_geolookup_classes(),
        }
    }
}

fn default_geolookup_classes() -> Vec<String> {
    vec!["AddressLocation".to_string()]
}

impl TemplateEntry {
    pub fn column_rules(&self) -> impl Iterator<Item = (&str, &PropertyRule)> {
        self.properties.iter().filter_map(|rule| match &rule.target {
            PropertyTarget::Column(column) => Some((column.as_str(), rule)),
            _ => None,
        })
    }
}

impl SpecOptions {
    pub fn geocodes(&self, entity_type: &str) -> bool {
        self.geolookup && self.geolookup_classes.iter().any(|c| c == entity_type)
    }
}

// ===== Raw document shape =====

#[derive(Debug, Deserialize)]
struct RawSpec {
    #[serde(rename = "TEMPLATE")]
    template: Vec<(String, Map<String, Value>)>,
    #[serde(rename = "SUBTEMPLATES", default)]
    subtemplates: HashMap<String, RawSpec>,
    #[serde(rename = "BIND", default)]
    bind: Map<String, Value>,
    #[serde(rename = "OPTIONS", default)]
    options: Option<RawOptions>,
    #[serde(rename = "ITERABLE", default)]
    iterable: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct RawOptions {
    #[serde(rename = "HASHED_IDS", default)]
    hashed_ids: bool,
    #[serde(rename = "GEOLOOKUP", default)]
    geolookup: bool,
    #[serde(rename = "GEOLOOKUP_CLASSES", default)]
    geolookup_classes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawBinding {
    #[serde(rename = "FUNCTION")]
    function: String,
    #[serde(rename = "DATA", default)]
    data: Value,
}

const GENSYM_KEY: &str = "GENSYM";
const GENSYM_PREFIX: &str = "GENSYM_";
const SUBTEMPLATE_PREFIX: &str = "SUBTEMPLATE_";

impl TemplateSpec {
    /// Load a template from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| TemplateError::read_error_with_context(path.display().to_string(), e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self, TemplateError> {
        let raw: RawSpec = serde_json::from_str(content).map_err(|e| TemplateError::ParseError {
            error: e.to_string(),
        })?;
        Self::from_raw(raw, None)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, TemplateError> {
        let raw: RawSpec = serde_yaml::from_str(content).map_err(|e| TemplateError::ParseError {
            error: e.to_string(),
        })?;
        Self::from_raw(raw, None)
    }

    pub fn from_json_value(value: Value) -> Result<Self, TemplateError> {
        let raw: RawSpec = serde_json::from_value(value).map_err(|e| TemplateError::ParseError {
            error: e.to_string(),
        })?;
        Self::from_raw(raw, None)
    }

    pub fn subtemplate(&self, name: &str) -> Option<&Subtemplate> {
        self.subtemplates.get(name)
    }

    /// Gensyms declared by this scope's entries, first declaration first.
    pub fn declared_gensyms(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.gensym.as_str()) {
                seen.push(entry.gensym.as_str());
            }
        }
        seen
    }

    /// Build a spec from its raw document. Subtemplates without their own
    /// OPTIONS inherit `parent_options`.
    fn from_raw(raw: RawSpec, parent_options: Option<&SpecOptions>) -> Result<Self, TemplateError> {
        let options = match raw.options {
            Some(o) => SpecOptions {
                hashed_ids: o.hashed_ids,
                geolookup: o.geolookup,
                geolookup_classes: o.geolookup_classes.unwrap_or_else(default_geolookup_classes),
            },
            None => parent_options.cloned().unwrap_or_default(),
        };

        let mut bindings = Vec::with_capacity(raw.bind.len());
        for (name, value) in raw.bind {
            let decl: RawBinding =
                serde_json::from_value(value).map_err(|e| TemplateError::ParseError {
                    error: format!("binding `{}`: {}", name, e),
                })?;
            let binding = Binding::resolve(&name, &decl.function, decl.data)?;
            bindings.push(NamedBinding { name, binding });
        }

        let mut subtemplates = HashMap::with_capacity(raw.subtemplates.len());
        for (name, mut sub) in raw.subtemplates {
            if sub.iterable.is_empty() {
                return Err(TemplateError::MissingIterable { subtemplate: name });
            }
            let (source, variable) = sub.iterable.remove(0);
            let spec = Self::from_raw(sub, Some(&options))?;
            subtemplates.insert(
                name,
                Subtemplate {
                    spec,
                    iteration: Iteration { source, variable },
                },
            );
        }

        let entries = raw
            .template
            .into_iter()
            .map(|(entity_type, props)| parse_entry(entity_type, props))
            .collect::<Result<Vec<_>, _>>()?;

        for entry in &entries {
            for rule in &entry.properties {
                if let PropertyTarget::Subtemplate { name, .. } = &rule.target {
                    if !subtemplates.contains_key(name) {
                        return Err(TemplateError::UnknownSubtemplate {
                            entity: entry.entity_type.clone(),
                            subtemplate: name.clone(),
                        });
                    }
                }
            }
        }

        Ok(TemplateSpec {
            entries,
            subtemplates,
            bindings,
            options,
        })
    }
}

fn parse_entry(entity_type: String, props: Map<String, Value>) -> Result<TemplateEntry, TemplateError> {
    let mut gensym = None;
    let mut properties = Vec::with_capacity(props.len());

    for (key, value) in props {
        if key == GENSYM_KEY {
            let name = value.as_str().ok_or_else(|| TemplateError::InvalidGensym {
                entity: entity_type.clone(),
            })?;
            gensym = Some(name.to_string());
            properties.push(PropertyRule {
                target: PropertyTarget::TypeDeclaration,
                predicates: Vec::new(),
            });
            continue;
        }

        let target = parse_property_key(&entity_type, &key)?;
        let predicates = parse_predicates(&value).ok_or_else(|| TemplateError::InvalidPredicates {
            entity: entity_type.clone(),
            key: key.clone(),
        })?;
        properties.push(PropertyRule { target, predicates });
    }

    let gensym = gensym.ok_or_else(|| TemplateError::MissingGensym {
        entity: entity_type.clone(),
    })?;

    Ok(TemplateEntry {
        entity_type,
        gensym,
        properties,
    })
}

fn parse_property_key(entity_type: &str, key: &str) -> Result<PropertyTarget, TemplateError> {
    let malformed = || TemplateError::InvalidPropertyKey {
        entity: entity_type.to_string(),
        key: key.to_string(),
    };

    if let Some(rest) = key.strip_prefix(SUBTEMPLATE_PREFIX) {
        let (name, gensym_part) = rest.split_once('.').ok_or_else(malformed)?;
        let gensym = gensym_part.strip_prefix(GENSYM_PREFIX).ok_or_else(malformed)?;
        if name.is_empty() || gensym.is_empty() {
            return Err(malformed());
        }
        return Ok(PropertyTarget::Subtemplate {
            name: name.to_string(),
            gensym: gensym.to_string(),
        });
    }

    if let Some(target) = key.strip_prefix(GENSYM_PREFIX) {
        if target.is_empty() {
            return Err(malformed());
        }
        return Ok(PropertyTarget::Gensym(target.to_string()));
    }

    Ok(PropertyTarget::Column(key.to_string()))
}

fn parse_predicates(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}
