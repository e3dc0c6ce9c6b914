//! IRI construction for entity classes, properties and identifiers.

pub const DEFAULT_NAMESPACE: &str = "http://schema.localhost";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema#";

/// Namespace that bare names (classes, predicates, gensym values) are placed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    namespace: String,
}

impl Vocabulary {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace: String = namespace.into();
        Vocabulary {
            namespace: namespace.trim_end_matches('/').to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Full IRI for a name. Absolute IRIs pass through unchanged.
    pub fn expand(&self, name: &str) -> String {
        if is_absolute(name) {
            name.to_string()
        } else {
            format!("{}/{}", self.namespace, name)
        }
    }

    /// Angle-bracketed resource token for a name. Bare names are
    /// percent-encoded, so binding-sourced identifiers with spaces or
    /// brackets still form a valid IRI.
    pub fn resource(&self, name: &str) -> String {
        if is_absolute(name) {
            iri_token(name)
        } else {
            format!("<{}/{}>", self.namespace, urlencoding::encode(name))
        }
    }

    /// Name relative to the namespace, or the input when it lies outside it.
    pub fn local_name<'n>(&self, iri: &'n str) -> &'n str {
        iri.strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(iri)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Vocabulary::new(DEFAULT_NAMESPACE)
    }
}

/// Resource token for an absolute IRI.
pub fn iri_token(iri: &str) -> String {
    format!("<{}>", iri)
}

fn is_absolute(name: &str) -> bool {
    name.contains("://") || name.starts_with("urn:")
}
