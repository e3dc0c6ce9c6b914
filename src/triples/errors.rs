use thiserror::Error;

/// Hard stops raised while expanding a row. Field-level problems never end up
/// here; they are reported as diagnostics instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExpandError {
    #[error("Gensym `{gensym}` referenced by `{referenced_by}` is not declared in this scope or any parent scope")]
    UnknownGensym {
        gensym: String,
        referenced_by: String,
    },
    #[error("Circular gensym dependency between: {}", members.join(", "))]
    GensymCycle { members: Vec<String> },
    #[error("No subtemplate named `{subtemplate}`")]
    UnknownSubtemplate { subtemplate: String },
    #[error("Subtemplate `{subtemplate}` does not resolve the linked gensym `{gensym}`")]
    UnresolvedSubtemplateGensym { subtemplate: String, gensym: String },
}

/// A value that could not be typed. The statement carrying it is omitted.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Cannot type `{value}` for property `{property}` as {target}: {reason}")]
pub struct CoercionError {
    pub property: String,
    pub value: String,
    pub target: String,
    pub reason: String,
}

/// A statement token that cannot be written as N-Triples.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Statement {index}: {part} token {token:?} is invalid ({reason})")]
pub struct RenderError {
    pub index: usize,
    pub part: &'static str,
    pub token: String,
    pub reason: &'static str,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Geocoder request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Geocoder returned an unreadable response: {0}")]
    Decode(String),
}
