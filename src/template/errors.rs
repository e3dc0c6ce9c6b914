//! # Template Spec Error Types
//!
//! Errors raised while loading a dataset template. All of them are hard stops:
//! a spec that fails here never reaches row expansion.
//!
//! ## Error Categories
//!
//! - **Structure Errors**: entries without a `GENSYM`, malformed property keys or
//!   predicate lists, subtemplates without an `ITERABLE` descriptor
//! - **Binding Errors**: unknown binding functions and mismatched `DATA` blocks
//! - **Source Errors**: file I/O and JSON/YAML parsing

use thiserror::Error;

use crate::binding::BindingError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TemplateError {
    #[error("Template entry `{entity}` has no GENSYM declaration")]
    MissingGensym { entity: String },
    #[error("Template entry `{entity}`: GENSYM must be a string")]
    InvalidGensym { entity: String },
    #[error("Template entry `{entity}`: property `{key}` must map to a predicate or list of predicates")]
    InvalidPredicates { entity: String, key: String },
    #[error("Template entry `{entity}`: malformed property key `{key}`")]
    InvalidPropertyKey { entity: String, key: String },
    #[error("Subtemplate `{subtemplate}` has no ITERABLE descriptor")]
    MissingIterable { subtemplate: String },
    #[error("Template entry `{entity}` references unknown subtemplate `{subtemplate}`")]
    UnknownSubtemplate { entity: String, subtemplate: String },
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("Failed to read template file: {error}")]
    ReadError { error: String },
    #[error("Failed to parse template: {error}")]
    ParseError { error: String },
}

impl TemplateError {
    /// Attach the location of the template file to a source error.
    pub fn read_error_with_context(path: impl Into<String>, error: impl std::fmt::Display) -> Self {
        TemplateError::ReadError {
            error: format!("{}: {}", path.into(), error),
        }
    }
}
