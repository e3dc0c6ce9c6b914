//! Statement generation: typing, identifier resolution, template expansion
//! and rendering.

pub mod errors;
pub mod expander;
pub mod gensym;
pub mod geocode;
pub mod render;
pub mod typer;

pub use errors::{CoercionError, ExpandError, GeocodeError, RenderError};
pub use expander::{Diagnostic, DiagnosticKind, RowContext, RowExpansion, TemplateExpander};
pub use gensym::{DeterministicIds, GensymMap, GensymResolver, ResolutionContext};
pub use geocode::{AddressQuery, GeocodeResponse, Geocoder, NominatimGeocoder};
pub use render::{render_statements, try_render};
pub use typer::DatumTyper;

/// One subject-predicate-object statement. Every part is a pre-formatted
/// N-Triples token (`<iri>`, `"literal"` or `"literal"^^<datatype>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Statement {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Statement {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// True when both statements describe the same property of the same subject.
    pub fn same_slot(&self, other: &Statement) -> bool {
        self.subject == other.subject && self.predicate == other.predicate
    }
}
