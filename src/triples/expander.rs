//! Row expansion.
//!
//! For one source row and one template scope:
//!
//! 1. evaluate the scope's bindings in declaration order, each one visible to
//!    the bindings after it
//! 2. resolve the scope's gensyms
//! 3. query the geocoder for entities of the configured classes
//! 4. walk entries and their properties in declaration order, emitting the
//!    type statement, links, data statements and subtemplate expansions
//! 5. add geocoded statements for (subject, predicate) slots the row did not
//!    already fill
//!
//! Columns bound for a scope (bindings and iteration variables) are dropped
//! when that scope ends, so a subtemplate iteration never sees the previous
//! iteration's values.

use std::fmt;

use super::errors::ExpandError;
use super::gensym::{DeterministicIds, GensymMap, GensymResolver, ResolutionContext};
use super::geocode::{address_statements, AddressQuery, Geocoder};
use super::typer::DatumTyper;
use super::{CoercionError, Statement};
use crate::datum::Datum;
use crate::row::{ColumnOrigin, Header, RowFrame};
use crate::template::{PropertyTarget, PropertyTypeIndex, TemplateEntry, TemplateSpec};
use crate::vocabulary::{iri_token, Vocabulary, RDF_TYPE};

/// Position of the row being expanded.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'c> {
    /// Name of the output unit (chunk file) the row belongs to
    pub file_name: &'c str,
    pub row_index: usize,
}

/// Statements produced for one row, plus the field-level problems hit on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowExpansion {
    pub statements: Vec<Statement>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub row_index: usize,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// A value that could not be typed; its statement was omitted
    SkippedValue { subject: String, error: CoercionError },
    GeocodeFailed { subject: String, message: String },
    GeocodeNoMatch { subject: String },
    GeocoderUnavailable { subject: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: ", self.row_index)?;
        match &self.kind {
            DiagnosticKind::SkippedValue { subject, error } => {
                write!(f, "skipped value for {}: {}", subject, error)
            }
            DiagnosticKind::GeocodeFailed { subject, message } => {
                write!(f, "geocoding failed for {}: {}", subject, message)
            }
            DiagnosticKind::GeocodeNoMatch { subject } => {
                write!(f, "no confident geocoder match for {}", subject)
            }
            DiagnosticKind::GeocoderUnavailable { subject } => {
                write!(f, "geocoding requested for {} but no geocoder is configured", subject)
            }
        }
    }
}

pub struct TemplateExpander<'a> {
    vocabulary: &'a Vocabulary,
    typer: DatumTyper<'a>,
    resolver: GensymResolver,
    geocoder: Option<&'a dyn Geocoder>,
}

impl<'a> TemplateExpander<'a> {
    pub fn new(types: &'a PropertyTypeIndex, vocabulary: &'a Vocabulary, mode: DeterministicIds) -> Self {
        TemplateExpander {
            vocabulary,
            typer: DatumTyper::new(types, vocabulary),
            resolver: GensymResolver::new(mode),
            geocoder: None,
        }
    }

    pub fn with_geocoder(mut self, geocoder: &'a dyn Geocoder) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Expand one source row with the top-level template.
    pub fn expand_row(
        &self,
        spec: &TemplateSpec,
        header: &Header,
        row: &[Datum],
        ctx: &RowContext<'_>,
    ) -> Result<RowExpansion, ExpandError> {
        let mut frame = RowFrame::new(header, row);
        let mut diagnostics = Vec::new();
        let (statements, _) = self.expand_scope(spec, &mut frame, ctx, &GensymMap::new(), None, &mut diagnostics)?;
        Ok(RowExpansion {
            statements,
            diagnostics,
        })
    }

    fn expand_scope(
        &self,
        spec: &TemplateSpec,
        frame: &mut RowFrame<'_>,
        ctx: &RowContext<'_>,
        inherited: &GensymMap,
        sub_iteration: Option<usize>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(Vec<Statement>, GensymMap), ExpandError> {
        let mut scope = frame.scope();

        for named in &spec.bindings {
            let value = named.binding.evaluate(&scope);
            scope.bind(named.name.clone(), value, ColumnOrigin::Binding);
        }

        let resolution = ResolutionContext {
            file_name: ctx.file_name,
            row_index: ctx.row_index,
            sub_iteration,
        };
        let gensyms = self.resolver.resolve(spec, &scope, &resolution, inherited)?;

        let geocoded = self.geocode_entries(spec, &scope, &gensyms, ctx, diagnostics);

        let mut statements = Vec::new();
        for entry in &spec.entries {
            let subject = self.subject(entry, &gensyms)?;
            for rule in &entry.properties {
                match &rule.target {
                    PropertyTarget::TypeDeclaration => statements.push(Statement::new(
                        subject.clone(),
                        iri_token(RDF_TYPE),
                        self.vocabulary.resource(&entry.entity_type),
                    )),
                    PropertyTarget::Gensym(target) => {
                        let id = gensyms.get(target).ok_or_else(|| ExpandError::UnknownGensym {
                            gensym: target.clone(),
                            referenced_by: entry.gensym.clone(),
                        })?;
                        let object = self.vocabulary.resource(id);
                        for predicate in &rule.predicates {
                            statements.push(Statement::new(
                                subject.clone(),
                                self.vocabulary.resource(predicate),
                                object.clone(),
                            ));
                        }
                    }
                    PropertyTarget::Subtemplate { name, gensym } => {
                        let sub = spec.subtemplate(name).ok_or_else(|| ExpandError::UnknownSubtemplate {
                            subtemplate: name.clone(),
                        })?;
                        let elements = iteration_elements(scope.get(&sub.iteration.source));

                        for (index, element) in elements.into_iter().enumerate() {
                            let mut iteration = scope.scope();
                            iteration.bind(sub.iteration.variable.clone(), element, ColumnOrigin::Iteration);

                            let mut seed = gensyms.clone();
                            if !self.resolver.mode().is_deterministic() {
                                let child_ctx = ResolutionContext {
                                    sub_iteration: Some(index),
                                    ..resolution
                                };
                                let id = self.resolver.mint(gensym, &spec.options, &iteration, &child_ctx);
                                seed.insert(gensym.clone(), id);
                            }

                            let (child_statements, child_gensyms) = self.expand_scope(
                                &sub.spec,
                                &mut iteration,
                                ctx,
                                &seed,
                                Some(index),
                                diagnostics,
                            )?;

                            let child_id = child_gensyms.get(gensym).ok_or_else(|| {
                                ExpandError::UnresolvedSubtemplateGensym {
                                    subtemplate: name.clone(),
                                    gensym: gensym.clone(),
                                }
                            })?;
                            let object = self.vocabulary.resource(child_id);
                            for predicate in &rule.predicates {
                                statements.push(Statement::new(
                                    subject.clone(),
                                    self.vocabulary.resource(predicate),
                                    object.clone(),
                                ));
                            }
                            statements.extend(child_statements);
                        }
                    }
                    PropertyTarget::Column(column) => {
                        let Some(value) = scope.get(column).filter(|v| !v.is_empty()) else {
                            continue;
                        };
                        let values: Vec<&Datum> = match value {
                            Datum::List(items) => items.iter().collect(),
                            single => vec![single],
                        };
                        for predicate in &rule.predicates {
                            for value in values.iter().filter(|v| !v.is_empty()) {
                                match self.typer.type_datum(predicate, value) {
                                    Ok(object) => statements.push(Statement::new(
                                        subject.clone(),
                                        self.vocabulary.resource(predicate),
                                        object,
                                    )),
                                    Err(error) => {
                                        log::debug!("Row {}: {}", ctx.row_index, error);
                                        diagnostics.push(Diagnostic {
                                            row_index: ctx.row_index,
                                            kind: DiagnosticKind::SkippedValue {
                                                subject: subject.clone(),
                                                error,
                                            },
                                        });
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        for candidate in geocoded {
            if !statements.iter().any(|s| s.same_slot(&candidate)) {
                statements.push(candidate);
            }
        }

        Ok((statements, gensyms))
    }

    fn subject(&self, entry: &TemplateEntry, gensyms: &GensymMap) -> Result<String, ExpandError> {
        gensyms
            .get(&entry.gensym)
            .map(|id| self.vocabulary.resource(id))
            .ok_or_else(|| ExpandError::UnknownGensym {
                gensym: entry.gensym.clone(),
                referenced_by: entry.entity_type.clone(),
            })
    }

    /// Candidate address statements for every entry of a geocoded class.
    fn geocode_entries(
        &self,
        spec: &TemplateSpec,
        frame: &RowFrame<'_>,
        gensyms: &GensymMap,
        ctx: &RowContext<'_>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<Statement> {
        let mut candidates = Vec::new();

        for entry in spec.entries.iter().filter(|e| spec.options.geocodes(&e.entity_type)) {
            let Some(subject) = gensyms.get(&entry.gensym).map(|id| self.vocabulary.resource(id)) else {
                continue;
            };

            let fields: Vec<(String, String)> = entry
                .column_rules()
                .filter_map(|(column, rule)| {
                    let predicate = rule.predicates.first()?;
                    let value = frame.get(column).filter(|v| !v.is_empty())?;
                    Some((
                        self.vocabulary.local_name(predicate).to_string(),
                        value.to_plain_string(),
                    ))
                })
                .collect();
            let Some(query) = AddressQuery::from_fields(&fields) else {
                continue;
            };

            let mut report = |kind| {
                diagnostics.push(Diagnostic {
                    row_index: ctx.row_index,
                    kind,
                })
            };

            let Some(geocoder) = self.geocoder else {
                report(DiagnosticKind::GeocoderUnavailable { subject });
                continue;
            };

            match geocoder.search(&query) {
                Ok(response) => match response.confident_match() {
                    Some(feature) => candidates.extend(address_statements(
                        &subject,
                        feature,
                        self.vocabulary,
                        &self.typer,
                    )),
                    None => report(DiagnosticKind::GeocodeNoMatch { subject }),
                },
                Err(e) => {
                    log::error!("Row {}: geocoding {} failed: {}", ctx.row_index, subject, e);
                    report(DiagnosticKind::GeocodeFailed {
                        subject,
                        message: e.to_string(),
                    });
                }
            }
        }

        candidates
    }
}

/// Elements a subtemplate iterates over. Lists iterate their non-empty items;
/// absent, null and empty values iterate nothing; any other value iterates once.
fn iteration_elements(source: Option<&Datum>) -> Vec<Datum> {
    match source {
        None => Vec::new(),
        Some(Datum::List(items)) => items.iter().filter(|d| !d.is_empty()).cloned().collect(),
        Some(value) if value.is_empty() => Vec::new(),
        Some(value) => vec![value.clone()],
    }
}
