//! Tablegraph - RDF statement generation from tabular data
//!
//! This crate turns rows of CSV-like tables into N-Triples through:
//! - Declarative dataset templates (entities, links, repeated sub-entities)
//! - Derived columns computed by a catalog of binding functions
//! - Identifier resolution (random, hashed, or content-addressed)
//! - Schema-driven literal typing
//! - Optional address enrichment through a geocoding service

pub mod utils;

pub mod binding;
pub mod config;
pub mod datum;
pub mod pipeline;
pub mod row;
pub mod template;
pub mod triples;
pub mod vocabulary;
