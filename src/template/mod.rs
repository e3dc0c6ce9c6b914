pub mod config;
pub mod errors;
pub mod property_types;


pub use config::{
    Iteration, NamedBinding, PropertyRule, PropertyTarget, SpecOptions, Subtemplate,
    TemplateEntry, TemplateSpec,
};
pub use errors::TemplateError;
pub use property_types::{PropertyTypeIndex, PropertyTypeMap};
