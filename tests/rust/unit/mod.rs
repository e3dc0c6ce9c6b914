//! Unit tests - Exercise the public API of individual components without any
//! file system or network access.

mod binding_catalog_tests;
mod expansion_property_tests;
