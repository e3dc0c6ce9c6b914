//! Integration tests - Tests that drive the file pipeline end to end
//!
//! These tests write CSV inputs, templates and run configurations to temporary
//! directories and check the chunk files the pipeline produces.

mod geocoding_tests;
mod pipeline_tests;
