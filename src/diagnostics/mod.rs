//! Diagnostics module for error collection and reporting

mod collector;
pub mod validate;

pub use collector::{DiagnosticCode, DiagnosticCollector, SOURCE};
pub use validate::{duplicate_keys, validate_tree, Violation};
