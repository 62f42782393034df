//! Diagnostic collection and conversion to LSP diagnostics

use std::collections::HashSet;
use std::ops::Range;

use serde_json::Value;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};

use super::validate::Violation;
use crate::document::Document;

/// Source name attached to every diagnostic
pub const SOURCE: &str = "yaml-schema-lsp";

/// Machine readable diagnostic codes, used by code actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    SyntaxError,
    DuplicateKey,
    MissingProperty,
    PropertyNotAllowed,
    IncorrectType,
    ValueNotAccepted,
    TooManyItems,
    NoMatchingSchema,
    SchemaUnavailable,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::SyntaxError => "syntaxError",
            DiagnosticCode::DuplicateKey => "duplicateKey",
            DiagnosticCode::MissingProperty => "missingProperty",
            DiagnosticCode::PropertyNotAllowed => "propertyNotAllowed",
            DiagnosticCode::IncorrectType => "incorrectType",
            DiagnosticCode::ValueNotAccepted => "valueNotAccepted",
            DiagnosticCode::TooManyItems => "tooManyItems",
            DiagnosticCode::NoMatchingSchema => "noMatchingSchema",
            DiagnosticCode::SchemaUnavailable => "schemaUnavailable",
        }
    }

    /// The code of a diagnostic we produced, if any
    pub fn of(diagnostic: &Diagnostic) -> Option<Self> {
        if diagnostic.source.as_deref() != Some(SOURCE) {
            return None;
        }
        let Some(NumberOrString::String(code)) = &diagnostic.code else {
            return None;
        };
        [
            DiagnosticCode::SyntaxError,
            DiagnosticCode::DuplicateKey,
            DiagnosticCode::MissingProperty,
            DiagnosticCode::PropertyNotAllowed,
            DiagnosticCode::IncorrectType,
            DiagnosticCode::ValueNotAccepted,
            DiagnosticCode::TooManyItems,
            DiagnosticCode::NoMatchingSchema,
            DiagnosticCode::SchemaUnavailable,
        ]
        .into_iter()
        .find(|candidate| candidate.as_str() == code)
    }
}

/// Collects diagnostics for one document, dropping repeats of the same
/// message at the same range
#[derive(Debug)]
pub struct DiagnosticCollector<'a> {
    document: &'a Document,
    diagnostics: Vec<Diagnostic>,
    seen: HashSet<(Range<usize>, String)>,
}

impl<'a> DiagnosticCollector<'a> {
    /// Create a new empty collector
    pub fn new(document: &'a Document) -> Self {
        Self {
            document,
            diagnostics: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Add a YAML syntax error diagnostic
    pub fn add_yaml_error(&mut self, range: &Range<usize>, message: &str) {
        self.push(
            range.clone(),
            DiagnosticSeverity::ERROR,
            DiagnosticCode::SyntaxError,
            message.to_string(),
            None,
        );
    }

    /// Add a schema violation
    pub fn add_violation(&mut self, violation: Violation) {
        self.push(
            violation.range,
            DiagnosticSeverity::ERROR,
            violation.code,
            violation.message,
            violation.data,
        );
    }

    /// Add a warning about a schema that could not be fully loaded, reported
    /// at the start of the document
    pub fn add_schema_warning(&mut self, message: String) {
        self.push(
            0..0,
            DiagnosticSeverity::WARNING,
            DiagnosticCode::SchemaUnavailable,
            message,
            None,
        );
    }

    /// Convert into the final list of diagnostics, in document order
    pub fn into_diagnostics(mut self) -> Vec<Diagnostic> {
        self.diagnostics
            .sort_by_key(|d| (d.range.start.line, d.range.start.character));
        self.diagnostics
    }

    fn push(
        &mut self,
        range: Range<usize>,
        severity: DiagnosticSeverity,
        code: DiagnosticCode,
        message: String,
        data: Option<Value>,
    ) {
        if !self.seen.insert((range.clone(), message.clone())) {
            return;
        }
        self.diagnostics.push(Diagnostic {
            range: self.document.range_of(&range),
            severity: Some(severity),
            code: Some(NumberOrString::String(code.as_str().to_string())),
            code_description: None,
            source: Some(SOURCE.to_string()),
            message,
            related_information: None,
            tags: None,
            data,
        });
    }
}
