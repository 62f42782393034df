//! Error types shared across the crate

use thiserror::Error;

/// Failures attached to a schema document.
///
/// None of these abort analysis: a schema carrying one of them is treated as
/// unconstrained (or, for a broken `$ref`, the referencing node matches
/// nothing) and the error is surfaced as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Unable to load schema from '{uri}': {reason}")]
    Fetch { uri: String, reason: String },

    #[error("Unable to parse content from '{uri}': {reason}")]
    Parse { uri: String, reason: String },

    #[error("$ref '{reference}' in '{uri}' can not be resolved")]
    UnresolvedReference { uri: String, reference: String },
}

/// Errors produced while fetching raw schema content
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported URI scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("'{0}' is not a valid file path")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors produced by schema content modifications
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModifyError {
    #[error("'{path}' does not address an object in schema '{schema}'")]
    InvalidPath { schema: String, path: String },

    #[error("'{0}' is not a valid schema URI")]
    UnknownSchema(String),
}
