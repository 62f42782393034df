//! yaml-schema-lsp: LSP server library for YAML files validated against JSON Schemas
//!
//! This library provides the core functionality for the yaml-schema-lsp server:
//! - YAML parsing into position-tracked trees with error recovery
//! - Schema resolution, fetching, caching and runtime modification
//! - Matching trees against schemas for diagnostics, completion and hover
//! - Schema independent structure: symbols, folding ranges and links
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use tower_lsp::lsp_types::{Position, Url};
//! use yaml_schema_lsp::analyzer::Analyzer;
//! use yaml_schema_lsp::document::Document;
//! use yaml_schema_lsp::schema::{DefaultFetcher, SchemaModification};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let analyzer = Analyzer::new(Arc::new(DefaultFetcher::new()));
//! analyzer
//!     .modify_schema(&SchemaModification::Add {
//!         schema: "file:///virtual/kind.json".to_string(),
//!         path: String::new(),
//!         key: "properties".to_string(),
//!         content: serde_json::json!({ "kind": { "enum": ["Pod", "Service"] } }),
//!     })
//!     .await
//!     .unwrap();
//!
//! let uri = Url::parse("file:///work/pod.yaml").unwrap();
//! analyzer.associate(&uri, &["file:///virtual/kind.json".to_string()]);
//!
//! let document = Document::new(uri, "kind: ".to_string(), 1);
//! let items = analyzer.complete(&document, Position::new(0, 6)).await;
//! let labels: Vec<_> = items.iter().map(|item| item.label.as_str()).collect();
//! assert_eq!(labels, ["Pod", "Service"]);
//! # }
//! ```

pub mod analyzer;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod parser;
pub mod schema;

mod backend;

pub use analyzer::Analyzer;
pub use backend::{AssociateParams, Backend};
