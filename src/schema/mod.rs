//! Schema module: resolution, loading, association and matching of JSON
//! Schemas

pub mod association;
pub mod fetch;
pub mod matcher;
pub mod model;
pub mod overlay;
pub mod store;
pub mod uri;

pub use association::AssociationIndex;
pub use fetch::{DefaultFetcher, SchemaFetcher};
pub use model::{SchemaDocument, SchemaId, SchemaNode};
pub use overlay::SchemaModification;
pub use store::SchemaStore;
pub use uri::{resolve_schema_uri, KUBERNETES_SCHEMA_URL};
