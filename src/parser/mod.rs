//! Parser module for position-tracked YAML trees

mod node;
mod splitter;
mod yaml;

pub use node::{
    NodeKind, NodeRef, Pair, ScalarValue, Segment, Step, SyntaxDiagnostic, YamlDocument, YamlNode,
};
pub use splitter::split_documents;
pub use yaml::parse_yaml;
