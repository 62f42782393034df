//! Position-tracked YAML syntax tree
//!
//! Every node carries a byte range into the source text. Nodes are shared via
//! [`NodeRef`] so that an alias and its anchor resolve to the same node.

use std::ops::Range;
use std::sync::Arc;

/// Shared handle to a syntax node
pub type NodeRef = Arc<YamlNode>;

/// A node of the YAML syntax tree
#[derive(Debug, Clone, PartialEq)]
pub struct YamlNode {
    /// Byte range of the node in the source text
    pub range: Range<usize>,
    /// The node variant
    pub kind: NodeKind,
}

/// The variants of a syntax node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A scalar with its source text (quotes stripped) and resolved value
    Scalar { text: String, value: ScalarValue },
    /// A mapping, pairs kept in source order
    Mapping(Vec<Pair>),
    /// A sequence, items kept in source order
    Sequence(Vec<NodeRef>),
    /// A region the parser could not interpret
    Error { message: String },
}

/// A key/value entry of a mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub key: NodeRef,
    pub value: NodeRef,
}

/// Resolved value of a scalar, following the YAML 1.2 core schema
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ScalarValue {
    /// Resolve a plain (unquoted) scalar
    pub fn from_plain(text: &str) -> Self {
        match text {
            "" | "~" | "null" | "Null" | "NULL" => return ScalarValue::Null,
            "true" | "True" | "TRUE" => return ScalarValue::Bool(true),
            "false" | "False" | "FALSE" => return ScalarValue::Bool(false),
            ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
                return ScalarValue::Float(f64::INFINITY)
            }
            "-.inf" | "-.Inf" | "-.INF" => return ScalarValue::Float(f64::NEG_INFINITY),
            ".nan" | ".NaN" | ".NAN" => return ScalarValue::Float(f64::NAN),
            _ => {}
        }

        if let Some(hex) = text.strip_prefix("0x") {
            if let Ok(i) = i64::from_str_radix(hex, 16) {
                return ScalarValue::Int(i);
            }
        }
        if let Some(oct) = text.strip_prefix("0o") {
            if let Ok(i) = i64::from_str_radix(oct, 8) {
                return ScalarValue::Int(i);
            }
        }
        if let Ok(i) = text.parse::<i64>() {
            return ScalarValue::Int(i);
        }
        // Rust accepts "inf"/"nan" spellings that YAML treats as strings
        let looks_numeric = text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
        if looks_numeric {
            if let Ok(f) = text.parse::<f64>() {
                return ScalarValue::Float(f);
            }
        }

        ScalarValue::String(text.to_string())
    }

    /// The JSON type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarValue::Null => "null",
            ScalarValue::Bool(_) => "boolean",
            ScalarValue::Int(_) => "integer",
            ScalarValue::Float(_) => "number",
            ScalarValue::String(_) => "string",
        }
    }

    /// Convert to a JSON value for `enum`/`const` comparison
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ScalarValue::Null => serde_json::Value::Null,
            ScalarValue::Bool(b) => serde_json::Value::Bool(*b),
            ScalarValue::Int(i) => serde_json::Value::from(*i),
            ScalarValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ScalarValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// A step from a node to one of its children
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// One node on the way from a document root to an offset
#[derive(Debug, Clone)]
pub struct Step {
    pub node: NodeRef,
    /// How this node was reached from its parent (`None` for the root)
    pub segment: Option<Segment>,
    /// Whether the node is a mapping key rather than a value
    pub is_key: bool,
}

impl YamlNode {
    pub fn is_mapping(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, NodeKind::Error { .. })
    }

    pub fn pairs(&self) -> &[Pair] {
        match &self.kind {
            NodeKind::Mapping(pairs) => pairs,
            _ => &[],
        }
    }

    pub fn items(&self) -> &[NodeRef] {
        match &self.kind {
            NodeKind::Sequence(items) => items,
            _ => &[],
        }
    }

    /// The scalar text, if this is a scalar
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { text, .. } => Some(text),
            _ => None,
        }
    }

    /// The resolved scalar value, if this is a scalar
    pub fn scalar(&self) -> Option<&ScalarValue> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The JSON type name of this node, `None` for error nodes
    pub fn type_name(&self) -> Option<&'static str> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value.type_name()),
            NodeKind::Mapping(_) => Some("object"),
            NodeKind::Sequence(_) => Some("array"),
            NodeKind::Error { .. } => None,
        }
    }

    /// Look up the value of a mapping key
    pub fn get(&self, key: &str) -> Option<&NodeRef> {
        self.pairs()
            .iter()
            .find(|pair| pair.key.as_str() == Some(key))
            .map(|pair| &pair.value)
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.range.start <= offset && offset <= self.range.end
    }

    /// Collect the path of nodes from this node down to the innermost node
    /// containing `offset`. Empty when the offset is outside this node.
    pub fn path_to(self: &Arc<Self>, offset: usize) -> Vec<Step> {
        let mut steps = Vec::new();
        if !self.contains(offset) {
            return steps;
        }
        steps.push(Step {
            node: Arc::clone(self),
            segment: None,
            is_key: false,
        });
        descend(self, offset, &mut steps);
        steps
    }
}

fn descend(node: &NodeRef, offset: usize, steps: &mut Vec<Step>) {
    match &node.kind {
        NodeKind::Mapping(pairs) => {
            // Later pairs win on shared boundaries so an empty value at the end
            // of a line is preferred over the preceding key.
            for pair in pairs.iter().rev() {
                let Some(name) = pair.key.as_str() else {
                    continue;
                };
                if pair.value.contains(offset) && !is_alias_of_elsewhere(&pair.value, pair) {
                    steps.push(Step {
                        node: Arc::clone(&pair.value),
                        segment: Some(Segment::Key(name.to_string())),
                        is_key: false,
                    });
                    descend(&pair.value, offset, steps);
                    return;
                }
                if pair.key.contains(offset) {
                    steps.push(Step {
                        node: Arc::clone(&pair.key),
                        segment: Some(Segment::Key(name.to_string())),
                        is_key: true,
                    });
                    return;
                }
            }
        }
        NodeKind::Sequence(items) => {
            for (index, item) in items.iter().enumerate().rev() {
                if item.contains(offset) {
                    steps.push(Step {
                        node: Arc::clone(item),
                        segment: Some(Segment::Index(index)),
                        is_key: false,
                    });
                    descend(item, offset, steps);
                    return;
                }
            }
        }
        _ => {}
    }
}

/// An aliased value keeps the range of its anchor, which lies before the key.
fn is_alias_of_elsewhere(value: &YamlNode, pair: &Pair) -> bool {
    value.range.end < pair.key.range.start
}

/// A syntax error recorded while building a document
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxDiagnostic {
    pub range: Range<usize>,
    pub message: String,
}

/// One `---`-delimited document of a YAML stream
#[derive(Debug, Clone, PartialEq)]
pub struct YamlDocument {
    /// Byte range of the document content (separators excluded)
    pub range: Range<usize>,
    /// The root node, `None` for an empty document
    pub root: Option<NodeRef>,
    /// Error nodes standing in for regions that could not be parsed
    pub errors: Vec<NodeRef>,
    /// Syntax errors, one per error node
    pub diagnostics: Vec<SyntaxDiagnostic>,
}

impl YamlDocument {
    /// Path from the root to the innermost node containing `offset`.
    ///
    /// Falls back to an error node when the offset lies in an unparsable
    /// region outside the tree.
    pub fn path_at(&self, offset: usize) -> Vec<Step> {
        let steps = self
            .root
            .as_ref()
            .map(|root| root.path_to(offset))
            .unwrap_or_default();
        if !steps.is_empty() {
            return steps;
        }
        self.errors
            .iter()
            .find(|node| node.contains(offset))
            .map(|node| {
                vec![Step {
                    node: Arc::clone(node),
                    segment: None,
                    is_key: false,
                }]
            })
            .unwrap_or_default()
    }

    /// The innermost node containing `offset`
    pub fn node_at(&self, offset: usize) -> Option<NodeRef> {
        self.path_at(offset).pop().map(|step| step.node)
    }

    /// Walk a path of segments down from the root
    pub fn node_at_path(&self, path: &[Segment]) -> Option<NodeRef> {
        let mut current = Arc::clone(self.root.as_ref()?);
        for segment in path {
            let next = match segment {
                Segment::Key(key) => current.get(key).cloned(),
                Segment::Index(index) => current.items().get(*index).cloned(),
            }?;
            current = next;
        }
        Some(current)
    }
}
