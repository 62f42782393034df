//! Validation of syntax trees against compiled schemas

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::collector::DiagnosticCode;
use crate::parser::{NodeKind, NodeRef, YamlNode};
use crate::schema::matcher::{is_viable, item_schema, json_equal, type_matches};
use crate::schema::model::{Items, SchemaDocument, SchemaId, SchemaNode};

/// One violated constraint
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub range: Range<usize>,
    pub code: DiagnosticCode,
    pub message: String,
    /// Extra information for code actions
    pub data: Option<Value>,
}

impl Violation {
    fn new(range: &Range<usize>, code: DiagnosticCode, message: String) -> Self {
        Self {
            range: range.clone(),
            code,
            message,
            data: None,
        }
    }

    fn with_property(mut self, property: &str) -> Self {
        self.data = Some(json!({ "property": property }));
        self
    }
}

/// Validate a tree against the root of a schema document
pub fn validate_tree(doc: &SchemaDocument, root: &NodeRef) -> Vec<Violation> {
    Validator::new(doc).validate(root, doc.root)
}

/// Report every repeated key of every mapping in the tree
pub fn duplicate_keys(root: &NodeRef) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![Arc::clone(root)];

    while let Some(node) = stack.pop() {
        // Aliased nodes are shared, check them once
        if !visited.insert(Arc::as_ptr(&node)) {
            continue;
        }
        match &node.kind {
            NodeKind::Mapping(pairs) => {
                let mut seen = HashSet::new();
                for pair in pairs {
                    if let Some(key) = pair.key.as_str() {
                        if !seen.insert(key) {
                            violations.push(
                                Violation::new(
                                    &pair.key.range,
                                    DiagnosticCode::DuplicateKey,
                                    "Map keys must be unique".to_string(),
                                )
                                .with_property(key),
                            );
                        }
                    }
                    stack.push(Arc::clone(&pair.value));
                }
            }
            NodeKind::Sequence(items) => stack.extend(items.iter().cloned()),
            _ => {}
        }
    }
    violations
}

/// Walks a tree and a schema together.
///
/// Results are memoized per (node, schema) pair, which also cuts recursion
/// through self-referencing schemas and repeated walks of aliased nodes.
///
/// A pair met again while it is still being checked contributes nothing.
/// Results that relied on such a re-entry are not memoized, and an
/// `anyOf`/`oneOf` branch that only passed because of one does not count as
/// passing.
struct Validator<'a> {
    doc: &'a SchemaDocument,
    /// `None` while the pair is being checked
    memo: HashMap<(*const YamlNode, SchemaId), Option<Vec<Violation>>>,
    reentered: bool,
}

impl<'a> Validator<'a> {
    fn new(doc: &'a SchemaDocument) -> Self {
        Self {
            doc,
            memo: HashMap::new(),
            reentered: false,
        }
    }

    fn validate(&mut self, node: &NodeRef, id: SchemaId) -> Vec<Violation> {
        let key = (Arc::as_ptr(node), id);
        match self.memo.get(&key) {
            Some(Some(violations)) => return violations.clone(),
            Some(None) => {
                self.reentered = true;
                return Vec::new();
            }
            None => {}
        }
        self.memo.insert(key, None);

        let outer = std::mem::take(&mut self.reentered);
        let mut violations = Vec::new();
        self.check(node, id, &mut violations);
        if self.reentered {
            self.memo.remove(&key);
        } else {
            self.memo.insert(key, Some(violations.clone()));
        }
        self.reentered |= outer;
        violations
    }

    fn check(&mut self, node: &NodeRef, id: SchemaId, out: &mut Vec<Violation>) {
        let doc = self.doc;
        let schema = doc.node(id);
        if schema.unresolved || schema.boolean == Some(true) {
            return;
        }
        if schema.is_false() {
            out.push(Violation::new(
                &node.range,
                DiagnosticCode::NoMatchingSchema,
                "Value is not allowed.".to_string(),
            ));
            return;
        }

        if let Some(target) = schema.reference {
            out.extend(self.validate(node, target));
        }
        for &branch in &schema.all_of {
            out.extend(self.validate(node, branch));
        }
        if !schema.any_of.is_empty() {
            self.check_alternatives(node, &schema.any_of, "anyOf", out);
        }
        if !schema.one_of.is_empty() {
            self.check_alternatives(node, &schema.one_of, "oneOf", out);
        }

        if node.is_error() {
            return;
        }

        if !type_matches(&schema.types, node) {
            let expected: Vec<String> = schema.types.iter().map(|ty| format!("\"{ty}\"")).collect();
            out.push(Violation::new(
                &node.range,
                DiagnosticCode::IncorrectType,
                format!("Incorrect type. Expected {}.", expected.join(" | ")),
            ));
            return;
        }

        self.check_values(node, schema, out);

        match &node.kind {
            NodeKind::Mapping(_) => self.check_mapping(node, schema, out),
            NodeKind::Sequence(items) => self.check_sequence(items, schema, out),
            _ => {}
        }
    }

    /// `anyOf`/`oneOf`: nothing to report if one branch passes, otherwise the
    /// union of what the viable branches report
    fn check_alternatives(
        &mut self,
        node: &NodeRef,
        branches: &[SchemaId],
        keyword: &str,
        out: &mut Vec<Violation>,
    ) {
        let mut failures = Vec::new();
        for &branch in branches {
            let outer = std::mem::take(&mut self.reentered);
            let violations = self.validate(node, branch);
            let undecided = self.reentered && violations.is_empty();
            self.reentered |= outer;
            if undecided {
                continue;
            }
            if violations.is_empty() {
                return;
            }
            failures.push((branch, violations));
        }
        if failures.is_empty() {
            return;
        }

        let viable: Vec<Vec<Violation>> = failures
            .into_iter()
            .filter(|(branch, _)| is_viable(self.doc, *branch, node))
            .map(|(_, violations)| violations)
            .collect();

        if viable.is_empty() {
            out.push(Violation::new(
                &node.range,
                DiagnosticCode::NoMatchingSchema,
                format!("Matches none of the listed schemas ({keyword})."),
            ));
        } else {
            out.extend(viable.into_iter().flatten());
        }
    }

    fn check_values(&self, node: &YamlNode, schema: &SchemaNode, out: &mut Vec<Violation>) {
        let Some(value) = to_json(node) else {
            return;
        };
        if let Some(allowed) = &schema.enum_values {
            if !allowed.iter().any(|candidate| json_equal(candidate, &value)) {
                let listed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                out.push(Violation::new(
                    &node.range,
                    DiagnosticCode::ValueNotAccepted,
                    format!("Value is not accepted. Valid values: {}.", listed.join(", ")),
                ));
            }
        }
        if let Some(expected) = &schema.const_value {
            if !json_equal(expected, &value) {
                out.push(Violation::new(
                    &node.range,
                    DiagnosticCode::ValueNotAccepted,
                    format!("Value must be {expected}."),
                ));
            }
        }
    }

    fn check_mapping(&mut self, node: &NodeRef, schema: &SchemaNode, out: &mut Vec<Violation>) {
        let doc = self.doc;
        for name in &schema.required {
            if node.get(name).is_none() {
                out.push(
                    Violation::new(
                        &node.range,
                        DiagnosticCode::MissingProperty,
                        format!("Missing property \"{name}\"."),
                    )
                    .with_property(name),
                );
            }
        }

        for pair in node.pairs() {
            let Some(key) = pair.key.as_str() else {
                continue;
            };
            let mut matched = false;
            if let Some(&property) = schema.properties.get(key) {
                out.extend(self.validate(&pair.value, property));
                matched = true;
            }
            for (pattern, property) in &schema.pattern_properties {
                if pattern.is_match(key) {
                    out.extend(self.validate(&pair.value, *property));
                    matched = true;
                }
            }
            if matched {
                continue;
            }
            match schema.additional_properties {
                Some(additional) if doc.node(additional).is_false() => out.push(
                    Violation::new(
                        &pair.key.range,
                        DiagnosticCode::PropertyNotAllowed,
                        format!("Property \"{key}\" is not allowed."),
                    )
                    .with_property(key),
                ),
                Some(additional) => out.extend(self.validate(&pair.value, additional)),
                None => {}
            }
        }
    }

    fn check_sequence(&mut self, items: &[NodeRef], schema: &SchemaNode, out: &mut Vec<Violation>) {
        let doc = self.doc;
        for (index, item) in items.iter().enumerate() {
            if let Some(Items::Tuple(tuple)) = &schema.items {
                let closed = schema
                    .additional_items
                    .map(|additional| doc.node(additional).is_false())
                    .unwrap_or(false);
                if index >= tuple.len() && closed {
                    out.push(Violation::new(
                        &item.range,
                        DiagnosticCode::TooManyItems,
                        format!(
                            "Array has too many items according to schema. Expected {} or fewer.",
                            tuple.len()
                        ),
                    ));
                    continue;
                }
            }
            if let Some(item_schema) = item_schema(doc, schema, index) {
                out.extend(self.validate(item, item_schema));
            }
        }
    }
}

/// The JSON value of a node, `None` if it contains error nodes
fn to_json(node: &YamlNode) -> Option<Value> {
    match &node.kind {
        NodeKind::Scalar { value, .. } => Some(value.to_json()),
        NodeKind::Mapping(pairs) => {
            let mut map = Map::new();
            for pair in pairs {
                let key = pair.key.as_str()?.to_string();
                map.insert(key, to_json(&pair.value)?);
            }
            Some(Value::Object(map))
        }
        NodeKind::Sequence(items) => items
            .iter()
            .map(|item| to_json(item))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        NodeKind::Error { .. } => None,
    }
}
