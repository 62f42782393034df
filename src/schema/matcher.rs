//! Matching syntax nodes against schema nodes
//!
//! The result of a match is a *set* of schema nodes that all apply to the
//! syntax node: `$ref` targets and `allOf` branches are always part of it,
//! `anyOf`/`oneOf` contribute every branch that is still viable for the node.
//! Consumers union over the set instead of picking a winner.

use std::collections::HashSet;

use serde_json::Value;

use super::model::{Items, SchemaDocument, SchemaId, SchemaNode};
use crate::parser::{NodeKind, Segment, YamlNode};

/// Schema nodes applying to `node` when matched against `schema`
pub fn match_node(doc: &SchemaDocument, node: &YamlNode, schema: SchemaId) -> Vec<SchemaId> {
    let mut set = Vec::new();
    expand(doc, schema, Some(node), &mut set, &mut HashSet::new());
    set
}

/// Like [`match_node`] for a position where no node exists yet, keeping
/// every combinator branch
pub fn match_absent(doc: &SchemaDocument, schema: SchemaId) -> Vec<SchemaId> {
    let mut set = Vec::new();
    expand(doc, schema, None, &mut set, &mut HashSet::new());
    set
}

fn expand(
    doc: &SchemaDocument,
    id: SchemaId,
    node: Option<&YamlNode>,
    set: &mut Vec<SchemaId>,
    visited: &mut HashSet<SchemaId>,
) {
    if !visited.insert(id) {
        return;
    }
    let schema = doc.node(id);
    if schema.unresolved {
        return;
    }
    set.push(id);

    if let Some(target) = schema.reference {
        expand(doc, target, node, set, visited);
    }
    for &branch in &schema.all_of {
        expand(doc, branch, node, set, visited);
    }
    for &branch in schema.any_of.iter().chain(&schema.one_of) {
        if node.map(|node| is_viable(doc, branch, node)).unwrap_or(true) {
            expand(doc, branch, node, set, visited);
        }
    }
}

/// The nodes a schema conjunctively requires: itself, its `$ref` targets and
/// `allOf` branches
pub fn conjuncts(doc: &SchemaDocument, id: SchemaId) -> Vec<SchemaId> {
    let mut out = Vec::new();
    let mut stack = vec![id];
    let mut visited = HashSet::new();
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let schema = doc.node(id);
        out.push(id);
        stack.extend(schema.reference);
        stack.extend(schema.all_of.iter().rev());
    }
    out
}

/// Whether a combinator branch could still describe `node`: its type is
/// compatible and no `enum`/`const` on a present scalar property rules it out
pub fn is_viable(doc: &SchemaDocument, branch: SchemaId, node: &YamlNode) -> bool {
    conjuncts(doc, branch).into_iter().all(|id| {
        let schema = doc.node(id);
        !schema.unresolved
            && !schema.is_false()
            && type_matches(&schema.types, node)
            && !discriminator_excludes(doc, schema, node)
    })
}

fn discriminator_excludes(doc: &SchemaDocument, schema: &SchemaNode, node: &YamlNode) -> bool {
    node.pairs().iter().any(|pair| {
        let (Some(name), Some(value)) = (pair.key.as_str(), pair.value.scalar()) else {
            return false;
        };
        let Some(&property) = schema.properties.get(name) else {
            return false;
        };
        let value = value.to_json();
        conjuncts(doc, property).into_iter().any(|id| {
            doc.node(id)
                .allowed_values()
                .map(|allowed| !allowed.iter().any(|candidate| json_equal(candidate, &value)))
                .unwrap_or(false)
        })
    })
}

/// Whether `node` has one of the JSON `types`. An empty list allows any type.
pub fn type_matches(types: &[String], node: &YamlNode) -> bool {
    if types.is_empty() {
        return true;
    }
    let Some(name) = node.type_name() else {
        return true;
    };
    types.iter().any(|ty| {
        ty == name
            || (ty == "number" && name == "integer")
            || (ty == "integer" && integral_float(node))
    })
}

fn integral_float(node: &YamlNode) -> bool {
    matches!(node.kind, NodeKind::Scalar { value: crate::parser::ScalarValue::Float(f), .. } if f.fract() == 0.0)
}

/// Compare JSON values treating integers and integral floats alike
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Schemas for a child of a node matched by `set` (not yet expanded)
pub fn child_schemas(doc: &SchemaDocument, set: &[SchemaId], segment: &Segment) -> Vec<SchemaId> {
    let mut children = Vec::new();
    for &id in set {
        let schema = doc.node(id);
        match segment {
            Segment::Key(key) => {
                let mut matched = false;
                if let Some(&property) = schema.properties.get(key) {
                    children.push(property);
                    matched = true;
                }
                for (pattern, property) in &schema.pattern_properties {
                    if pattern.is_match(key) {
                        children.push(*property);
                        matched = true;
                    }
                }
                if !matched {
                    if let Some(additional) = schema.additional_properties {
                        if !doc.node(additional).is_false() {
                            children.push(additional);
                        }
                    }
                }
            }
            Segment::Index(index) => {
                if let Some(item) = item_schema(doc, schema, *index) {
                    children.push(item);
                }
            }
        }
    }
    dedup(children)
}

/// The schema covering position `index` of an array: positional for tuple
/// `items`, overflow going to `additionalItems` or else the last entry
pub fn item_schema(doc: &SchemaDocument, schema: &SchemaNode, index: usize) -> Option<SchemaId> {
    match schema.items.as_ref()? {
        Items::Single(item) => Some(*item),
        Items::Tuple(items) => match items.get(index) {
            Some(item) => Some(*item),
            None => match schema.additional_items {
                Some(additional) if doc.node(additional).is_false() => None,
                Some(additional) => Some(additional),
                None => items.last().copied(),
            },
        },
    }
}

/// Walk `path` down from `root`, returning the expanded set at its end.
///
/// Segments past the end of the tree (or every segment, without a root) are
/// matched without a node, which keeps every combinator branch open.
pub fn schemas_at(
    doc: &SchemaDocument,
    root: Option<&YamlNode>,
    path: &[Segment],
    schema: SchemaId,
) -> Vec<SchemaId> {
    let mut set = Vec::new();
    expand(doc, schema, root, &mut set, &mut HashSet::new());
    let mut current = root;
    for segment in path {
        let child = current.and_then(|node| match segment {
            Segment::Key(key) => node.get(key).map(|value| value.as_ref()),
            Segment::Index(index) => node.items().get(*index).map(|item| item.as_ref()),
        });
        let mut next = Vec::new();
        let mut visited = HashSet::new();
        for id in child_schemas(doc, &set, segment) {
            expand(doc, id, child, &mut next, &mut visited);
        }
        set = next;
        current = child;
        if set.is_empty() {
            break;
        }
    }
    set
}

fn dedup(ids: Vec<SchemaId>) -> Vec<SchemaId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_yaml;
    use crate::schema::model::SchemaCompiler;
    use serde_json::json;
    use tower_lsp::lsp_types::Url;

    fn compile(value: Value) -> SchemaDocument {
        let base = Url::parse("file:///schema.json").expect("url");
        let mut compiler = SchemaCompiler::new();
        let root = compiler.add_resource(&base, value);
        compiler.finish(base, root, None)
    }

    fn root(text: &str) -> crate::parser::NodeRef {
        parse_yaml(text).remove(0).root.expect("root")
    }

    fn workload_schema() -> SchemaDocument {
        compile(json!({
            "oneOf": [
                {
                    "type": "object",
                    "properties": {
                        "kind": { "const": "Pod" },
                        "containers": { "type": "array" }
                    }
                },
                {
                    "type": "object",
                    "properties": {
                        "kind": { "const": "Service" },
                        "ports": { "type": "array" }
                    }
                },
                { "type": "string" }
            ]
        }))
    }

    #[test]
    fn test_ref_is_transparent() {
        let doc = compile(json!({
            "$ref": "#/definitions/base",
            "definitions": { "base": { "type": "object", "required": ["a"] } }
        }));
        let node = root("a: 1\n");
        let set = match_node(&doc, &node, doc.root);
        assert!(set.iter().any(|id| doc.node(*id).required == vec!["a"]));
    }

    #[test]
    fn test_discriminator_narrows_branches() {
        let doc = workload_schema();
        let node = root("kind: Service\n");
        let set = match_node(&doc, &node, doc.root);
        let properties: Vec<&str> = set
            .iter()
            .flat_map(|id| doc.node(*id).properties.keys().map(String::as_str))
            .collect();
        assert!(properties.contains(&"ports"));
        assert!(!properties.contains(&"containers"));
    }

    #[test]
    fn test_ambiguity_is_preserved() {
        let doc = workload_schema();
        let node = root("name: x\n");
        let set = match_node(&doc, &node, doc.root);
        // Both object branches remain, the string branch is ruled out by type
        let objects = set.iter().filter(|id| doc.node(**id).types == vec!["object"]).count();
        assert_eq!(objects, 2);
        assert!(!set.iter().any(|id| doc.node(*id).types == vec!["string"]));
    }

    #[test]
    fn test_child_schemas_by_key_and_index() {
        let doc = compile(json!({
            "properties": {
                "items": {
                    "type": "array",
                    "items": [{ "type": "string" }, { "type": "integer" }]
                }
            },
            "patternProperties": { "^x-": { "type": "boolean" } },
            "additionalProperties": false
        }));
        let set = vec![doc.root];
        assert_eq!(child_schemas(&doc, &set, &Segment::Key("items".into())).len(), 1);
        assert_eq!(child_schemas(&doc, &set, &Segment::Key("x-flag".into())).len(), 1);
        assert!(child_schemas(&doc, &set, &Segment::Key("other".into())).is_empty());

        let items = child_schemas(&doc, &set, &Segment::Key("items".into()));
        let overflow = child_schemas(&doc, &items, &Segment::Index(5));
        assert_eq!(doc.node(overflow[0]).types, vec!["integer"]);
    }

    #[test]
    fn test_schemas_at_path() {
        let doc = compile(json!({
            "properties": {
                "spec": {
                    "properties": {
                        "replicas": { "type": "integer", "description": "Count" }
                    }
                }
            }
        }));
        let node = root("spec:\n  replicas: 3\n");
        let path = [Segment::Key("spec".into()), Segment::Key("replicas".into())];
        let set = schemas_at(&doc, Some(node.as_ref()), &path, doc.root);
        assert_eq!(doc.node(set[0]).description.as_deref(), Some("Count"));
    }

    #[test]
    fn test_schemas_at_missing_node() {
        let doc = compile(json!({
            "properties": { "spec": { "properties": { "image": { "type": "string" } } } }
        }));
        let node = root("other: 1\n");
        let path = [Segment::Key("spec".into())];
        let set = schemas_at(&doc, Some(node.as_ref()), &path, doc.root);
        assert!(doc.node(set[0]).properties.contains_key("image"));
    }

    #[test]
    fn test_type_matches() {
        let types = vec!["number".to_string()];
        assert!(type_matches(&types, &root("a: 1\n").pairs()[0].value));
        let types = vec!["object".to_string()];
        assert!(!type_matches(&types, &root("a: 1\n").pairs()[0].value));
        assert!(type_matches(&[], &root("a: 1\n")));
    }

    #[test]
    fn test_recursive_schema_terminates() {
        let doc = compile(json!({
            "type": "object",
            "properties": { "child": { "$ref": "#" } },
            "anyOf": [{ "$ref": "#" }]
        }));
        let node = root("child:\n  child: {}\n");
        let path = [Segment::Key("child".into()), Segment::Key("child".into())];
        let set = schemas_at(&doc, Some(node.as_ref()), &path, doc.root);
        assert!(set.contains(&doc.root));
    }
}
