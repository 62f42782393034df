//! Schema driven completion
//!
//! The cursor is first classified as a key or a value position together with
//! the path of the mapping it belongs to. The parent is found by indentation
//! against the lines above the cursor, so the line being typed does not need
//! to parse.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use serde_json::Value;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Documentation, MarkupContent, MarkupKind,
    TextEdit,
};

use crate::document::Document;
use crate::parser::{NodeKind, NodeRef, ScalarValue, Segment};
use crate::schema::matcher::{match_absent, schemas_at};
use crate::schema::model::{SchemaDocument, SchemaId};

/// What the cursor is positioned on
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionContext {
    /// A key of the mapping at `path`
    Key {
        path: Vec<Segment>,
        existing: Vec<String>,
        replace: Range<usize>,
    },
    /// The value at `path`
    Value {
        path: Vec<Segment>,
        replace: Range<usize>,
    },
    /// Nothing to complete, e.g. inside a comment
    None,
}

/// Completion candidates at `offset`, unioned by label across `schemas`
pub fn complete(document: &Document, offset: usize, schemas: &[Arc<SchemaDocument>]) -> Vec<CompletionItem> {
    let root = document.tree_at(offset).and_then(|tree| tree.root);
    let context = completion_context(document, root.as_ref(), offset);

    let (candidates, replace) = match &context {
        CompletionContext::Key {
            path,
            existing,
            replace,
        } => (
            schemas
                .iter()
                .flat_map(|schema| key_candidates(schema, root.as_ref(), path, existing))
                .collect::<Vec<_>>(),
            replace.clone(),
        ),
        CompletionContext::Value { path, replace } => (
            schemas
                .iter()
                .flat_map(|schema| value_candidates(schema, root.as_ref(), path))
                .collect(),
            replace.clone(),
        ),
        CompletionContext::None => return Vec::new(),
    };

    let range = document.range_of(&replace);
    let mut labels = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| labels.insert(candidate.label.clone()))
        .enumerate()
        .map(|(index, candidate)| candidate.into_item(index, range))
        .collect()
}

/// Classify the cursor position
pub fn completion_context(document: &Document, root: Option<&NodeRef>, offset: usize) -> CompletionContext {
    let text = document.text.as_str();
    let line_start = document
        .line_index
        .line_start(document.line_index.line_of(offset))
        .unwrap_or(0);
    let line_end = text[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(text.len());
    let prefix = &text[line_start..offset];

    if let Some(context) = flow_mapping_context(text, root, offset) {
        return context;
    }

    // Skip indentation and sequence indicators
    let mut column = prefix.len() - prefix.trim_start().len();
    let mut rest = &prefix[column..];
    while let Some(after) = rest.strip_prefix("- ") {
        let after_trimmed = after.trim_start();
        column += rest.len() - after_trimmed.len();
        rest = after_trimmed;
    }

    if rest.starts_with('#') || rest == "-" {
        return CompletionContext::None;
    }

    let (path, parent) = parent_path(document, root, column, line_start, offset);

    if let Some(colon) = value_colon(rest) {
        let key = rest[..colon].trim().trim_matches(['"', '\'']);
        let mut path = path;
        path.push(Segment::Key(key.to_string()));

        let after_colon = line_start + column + colon + 1;
        let value_start = after_colon + (text[after_colon..offset].len() - text[after_colon..offset].trim_start().len());
        let value_end = token_end(text, offset, line_end, |c| c.is_whitespace());
        return CompletionContext::Value {
            path,
            replace: value_start..value_end,
        };
    }

    let existing = parent
        .map(|node| {
            node.pairs()
                .iter()
                .filter_map(|pair| pair.key.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let key_end = token_end(text, offset, line_end, |c| c.is_whitespace() || c == ':');
    CompletionContext::Key {
        path,
        existing,
        replace: (line_start + column)..key_end,
    }
}

/// Inside `{ ... }` the tree knows the mapping even mid-line
fn flow_mapping_context(text: &str, root: Option<&NodeRef>, offset: usize) -> Option<CompletionContext> {
    let steps = root?.path_to(offset);
    let last = steps.last()?;
    let node = &last.node;
    let inside = node.range.start < offset && offset < node.range.end;
    if last.is_key || !node.is_mapping() || !inside || !text[node.range.clone()].starts_with('{') {
        return None;
    }

    let word_start = text[..offset]
        .rfind(|c: char| c == '{' || c == ',' || c.is_whitespace())
        .map(|i| i + 1)
        .unwrap_or(offset);
    Some(CompletionContext::Key {
        path: steps.iter().filter_map(|step| step.segment.clone()).collect(),
        existing: node
            .pairs()
            .iter()
            .filter_map(|pair| pair.key.as_str().map(str::to_string))
            .collect(),
        replace: word_start..offset,
    })
}

/// Find the mapping that a line indented to `column` belongs to.
///
/// Returns the path to it and the node itself when it exists; `None` when
/// the line opens a new mapping below an empty or scalar value.
fn parent_path(
    document: &Document,
    root: Option<&NodeRef>,
    column: usize,
    line_start: usize,
    offset: usize,
) -> (Vec<Segment>, Option<NodeRef>) {
    let mut path = Vec::new();
    let Some(mut node) = root.cloned() else {
        return (path, None);
    };

    loop {
        let next = match &node.kind {
            NodeKind::Mapping(pairs) => {
                let Some(first) = pairs.first() else {
                    return (path, Some(Arc::clone(&node)));
                };
                if column_of(document, first.key.range.start) >= column {
                    return (path, Some(Arc::clone(&node)));
                }
                let Some(pair) = pairs.iter().rev().find(|pair| pair.key.range.start < line_start) else {
                    return (path, Some(Arc::clone(&node)));
                };
                let Some(key) = pair.key.as_str() else {
                    return (path, None);
                };
                path.push(Segment::Key(key.to_string()));
                Arc::clone(&pair.value)
            }
            NodeKind::Sequence(items) => {
                let Some((index, item)) = items
                    .iter()
                    .enumerate()
                    .rev()
                    .find(|(_, item)| item.range.start <= offset)
                else {
                    return (path, Some(Arc::clone(&node)));
                };
                path.push(Segment::Index(index));
                Arc::clone(item)
            }
            _ => return (path, None),
        };
        node = next;
    }
}

fn column_of(document: &Document, offset: usize) -> usize {
    let line = document.line_index.line_of(offset);
    offset - document.line_index.line_start(line).unwrap_or(0)
}

/// Byte index of a `:` that separates a key from its value
fn value_colon(rest: &str) -> Option<usize> {
    let mut quote = None;
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') if i == 0 => quote = Some(c),
            (None, '#') => return None,
            (None, ':') => match chars.peek() {
                None | Some((_, ' ' | '\t')) => return Some(i),
                _ => {}
            },
            _ => {}
        }
    }
    None
}

fn token_end(text: &str, offset: usize, line_end: usize, stop: impl Fn(char) -> bool) -> usize {
    text[offset..line_end]
        .find(stop)
        .map(|i| offset + i)
        .unwrap_or(line_end)
}

/// A completion candidate before it is placed in the document
#[derive(Debug, Clone)]
struct Candidate {
    label: String,
    kind: CompletionItemKind,
    insert: String,
    detail: Option<String>,
    documentation: Option<String>,
}

impl Candidate {
    fn into_item(self, index: usize, range: tower_lsp::lsp_types::Range) -> CompletionItem {
        CompletionItem {
            label: self.label,
            kind: Some(self.kind),
            detail: self.detail,
            documentation: self.documentation.map(|value| {
                Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value,
                })
            }),
            sort_text: Some(format!("{index:04}")),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range,
                new_text: self.insert,
            })),
            ..Default::default()
        }
    }
}

fn key_candidates(
    schema: &SchemaDocument,
    root: Option<&NodeRef>,
    path: &[Segment],
    existing: &[String],
) -> Vec<Candidate> {
    let set = schemas_at(schema, root.map(|node| node.as_ref()), path, schema.root);
    let mut candidates = Vec::new();
    for id in set {
        for (name, &property) in &schema.node(id).properties {
            if existing.contains(name) {
                continue;
            }
            let annotations = match_absent(schema, property);
            candidates.push(Candidate {
                label: name.clone(),
                kind: CompletionItemKind::PROPERTY,
                insert: format!("{name}: "),
                detail: annotations
                    .iter()
                    .find_map(|id| schema.node(*id).default.as_ref())
                    .map(|default| format!("Default: {}", render_value(default))),
                documentation: documentation(schema, &annotations),
            });
        }
    }
    candidates
}

fn value_candidates(schema: &SchemaDocument, root: Option<&NodeRef>, path: &[Segment]) -> Vec<Candidate> {
    let set = schemas_at(schema, root.map(|node| node.as_ref()), path, schema.root);
    let description = documentation(schema, &set);

    let allowed: Vec<Value> = set
        .iter()
        .filter_map(|id| schema.node(*id).allowed_values())
        .flatten()
        .collect();
    if !allowed.is_empty() {
        return allowed
            .iter()
            .map(|value| value_candidate(value, CompletionItemKind::ENUM_MEMBER, description.clone()))
            .collect();
    }

    let defaults: Vec<&Value> = set
        .iter()
        .filter_map(|id| schema.node(*id).default.as_ref())
        .collect();
    if !defaults.is_empty() {
        return defaults
            .into_iter()
            .map(|value| value_candidate(value, CompletionItemKind::VALUE, description.clone()))
            .collect();
    }

    let mut candidates = Vec::new();
    for id in &set {
        for ty in &schema.node(*id).types {
            let placeholders: &[(&str, &str)] = match ty.as_str() {
                "boolean" => &[("true", "true"), ("false", "false")],
                "null" => &[("null", "null")],
                "object" => &[("{}", "{}")],
                "array" => &[("[]", "[]")],
                _ => &[],
            };
            for (label, insert) in placeholders {
                candidates.push(Candidate {
                    label: label.to_string(),
                    kind: CompletionItemKind::VALUE,
                    insert: insert.to_string(),
                    detail: None,
                    documentation: description.clone(),
                });
            }
        }
    }
    candidates
}

fn value_candidate(value: &Value, kind: CompletionItemKind, documentation: Option<String>) -> Candidate {
    let text = render_value(value);
    Candidate {
        label: match value {
            Value::String(s) => s.clone(),
            _ => text.clone(),
        },
        kind,
        insert: text,
        detail: None,
        documentation,
    }
}

fn documentation(schema: &SchemaDocument, set: &[SchemaId]) -> Option<String> {
    set.iter()
        .find_map(|id| schema.node(*id).documentation())
        .map(str::to_string)
}

/// Render a JSON value as YAML text, quoting strings that would otherwise
/// read as something else
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) if needs_quotes(s) => serde_json::to_string(s).unwrap_or_else(|_| s.clone()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || ScalarValue::from_plain(s) != ScalarValue::String(s.to_string())
        || s.contains(": ")
        || s.contains(" #")
        || s.ends_with(':')
        || s.starts_with([
            '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::SchemaCompiler;
    use serde_json::json;
    use tower_lsp::lsp_types::Url;

    fn document(text: &str) -> Document {
        Document::new(Url::parse("file:///test.yaml").expect("url"), text.to_string(), 1)
    }

    fn schema(value: Value) -> Arc<SchemaDocument> {
        let base = Url::parse("file:///schema.json").expect("url");
        let mut compiler = SchemaCompiler::new();
        let root = compiler.add_resource(&base, value);
        Arc::new(compiler.finish(base, root, None))
    }

    fn context(text: &str, offset: usize) -> CompletionContext {
        let doc = document(text);
        let root = doc.tree_at(offset).and_then(|tree| tree.root);
        completion_context(&doc, root.as_ref(), offset)
    }

    fn labels(text: &str, offset: usize, value: Value) -> Vec<String> {
        let doc = document(text);
        complete(&doc, offset, &[schema(value)])
            .into_iter()
            .map(|item| item.label)
            .collect()
    }

    fn k8s() -> Value {
        json!({
            "type": "object",
            "required": ["kind"],
            "properties": {
                "kind": { "enum": ["Pod", "Service"], "description": "Resource kind" },
                "metadata": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Object name" },
                        "labels": { "type": "object" }
                    }
                },
                "enabled": { "type": "boolean", "default": true }
            }
        })
    }

    #[test]
    fn test_value_context() {
        assert_eq!(
            context("kind: ", 6),
            CompletionContext::Value {
                path: vec![Segment::Key("kind".into())],
                replace: 6..6,
            }
        );
    }

    #[test]
    fn test_key_context_on_empty_line() {
        let text = "metadata:\n  name: x\n  ";
        assert_eq!(
            context(text, text.len()),
            CompletionContext::Key {
                path: vec![Segment::Key("metadata".into())],
                existing: vec!["name".into()],
                replace: text.len()..text.len(),
            }
        );
    }

    #[test]
    fn test_key_context_below_empty_value() {
        let text = "metadata:\n  ";
        assert_matches::assert_matches!(
            context(text, text.len()),
            CompletionContext::Key { path, existing, .. }
                if path == vec![Segment::Key("metadata".into())] && existing.is_empty()
        );
    }

    #[test]
    fn test_key_context_in_sequence_item() {
        let text = "items:\n  - a: 1\n    ";
        assert_matches::assert_matches!(
            context(text, text.len()),
            CompletionContext::Key { path, .. }
                if path == vec![Segment::Key("items".into()), Segment::Index(0)]
        );
    }

    #[test]
    fn test_comment_has_no_context() {
        assert_eq!(context("# kind: ", 8), CompletionContext::None);
    }

    #[test]
    fn test_enum_values() {
        assert_eq!(labels("kind: ", 6, k8s()), vec!["Pod", "Service"]);
        assert_eq!(labels("kind: Pod\n", 6, k8s()), vec!["Pod", "Service"]);
    }

    #[test]
    fn test_missing_keys_only() {
        let text = "kind: Pod\n";
        assert_eq!(labels(text, text.len(), k8s()), vec!["metadata", "enabled"]);
    }

    #[test]
    fn test_nested_keys() {
        let text = "kind: Pod\nmetadata:\n  ";
        assert_eq!(labels(text, text.len(), k8s()), vec!["name", "labels"]);
    }

    #[test]
    fn test_boolean_default() {
        let items = complete(&document("enabled: "), 9, &[schema(k8s())]);
        let labels: Vec<_> = items.iter().map(|item| item.label.as_str()).collect();
        assert_eq!(labels, vec!["true"]);
    }

    #[test]
    fn test_key_item_annotations() {
        let items = complete(&document(""), 0, &[schema(k8s())]);
        let kind = items.iter().find(|item| item.label == "kind").expect("kind");
        assert_matches::assert_matches!(
            &kind.text_edit,
            Some(CompletionTextEdit::Edit(edit)) if edit.new_text == "kind: "
        );
        assert_matches::assert_matches!(
            &kind.documentation,
            Some(Documentation::MarkupContent(content)) if content.value == "Resource kind"
        );
        let enabled = items.iter().find(|item| item.label == "enabled").expect("enabled");
        assert_eq!(enabled.detail.as_deref(), Some("Default: true"));
    }

    #[test]
    fn test_union_across_schemas() {
        let doc = document("");
        let first = schema(json!({ "properties": { "a": {}, "b": {} } }));
        let second = schema(json!({ "properties": { "b": {}, "c": {} } }));
        let labels: Vec<_> = complete(&doc, 0, &[first, second])
            .into_iter()
            .map(|item| item.label)
            .collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_flow_mapping_keys() {
        let text = "metadata: {}";
        let offset = text.len() - 1;
        assert_eq!(labels(text, offset, k8s()), vec!["name", "labels"]);
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("Pod")), "Pod");
        assert_eq!(render_value(&json!("yes")), "yes");
        assert_eq!(render_value(&json!("true")), "\"true\"");
        assert_eq!(render_value(&json!("1.0")), "\"1.0\"");
        assert_eq!(render_value(&json!("a: b")), "\"a: b\"");
        assert_eq!(render_value(&json!(3)), "3");
    }
}
