//! Quick fixes for our own diagnostics

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, Diagnostic, TextEdit, WorkspaceEdit,
};

use crate::diagnostics::DiagnosticCode;
use crate::document::Document;
use crate::parser::{NodeKind, NodeRef, Pair, YamlNode};

/// Code actions fixing the given diagnostics, skipping those produced by
/// someone else or that no longer match the text
pub fn code_actions(document: &Document, diagnostics: &[Diagnostic]) -> Vec<CodeActionOrCommand> {
    diagnostics
        .iter()
        .filter_map(|diagnostic| {
            let code = DiagnosticCode::of(diagnostic)?;
            let property = diagnostic
                .data
                .as_ref()
                .and_then(|data| data.get("property"))
                .and_then(|value| value.as_str())?;
            let range = document.offset_of(diagnostic.range.start)..document.offset_of(diagnostic.range.end);

            let (title, edit) = match code {
                DiagnosticCode::MissingProperty => (
                    format!("Add missing property \"{property}\""),
                    insert_property(document, &range, property)?,
                ),
                DiagnosticCode::PropertyNotAllowed => (
                    format!("Remove property \"{property}\""),
                    remove_pair(document, &range)?,
                ),
                DiagnosticCode::DuplicateKey => (
                    format!("Remove duplicate key \"{property}\""),
                    remove_pair(document, &range)?,
                ),
                _ => return None,
            };
            Some(quick_fix(document, diagnostic, title, edit))
        })
        .collect()
}

fn quick_fix(document: &Document, diagnostic: &Diagnostic, title: String, edit: TextEdit) -> CodeActionOrCommand {
    let changes = HashMap::from([(document.uri.clone(), vec![edit])]);
    CodeActionOrCommand::CodeAction(CodeAction {
        title,
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: Some(vec![diagnostic.clone()]),
        edit: Some(WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        }),
        is_preferred: Some(true),
        ..Default::default()
    })
}

/// Append `property: ` to the mapping spanning `range`
fn insert_property(document: &Document, range: &Range<usize>, property: &str) -> Option<TextEdit> {
    let mapping = find(document, range.start, |node| node.is_mapping() && node.range == *range)?;
    let text = &document.text;

    let (offset, new_text) = if text[mapping.range.clone()].starts_with('{') {
        let close = mapping.range.end - 1;
        if mapping.pairs().is_empty() {
            (close, format!("{property}: "))
        } else {
            (close, format!(", {property}: "))
        }
    } else {
        let first = mapping.pairs().first()?;
        let indent = first.key.range.start - line_start(document, first.key.range.start);
        (
            mapping.range.end,
            format!("\n{}{property}: ", " ".repeat(indent)),
        )
    };

    let position = document.position_of(offset);
    Some(TextEdit {
        range: tower_lsp::lsp_types::Range {
            start: position,
            end: position,
        },
        new_text,
    })
}

/// Delete the pair whose key spans `range`
fn remove_pair(document: &Document, range: &Range<usize>) -> Option<TextEdit> {
    let parent = find(document, range.start, |node| {
        node.pairs().iter().any(|pair| pair.key.range == *range)
    })?;
    let pair = parent.pairs().iter().find(|pair| pair.key.range == *range)?;
    let text = &document.text;

    let deletion = if text[parent.range.clone()].starts_with('{') {
        flow_pair_range(text, pair)
    } else {
        block_pair_range(document, pair)
    };
    Some(TextEdit {
        range: document.range_of(&deletion),
        new_text: String::new(),
    })
}

/// Whole lines of a block pair, or from the key on when something such as
/// a sequence indicator precedes it
fn block_pair_range(document: &Document, pair: &Pair) -> Range<usize> {
    let key = &pair.key.range;
    let start_of_line = line_start(document, key.start);
    let start = if document.text[start_of_line..key.start].trim().is_empty() {
        start_of_line
    } else {
        key.start
    };

    let end = pair.value.range.end.max(key.end);
    let last_line = document.line_index.line_of(end.saturating_sub(1).max(key.start));
    let end = document
        .line_index
        .line_start(last_line + 1)
        .unwrap_or(document.text.len());
    start..end
}

/// The pair and one adjoining comma
fn flow_pair_range(text: &str, pair: &Pair) -> Range<usize> {
    let start = pair.key.range.start;
    let end = pair.value.range.end.max(pair.key.range.end);
    let after = &text[end..];
    if let Some(rest) = after.trim_start().strip_prefix(',') {
        return start..(text.len() - rest.trim_start().len());
    }
    let before = text[..start].trim_end();
    match before.strip_suffix(',') {
        Some(kept) => kept.len()..end,
        None => start..end,
    }
}

fn line_start(document: &Document, offset: usize) -> usize {
    document
        .line_index
        .line_start(document.line_index.line_of(offset))
        .unwrap_or(0)
}

/// First node in the tree at `offset` satisfying `predicate`, searching
/// every node that contains the offset
fn find(document: &Document, offset: usize, predicate: impl Fn(&YamlNode) -> bool) -> Option<NodeRef> {
    let root = document.tree_at(offset)?.root?;
    let mut stack = vec![root];
    let mut visited = HashSet::new();
    while let Some(node) = stack.pop() {
        if !node.contains(offset) || !visited.insert(Arc::as_ptr(&node)) {
            continue;
        }
        if predicate(node.as_ref()) {
            return Some(node);
        }
        match &node.kind {
            NodeKind::Mapping(pairs) => stack.extend(pairs.iter().map(|pair| Arc::clone(&pair.value))),
            NodeKind::Sequence(items) => stack.extend(items.iter().cloned()),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{duplicate_keys, validate_tree, DiagnosticCollector};
    use crate::schema::model::{SchemaCompiler, SchemaDocument};
    use serde_json::{json, Value};
    use tower_lsp::lsp_types::Url;

    fn document(text: &str) -> Document {
        Document::new(Url::parse("file:///t.yaml").expect("url"), text.to_string(), 1)
    }

    fn schema(value: Value) -> SchemaDocument {
        let base = Url::parse("file:///schema.json").expect("url");
        let mut compiler = SchemaCompiler::new();
        let root = compiler.add_resource(&base, value);
        compiler.finish(base, root, None)
    }

    fn diagnostics(doc: &Document, schema: &SchemaDocument) -> Vec<Diagnostic> {
        let root = doc.tree_at(0).and_then(|tree| tree.root).expect("root");
        let mut collector = DiagnosticCollector::new(doc);
        for violation in duplicate_keys(&root).into_iter().chain(validate_tree(schema, &root)) {
            collector.add_violation(violation);
        }
        collector.into_diagnostics()
    }

    /// Apply the single edit of each action to the text
    fn fixed(doc: &Document, actions: &[CodeActionOrCommand]) -> Vec<String> {
        actions
            .iter()
            .map(|action| {
                let CodeActionOrCommand::CodeAction(action) = action else {
                    panic!("expected a code action");
                };
                let changes = action.edit.as_ref().and_then(|edit| edit.changes.as_ref()).expect("changes");
                let edit = &changes[&doc.uri][0];
                let start = doc.offset_of(edit.range.start);
                let end = doc.offset_of(edit.range.end);
                let mut text = doc.text.clone();
                text.replace_range(start..end, &edit.new_text);
                text
            })
            .collect()
    }

    #[test]
    fn test_insert_missing_property() {
        let schema = schema(json!({ "required": ["kind"] }));
        let doc = document("spec: {}\n");
        let actions = code_actions(&doc, &diagnostics(&doc, &schema));
        assert_eq!(fixed(&doc, &actions), vec!["spec: {}\nkind: \n"]);
        assert_matches::assert_matches!(
            &actions[0],
            CodeActionOrCommand::CodeAction(action) if action.title == "Add missing property \"kind\""
        );
    }

    #[test]
    fn test_insert_into_nested_and_flow_mappings() {
        let schema = schema(json!({
            "properties": {
                "meta": { "required": ["name"] },
                "spec": { "required": ["image"] }
            }
        }));
        let doc = document("meta:\n  labels: {}\nspec: {a: 1}\n");
        let actions = code_actions(&doc, &diagnostics(&doc, &schema));
        assert_eq!(
            fixed(&doc, &actions),
            vec![
                "meta:\n  labels: {}\n  name: \nspec: {a: 1}\n",
                "meta:\n  labels: {}\nspec: {a: 1, image: }\n",
            ]
        );
    }

    #[test]
    fn test_remove_property_not_allowed() {
        let schema = schema(json!({
            "properties": { "a": {}, "c": {} },
            "additionalProperties": false
        }));
        let doc = document("a: 1\nb:\n  x: 2\nc: 3\n");
        let actions = code_actions(&doc, &diagnostics(&doc, &schema));
        assert_eq!(fixed(&doc, &actions), vec!["a: 1\nc: 3\n"]);
    }

    #[test]
    fn test_remove_from_flow_mapping() {
        let schema = schema(json!({
            "properties": { "m": { "properties": { "a": {} }, "additionalProperties": false } }
        }));
        let doc = document("m: {a: 1, b: 2}\n");
        let actions = code_actions(&doc, &diagnostics(&doc, &schema));
        assert_eq!(fixed(&doc, &actions), vec!["m: {a: 1}\n"]);
    }

    #[test]
    fn test_remove_duplicate_key() {
        let schema = schema(json!({}));
        let doc = document("a: 1\nb: 2\na: 3\n");
        let actions = code_actions(&doc, &diagnostics(&doc, &schema));
        assert_eq!(fixed(&doc, &actions), vec!["a: 1\nb: 2\n"]);
    }

    #[test]
    fn test_foreign_diagnostics_are_ignored() {
        let doc = document("a: 1\n");
        let diagnostic = Diagnostic {
            source: Some("other".into()),
            message: "whatever".into(),
            ..Default::default()
        };
        assert!(code_actions(&doc, &[diagnostic]).is_empty());
    }
}
