//! Document outline: one symbol per mapping key and sequence item

use std::collections::HashSet;

use tower_lsp::lsp_types::{DocumentSymbol, SymbolKind};

use crate::document::Document;
use crate::parser::{NodeKind, NodeRef, ScalarValue, YamlNode};

/// Hierarchical symbols for every YAML document in the text
pub fn document_symbols(document: &Document) -> Vec<DocumentSymbol> {
    let mut symbols = Vec::new();
    for tree in document.trees().iter() {
        let Some(root) = &tree.root else {
            continue;
        };
        let mut expanded = HashSet::new();
        symbols.extend(children(document, root, &mut expanded));
    }
    symbols
}

fn children(document: &Document, node: &NodeRef, expanded: &mut HashSet<*const YamlNode>) -> Vec<DocumentSymbol> {
    // An alias shares its anchor's node; only outline it once
    if !expanded.insert(std::sync::Arc::as_ptr(node)) {
        return Vec::new();
    }
    match &node.kind {
        NodeKind::Mapping(pairs) => pairs
            .iter()
            .filter_map(|pair| {
                let name = match &pair.key.kind {
                    NodeKind::Scalar { text, .. } => text.clone(),
                    _ => return None,
                };
                let end = pair.value.range.end.max(pair.key.range.end);
                Some(symbol(
                    document,
                    name,
                    pair.key.range.start..end,
                    pair.key.range.clone(),
                    &pair.value,
                    expanded,
                ))
            })
            .collect(),
        NodeKind::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                symbol(
                    document,
                    format!("[{index}]"),
                    item.range.clone(),
                    item.range.clone(),
                    item,
                    expanded,
                )
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn symbol(
    document: &Document,
    name: String,
    range: std::ops::Range<usize>,
    selection: std::ops::Range<usize>,
    value: &NodeRef,
    expanded: &mut HashSet<*const YamlNode>,
) -> DocumentSymbol {
    let nested = match value.kind {
        NodeKind::Mapping(_) | NodeKind::Sequence(_) => Some(children(document, value, expanded)),
        _ => None,
    };
    let detail = match &value.kind {
        NodeKind::Scalar { text, .. } if !text.is_empty() => Some(text.clone()),
        _ => None,
    };

    #[allow(deprecated)]
    DocumentSymbol {
        name,
        detail,
        kind: symbol_kind(value),
        tags: None,
        deprecated: None,
        range: document.range_of(&range),
        selection_range: document.range_of(&selection),
        children: nested,
    }
}

fn symbol_kind(node: &YamlNode) -> SymbolKind {
    match &node.kind {
        NodeKind::Mapping(_) => SymbolKind::MODULE,
        NodeKind::Sequence(_) => SymbolKind::ARRAY,
        NodeKind::Scalar { value, .. } => match value {
            ScalarValue::Null => SymbolKind::NULL,
            ScalarValue::Bool(_) => SymbolKind::BOOLEAN,
            ScalarValue::Int(_) | ScalarValue::Float(_) => SymbolKind::NUMBER,
            ScalarValue::String(_) => SymbolKind::STRING,
        },
        NodeKind::Error { .. } => SymbolKind::NULL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Url;

    fn symbols(text: &str) -> Vec<DocumentSymbol> {
        let document = Document::new(Url::parse("file:///t.yaml").expect("url"), text.to_string(), 1);
        document_symbols(&document)
    }

    #[test]
    fn test_nested_outline() {
        let result = symbols("kind: Pod\nspec:\n  containers:\n    - name: app\n");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "kind");
        assert_eq!(result[0].kind, SymbolKind::STRING);
        assert_eq!(result[0].detail.as_deref(), Some("Pod"));

        let spec = &result[1];
        assert_eq!(spec.kind, SymbolKind::MODULE);
        let containers = &spec.children.as_ref().expect("children")[0];
        assert_eq!(containers.name, "containers");
        assert_eq!(containers.kind, SymbolKind::ARRAY);
        let item = &containers.children.as_ref().expect("items")[0];
        assert_eq!(item.name, "[0]");
        assert_eq!(item.children.as_ref().expect("fields")[0].name, "name");
    }

    #[test]
    fn test_selection_is_key() {
        let result = symbols("spec:\n  a: 1\n");
        let spec = &result[0];
        assert_eq!(spec.selection_range.end.character, 4);
        assert_eq!(spec.range.end.line, 1);
    }

    #[test]
    fn test_multiple_documents() {
        let result = symbols("a: 1\n---\nb: true\n");
        let names: Vec<_> = result.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(result[1].kind, SymbolKind::BOOLEAN);
    }

    #[test]
    fn test_alias_is_outlined_once() {
        let result = symbols("base: &b\n  x: 1\ncopy: *b\n");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].children.as_ref().map(Vec::len), Some(1));
        assert_eq!(result[1].children.as_ref().map(Vec::len), Some(0));
    }
}
