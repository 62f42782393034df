//! Folding ranges for multi-line collections

use std::collections::HashSet;
use std::sync::Arc;

use tower_lsp::lsp_types::{FoldingRange, FoldingRangeKind};

use crate::document::Document;
use crate::parser::{NodeKind, NodeRef, YamlNode};

/// One range per collection value spanning more than one line, starting at
/// the line of its key
pub fn folding_ranges(document: &Document) -> Vec<FoldingRange> {
    let mut ranges = Vec::new();
    let mut visited = HashSet::new();
    for tree in document.trees().iter() {
        if let Some(root) = &tree.root {
            collect(document, root, &mut visited, &mut ranges);
        }
    }
    ranges.sort_by_key(|range| (range.start_line, range.end_line));
    ranges
}

fn collect(
    document: &Document,
    node: &NodeRef,
    visited: &mut HashSet<*const YamlNode>,
    ranges: &mut Vec<FoldingRange>,
) {
    if !visited.insert(Arc::as_ptr(node)) {
        return;
    }
    match &node.kind {
        NodeKind::Mapping(pairs) => {
            for pair in pairs {
                if is_collection(&pair.value) && pair.value.range.start > pair.key.range.start {
                    push(document, pair.key.range.start, pair.value.range.end, ranges);
                }
                collect(document, &pair.value, visited, ranges);
            }
        }
        NodeKind::Sequence(items) => {
            for item in items {
                if is_collection(item) {
                    push(document, item.range.start, item.range.end, ranges);
                }
                collect(document, item, visited, ranges);
            }
        }
        _ => {}
    }
}

fn is_collection(node: &YamlNode) -> bool {
    matches!(node.kind, NodeKind::Mapping(_) | NodeKind::Sequence(_))
}

fn push(document: &Document, start: usize, end: usize, ranges: &mut Vec<FoldingRange>) {
    let start_line = document.line_index.line_of(start) as u32;
    let end_line = document.line_index.line_of(end.saturating_sub(1).max(start)) as u32;
    if end_line > start_line {
        ranges.push(FoldingRange {
            start_line,
            start_character: None,
            end_line,
            end_character: None,
            kind: Some(FoldingRangeKind::Region),
            collapsed_text: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Url;

    fn lines(text: &str) -> Vec<(u32, u32)> {
        let document = Document::new(Url::parse("file:///t.yaml").expect("url"), text.to_string(), 1);
        folding_ranges(&document)
            .into_iter()
            .map(|range| (range.start_line, range.end_line))
            .collect()
    }

    #[test]
    fn test_nested_mappings() {
        let text = "spec:\n  template:\n    a: 1\n    b: 2\nkind: Pod\n";
        assert_eq!(lines(text), vec![(0, 3), (1, 3)]);
    }

    #[test]
    fn test_sequence_items() {
        let text = "items:\n  - name: a\n    value: 1\n  - name: b\n";
        assert_eq!(lines(text), vec![(0, 3), (1, 2)]);
    }

    #[test]
    fn test_single_line_collections_do_not_fold() {
        assert!(lines("a: {b: 1}\nc: [1, 2]\n").is_empty());
    }
}
