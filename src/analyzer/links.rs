//! Document links: URL scalars and `$ref` pointers

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use tower_lsp::lsp_types::{DocumentLink, Url};

use crate::document::Document;
use crate::parser::{NodeKind, NodeRef, Segment, YamlDocument, YamlNode};

pub fn document_links(document: &Document) -> Vec<DocumentLink> {
    let mut links = Vec::new();
    let mut visited = HashSet::new();
    for tree in document.trees().iter() {
        if let Some(root) = &tree.root {
            collect(document, tree, root, false, &mut visited, &mut links);
        }
    }
    links
}

fn collect(
    document: &Document,
    tree: &YamlDocument,
    node: &NodeRef,
    is_ref: bool,
    visited: &mut HashSet<*const YamlNode>,
    links: &mut Vec<DocumentLink>,
) {
    if !visited.insert(Arc::as_ptr(node)) {
        return;
    }
    match &node.kind {
        NodeKind::Mapping(pairs) => {
            for pair in pairs {
                let is_ref = pair.key.as_str() == Some("$ref");
                collect(document, tree, &pair.value, is_ref, visited, links);
            }
        }
        NodeKind::Sequence(items) => {
            for item in items {
                collect(document, tree, item, false, visited, links);
            }
        }
        NodeKind::Scalar { .. } => {
            let Some(text) = node.as_str() else {
                return;
            };
            let target = if is_ref {
                reference_target(document, tree, text)
            } else {
                url_target(text)
            };
            if let Some(target) = target {
                links.push(DocumentLink {
                    range: document.range_of(&unquoted(&document.text, &node.range)),
                    target: Some(target),
                    tooltip: None,
                    data: None,
                });
            }
        }
        NodeKind::Error { .. } => {}
    }
}

fn url_target(text: &str) -> Option<Url> {
    let url = Url::parse(text.trim()).ok()?;
    matches!(url.scheme(), "http" | "https" | "file").then_some(url)
}

/// Target of a `$ref`: a position in this document for `#/pointer`,
/// otherwise the referenced file relative to this document
fn reference_target(document: &Document, tree: &YamlDocument, reference: &str) -> Option<Url> {
    let Some(pointer) = reference.strip_prefix('#') else {
        return document.uri.join(reference).ok();
    };
    let node = tree.node_at_path(&pointer_path(tree, pointer)?)?;
    let position = document.position_of(node.range.start);
    let mut target = document.uri.clone();
    target.set_fragment(Some(&format!("L{},{}", position.line + 1, position.character + 1)));
    Some(target)
}

/// Turn a JSON pointer into tree segments, reading numeric tokens as indices
/// where the tree has a sequence
fn pointer_path(tree: &YamlDocument, pointer: &str) -> Option<Vec<Segment>> {
    if pointer.is_empty() {
        return Some(Vec::new());
    }
    let mut current = Arc::clone(tree.root.as_ref()?);
    let mut path = Vec::new();
    for token in pointer.strip_prefix('/')?.split('/') {
        let token = token.replace("~1", "/").replace("~0", "~");
        let segment = match (&current.kind, token.parse::<usize>()) {
            (NodeKind::Sequence(_), Ok(index)) => Segment::Index(index),
            _ => Segment::Key(token),
        };
        let next = match &segment {
            Segment::Key(key) => current.get(key).cloned(),
            Segment::Index(index) => current.items().get(*index).cloned(),
        }?;
        path.push(segment);
        current = next;
    }
    Some(path)
}

fn unquoted(text: &str, range: &Range<usize>) -> Range<usize> {
    let source = &text[range.clone()];
    let quoted = source.len() >= 2
        && ((source.starts_with('"') && source.ends_with('"'))
            || (source.starts_with('\'') && source.ends_with('\'')));
    if quoted {
        (range.start + 1)..(range.end - 1)
    } else {
        range.clone()
    }
}
