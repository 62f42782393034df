//! Hover documentation from schema annotations

use std::sync::Arc;

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Url};

use crate::document::Document;
use crate::parser::Segment;
use crate::schema::matcher::schemas_at;
use crate::schema::model::SchemaDocument;

/// Hover for the node at `offset`: title and description of the narrowest
/// schema nodes that document it, one section per schema
pub fn hover(document: &Document, offset: usize, schemas: &[Arc<SchemaDocument>]) -> Option<Hover> {
    let tree = document.tree_at(offset)?;
    let target = tree.node_at(offset)?;
    if target.is_error() {
        return None;
    }
    let root = tree.root.as_ref()?;
    let path: Vec<Segment> = root
        .path_to(offset)
        .into_iter()
        .filter_map(|step| step.segment)
        .collect();

    let sections: Vec<String> = schemas
        .iter()
        .filter_map(|schema| section(schema, root, &path))
        .collect();
    if sections.is_empty() {
        return None;
    }

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: sections.join("\n\n---\n\n"),
        }),
        range: Some(document.range_of(&target.range)),
    })
}

fn section(schema: &SchemaDocument, root: &crate::parser::NodeRef, path: &[Segment]) -> Option<String> {
    let set = schemas_at(schema, Some(root.as_ref()), path, schema.root);
    let title = set.iter().find_map(|id| schema.node(*id).title.as_deref());
    let description = set.iter().find_map(|id| schema.node(*id).documentation());
    if title.is_none() && description.is_none() {
        return None;
    }

    let mut markdown = String::new();
    if let Some(title) = title {
        markdown.push_str(&format!("#### {title}\n\n"));
    }
    if let Some(description) = description {
        markdown.push_str(description);
        markdown.push_str("\n\n");
    }
    markdown.push_str(&format!("Source: [{}]({})", schema_name(&schema.uri), schema.uri));
    Some(markdown)
}

/// Short display name of a schema: the last path segment of its URI
pub fn schema_name(uri: &Url) -> String {
    uri.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|name| {
            percent_encoding::percent_decode_str(name)
                .decode_utf8_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| uri.to_string())
}
