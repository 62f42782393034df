//! Document state management

use std::ops::Range;
use std::sync::{Arc, OnceLock};

use tower_lsp::lsp_types::{Position, Url};

use crate::parser::{parse_yaml, YamlDocument};

/// Represents the state of a text document
#[derive(Debug, Clone)]
pub struct Document {
    /// The document URI
    pub uri: Url,
    /// The document text content
    pub text: String,
    /// The document version
    pub version: i32,
    /// Offset <-> position conversion for `text`
    pub line_index: LineIndex,
    trees: OnceLock<Arc<Vec<YamlDocument>>>,
}

impl Document {
    /// Create a new document with the given text and version
    pub fn new(uri: Url, text: String, version: i32) -> Self {
        let line_index = LineIndex::new(&text);
        Self {
            uri,
            text,
            version,
            line_index,
            trees: OnceLock::new(),
        }
    }

    /// The parsed YAML documents, built on first use
    pub fn trees(&self) -> Arc<Vec<YamlDocument>> {
        Arc::clone(self.trees.get_or_init(|| Arc::new(parse_yaml(&self.text))))
    }

    /// The YAML document containing `offset`
    pub fn tree_at(&self, offset: usize) -> Option<YamlDocument> {
        let trees = self.trees();
        trees
            .iter()
            .find(|doc| doc.range.start <= offset && offset <= doc.range.end)
            .or_else(|| trees.last())
            .cloned()
    }

    pub fn offset_of(&self, position: Position) -> usize {
        self.line_index.offset(&self.text, position)
    }

    pub fn position_of(&self, offset: usize) -> Position {
        self.line_index.position(&self.text, offset)
    }

    pub fn range_of(&self, range: &Range<usize>) -> tower_lsp::lsp_types::Range {
        tower_lsp::lsp_types::Range {
            start: self.position_of(range.start),
            end: self.position_of(range.end),
        }
    }
}

/// Line start offsets of a text, converting between byte offsets and LSP
/// positions (UTF-16 columns)
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    /// Byte offset where `line` starts
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Zero-based line containing `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    pub fn position(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(text.len());
        let line = self.line_of(offset);
        let start = self.line_starts[line];
        let character = text
            .get(start..offset)
            .map(|s| s.encode_utf16().count())
            .unwrap_or(offset - start);
        Position {
            line: line as u32,
            character: character as u32,
        }
    }

    pub fn offset(&self, text: &str, position: Position) -> usize {
        let Some(start) = self.line_start(position.line as usize) else {
            return text.len();
        };
        let mut remaining = position.character as usize;
        for (i, c) in text[start..].char_indices() {
            if remaining == 0 || c == '\n' {
                return start + i;
            }
            remaining = remaining.saturating_sub(c.len_utf16());
        }
        text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new(
            Url::parse("file:///test.yaml").expect("url"),
            text.to_string(),
            1,
        )
    }

    #[test]
    fn test_position_roundtrip() {
        let d = doc("a: 1\nbb: 2\n");
        let position = d.position_of(7);
        assert_eq!(position, Position { line: 1, character: 2 });
        assert_eq!(d.offset_of(position), 7);
    }

    #[test]
    fn test_utf16_columns() {
        let d = doc("k: 😀x\n");
        // The emoji is two UTF-16 code units and four bytes
        let x = d.text.find('x').expect("x");
        assert_eq!(d.position_of(x), Position { line: 0, character: 5 });
        assert_eq!(d.offset_of(Position { line: 0, character: 5 }), x);
    }

    #[test]
    fn test_offset_clamps_to_line_end() {
        let d = doc("ab\ncd\n");
        assert_eq!(d.offset_of(Position { line: 0, character: 10 }), 2);
        assert_eq!(d.offset_of(Position { line: 9, character: 0 }), d.text.len());
    }

    #[test]
    fn test_trees_are_cached() {
        let d = doc("a: 1\n---\nb: 2\n");
        let first = d.trees();
        let second = d.trees();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_tree_at_picks_sub_document() {
        let d = doc("a: 1\n---\nb: 2\n");
        let offset = d.text.find('b').expect("b");
        let tree = d.tree_at(offset).expect("tree");
        assert!(tree.root.expect("root").get("b").is_some());
    }
}
