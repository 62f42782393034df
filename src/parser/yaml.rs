//! YAML parsing with error recovery
//!
//! Each document of the stream is fed to the `yaml-rust2` event parser and
//! turned into a [`YamlDocument`]. When the scanner reports an error, the
//! offending line and its more-indented continuation lines are blanked out
//! (byte offsets are preserved) and the document is parsed again. Every
//! blanked region becomes an error node, so a broken line costs a diagnostic
//! but never the rest of the tree.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use super::node::{NodeKind, NodeRef, Pair, ScalarValue, SyntaxDiagnostic, YamlDocument, YamlNode};
use super::splitter::split_documents;

/// Parse YAML text into one tree per document.
///
/// Parsing never fails: malformed regions are reported through
/// [`YamlDocument::errors`] and [`YamlDocument::diagnostics`].
pub fn parse_yaml(text: &str) -> Vec<YamlDocument> {
    split_documents(text)
        .into_iter()
        .map(|range| parse_document(text, range))
        .collect()
}

fn parse_document(text: &str, range: Range<usize>) -> YamlDocument {
    let base = range.start;
    let mut working = text[range.clone()].to_string();
    let mut errors = Vec::new();
    let mut diagnostics = Vec::new();

    loop {
        let failure = {
            let mut builder = TreeBuilder::new(&working, base);
            let mut parser = Parser::new_from_str(&working);
            match parser.load(&mut builder, false) {
                Ok(()) => {
                    let (root, alias_errors) = builder.finish();
                    for node in alias_errors {
                        if let NodeKind::Error { message } = &node.kind {
                            diagnostics.push(SyntaxDiagnostic {
                                range: node.range.clone(),
                                message: message.clone(),
                            });
                        }
                        errors.push(node);
                    }
                    return YamlDocument {
                        range,
                        root,
                        errors,
                        diagnostics,
                    };
                }
                Err(err) => (
                    char_to_byte(&working, err.marker().index()),
                    err.info().to_string(),
                ),
            }
        };

        let (at, message) = failure;
        tracing::debug!("YAML syntax error at offset {}: {}", base + at, message);
        let (at, message) = blame_flow_collection(&working, at, message);

        let region = match blank_region(&mut working, at) {
            Some(region) => (base + region.start)..(base + region.end),
            // Nothing left to blank: report at the failure point and give up on the tree
            None => (base + at)..(base + at),
        };
        diagnostics.push(SyntaxDiagnostic {
            range: region.clone(),
            message: message.clone(),
        });
        errors.push(Arc::new(YamlNode {
            range: region.clone(),
            kind: NodeKind::Error { message },
        }));

        if region.is_empty() {
            return YamlDocument {
                range,
                root: None,
                errors,
                diagnostics,
            };
        }
    }
}

/// Move an error raised inside a flow collection to the line that opens it.
///
/// The scanner keeps reading lines after an unclosed `[` or `{` and reports
/// the error on whichever valid line it stumbles over. Blaming the opening
/// line instead lets those lines survive as siblings.
fn blame_flow_collection(text: &str, at: usize, message: String) -> (usize, String) {
    let Some(&start) = open_flow_collections(text, at).first() else {
        return (at, message);
    };
    if !open_flow_collections(text, text.len()).contains(&start) {
        return (start, message);
    }
    let kind = if text[start..].starts_with('[') {
        "sequence"
    } else {
        "mapping"
    };
    (start, format!("unclosed flow {kind}"))
}

/// Offsets of the flow collection openers still unclosed at `at`,
/// outermost first
fn open_flow_collections(text: &str, at: usize) -> Vec<usize> {
    let mut open = Vec::new();
    let mut quote: Option<char> = None;
    let mut block_scalar: Option<usize> = None;
    let mut previous: Option<char> = None;

    for line in line_spans(text) {
        if line.start >= at {
            break;
        }
        let content = &text[line.clone()];
        if quote.is_none() {
            if let Some(parent) = block_scalar {
                if is_blank(content) || indentation(content) > parent {
                    continue;
                }
                block_scalar = None;
            }
            if open.is_empty() {
                previous = None;
            }
        }

        let mut gap = true;
        let mut chars = content.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if line.start + i >= at {
                break;
            }
            if let Some(q) = quote {
                if q == '"' && c == '\\' {
                    chars.next();
                } else if c == q {
                    if q == '\'' && matches!(chars.peek(), Some((_, '\''))) {
                        chars.next();
                    } else {
                        quote = None;
                        previous = Some(c);
                        gap = false;
                    }
                }
                continue;
            }
            if c == ' ' || c == '\t' {
                gap = true;
                continue;
            }
            if c == '#' && gap {
                break;
            }

            let token_start = match previous {
                None | Some(',' | '[' | '{') => true,
                Some(':') => gap || !open.is_empty(),
                Some('-' | '?') => gap,
                _ => false,
            };
            match c {
                '"' | '\'' if token_start => quote = Some(c),
                '[' | '{' if token_start || !open.is_empty() => open.push(line.start + i),
                ']' | '}' if !open.is_empty() => {
                    open.pop();
                }
                '|' | '>' if token_start && open.is_empty() => {
                    block_scalar = Some(indentation(content));
                    break;
                }
                _ => {}
            }
            previous = Some(c);
            gap = false;
        }
    }
    open
}

/// Convert a character index into a byte offset of `text`
fn char_to_byte(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

/// Blank the line containing `at` and its continuation lines.
///
/// Returns the trimmed byte range that was blanked, or `None` when every line
/// is already blank.
fn blank_region(working: &mut String, at: usize) -> Option<Range<usize>> {
    let lines = line_spans(working);
    let mut index = lines
        .iter()
        .position(|line| at <= line.end)
        .unwrap_or(lines.len().saturating_sub(1));

    // Errors reported at a blank line (typically end of stream) belong to the
    // last line with content above it.
    while index > 0 && is_blank(&working[lines[index].clone()]) {
        index -= 1;
    }
    let first = lines.get(index)?.clone();
    if is_blank(&working[first.clone()]) {
        return None;
    }

    let indent = indentation(&working[first.clone()]);
    let mut last = first.clone();
    for line in &lines[index + 1..] {
        let content = &working[line.clone()];
        if is_blank(content) {
            continue;
        }
        if indentation(content) <= indent {
            break;
        }
        last = line.clone();
    }

    let region = first.start..last.end;
    let original = &working[region.clone()];
    let trimmed_start = region.start + (original.len() - original.trim_start().len());
    let trimmed_end = region.start + original.trim_end().len();

    let blanked: String = original
        .chars()
        .map(|c| {
            if c == '\n' {
                "\n".to_string()
            } else {
                " ".repeat(c.len_utf8())
            }
        })
        .collect();
    working.replace_range(region, &blanked);

    Some(trimmed_start..trimmed_end)
}

/// Byte ranges of every line, newline excluded
fn line_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        spans.push(offset..offset + content.len());
        offset += line.len();
    }
    if spans.is_empty() || text.ends_with('\n') {
        spans.push(offset..offset);
    }
    spans
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// A completed node together with the end of the source it occupies here.
///
/// For an alias the node is shared with its anchor, so its range points at
/// the anchor; `end` is the end of the alias token itself.
struct Item {
    node: NodeRef,
    end: usize,
}

enum Frame {
    Sequence {
        start: usize,
        anchor: usize,
        items: Vec<Item>,
    },
    Mapping {
        start: usize,
        anchor: usize,
        entries: Vec<(Item, Option<Item>)>,
    },
}

/// Event receiver building the position-tracked tree
struct TreeBuilder<'a> {
    source: &'a str,
    base: usize,
    /// Byte offset of every char, plus the text length
    char_offsets: Vec<usize>,
    stack: Vec<Frame>,
    anchors: HashMap<usize, NodeRef>,
    root: Option<NodeRef>,
    alias_errors: Vec<NodeRef>,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str, base: usize) -> Self {
        let mut char_offsets: Vec<usize> = source.char_indices().map(|(i, _)| i).collect();
        char_offsets.push(source.len());
        Self {
            source,
            base,
            char_offsets,
            stack: Vec::new(),
            anchors: HashMap::new(),
            root: None,
            alias_errors: Vec::new(),
        }
    }

    fn finish(self) -> (Option<NodeRef>, Vec<NodeRef>) {
        (self.root, self.alias_errors)
    }

    /// Local byte offset of a marker
    fn local(&self, marker: &Marker) -> usize {
        self.char_offsets
            .get(marker.index())
            .copied()
            .unwrap_or(self.source.len())
    }

    fn node(&self, range: Range<usize>, kind: NodeKind) -> NodeRef {
        Arc::new(YamlNode {
            range: (self.base + range.start)..(self.base + range.end),
            kind,
        })
    }

    fn register_anchor(&mut self, anchor: usize, node: &NodeRef) {
        if anchor > 0 {
            self.anchors.insert(anchor, Arc::clone(node));
        }
    }

    fn push_complete(&mut self, item: Item) {
        match self.stack.last_mut() {
            None => self.root = Some(item.node),
            Some(Frame::Sequence { items, .. }) => items.push(item),
            Some(Frame::Mapping { entries, .. }) => match entries.last_mut() {
                Some((_, value @ None)) => *value = Some(item),
                _ => entries.push((item, None)),
            },
        }
    }

    /// Whether the next completed node is the value of a mapping entry
    fn awaiting_value(&self) -> Option<usize> {
        match self.stack.last() {
            Some(Frame::Mapping { entries, .. }) => match entries.last() {
                Some((key, None)) => Some(key.node.range.end - self.base),
                _ => None,
            },
            _ => None,
        }
    }

    fn in_sequence(&self) -> bool {
        matches!(self.stack.last(), Some(Frame::Sequence { .. }))
    }

    fn on_scalar(&mut self, value: String, style: TScalarStyle, anchor: usize, marker: &Marker) {
        let start = self.local(marker);
        let plain = matches!(style, TScalarStyle::Plain);

        let range = if plain && value.is_empty() {
            self.empty_scalar_range(start)
        } else {
            start..scalar_end(self.source, style, start, &value)
        };

        let scalar = if plain {
            ScalarValue::from_plain(&value)
        } else {
            ScalarValue::String(value.clone())
        };

        let node = self.node(range, NodeKind::Scalar { text: value, value: scalar });
        self.register_anchor(anchor, &node);
        self.push_complete(Item {
            end: node.range.end,
            node,
        });
    }

    /// An empty value spans from its indicator to the end of the line, so a
    /// cursor placed after `key: ` lands on it.
    fn empty_scalar_range(&self, start: usize) -> Range<usize> {
        let indicator = if let Some(key_end) = self.awaiting_value() {
            self.source[key_end..]
                .find(':')
                .map(|colon| key_end + colon + 1)
        } else if self.in_sequence() {
            let before = self.source[..start].trim_end();
            before.ends_with('-').then_some(before.len())
        } else {
            None
        };

        match indicator {
            Some(from) if from <= self.source.len() => {
                let line_end = self.source[from..]
                    .find('\n')
                    .map(|i| from + i)
                    .unwrap_or(self.source.len());
                let line_end = line_end.min(
                    self.source[from..line_end]
                        .find(" #")
                        .map(|i| from + i)
                        .unwrap_or(line_end),
                );
                from..line_end.max(from)
            }
            _ => start..start,
        }
    }

    fn on_alias(&mut self, anchor: usize, marker: &Marker) {
        let start = self.local(marker);
        let end = start
            + self.source[start..]
                .find(|c: char| c.is_whitespace() || matches!(c, ',' | ']' | '}'))
                .unwrap_or(self.source.len() - start);

        let node = match self.anchors.get(&anchor) {
            Some(target) => Arc::clone(target),
            None => {
                let node = self.node(
                    start..end,
                    NodeKind::Error {
                        message: "Alias refers to an anchor that is not yet complete".to_string(),
                    },
                );
                self.alias_errors.push(Arc::clone(&node));
                node
            }
        };
        self.push_complete(Item {
            node,
            end: self.base + end,
        });
    }

    /// End of a collection: past the closing bracket for flow collections,
    /// otherwise the end of the last child.
    fn collection_end(&self, start: usize, last_child_end: Option<usize>, marker: &Marker, close: char) -> usize {
        let at = self.local(marker);
        if self.source[at..].starts_with(close) {
            return at + close.len_utf8();
        }
        last_child_end
            .map(|end| end - self.base)
            .unwrap_or(start)
    }
}

impl<'a> MarkedEventReceiver for TreeBuilder<'a> {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        match ev {
            Event::Scalar(value, style, anchor, _tag) => {
                self.on_scalar(value, style, anchor, &marker);
            }

            Event::SequenceStart(anchor, _tag) => {
                let start = self.local(&marker);
                self.stack.push(Frame::Sequence {
                    start,
                    anchor,
                    items: Vec::new(),
                });
            }

            Event::SequenceEnd => {
                let Some(Frame::Sequence { start, anchor, items }) = self.stack.pop() else {
                    return;
                };
                let last = items.iter().map(|item| item.end).max();
                let end = self.collection_end(start, last, &marker, ']');
                let children = items.into_iter().map(|item| item.node).collect();
                let node = self.node(start..end, NodeKind::Sequence(children));
                self.register_anchor(anchor, &node);
                self.push_complete(Item {
                    end: node.range.end,
                    node,
                });
            }

            Event::MappingStart(anchor, _tag) => {
                let start = self.local(&marker);
                self.stack.push(Frame::Mapping {
                    start,
                    anchor,
                    entries: Vec::new(),
                });
            }

            Event::MappingEnd => {
                let Some(Frame::Mapping { start, anchor, entries }) = self.stack.pop() else {
                    return;
                };
                let last = entries
                    .iter()
                    .flat_map(|(key, value)| std::iter::once(key.end).chain(value.as_ref().map(|v| v.end)))
                    .max();
                let end = self.collection_end(start, last, &marker, '}');
                let pairs = entries
                    .into_iter()
                    .filter_map(|(key, value)| {
                        value.map(|value| Pair {
                            key: key.node,
                            value: value.node,
                        })
                    })
                    .collect();
                let node = self.node(start..end, NodeKind::Mapping(pairs));
                self.register_anchor(anchor, &node);
                self.push_complete(Item {
                    end: node.range.end,
                    node,
                });
            }

            Event::Alias(anchor) => self.on_alias(anchor, &marker),

            _ => {}
        }
    }
}

/// Compute where a scalar token ends in the source
fn scalar_end(source: &str, style: TScalarStyle, start: usize, value: &str) -> usize {
    match style {
        TScalarStyle::SingleQuoted => quoted_end(source, start, '\''),
        TScalarStyle::DoubleQuoted => quoted_end(source, start, '"'),
        TScalarStyle::Literal | TScalarStyle::Folded => block_scalar_end(source, start),
        _ => plain_end(source, start, value),
    }
}

fn quoted_end(source: &str, start: usize, quote: char) -> usize {
    let mut chars = source[start..].char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if quote == '"' && c == '\\' {
            chars.next();
        } else if c == quote {
            // '' is an escaped quote inside single-quoted scalars
            if quote == '\'' && matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                continue;
            }
            return start + i + c.len_utf8();
        }
    }
    source.len()
}

/// A block scalar runs until the first non-blank line indented no deeper
/// than the line holding its `|`/`>` indicator.
fn block_scalar_end(source: &str, start: usize) -> usize {
    let line_start = source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let parent_indent = indentation(&source[line_start..]);
    let header_end = source[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(source.len());
    let mut end = start + source[start..header_end].trim_end().len();

    let mut offset = header_end;
    while offset < source.len() {
        let line_start = offset + 1;
        if line_start > source.len() {
            break;
        }
        let line_end = source[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(source.len());
        let line = &source[line_start..line_end];
        if !is_blank(line) {
            if indentation(line) <= parent_indent {
                break;
            }
            end = line_start + line.trim_end().len();
        }
        offset = line_end;
    }
    end
}

/// A plain scalar may be folded over several lines; follow its words
fn plain_end(source: &str, start: usize, value: &str) -> usize {
    if source[start..].starts_with(value) {
        return start + value.len();
    }
    let mut end = start;
    for word in value.split_whitespace() {
        match source[end..].find(word) {
            Some(found) => end += found + word.len(),
            None => break,
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::node::Segment;

    fn single(text: &str) -> YamlDocument {
        let mut docs = parse_yaml(text);
        assert_eq!(docs.len(), 1);
        docs.remove(0)
    }

    #[test]
    fn test_parse_valid_yaml() {
        let doc = single("key: value\nlist:\n  - item1\n  - item2");
        assert!(doc.diagnostics.is_empty());
        let root = doc.root.expect("root");
        assert_eq!(root.pairs().len(), 2);
        assert_eq!(root.get("list").map(|l| l.items().len()), Some(2));
    }

    #[test]
    fn test_scalar_ranges() {
        let text = "name: \"quoted\"\ncount: 42\n";
        let doc = single(text);
        let root = doc.root.expect("root");
        let name = root.get("name").expect("name");
        assert_eq!(&text[name.range.clone()], "\"quoted\"");
        assert_eq!(name.scalar(), Some(&ScalarValue::String("quoted".into())));
        let count = root.get("count").expect("count");
        assert_eq!(&text[count.range.clone()], "42");
        assert_eq!(count.scalar(), Some(&ScalarValue::Int(42)));
    }

    #[test]
    fn test_mapping_range_spans_children() {
        let text = "a: 1\nb:\n  c: two\n";
        let doc = single(text);
        let root = doc.root.expect("root");
        assert_eq!(&text[root.range.clone()], "a: 1\nb:\n  c: two");
    }

    #[test]
    fn test_flow_collection_ranges() {
        let text = "spec: {}\nitems: [1, 2]\n";
        let doc = single(text);
        let root = doc.root.expect("root");
        let spec = root.get("spec").expect("spec");
        assert_eq!(&text[spec.range.clone()], "{}");
        let items = root.get("items").expect("items");
        assert_eq!(&text[items.range.clone()], "[1, 2]");
    }

    #[test]
    fn test_empty_value_spans_to_line_end() {
        let text = "kind: ";
        let doc = single(text);
        let root = doc.root.expect("root");
        let kind = root.get("kind").expect("kind");
        assert_eq!(kind.scalar(), Some(&ScalarValue::Null));
        assert_eq!(kind.range, 5..6);
    }

    #[test]
    fn test_block_scalar_range() {
        let text = "script: |\n  echo one\n  echo two\nnext: 1\n";
        let doc = single(text);
        let root = doc.root.expect("root");
        let script = root.get("script").expect("script");
        assert_eq!(&text[script.range.clone()], "|\n  echo one\n  echo two");
    }

    #[test]
    fn test_alias_shares_anchor_identity() {
        let text = "base: &b\n  x: 1\nother: *b\n";
        let doc = single(text);
        let root = doc.root.expect("root");
        let base = root.get("base").expect("base");
        let other = root.get("other").expect("other");
        assert!(Arc::ptr_eq(base, other));
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn test_path_at_prefers_deepest_node() {
        let text = "outer:\n  inner: value\n";
        let doc = single(text);
        let offset = text.find("value").expect("value") + 2;
        let path = doc.path_at(offset);
        let segments: Vec<_> = path.iter().filter_map(|s| s.segment.clone()).collect();
        assert_eq!(
            segments,
            vec![Segment::Key("outer".into()), Segment::Key("inner".into())]
        );
        assert_eq!(path.last().and_then(|s| s.node.as_str()), Some("value"));
    }

    #[test]
    fn test_path_at_key() {
        let text = "outer: 1\n";
        let doc = single(text);
        let path = doc.path_at(2);
        let last = path.last().expect("step");
        assert!(last.is_key);
        assert_eq!(last.segment, Some(Segment::Key("outer".into())));
    }

    #[test]
    fn test_parse_invalid_yaml_indentation() {
        let text = "key: value\n  bad: indentation\nother: 1\n";
        let doc = single(text);
        assert!(!doc.diagnostics.is_empty());
        assert!(!doc.errors.is_empty());
        assert!(doc.errors.iter().all(|node| node.is_error()));
        let root = doc.root.expect("tree survives the error");
        assert!(root.get("key").is_some());
    }

    #[test]
    fn test_parse_invalid_yaml_unclosed_quote() {
        let doc = single("key: \"unclosed");
        assert!(!doc.diagnostics.is_empty());
        assert!(!doc.errors.is_empty());
    }

    #[test]
    fn test_error_does_not_leak_into_sibling_document() {
        let docs = parse_yaml("a: [1, 2\n---\nb: 2\n");
        assert_eq!(docs.len(), 2);
        assert!(!docs[0].diagnostics.is_empty());
        assert!(docs[1].diagnostics.is_empty());
        let root = docs[1].root.as_ref().expect("second document parses");
        assert_eq!(root.get("b").and_then(|v| v.scalar()), Some(&ScalarValue::Int(2)));
    }

    #[test]
    fn test_unclosed_flow_sequence_keeps_siblings() {
        let text = "a: [1, 2\nb: 3\nc: 4\n";
        let doc = single(text);
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(&text[doc.diagnostics[0].range.clone()], "a: [1, 2");
        assert_eq!(doc.diagnostics[0].message, "unclosed flow sequence");

        let root = doc.root.expect("siblings survive");
        assert!(root.get("a").is_none());
        assert_eq!(root.get("b").and_then(|v| v.scalar()), Some(&ScalarValue::Int(3)));
        assert_eq!(root.get("c").and_then(|v| v.scalar()), Some(&ScalarValue::Int(4)));
    }

    #[test]
    fn test_unclosed_multiline_flow_mapping() {
        let text = "a: {x: 1,\n  y: 2\nb: 3\n";
        let doc = single(text);
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(doc.diagnostics[0].message, "unclosed flow mapping");
        let root = doc.root.expect("root");
        assert!(root.get("b").is_some());
    }

    #[test]
    fn test_open_flow_collections() {
        let text = "c: it's [x\nd: \"[y\"\ne: [1, {f: 2}\n";
        assert_eq!(open_flow_collections(text, text.len()), vec![22]);
        assert!(open_flow_collections("a: [1]\n# [x\n", 13).is_empty());
        assert!(open_flow_collections("s: |\n  [x\nb: 1\n", 16).is_empty());
    }

    #[test]
    fn test_document_ranges_are_absolute() {
        let text = "a: 1\n---\nb: 2\n";
        let docs = parse_yaml(text);
        let root = docs[1].root.as_ref().expect("root");
        let b = root.get("b").expect("b");
        assert_eq!(&text[b.range.clone()], "2");
    }

    #[test]
    fn test_parse_empty_yaml() {
        let doc = single("");
        assert!(doc.root.is_none());
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn test_parse_yaml_comment_only() {
        let doc = single("# This is a comment\n# Another comment");
        assert!(doc.root.is_none());
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn test_multibyte_offsets() {
        let text = "name: héllo\nnext: x\n";
        let doc = single(text);
        let root = doc.root.expect("root");
        let next = root.get("next").expect("next");
        assert_eq!(&text[next.range.clone()], "x");
    }

    #[test]
    fn test_blank_region_preserves_length() {
        let mut text = String::from("a: 1\n  é: 2\nb: 3\n");
        let len = text.len();
        let region = blank_region(&mut text, 7).expect("region");
        assert_eq!(text.len(), len);
        assert_eq!(region, 7..12);
        assert!(text.starts_with("a: 1\n"));
        assert!(text.ends_with("b: 3\n"));
    }
}
