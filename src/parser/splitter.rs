//! Splitting a YAML stream into its `---`-delimited documents
//!
//! Each document is parsed independently so that a syntax error in one
//! document can never affect the tree of another.

use std::ops::Range;

/// Split `text` into the byte ranges of its documents, in source order.
///
/// Separator lines (`---`, optionally followed by inline content, and `...`)
/// are not part of any range, except for content following `--- ` on the same
/// line. A leading segment made only of directives, comments and blank lines
/// is folded into the first document, and the same kind of segment after a
/// `...` end marker belongs to no document. Always returns at least one range.
pub fn split_documents(text: &str) -> Vec<Range<usize>> {
    let mut documents = Vec::new();
    let mut current_start = 0;
    let mut seen_separator = false;
    // The previous document was closed by `...`
    let mut ended = false;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let content = line.trim_end_matches(['\n', '\r']);
        let (next_start, closes) = if is_marker(content, "---") {
            (line_start + 3, false)
        } else if is_marker(content, "...") {
            (offset, true)
        } else {
            continue;
        };

        let segment = current_start..line_start;
        let preamble = is_preamble(&text[segment.clone()]);
        if !(preamble && (ended || !seen_separator)) {
            documents.push(segment);
        }
        seen_separator = true;
        ended = closes;
        current_start = next_start;
    }

    let tail = current_start..text.len();
    if documents.is_empty() || !(ended && is_preamble(&text[tail.clone()])) {
        documents.push(tail);
    }
    documents
}

/// `---` or `...` at column zero, followed by nothing or whitespace
fn is_marker(line: &str, marker: &str) -> bool {
    line.strip_prefix(marker)
        .map(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
        .unwrap_or(false)
}

fn is_preamble(segment: &str) -> bool {
    segment.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%')
    })
}
