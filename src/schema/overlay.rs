//! Runtime schema modifications
//!
//! Modifications never touch the fetched schema content. They are recorded
//! as an ordered list of edits per schema and replayed over the fetched JSON
//! whenever the schema is compiled, so clearing the list restores the
//! fetched state exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::escape_pointer;
use crate::error::ModifyError;

/// A schema modification request, as sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SchemaModification {
    /// Set `key` to `content` in the object addressed by `path`
    Add {
        schema: String,
        #[serde(default)]
        path: String,
        key: String,
        content: Value,
    },
    /// Remove `key` from the object addressed by `path`
    Delete {
        schema: String,
        #[serde(default)]
        path: String,
        key: String,
    },
    /// Drop every modification made to `schema`
    DeleteAll { schema: String },
}

impl SchemaModification {
    /// The raw schema identifier the modification targets
    pub fn schema(&self) -> &str {
        match self {
            SchemaModification::Add { schema, .. }
            | SchemaModification::Delete { schema, .. }
            | SchemaModification::DeleteAll { schema } => schema,
        }
    }
}

/// One recorded edit
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEdit {
    Add {
        path: Vec<String>,
        key: String,
        content: Value,
    },
    Delete {
        path: Vec<String>,
        key: String,
    },
}

impl OverlayEdit {
    fn target(&self) -> (&[String], &str) {
        match self {
            OverlayEdit::Add { path, key, .. } | OverlayEdit::Delete { path, key } => (path, key),
        }
    }
}

/// The edits recorded for one schema, in the order they were made
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    edits: Vec<OverlayEdit>,
}

impl Overlay {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Record an edit after checking that its path addresses a container in
    /// the effective content (`base` with the current edits applied).
    ///
    /// A later edit of the same path and key replaces earlier ones.
    pub fn push(&mut self, base: &Value, schema: &str, edit: OverlayEdit) -> Result<(), ModifyError> {
        let effective = self.apply(base);
        let (path, key) = edit.target();
        let pointer = to_pointer(path);
        if !matches!(effective.pointer(&pointer), Some(Value::Object(_) | Value::Array(_))) {
            return Err(ModifyError::InvalidPath {
                schema: schema.to_string(),
                path: format!("/{}", path.join("/")),
            });
        }

        let (path, key) = (path.to_vec(), key.to_string());
        self.edits
            .retain(|existing| existing.target() != (path.as_slice(), key.as_str()));
        self.edits.push(edit);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.edits.clear();
    }

    /// Replay the edits over a copy of `base`. Edits whose path no longer
    /// exists are skipped.
    pub fn apply(&self, base: &Value) -> Value {
        let mut content = base.clone();
        for edit in &self.edits {
            let (path, key) = edit.target();
            let Some(section) = content.pointer_mut(&to_pointer(path)) else {
                tracing::debug!("Skipping schema edit at missing path /{}", path.join("/"));
                continue;
            };
            match (edit, section) {
                (OverlayEdit::Add { content: value, .. }, Value::Object(map)) => {
                    map.insert(key.to_string(), value.clone());
                }
                (OverlayEdit::Add { content: value, .. }, Value::Array(items)) => {
                    if let Some(slot) = key.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                        *slot = value.clone();
                    } else {
                        items.push(value.clone());
                    }
                }
                (OverlayEdit::Delete { .. }, Value::Object(map)) => {
                    map.shift_remove(key);
                }
                (OverlayEdit::Delete { .. }, Value::Array(items)) => {
                    if let Some(i) = key.parse::<usize>().ok().filter(|i| *i < items.len()) {
                        items.remove(i);
                    }
                }
                _ => {}
            }
        }
        content
    }
}

/// Split a slash separated path into unescaped tokens
pub fn parse_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|token| !token.is_empty())
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// The JSON pointer addressing `path`
fn to_pointer(path: &[String]) -> String {
    path.iter()
        .map(|token| format!("/{}", escape_pointer(token)))
        .collect()
}
