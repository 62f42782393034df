//! Schema cache
//!
//! Two caches keyed by schema URI: the raw (fetched and parsed) content, and
//! the resolved document compiled from it with the overlay applied. Every
//! entry lives in its own `OnceCell`, so concurrent lookups of a URI share a
//! single fetch, and invalidation swaps the cell out without disturbing
//! lookups that already hold it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use serde_json::Value;
use tokio::sync::OnceCell;
use tower_lsp::lsp_types::Url;

use super::fetch::{DefaultFetcher, SchemaFetcher};
use super::model::{without_fragment, SchemaCompiler, SchemaDocument};
use super::overlay::{parse_path, Overlay, OverlayEdit, SchemaModification};
use crate::error::{ModifyError, SchemaError};

/// Fetched schema content, before overlays and compilation
#[derive(Debug, Clone)]
pub struct RawSchema {
    pub uri: Url,
    pub content: Result<Value, SchemaError>,
    pub fetched_at: SystemTime,
}

type Cell<T> = Arc<OnceCell<Arc<T>>>;

/// Owns every schema the server has loaded
pub struct SchemaStore {
    fetcher: Arc<dyn SchemaFetcher>,
    raw: Mutex<HashMap<Url, Cell<RawSchema>>>,
    resolved: Mutex<HashMap<Url, Cell<SchemaDocument>>>,
    overlays: Mutex<HashMap<Url, Overlay>>,
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaStore")
            .field("raw", &lock(&self.raw).len())
            .field("resolved", &lock(&self.resolved).len())
            .finish()
    }
}

impl Default for SchemaStore {
    fn default() -> Self {
        Self::new(Arc::new(DefaultFetcher::new()))
    }
}

impl SchemaStore {
    pub fn new(fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            fetcher,
            raw: Mutex::new(HashMap::new()),
            resolved: Mutex::new(HashMap::new()),
            overlays: Mutex::new(HashMap::new()),
        }
    }

    /// The resolved schema for `uri`, loading it on first use.
    ///
    /// A schema that cannot be fetched or parsed resolves to a document that
    /// matches nothing and carries the error. It stays cached until reset.
    pub async fn get(&self, uri: &Url) -> Arc<SchemaDocument> {
        let uri = without_fragment(uri);
        let cell = Arc::clone(lock(&self.resolved).entry(uri.clone()).or_default());
        let document = cell
            .get_or_init(|| async { Arc::new(self.load(&uri).await) })
            .await;
        Arc::clone(document)
    }

    /// Evict everything cached for `uri`, including resolved schemas that
    /// pulled it in through `$ref`. Returns whether anything was evicted.
    pub fn reset_schema(&self, uri: &Url) -> bool {
        let uri = without_fragment(uri);
        let raw_evicted = lock(&self.raw).remove(&uri).is_some();
        let resolved_evicted = self.invalidate(&uri);
        if raw_evicted || resolved_evicted {
            tracing::info!("Reset schema {}", uri);
        }
        raw_evicted || resolved_evicted
    }

    /// Apply a modification to the overlay of `uri`.
    ///
    /// Paths are checked against the fetched content (or an empty object when
    /// the schema cannot be fetched) with the earlier modifications applied.
    pub async fn modify_content(
        &self,
        uri: &Url,
        modification: &SchemaModification,
    ) -> Result<(), ModifyError> {
        let uri = without_fragment(uri);
        let base = self.base_content(&uri).await;
        {
            let mut overlays = lock(&self.overlays);
            let overlay = overlays.entry(uri.clone()).or_default();
            match modification {
                SchemaModification::Add {
                    schema,
                    path,
                    key,
                    content,
                } => overlay.push(
                    &base,
                    schema,
                    OverlayEdit::Add {
                        path: parse_path(path),
                        key: key.clone(),
                        content: content.clone(),
                    },
                )?,
                SchemaModification::Delete { schema, path, key } => overlay.push(
                    &base,
                    schema,
                    OverlayEdit::Delete {
                        path: parse_path(path),
                        key: key.clone(),
                    },
                )?,
                SchemaModification::DeleteAll { .. } => overlay.clear(),
            }
        }
        self.invalidate(&uri);
        tracing::debug!("Modified schema {}", uri);
        Ok(())
    }

    /// The effective JSON content of `uri`: fetched content with the overlay
    /// applied. `None` when the schema cannot be loaded and has no overlay.
    pub async fn content(&self, uri: &Url) -> Option<Value> {
        let uri = without_fragment(uri);
        let raw = self.raw(&uri).await;
        let overlay = self.overlay(&uri);
        match &raw.content {
            Ok(value) => Some(overlay.apply(value)),
            Err(_) if overlay.is_empty() => None,
            Err(_) => Some(overlay.apply(&empty_object())),
        }
    }

    /// Whether a resolved schema is currently cached for `uri`
    pub fn is_cached(&self, uri: &Url) -> bool {
        lock(&self.resolved)
            .get(&without_fragment(uri))
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    /// Drop resolved entries for `uri` and for schemas that depend on it.
    ///
    /// Entries still loading may have read the old state, so they are dropped
    /// as well; their callers get the document they were waiting for and the
    /// next lookup loads again.
    fn invalidate(&self, uri: &Url) -> bool {
        let mut evicted = false;
        lock(&self.resolved).retain(|key, cell| match cell.get() {
            Some(doc) if key != uri && !doc.depends_on(uri) => true,
            Some(_) => {
                evicted = true;
                false
            }
            None => {
                evicted |= key == uri;
                false
            }
        });
        evicted
    }

    fn overlay(&self, uri: &Url) -> Overlay {
        lock(&self.overlays).get(uri).cloned().unwrap_or_default()
    }

    async fn base_content(&self, uri: &Url) -> Value {
        match &self.raw(uri).await.content {
            Ok(value) => value.clone(),
            Err(_) => empty_object(),
        }
    }

    async fn raw(&self, uri: &Url) -> Arc<RawSchema> {
        let cell = Arc::clone(lock(&self.raw).entry(uri.clone()).or_default());
        let raw = cell
            .get_or_init(|| async { Arc::new(self.fetch(uri).await) })
            .await;
        Arc::clone(raw)
    }

    async fn fetch(&self, uri: &Url) -> RawSchema {
        let content = match self.fetcher.fetch(uri).await {
            Ok(text) => parse_content(uri, &text),
            Err(err) => {
                tracing::warn!("Failed to fetch schema {}: {}", uri, err);
                Err(SchemaError::Fetch {
                    uri: uri.to_string(),
                    reason: err.to_string(),
                })
            }
        };
        RawSchema {
            uri: uri.clone(),
            content,
            fetched_at: SystemTime::now(),
        }
    }

    async fn load(&self, uri: &Url) -> SchemaDocument {
        let raw = self.raw(uri).await;
        let overlay = self.overlay(uri);
        let (content, fetched_at) = match &raw.content {
            Ok(value) => (overlay.apply(value), Some(raw.fetched_at)),
            Err(err) if overlay.is_empty() => {
                return SchemaDocument::unavailable(uri.clone(), err.clone());
            }
            // A schema built purely from modifications
            Err(_) => (overlay.apply(&empty_object()), None),
        };

        let mut compiler = SchemaCompiler::new();
        let root = compiler.add_resource(uri, content);
        loop {
            let missing = compiler.missing_resources();
            if missing.is_empty() {
                break;
            }
            for dependency in missing {
                let raw = self.raw(&dependency).await;
                match &raw.content {
                    Ok(value) => {
                        let value = self.overlay(&dependency).apply(value);
                        compiler.add_resource(&dependency, value);
                    }
                    Err(err) => compiler.mark_unavailable(&dependency, err.clone()),
                }
            }
        }

        let document = compiler.finish(uri.clone(), root, fetched_at);
        tracing::debug!(
            "Compiled schema {} ({} nodes, {} referenced resources)",
            uri,
            document.len(),
            document.resources.len()
        );
        document
    }
}

/// Parse schema text as JSON, or as YAML for `.yaml`/`.yml` resources
pub fn parse_content(uri: &Url, text: &str) -> Result<Value, SchemaError> {
    let json_error = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let is_yaml = Path::new(uri.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);
    if is_yaml {
        return serde_yaml::from_str::<Value>(text).map_err(|err| SchemaError::Parse {
            uri: uri.to_string(),
            reason: err.to_string(),
        });
    }

    Err(SchemaError::Parse {
        uri: uri.to_string(),
        reason: json_error.to_string(),
    })
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
