//! Analysis entry points
//!
//! [`Analyzer`] ties documents to their schemas and produces every artifact
//! the server answers with. It owns the schema store and the association
//! index; documents are owned by the caller and passed in per request.

mod code_action;
mod completion;
mod folding;
mod hover;
mod links;
mod symbols;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tower_lsp::lsp_types::{
    CodeActionOrCommand, CompletionItem, Diagnostic, DocumentLink, DocumentSymbol, FoldingRange,
    Hover, Position, Url, WorkspaceFolder,
};

pub use code_action::code_actions;
pub use completion::{complete, completion_context, render_value, CompletionContext};
pub use folding::folding_ranges;
pub use hover::{hover, schema_name};
pub use links::document_links;
pub use symbols::document_symbols;

use crate::config::Settings;
use crate::diagnostics::{duplicate_keys, validate_tree, DiagnosticCollector};
use crate::document::Document;
use crate::error::ModifyError;
use crate::schema::{
    resolve_schema_uri, AssociationIndex, SchemaDocument, SchemaFetcher, SchemaModification,
    SchemaStore,
};

/// Workspace layout used to resolve relative schema identifiers
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub root: Option<Url>,
    pub folders: Vec<WorkspaceFolder>,
}

/// Schema-aware analysis of YAML documents
#[derive(Debug)]
pub struct Analyzer {
    store: SchemaStore,
    associations: RwLock<AssociationIndex>,
    workspace: RwLock<Workspace>,
    settings: RwLock<Settings>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::with_store(SchemaStore::default())
    }
}

impl Analyzer {
    /// Create an analyzer loading schemas through `fetcher`
    pub fn new(fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self::with_store(SchemaStore::new(fetcher))
    }

    fn with_store(store: SchemaStore) -> Self {
        Self {
            store,
            associations: RwLock::new(AssociationIndex::new()),
            workspace: RwLock::new(Workspace::default()),
            settings: RwLock::new(Settings::default()),
        }
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    pub fn settings(&self) -> Settings {
        read(&self.settings).clone()
    }

    pub fn workspace(&self) -> Workspace {
        read(&self.workspace).clone()
    }

    /// Replace the workspace layout. Configured associations are resolved
    /// again since relative identifiers depend on it.
    pub fn set_workspace(&self, root: Option<Url>, folders: Vec<WorkspaceFolder>) {
        *write(&self.workspace) = Workspace { root, folders };
        self.reload_associations();
    }

    /// Apply a `workspace/didChangeWorkspaceFolders` event
    pub fn update_workspace_folders(&self, added: Vec<WorkspaceFolder>, removed: &[WorkspaceFolder]) {
        {
            let mut workspace = write(&self.workspace);
            workspace
                .folders
                .retain(|folder| !removed.iter().any(|gone| gone.uri == folder.uri));
            workspace.folders.extend(added);
        }
        self.reload_associations();
    }

    /// Replace the settings and the associations they configure
    pub fn set_settings(&self, settings: Settings) {
        *write(&self.settings) = settings;
        self.reload_associations();
    }

    fn reload_associations(&self) {
        let resolved: Vec<(Url, Vec<String>)> = {
            let settings = read(&self.settings);
            settings
                .associations()
                .map(|(schema, patterns)| (self.resolve_schema(schema), patterns))
                .collect()
        };
        write(&self.associations).set_configured(resolved);
    }

    /// Resolve a raw schema identifier against the current workspace
    pub fn resolve_schema(&self, raw: &str) -> Url {
        let workspace = read(&self.workspace);
        resolve_schema_uri(&workspace.folders, workspace.root.as_ref(), raw)
    }

    /// Pin `document` to the given schema identifiers; an empty list removes
    /// the pin
    pub fn associate(&self, document: &Url, schemas: &[String]) {
        let schemas = schemas.iter().map(|raw| self.resolve_schema(raw)).collect();
        write(&self.associations).set_override(document, schemas);
    }

    /// The schema URIs that apply to `document`
    pub fn schemas_for(&self, document: &Document) -> Vec<Url> {
        read(&self.associations).schemas_for(&document.uri, &document.text)
    }

    async fn schemas(&self, document: &Document) -> Vec<Arc<SchemaDocument>> {
        let mut schemas = Vec::new();
        for uri in self.schemas_for(document) {
            schemas.push(self.store.get(&uri).await);
        }
        schemas
    }

    /// Every diagnostic for `document`: syntax errors, duplicate keys, schema
    /// load problems and schema violations of each sub-document
    pub async fn validate(&self, document: &Document) -> Vec<Diagnostic> {
        let trees = document.trees();
        let mut collector = DiagnosticCollector::new(document);

        for tree in trees.iter() {
            for error in &tree.diagnostics {
                collector.add_yaml_error(&error.range, &error.message);
            }
            if let Some(root) = &tree.root {
                for violation in duplicate_keys(root) {
                    collector.add_violation(violation);
                }
            }
        }

        for schema in self.schemas(document).await {
            for error in &schema.diagnostics {
                collector.add_schema_warning(error.to_string());
            }
            for root in trees.iter().filter_map(|tree| tree.root.as_ref()) {
                for violation in validate_tree(&schema, root) {
                    collector.add_violation(violation);
                }
            }
        }

        let diagnostics = collector.into_diagnostics();
        tracing::debug!("Validated {}: {} diagnostics", document.uri, diagnostics.len());
        diagnostics
    }

    pub async fn complete(&self, document: &Document, position: Position) -> Vec<CompletionItem> {
        let schemas = self.schemas(document).await;
        complete(document, document.offset_of(position), &schemas)
    }

    pub async fn hover(&self, document: &Document, position: Position) -> Option<Hover> {
        let schemas = self.schemas(document).await;
        hover(document, document.offset_of(position), &schemas)
    }

    pub fn symbols(&self, document: &Document) -> Vec<DocumentSymbol> {
        document_symbols(document)
    }

    pub fn folding_ranges(&self, document: &Document) -> Vec<FoldingRange> {
        folding_ranges(document)
    }

    pub fn links(&self, document: &Document) -> Vec<DocumentLink> {
        document_links(document)
    }

    pub fn code_actions(&self, document: &Document, diagnostics: &[Diagnostic]) -> Vec<CodeActionOrCommand> {
        code_actions(document, diagnostics)
    }

    /// Apply a schema modification; the schema identifier is resolved like
    /// any configured one
    pub async fn modify_schema(&self, modification: &SchemaModification) -> Result<(), ModifyError> {
        let raw = modification.schema();
        if raw.trim().is_empty() {
            return Err(ModifyError::UnknownSchema(raw.to_string()));
        }
        let uri = self.resolve_schema(raw);
        self.store.modify_content(&uri, modification).await
    }

    /// Forget everything cached for `uri`
    pub fn reset_schema(&self, uri: &Url) -> bool {
        self.store.reset_schema(uri)
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
