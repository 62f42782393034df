//! LSP Backend implementation

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::analyzer::Analyzer;
use crate::config::Settings;
use crate::document::Document;
use crate::schema::SchemaModification;

/// Parameters of the `yaml/schema/associate` notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociateParams {
    /// The document to pin
    pub uri: Url,
    /// Schema identifiers; an empty list removes the pin
    #[serde(default)]
    pub schemas: Vec<String>,
}

/// The LSP backend that handles all language server requests
pub struct Backend {
    /// The LSP client for sending notifications
    client: Client,
    /// Map of document URIs to their state
    documents: Arc<RwLock<HashMap<Url, Document>>>,
    /// Schema state and analysis
    analyzer: Arc<Analyzer>,
}

impl Backend {
    /// Create a new backend instance
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            analyzer: Arc::new(Analyzer::default()),
        }
    }

    /// Handler for the `yaml/schema/modify` request
    pub async fn modify_schema(&self, params: SchemaModification) -> Result<bool> {
        match self.analyzer.modify_schema(&params).await {
            Ok(()) => {
                tracing::info!("Modified schema {}", params.schema());
                self.revalidate_all().await;
                Ok(true)
            }
            Err(err) => {
                tracing::warn!("Schema modification failed: {}", err);
                Ok(false)
            }
        }
    }

    /// Handler for the `yaml/schema/associate` notification
    pub async fn associate(&self, params: AssociateParams) {
        tracing::debug!("Associating {} with {:?}", params.uri, params.schemas);
        self.analyzer.associate(&params.uri, &params.schemas);
        if let Some(document) = self.document(&params.uri).await {
            self.validate_document(&document).await;
        }
    }

    async fn document(&self, uri: &Url) -> Option<Document> {
        self.documents.read().await.get(uri).cloned()
    }

    /// Validate a document and publish diagnostics
    async fn validate_document(&self, document: &Document) {
        let diagnostics = if self.analyzer.settings().validate {
            self.analyzer.validate(document).await
        } else {
            Vec::new()
        };

        self.client
            .publish_diagnostics(document.uri.clone(), diagnostics, Some(document.version))
            .await;
    }

    /// Re-publish diagnostics for every open document after schema state
    /// changed
    async fn revalidate_all(&self) {
        let documents: Vec<Document> = self.documents.read().await.values().cloned().collect();
        tracing::debug!("Revalidating {} open documents", documents.len());
        for document in &documents {
            self.validate_document(document).await;
        }
    }

    async fn update_document(&self, uri: Url, text: String, version: i32) {
        let document = Document::new(uri.clone(), text, version);
        {
            let mut docs = self.documents.write().await;
            docs.insert(uri, document.clone());
        }
        self.validate_document(&document).await;
    }
}

fn read_settings(value: Option<serde_json::Value>) -> Settings {
    match Settings::from_value(value.unwrap_or_default()) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!("Ignoring invalid settings: {}", err);
            Settings::default()
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        #[allow(deprecated)]
        let root = params.root_uri.clone();
        let folders = params.workspace_folders.clone().unwrap_or_default();
        tracing::info!(
            "Initializing with root {:?} and {} workspace folders",
            root.as_ref().map(Url::as_str),
            folders.len()
        );

        self.analyzer.set_workspace(root, folders);
        self.analyzer
            .set_settings(read_settings(params.initialization_options));

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![":".to_string()]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
                document_link_provider: Some(DocumentLinkOptions {
                    resolve_provider: Some(false),
                    work_done_progress_options: Default::default(),
                }),
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                        supported: Some(true),
                        change_notifications: Some(OneOf::Left(true)),
                    }),
                    file_operations: None,
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "yaml-schema-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("Server initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("Server shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document opened: {}", uri);
        self.update_document(uri, params.text_document.text, params.text_document.version)
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // Get the full text from the changes (we use FULL sync)
        if let Some(change) = params.content_changes.into_iter().next() {
            tracing::debug!("Document changed: {}", uri);
            self.update_document(uri, change.text, version).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        tracing::debug!("Document saved: {}", params.text_document.uri);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document closed: {}", uri);

        // Remove document from our state
        {
            let mut docs = self.documents.write().await;
            docs.remove(&uri);
        }

        // Clear diagnostics for this document
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        tracing::info!("Configuration changed");
        // Pull-model clients send no payload
        if params.settings.is_null() {
            return;
        }
        self.analyzer.set_settings(read_settings(Some(params.settings)));
        self.revalidate_all().await;
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        tracing::info!(
            "Workspace folders changed: {} added, {} removed",
            params.event.added.len(),
            params.event.removed.len()
        );
        self.analyzer
            .update_workspace_folders(params.event.added, &params.event.removed);
        self.revalidate_all().await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let mut changed = false;
        for event in &params.changes {
            changed |= self.analyzer.reset_schema(&event.uri);
        }
        if changed {
            self.revalidate_all().await;
        }
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        if !self.analyzer.settings().completion {
            return Ok(None);
        }
        let position = params.text_document_position;
        let Some(document) = self.document(&position.text_document.uri).await else {
            return Ok(None);
        };
        let items = self.analyzer.complete(&document, position.position).await;
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        if !self.analyzer.settings().hover {
            return Ok(None);
        }
        let position = params.text_document_position_params;
        let Some(document) = self.document(&position.text_document.uri).await else {
            return Ok(None);
        };
        Ok(self.analyzer.hover(&document, position.position).await)
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(document) = self.document(&params.text_document.uri).await else {
            return Ok(None);
        };
        Ok(Some(DocumentSymbolResponse::Nested(
            self.analyzer.symbols(&document),
        )))
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        let Some(document) = self.document(&params.text_document.uri).await else {
            return Ok(None);
        };
        Ok(Some(self.analyzer.folding_ranges(&document)))
    }

    async fn document_link(&self, params: DocumentLinkParams) -> Result<Option<Vec<DocumentLink>>> {
        let Some(document) = self.document(&params.text_document.uri).await else {
            return Ok(None);
        };
        Ok(Some(self.analyzer.links(&document)))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let Some(document) = self.document(&params.text_document.uri).await else {
            return Ok(None);
        };
        Ok(Some(
            self.analyzer
                .code_actions(&document, &params.context.diagnostics),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_associate_params() {
        let params: AssociateParams = serde_json::from_value(json!({
            "uri": "file:///work/app.yaml",
            "schemas": ["kubernetes"]
        }))
        .expect("params");
        assert_eq!(params.schemas, vec!["kubernetes"]);

        let cleared: AssociateParams =
            serde_json::from_value(json!({ "uri": "file:///work/app.yaml" })).expect("params");
        assert!(cleared.schemas.is_empty());
    }

    #[test]
    fn test_modify_params() {
        let params: SchemaModification = serde_json::from_value(json!({
            "action": "add",
            "schema": "kubernetes",
            "path": "properties",
            "key": "extra",
            "content": { "type": "string" }
        }))
        .expect("params");
        assert_eq!(params.schema(), "kubernetes");

        let params: SchemaModification =
            serde_json::from_value(json!({ "action": "deleteAll", "schema": "s.json" })).expect("params");
        assert_eq!(params, SchemaModification::DeleteAll { schema: "s.json".into() });
    }

    #[test]
    fn test_invalid_settings_fall_back() {
        let settings = read_settings(Some(json!({ "validate": 3 })));
        assert_eq!(settings, Settings::default());
        assert_eq!(read_settings(None), Settings::default());
    }
}
