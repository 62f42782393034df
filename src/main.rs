//! yaml-schema-lsp: LSP server for YAML files validated against JSON Schemas

use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use yaml_schema_lsp::Backend;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting yaml-schema-lsp server");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(Backend::new)
        .custom_method("yaml/schema/modify", Backend::modify_schema)
        .custom_method("yaml/schema/associate", Backend::associate)
        .finish();
    Server::new(stdin, stdout, socket).serve(service).await;
}
