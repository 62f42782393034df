//! Raw schema retrieval

use std::time::Duration;

use tower_lsp::lsp_types::Url;

use crate::error::FetchError;

/// Loads the raw text of a schema resource
#[tower_lsp::async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, uri: &Url) -> Result<String, FetchError>;
}

/// Fetches `file://` URIs from disk and `http(s)://` URIs over the network
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    client: reqwest::Client,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[tower_lsp::async_trait]
impl SchemaFetcher for DefaultFetcher {
    async fn fetch(&self, uri: &Url) -> Result<String, FetchError> {
        match uri.scheme() {
            "file" => {
                let path = uri
                    .to_file_path()
                    .map_err(|_| FetchError::InvalidPath(uri.to_string()))?;
                tracing::debug!("Reading schema from {}", path.display());
                Ok(tokio::fs::read_to_string(path).await?)
            }
            "http" | "https" => {
                tracing::debug!("Downloading schema from {}", uri);
                let response = self
                    .client
                    .get(uri.as_str())
                    .send()
                    .await?
                    .error_for_status()?;
                Ok(response.text().await?)
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}
