//! HTTP client for the records API.

use crate::config::RukovoditelConfig;
use crate::error::ToolError;
use crate::query::WireParams;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

/// Anything that can answer a records query with a raw JSON document.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Perform one call. No retries, no caching.
    async fn execute(&self, params: &WireParams) -> Result<Value, ToolError>;
}

/// Form-encoded POST client with a bounded timeout.
pub struct ApiClient {
    client: Client,
    endpoint: Url,
}

impl ApiClient {
    pub fn new(config: &RukovoditelConfig) -> Result<Self, ToolError> {
        let endpoint = Url::parse(&config.api_url).map_err(|e| {
            ToolError::HttpClient(format!("URL de API inválida '{}': {e}", config.api_url))
        })?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ToolError::HttpClient(e.to_string()))?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl RecordSource for ApiClient {
    async fn execute(&self, params: &WireParams) -> Result<Value, ToolError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(params)
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        serde_json::from_str(&body).map_err(|_| ToolError::decode(&body))
    }
}
