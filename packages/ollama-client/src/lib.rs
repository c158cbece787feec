//! Pure Ollama REST API client
//!
//! A small client for a local Ollama server with no domain-specific logic.
//! Supports listing installed models and (multimodal) generation.
//!
//! # Example
//!
//! ```rust,ignore
//! use ollama_client::{GenerateRequest, OllamaClient};
//!
//! let client = OllamaClient::from_env()?;
//!
//! let models = client.list_models().await?;
//!
//! let text = client
//!     .generate(GenerateRequest::new("llava:7b", "What color is this label?").image_bytes(&bytes))
//!     .await?;
//! ```

pub mod error;
pub mod streaming;
pub mod types;

pub use error::{OllamaError, Result};
pub use streaming::{GenerateChunk, GenerateStream};
pub use types::{GenerateOptions, GenerateRequest, ModelInfo};

use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Default local Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Pure Ollama API client.
#[derive(Clone)]
pub struct OllamaClient {
    http_client: Client,
    base_url: String,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl OllamaClient {
    /// Create a new client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variable `OLLAMA_BASE_URL` (falls back to localhost).
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(OllamaError::Config(format!(
                "OLLAMA_BASE_URL must be an http(s) URL, got {}",
                base_url
            )));
        }
        Ok(Self::new(base_url))
    }

    /// Use a client with a whole-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OllamaError::Config(e.to_string()))?;
        Ok(self)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List locally installed models (`GET /api/tags`).
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Ollama tags request failed");
                OllamaError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OllamaError::Api(format!(
                "Ollama tags error ({}): {}",
                status, error_text
            )));
        }

        let tags: types::TagsResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::Parse(e.to_string()))?;

        Ok(tags.models)
    }

    /// Streaming generation (`POST /api/generate` with `stream: true`).
    pub async fn generate_stream(&self, mut request: GenerateRequest) -> Result<GenerateStream> {
        request.stream = true;

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Ollama generate request failed");
                OllamaError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Ollama generate API error");
            return Err(OllamaError::Api(format!(
                "Ollama generate error ({}): {}",
                status, error_text
            )));
        }

        Ok(GenerateStream::new(response.bytes_stream()))
    }

    /// Generation collected into one string.
    ///
    /// Concatenates every streamed `response` fragment until the final line.
    pub async fn generate(&self, request: GenerateRequest) -> Result<String> {
        let start = std::time::Instant::now();
        let model = request.model.clone();
        let mut stream = self.generate_stream(request).await?;

        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            text.push_str(&chunk.response);
            if chunk.done {
                break;
            }
        }

        debug!(
            model = %model,
            duration_ms = start.elapsed().as_millis(),
            chars = text.len(),
            "Ollama generate"
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = OllamaClient::new("http://gpu-box:11434/");
        assert_eq!(client.base_url(), "http://gpu-box:11434");
    }

    #[test]
    fn test_default_is_localhost() {
        let client = OllamaClient::default();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }
}
