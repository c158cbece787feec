//! Ollama API request and response types.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

// =============================================================================
// Generate
// =============================================================================

/// Request body for `POST /api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Model to use (e.g., "llava:7b")
    pub model: String,

    /// Prompt text
    pub prompt: String,

    /// Base64-encoded images for multimodal models
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Stream NDJSON fragments (the client always reads the stream)
    pub stream: bool,

    /// Force a response format (Ollama accepts "json")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Sampling options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

impl GenerateRequest {
    /// Create a new generate request for a model and prompt.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            images: Vec::new(),
            stream: true,
            format: None,
            options: None,
        }
    }

    /// Attach raw image bytes (encoded to base64 here).
    pub fn image_bytes(mut self, bytes: &[u8]) -> Self {
        self.images.push(STANDARD.encode(bytes));
        self
    }

    /// Ask Ollama to constrain output to JSON.
    pub fn json_format(mut self) -> Self {
        self.format = Some("json".to_string());
        self
    }

    /// Set sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options
            .get_or_insert_with(GenerateOptions::default)
            .temperature = Some(temperature);
        self
    }
}

/// Model options for a generate call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// One NDJSON line of a streamed generate response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenerateLineRaw {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Models
// =============================================================================

/// Response body of `GET /api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// A locally installed model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelInfo {
    /// Model tag, e.g. "llava:7b"
    pub name: String,

    /// Size on disk in bytes
    #[serde(default)]
    pub size: u64,
}
