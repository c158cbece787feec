//! LLaVA label analysis through a local Ollama server.
//!
//! The model is asked for the label's background color and text color as
//! JSON. Models do not always comply, so the first `{...}` block of the
//! answer is tried first and a scan for color words is the fallback.

use async_trait::async_trait;
use ollama_client::{GenerateRequest, ModelInfo, OllamaClient};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::AnalysisError;
use crate::traits::analyzer::VisionAnalyzer;
use crate::types::item::Item;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "llava:7b";

/// Color words recognized by the fallback, in priority order.
const COLORS: &[&str] = &[
    "black", "white", "red", "blue", "green", "yellow", "orange", "purple", "brown", "gray",
    "gold", "silver", "pink", "beige", "cream", "navy", "maroon", "olive", "teal", "cyan",
    "magenta", "lime", "indigo", "violet", "tan", "khaki", "burgundy", "crimson", "emerald",
    "turquoise", "amber", "copper", "bronze",
];

const UNKNOWN_COLOR: &str = "unknown";

/// Colors read off a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelAnalysis {
    pub label_color: String,
    pub text_color: String,
}

impl LabelAnalysis {
    /// Compact JSON, the form stored in the enrichment column.
    pub fn to_enrichment(&self) -> Result<String, AnalysisError> {
        serde_json::to_string(self).map_err(|e| AnalysisError::Unparseable(e.to_string()))
    }
}

/// Vision analyzer backed by a LLaVA model.
pub struct LlavaAnalyzer {
    client: OllamaClient,
    model: String,
}

impl LlavaAnalyzer {
    /// Create an analyzer for `model`. Call
    /// [`ensure_model`](Self::ensure_model) to check it is installed.
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Model in use.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check the server for a vision model, switching to the first
    /// installed LLaVA model when the configured one is missing.
    pub async fn ensure_model(mut self) -> Result<Self, AnalysisError> {
        let models = self
            .client
            .list_models()
            .await
            .map_err(|e| AnalysisError::Service(Box::new(e)))?;

        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        debug!(models = ?names, "Installed models");

        let selected = select_model(&models, &self.model).ok_or_else(|| {
            AnalysisError::ModelUnavailable {
                wanted: self.model.clone(),
            }
        })?;

        if selected != self.model {
            warn!(wanted = %self.model, using = %selected, "Configured model not installed");
        }
        info!(model = %selected, "Using vision model");
        self.model = selected;
        Ok(self)
    }

    async fn describe(&self, image: &Path, prompt: String) -> Result<String, AnalysisError> {
        let bytes = tokio::fs::read(image).await.map_err(|source| AnalysisError::Io {
            path: image.to_path_buf(),
            source,
        })?;

        let request = GenerateRequest::new(&self.model, prompt).image_bytes(&bytes);
        let response = self
            .client
            .generate(request)
            .await
            .map_err(|e| AnalysisError::Service(Box::new(e)))?;

        parse_label_analysis(&response)?.to_enrichment()
    }
}

#[async_trait]
impl VisionAnalyzer for LlavaAnalyzer {
    async fn analyze(&self, image: &Path) -> Result<String, AnalysisError> {
        self.describe(image, build_prompt(None)).await
    }

    async fn analyze_item(&self, image: &Path, item: &Item) -> Result<String, AnalysisError> {
        self.describe(image, build_prompt(Some(item))).await
    }
}

/// Pick `preferred` if installed (a bare name matches any tag of it),
/// otherwise the first model whose name contains `llava`.
pub fn select_model(models: &[ModelInfo], preferred: &str) -> Option<String> {
    let exact = models.iter().find(|m| {
        m.name == preferred
            || (!preferred.contains(':') && m.name.split(':').next() == Some(preferred))
    });

    exact
        .or_else(|| {
            models
                .iter()
                .find(|m| m.name.to_lowercase().contains("llava"))
        })
        .map(|m| m.name.clone())
}

fn build_prompt(item: Option<&Item>) -> String {
    let subject = match item {
        Some(item) => {
            let mut subject = format!("Analyze this beer label image for {}", item.name);
            if let Some(brewery) = item.detail("brewery") {
                subject.push_str(&format!(" by {}", brewery));
            }
            let facts: Vec<&str> = ["style", "abv"]
                .iter()
                .filter_map(|key| item.detail(key))
                .collect();
            if !facts.is_empty() {
                subject.push_str(&format!(" ({})", facts.join(", ")));
            }
            subject
        }
        None => "Analyze this beer label image".to_string(),
    };

    format!(
        r#"{}.

Identify the main label color (background color of the label) and the main text color. Respond in this exact JSON format:

{{
    "label_color": "color_name",
    "text_color": "color_name"
}}

Use only basic color names like: black, white, red, blue, green, yellow, orange, purple, brown, gray, gold, silver, pink, etc.
Respond with valid JSON only."#,
        subject
    )
}

#[derive(Deserialize)]
struct RawAnalysis {
    label_color: Option<String>,
    text_color: Option<String>,
}

/// Read label colors from a model answer.
pub fn parse_label_analysis(response: &str) -> Result<LabelAnalysis, AnalysisError> {
    if let Some(analysis) = parse_json_block(response) {
        return Ok(analysis);
    }

    debug!("No usable JSON in model answer, scanning for color words");
    scan_colors(response).ok_or_else(|| {
        let preview: String = response.chars().take(200).collect();
        AnalysisError::Unparseable(preview)
    })
}

fn parse_json_block(response: &str) -> Option<LabelAnalysis> {
    let block = Regex::new(r"\{[\s\S]*?\}").ok()?.find(response)?;
    let raw: RawAnalysis = serde_json::from_str(block.as_str()).ok()?;

    let clean = |color: Option<String>| {
        color
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
    };
    Some(LabelAnalysis {
        label_color: clean(raw.label_color)?,
        text_color: clean(raw.text_color).unwrap_or_else(|| UNKNOWN_COLOR.to_string()),
    })
}

fn scan_colors(response: &str) -> Option<LabelAnalysis> {
    let lower = response.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    let mut found = COLORS.iter().filter(|color| words.contains(color));
    let label_color = found.next()?;
    let text_color = found.next().copied().unwrap_or(UNKNOWN_COLOR);

    Some(LabelAnalysis {
        label_color: label_color.to_string(),
        text_color: text_color.to_string(),
    })
}
