//! Vision analyzer trait.

use async_trait::async_trait;
use std::path::Path;

use crate::error::AnalysisError;
use crate::types::item::Item;

/// Describes a label image stored on local disk.
///
/// Implementations wrap a specific vision model and handle prompting and
/// response parsing. Callers enforce the time budget.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Analyze the image at `image` and return a text description.
    async fn analyze(&self, image: &Path) -> Result<String, AnalysisError>;

    /// Analyze with the listing the image belongs to as extra context.
    async fn analyze_item(&self, image: &Path, _item: &Item) -> Result<String, AnalysisError> {
        // Default implementation ignores the context
        self.analyze(image).await
    }
}
