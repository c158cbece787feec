//! Per-item enrichment with the vision analyzer.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::pipeline::images::ImageLifecycleManager;
use crate::traits::analyzer::VisionAnalyzer;
use crate::traits::image::ImageSource;
use crate::types::item::{Enrichment, Item};

/// Attaches a label description to an item.
///
/// [`enrich`](Self::enrich) never fails: image and analyzer errors turn
/// into [`Enrichment::Unavailable`] so the item is still written.
pub struct ItemEnricher<S, A> {
    images: ImageLifecycleManager<S>,
    analyzer: A,
    timeout: Duration,
}

impl<S: ImageSource, A: VisionAnalyzer> ItemEnricher<S, A> {
    /// Create an enricher. `timeout` bounds each analyzer call.
    pub fn new(images: ImageLifecycleManager<S>, analyzer: A, timeout: Duration) -> Self {
        Self {
            images,
            analyzer,
            timeout,
        }
    }

    /// Enrich one item.
    ///
    /// Items without an image URL come back with no enrichment. Otherwise
    /// exactly one temporary image is created, analyzed, and deleted.
    pub async fn enrich(&self, mut item: Item) -> Item {
        let Some(url) = item.image_url.clone() else {
            item.enrichment = None;
            return item;
        };

        let outcome = self
            .images
            .with_image(&url, |path| self.analyze(path, &item))
            .await;

        item.enrichment = Some(match outcome {
            Ok(Ok(text)) => {
                debug!(item_id = %item.id, "Enriched item");
                Enrichment::Described(text)
            }
            Ok(Err(e)) => {
                warn!(item_id = %item.id, error = %e, "Analysis failed, writing sentinel enrichment");
                Enrichment::Unavailable
            }
            Err(e) => {
                warn!(item_id = %item.id, url = %url, error = %e, "Image unavailable, writing sentinel enrichment");
                Enrichment::Unavailable
            }
        });

        item
    }

    async fn analyze(&self, path: PathBuf, item: &Item) -> Result<String, AnalysisError> {
        let text = tokio::time::timeout(self.timeout, self.analyzer.analyze_item(&path, item))
            .await
            .map_err(|_| AnalysisError::Timeout(self.timeout))??;

        let text = text.trim();
        if text.is_empty() {
            return Err(AnalysisError::Unparseable("empty response".to_string()));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockAnalyzer, MockImageSource};
    use crate::types::item::RawEntry;

    const IMAGE_URL: &str = "https://cdn.test/label.jpg";

    fn item(image: Option<&str>) -> Item {
        let mut entry = RawEntry::new("beer-1", "Pale Ale").with_rating("4.1");
        if let Some(url) = image {
            entry = entry.with_image(url);
        }
        entry.validate().unwrap()
    }

    fn enricher(
        dir: &std::path::Path,
        analyzer: MockAnalyzer,
    ) -> ItemEnricher<MockImageSource, MockAnalyzer> {
        let source = MockImageSource::new().with_image(IMAGE_URL, b"JPEG".to_vec());
        ItemEnricher::new(
            ImageLifecycleManager::new(source, dir),
            analyzer,
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_no_image_means_no_enrichment() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer::new().with_response("red");
        let enricher = enricher(dir.path(), analyzer.clone());

        let out = enricher.enrich(item(None)).await;

        assert!(out.enrichment.is_none());
        assert!(analyzer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_success_sets_description_and_deletes_image() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer::new().with_response("  {\"label_color\":\"red\"}  ");
        let enricher = enricher(dir.path(), analyzer.clone());

        let out = enricher.enrich(item(Some(IMAGE_URL))).await;

        assert_eq!(
            out.enrichment,
            Some(Enrichment::Described("{\"label_color\":\"red\"}".into()))
        );

        let calls = analyzer.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].existed);
        assert!(!calls[0].path.exists());
    }

    #[tokio::test]
    async fn test_analyzer_failure_keeps_item_with_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer::new().failing();
        let enricher = enricher(dir.path(), analyzer.clone());

        let out = enricher.enrich(item(Some(IMAGE_URL))).await;

        assert!(out.enrichment_unavailable());
        assert_eq!(out.id, "beer-1");
        assert!(!analyzer.calls()[0].path.exists());
    }

    #[tokio::test]
    async fn test_timeout_keeps_item_with_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer::new()
            .with_response("late")
            .with_delay(Duration::from_secs(5));
        let enricher = enricher(dir.path(), analyzer.clone());

        let out = enricher.enrich(item(Some(IMAGE_URL))).await;

        assert!(out.enrichment_unavailable());
        assert!(!analyzer.calls()[0].path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_image_failure_skips_analyzer() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer::new().with_response("red");
        let enricher = enricher(dir.path(), analyzer.clone());

        let out = enricher.enrich(item(Some("https://cdn.test/gone.jpg"))).await;

        assert!(out.enrichment_unavailable());
        assert!(analyzer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blank_response_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = MockAnalyzer::new().with_response("   ");
        let enricher = enricher(dir.path(), analyzer);

        let out = enricher.enrich(item(Some(IMAGE_URL))).await;
        assert!(out.enrichment_unavailable());
    }
}
