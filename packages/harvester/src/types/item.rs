//! Catalog entries, validated items, and persisted records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Enrichment value written when the image or the analyzer failed.
pub const ENRICHMENT_UNAVAILABLE: &str = "unavailable";

/// An entry exactly as the catalog fetcher produced it.
///
/// The rating is still text and may be missing or malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Site-assigned id or item URL
    pub id: String,

    /// Display name
    pub name: String,

    /// Rating as scraped
    pub rating: Option<String>,

    /// Absolute image URL if the listing shows one
    pub image_url: Option<String>,

    /// Extra listing fields (brewery, style, abv) used as analysis context
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl RawEntry {
    /// Create a raw entry with an id and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rating: None,
            image_url: None,
            details: BTreeMap::new(),
        }
    }

    /// Set the scraped rating text.
    pub fn with_rating(mut self, rating: impl Into<String>) -> Self {
        self.rating = Some(rating.into());
        self
    }

    /// Set the image URL.
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Add a listing detail.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Validate into an [`Item`].
    ///
    /// This is the single rating-validity predicate of the pipeline:
    /// entries whose rating does not parse to a finite number yield `None`
    /// and never reach an artifact.
    pub fn validate(self) -> Option<Item> {
        let rating = parse_rating(self.rating.as_deref())?;
        Some(Item {
            id: self.id,
            name: self.name,
            rating,
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
            details: self.details,
            enrichment: None,
        })
    }
}

/// Parse a scraped rating into a finite number.
pub fn parse_rating(raw: Option<&str>) -> Option<f64> {
    let value: f64 = raw?.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

/// Result of enriching an item's image.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    /// Analyzer output
    Described(String),

    /// Image fetch or analysis failed
    Unavailable,
}

impl Enrichment {
    /// Text written to the enrichment column.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Described(text) => text,
            Self::Unavailable => ENRICHMENT_UNAVAILABLE,
        }
    }
}

/// A catalog item that passed rating validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub rating: f64,
    pub image_url: Option<String>,
    pub details: BTreeMap<String, String>,

    /// `None` until enriched, and stays `None` for items without an image
    pub enrichment: Option<Enrichment>,
}

impl Item {
    /// Whether enrichment fell back to the sentinel.
    pub fn enrichment_unavailable(&self) -> bool {
        matches!(self.enrichment, Some(Enrichment::Unavailable))
    }

    /// Look up a listing detail.
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }
}

/// One row of a batch or master artifact.
///
/// Column order is the artifact schema: id, name, rating, enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub rating: f64,
    pub enrichment: String,
}

impl Record {
    /// Column names in schema order.
    pub const HEADER: [&'static str; 4] = ["id", "name", "rating", "enrichment"];
}

impl From<Item> for Record {
    fn from(item: Item) -> Self {
        let enrichment = item
            .enrichment
            .as_ref()
            .map(|e| e.as_str().to_string())
            .unwrap_or_default();

        Self {
            id: item.id,
            name: item.name,
            rating: item.rating,
            enrichment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_rating_accepts_numbers() {
        assert_eq!(parse_rating(Some("4.12")), Some(4.12));
        assert_eq!(parse_rating(Some(" 3 ")), Some(3.0));
        assert_eq!(parse_rating(Some("0")), Some(0.0));
    }

    #[test]
    fn test_parse_rating_rejects_missing_and_malformed() {
        assert_eq!(parse_rating(None), None);
        assert_eq!(parse_rating(Some("")), None);
        assert_eq!(parse_rating(Some("N/A")), None);
        assert_eq!(parse_rating(Some("4,5")), None);
        assert_eq!(parse_rating(Some("NaN")), None);
        assert_eq!(parse_rating(Some("inf")), None);
    }

    #[test]
    fn test_validate_drops_unrated_entry() {
        let entry = RawEntry::new("beer-1", "Pale Ale");
        assert!(entry.validate().is_none());
    }

    #[test]
    fn test_validate_keeps_details_and_clears_blank_image() {
        let item = RawEntry::new("beer-2", "Stout")
            .with_rating("3.9")
            .with_image("  ")
            .with_detail("brewery", "Dark Horse")
            .validate()
            .unwrap();

        assert_eq!(item.rating, 3.9);
        assert!(item.image_url.is_none());
        assert_eq!(item.detail("brewery"), Some("Dark Horse"));
        assert!(item.enrichment.is_none());
    }

    #[test]
    fn test_record_enrichment_column() {
        let mut item = RawEntry::new("a", "A").with_rating("1").validate().unwrap();
        assert_eq!(Record::from(item.clone()).enrichment, "");

        item.enrichment = Some(Enrichment::Unavailable);
        assert_eq!(Record::from(item.clone()).enrichment, ENRICHMENT_UNAVAILABLE);

        item.enrichment = Some(Enrichment::Described("red label".into()));
        assert_eq!(Record::from(item).enrichment, "red label");
    }

    proptest! {
        #[test]
        fn prop_non_numeric_ratings_never_validate(raw in "[a-zA-Z/ ]{0,8}") {
            prop_assume!(raw.trim().parse::<f64>().is_err());
            let entry = RawEntry::new("x", "X").with_rating(raw);
            prop_assert!(entry.validate().is_none());
        }

        #[test]
        fn prop_finite_ratings_validate(value in -1.0e6f64..1.0e6) {
            let entry = RawEntry::new("x", "X").with_rating(value.to_string());
            let item = entry.validate().unwrap();
            prop_assert_eq!(item.rating, value);
        }
    }
}
