//! HTTP catalog fetcher for paginated beer listings.
//!
//! Pages are plain server-rendered HTML; every `div.beer-row` is one
//! listing. Fields are read with CSS selectors and anything missing is
//! simply left out of the entry.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::PageFetchError;
use crate::traits::catalog::CatalogFetcher;
use crate::types::item::RawEntry;

/// Listing URL; the page number is appended.
pub const DEFAULT_BASE_URL: &str = "https://beerizer.com/?page=";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches listing pages over HTTP.
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalog {
    /// Create a fetcher for [`DEFAULT_BASE_URL`].
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Use a different listing URL prefix.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// URL of page `page`.
    pub fn page_url(&self, page: u32) -> String {
        format!("{}{}", self.base_url, page)
    }
}

#[async_trait]
impl CatalogFetcher for HttpCatalog {
    async fn fetch(&self, page: u32) -> Result<Option<Vec<RawEntry>>, PageFetchError> {
        let url = self.page_url(page);
        debug!(page, url = %url, "Fetching catalog page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PageFetchError::Http {
                page,
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageFetchError::Status {
                page,
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let html = response.text().await.map_err(|e| PageFetchError::Http {
            page,
            source: Box::new(e),
        })?;

        parse_listing(page, &html, &final_url)
    }
}

struct ListingSelectors {
    row: Selector,
    name: Selector,
    brewery: Selector,
    flag: Selector,
    price: Selector,
    rating: Selector,
    abv: Selector,
    style: Selector,
    link: Selector,
    image: Selector,
}

impl ListingSelectors {
    fn new(page: u32) -> Result<Self, PageFetchError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| PageFetchError::Parse {
                page,
                reason: format!("invalid selector {}: {}", css, e),
            })
        };

        Ok(Self {
            row: parse("div.beer-row")?,
            name: parse(r#"[itemprop="name"]"#)?,
            brewery: parse("span.brewery-title")?,
            flag: parse("span.brewery-title img.flag")?,
            price: parse(r#"meta[itemprop="price"]"#)?,
            rating: parse(r#"meta[itemprop="ratingValue"]"#)?,
            abv: parse("span.abv.value")?,
            style: parse("div.right-item-row.style > div")?,
            link: parse("a.beer-title[itemprop='url']")?,
            image: parse(r#"[itemprop="image"]"#)?,
        })
    }
}

/// Parse a listing page.
///
/// Returns `Ok(None)` when the page has no listing rows, which is how the
/// catalog signals that it has ended. Relative links are resolved against
/// `page_url`.
pub fn parse_listing(
    page: u32,
    html: &str,
    page_url: &Url,
) -> Result<Option<Vec<RawEntry>>, PageFetchError> {
    let selectors = ListingSelectors::new(page)?;
    let document = Html::parse_document(html);

    let entries: Vec<RawEntry> = document
        .select(&selectors.row)
        .map(|row| parse_row(&selectors, row, page_url))
        .collect();

    if entries.is_empty() {
        return Ok(None);
    }
    debug!(page, rows = entries.len(), "Parsed listing");
    Ok(Some(entries))
}

fn parse_row(selectors: &ListingSelectors, row: ElementRef<'_>, page_url: &Url) -> RawEntry {
    let text = |selector: &Selector| {
        row.select(selector)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    };
    let attr = |selector: &Selector, name: &str| {
        row.select(selector)
            .next()
            .and_then(|el| el.value().attr(name))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let resolve = |href: String| {
        page_url
            .join(&href)
            .map(|u| u.to_string())
            .unwrap_or(href)
    };

    let name = text(&selectors.name).unwrap_or_else(|| "N/A".to_string());
    let link = attr(&selectors.link, "href").map(resolve);
    let id = row
        .value()
        .attr("id")
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .or_else(|| link.clone())
        .unwrap_or_else(|| name.clone());

    let mut entry = RawEntry::new(id, name);
    entry.rating = attr(&selectors.rating, "content");
    entry.image_url = attr(&selectors.image, "src").map(resolve);

    let country = attr(&selectors.flag, "title").or_else(|| attr(&selectors.flag, "alt"));
    let details = [
        ("brewery", text(&selectors.brewery)),
        ("country", country),
        ("price", attr(&selectors.price, "content")),
        ("abv", text(&selectors.abv)),
        ("style", text(&selectors.style)),
        ("url", link),
    ];
    for (key, value) in details {
        if let Some(value) = value {
            entry = entry.with_detail(key, value);
        }
    }

    entry
}

/// Element text with whitespace runs collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <div class="beer-row" id="beer-418178">
            <a class="beer-title" itemprop="url" href="/beer/418178-hazy-days">
              <span itemprop="name">Hazy   Days</span>
            </a>
            <span class="brewery-title">Omnipollo <img class="flag" title="Sweden" src="/se.png"></span>
            <meta itemprop="price" content="3.49">
            <meta itemprop="ratingValue" content="4.12">
            <span class="abv value">6.5%</span>
            <div class="right-item-row style"><div>New England IPA</div></div>
            <img itemprop="image" src="https://img.beerizer.com/418178.jpg">
          </div>
          <div class="beer-row">
            <a class="beer-title" itemprop="url" href="/beer/2-no-rating">
              <span itemprop="name">Mystery Lager</span>
            </a>
            <img itemprop="image" src="/images/2.png">
          </div>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://beerizer.com/?page=3").unwrap()
    }

    #[test]
    fn test_parse_listing_fields() {
        let entries = parse_listing(3, LISTING, &base()).unwrap().unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.id, "beer-418178");
        assert_eq!(first.name, "Hazy Days");
        assert_eq!(first.rating.as_deref(), Some("4.12"));
        assert_eq!(first.image_url.as_deref(), Some("https://img.beerizer.com/418178.jpg"));
        assert_eq!(first.details["brewery"], "Omnipollo");
        assert_eq!(first.details["country"], "Sweden");
        assert_eq!(first.details["price"], "3.49");
        assert_eq!(first.details["abv"], "6.5%");
        assert_eq!(first.details["style"], "New England IPA");
        assert_eq!(first.details["url"], "https://beerizer.com/beer/418178-hazy-days");
    }

    #[test]
    fn test_parse_listing_falls_back_and_resolves() {
        let entries = parse_listing(3, LISTING, &base()).unwrap().unwrap();
        let second = &entries[1];

        assert_eq!(second.id, "https://beerizer.com/beer/2-no-rating");
        assert!(second.rating.is_none());
        assert_eq!(second.image_url.as_deref(), Some("https://beerizer.com/images/2.png"));
        assert!(second.clone().validate().is_none());
    }

    #[test]
    fn test_page_without_rows_is_end_of_catalog() {
        let html = "<html><body><p>No beers found</p></body></html>";
        assert!(parse_listing(1677, html, &base()).unwrap().is_none());
    }

    #[test]
    fn test_page_url() {
        let catalog = HttpCatalog::new()
            .unwrap()
            .with_base_url("http://localhost:8080/list?page=");
        assert_eq!(catalog.page_url(7), "http://localhost:8080/list?page=7");
    }
}
