//! Testing utilities including mock implementations.
//!
//! These are useful for exercising the pipeline without network access or
//! a running vision model. Every mock is cheaply cloneable; clones share
//! their configuration and call history, so a test can hand one clone to
//! the pipeline and assert against another.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{AnalysisError, ImageFetchError, PageFetchError, PersistResult, PersistenceError};
use crate::traits::{
    analyzer::VisionAnalyzer, catalog::CatalogFetcher, image::ImageSource, store::TabularStore,
};
use crate::types::item::{Item, RawEntry, Record};

fn refused() -> Box<std::io::Error> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "Mock connection refused",
    ))
}

/// Record of a call made to the mock catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCatalogCall {
    Fetch { page: u32 },
}

/// A mock catalog serving predefined pages.
///
/// Pages set with [`with_page`](Self::with_page) return their entries.
/// Other pages up to [`with_last_page`](Self::with_last_page) return an
/// empty listing; pages past it signal end-of-catalog.
#[derive(Clone, Default)]
pub struct MockCatalog {
    /// Predefined entries by page
    pages: Arc<RwLock<BTreeMap<u32, Vec<RawEntry>>>>,

    /// Last page that exists
    last_page: Option<u32>,

    /// Failing pages; `None` fails forever, `Some(n)` fails n more times
    failures: Arc<RwLock<HashMap<u32, Option<u32>>>>,

    /// Call tracking
    calls: Arc<RwLock<Vec<MockCatalogCall>>>,
}

impl MockCatalog {
    /// Create a new mock catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog of `last_page` pages, each with `per_page` rated entries
    /// (with image URLs) and one unrated entry.
    pub fn generated(last_page: u32, per_page: usize) -> Self {
        let mut catalog = Self::new().with_last_page(last_page);
        for page in 1..=last_page {
            let mut entries: Vec<RawEntry> = (0..per_page)
                .map(|i| {
                    let id = format!("beer-{}-{}", page, i);
                    RawEntry::new(&id, format!("Beer {} #{}", page, i))
                        .with_rating(format!("{}.{}", 3 + i % 2, page % 10))
                        .with_image(format!("https://cdn.test/{}.jpg", id))
                })
                .collect();
            entries.push(RawEntry::new(format!("beer-{}-unrated", page), "Unrated"));
            catalog = catalog.with_page(page, entries);
        }
        catalog
    }

    /// Add a predefined page.
    pub fn with_page(self, page: u32, entries: Vec<RawEntry>) -> Self {
        self.pages.write().unwrap().insert(page, entries);
        self
    }

    /// Set the last existing page.
    pub fn with_last_page(mut self, page: u32) -> Self {
        self.last_page = Some(page);
        self
    }

    /// Make every fetch of `page` fail.
    pub fn fail_page(self, page: u32) -> Self {
        self.failures.write().unwrap().insert(page, None);
        self
    }

    /// Make the next `times` fetches of `page` fail.
    pub fn fail_page_times(self, page: u32, times: u32) -> Self {
        self.failures.write().unwrap().insert(page, Some(times));
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockCatalogCall> {
        self.calls.read().unwrap().clone()
    }

    /// Pages fetched, in call order.
    pub fn fetched_pages(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .map(|MockCatalogCall::Fetch { page }| page)
            .collect()
    }

    /// How many times `page` was fetched.
    pub fn fetch_count(&self, page: u32) -> usize {
        self.fetched_pages().into_iter().filter(|p| *p == page).count()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn should_fail(&self, page: u32) -> bool {
        let mut failures = self.failures.write().unwrap();
        match failures.get_mut(&page) {
            Some(None) => true,
            Some(Some(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl CatalogFetcher for MockCatalog {
    async fn fetch(&self, page: u32) -> Result<Option<Vec<RawEntry>>, PageFetchError> {
        self.calls
            .write()
            .unwrap()
            .push(MockCatalogCall::Fetch { page });

        if self.should_fail(page) {
            return Err(PageFetchError::Http {
                page,
                source: refused(),
            });
        }

        if let Some(entries) = self.pages.read().unwrap().get(&page) {
            return Ok(Some(entries.clone()));
        }

        match self.last_page {
            Some(last) if page <= last => Ok(Some(Vec::new())),
            _ => Ok(None),
        }
    }
}

/// A mock image source serving predefined bytes.
///
/// Unknown URLs answer 404 unless a default image is set.
#[derive(Clone, Default)]
pub struct MockImageSource {
    /// Predefined bytes by URL
    images: Arc<RwLock<HashMap<String, Vec<u8>>>>,

    /// Served for any URL without predefined bytes
    default_image: Option<Vec<u8>>,

    /// URLs that fail at the transport level
    fail_urls: Arc<RwLock<Vec<String>>>,

    /// Call tracking
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockImageSource {
    /// Create a new mock image source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add predefined bytes for a URL.
    pub fn with_image(self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.images.write().unwrap().insert(url.into(), bytes);
        self
    }

    /// Serve `bytes` for every other URL.
    pub fn with_default_image(mut self, bytes: Vec<u8>) -> Self {
        self.default_image = Some(bytes);
        self
    }

    /// Mark a URL as failing.
    pub fn fail_url(self, url: impl Into<String>) -> Self {
        self.fail_urls.write().unwrap().push(url.into());
        self
    }

    /// URLs requested, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl ImageSource for MockImageSource {
    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageFetchError> {
        self.calls.write().unwrap().push(url.to_string());

        if self.fail_urls.read().unwrap().iter().any(|u| u == url) {
            return Err(ImageFetchError::Http {
                url: url.to_string(),
                source: refused(),
            });
        }

        if let Some(bytes) = self.images.read().unwrap().get(url) {
            return Ok(bytes.clone());
        }

        self.default_image
            .clone()
            .ok_or_else(|| ImageFetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Record of a call made to the mock analyzer.
#[derive(Debug, Clone)]
pub struct MockAnalyzerCall {
    /// Image path passed in
    pub path: PathBuf,

    /// Whether the file existed when the call was made
    pub existed: bool,

    /// Item the image belongs to, when context was supplied
    pub item_id: Option<String>,
}

/// A mock vision analyzer returning a fixed response.
#[derive(Clone, Default)]
pub struct MockAnalyzer {
    /// Text returned on success
    response: Option<String>,

    /// Item ids whose analysis fails
    fail_items: Arc<RwLock<Vec<String>>>,

    /// Fail every call
    failing: bool,

    /// Delay before answering
    delay: Option<Duration>,

    /// Call tracking
    calls: Arc<RwLock<Vec<MockAnalyzerCall>>>,
}

impl MockAnalyzer {
    /// Create a new mock analyzer. With no response set, calls fail as
    /// unparseable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response text.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Fail every call with a service error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Fail calls for one item.
    pub fn fail_item(self, id: impl Into<String>) -> Self {
        self.fail_items.write().unwrap().push(id.into());
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockAnalyzerCall> {
        self.calls.read().unwrap().clone()
    }

    async fn respond(&self, image: &Path, item_id: Option<&str>) -> Result<String, AnalysisError> {
        self.calls.write().unwrap().push(MockAnalyzerCall {
            path: image.to_path_buf(),
            existed: image.exists(),
            item_id: item_id.map(str::to_string),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let item_fails = item_id.is_some_and(|id| self.fail_items.read().unwrap().iter().any(|f| f == id));
        if self.failing || item_fails {
            return Err(AnalysisError::Service(refused()));
        }

        self.response
            .clone()
            .ok_or_else(|| AnalysisError::Unparseable("no response configured".to_string()))
    }
}

#[async_trait]
impl VisionAnalyzer for MockAnalyzer {
    async fn analyze(&self, image: &Path) -> Result<String, AnalysisError> {
        self.respond(image, None).await
    }

    async fn analyze_item(&self, image: &Path, item: &Item) -> Result<String, AnalysisError> {
        self.respond(image, Some(&item.id)).await
    }
}

/// A store wrapper that fails writes and appends to matching destinations.
///
/// Everything else is delegated to the inner store.
#[derive(Clone)]
pub struct FailingStore<T> {
    inner: T,
    fail_matching: Arc<RwLock<Vec<String>>>,
}

impl<T: TabularStore> FailingStore<T> {
    /// Wrap `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            fail_matching: Arc::default(),
        }
    }

    /// Fail writes to any destination whose path contains `pattern`.
    pub fn fail_writes_to(self, pattern: impl Into<String>) -> Self {
        self.fail_matching.write().unwrap().push(pattern.into());
        self
    }

    /// Stop failing.
    pub fn heal(&self) {
        self.fail_matching.write().unwrap().clear();
    }

    fn check(&self, dest: &Path) -> PersistResult<()> {
        let path = dest.to_string_lossy();
        if self.fail_matching.read().unwrap().iter().any(|p| path.contains(p.as_str())) {
            return Err(PersistenceError::io(
                dest,
                std::io::Error::new(std::io::ErrorKind::Other, "Mock disk full"),
            ));
        }
        Ok(())
    }
}

impl<T: TabularStore> TabularStore for FailingStore<T> {
    fn exists(&self, dest: &Path) -> PersistResult<bool> {
        self.inner.exists(dest)
    }

    fn write(&self, dest: &Path, records: &[Record]) -> PersistResult<()> {
        self.check(dest)?;
        self.inner.write(dest, records)
    }

    fn append(&self, dest: &Path, records: &[Record]) -> PersistResult<()> {
        self.check(dest)?;
        self.inner.append(dest, records)
    }

    fn read(&self, dest: &Path) -> PersistResult<Vec<Record>> {
        self.inner.read(dest)
    }

    fn replace(&self, dest: &Path, records: &[Record]) -> PersistResult<()> {
        self.check(dest)?;
        self.inner.replace(dest, records)
    }

    fn list(&self, dir: &Path) -> PersistResult<Vec<PathBuf>> {
        self.inner.list(dir)
    }
}
