//! Production catalog and image collaborators.

pub mod http;
pub mod image;
pub mod rate_limited;

pub use http::{parse_listing, HttpCatalog, DEFAULT_BASE_URL};
pub use image::HttpImageSource;
pub use rate_limited::{CatalogExt, RateLimitedCatalog};
