//! HTTP image downloads.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::ImageFetchError;
use crate::traits::image::ImageSource;

/// Downloads label images with reqwest.
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    /// Create a source with a 30s request timeout.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Use an existing client (shares its connection pool).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageFetchError> {
        let http_error = |e: reqwest::Error| ImageFetchError::Http {
            url: url.to_string(),
            source: Box::new(e),
        };

        let response = self.client.get(url).send().await.map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageFetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(http_error)?;
        if bytes.is_empty() {
            return Err(ImageFetchError::Empty {
                url: url.to_string(),
            });
        }

        debug!(url = %url, bytes = bytes.len(), "Downloaded image");
        Ok(bytes.to_vec())
    }
}
