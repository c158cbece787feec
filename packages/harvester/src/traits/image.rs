//! Image source trait.

use async_trait::async_trait;

use crate::error::ImageFetchError;

/// Downloads image bytes.
///
/// Only the network half of image handling; staging the bytes to a
/// temporary file and deleting it belongs to
/// [`ImageLifecycleManager`](crate::pipeline::images::ImageLifecycleManager).
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Download the resource at `url`.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageFetchError>;
}
