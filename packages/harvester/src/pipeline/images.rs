//! Scoped acquisition of label images.
//!
//! An image is downloaded into a uniquely named file, handed to the caller
//! for one use, and deleted when the guard goes out of scope. The guard is
//! dropped on success, on error, and when a timed-out analysis future is
//! cancelled, so no code path leaves the file behind.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};
use url::Url;

use crate::error::ImageFetchError;
use crate::traits::image::ImageSource;

/// Extension used when the URL does not carry a usable one.
const DEFAULT_EXTENSION: &str = "jpg";

/// A downloaded image that is deleted on drop.
#[derive(Debug)]
pub struct TempImage {
    path: PathBuf,
    guard: Option<TempPath>,
}

impl TempImage {
    /// Local path of the image.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            match guard.close() {
                Ok(()) => debug!(path = %self.path.display(), "Deleted temporary image"),
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to delete temporary image"
                ),
            }
        }
    }
}

/// Downloads images into a scratch directory and guarantees their deletion.
pub struct ImageLifecycleManager<S> {
    source: S,
    dir: PathBuf,
}

impl<S: ImageSource> ImageLifecycleManager<S> {
    /// Create a manager staging images under `dir`.
    pub fn new(source: S, dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            dir: dir.into(),
        }
    }

    /// Scratch directory holding in-flight images.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Download `url` into a fresh file.
    ///
    /// On error nothing is left on disk.
    pub async fn acquire(&self, url: &str) -> Result<TempImage, ImageFetchError> {
        let bytes = self.source.download(url).await?;
        if bytes.is_empty() {
            return Err(ImageFetchError::Empty {
                url: url.to_string(),
            });
        }

        let io_error = |source| ImageFetchError::Io {
            url: url.to_string(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_error)?;

        let suffix = format!(".{}", image_extension(url));
        let mut file = tempfile::Builder::new()
            .prefix("label-")
            .suffix(&suffix)
            .tempfile_in(&self.dir)
            .map_err(io_error)?;

        // A failed write drops `file`, which removes it
        file.write_all(&bytes)
            .and_then(|_| file.flush())
            .map_err(io_error)?;

        let guard = file.into_temp_path();
        let path = guard.to_path_buf();
        debug!(url = %url, path = %path.display(), bytes = bytes.len(), "Staged image");

        Ok(TempImage {
            path,
            guard: Some(guard),
        })
    }

    /// Run `f` with the local path of the image at `url`, then delete it.
    pub async fn with_image<F, Fut, T>(&self, url: &str, f: F) -> Result<T, ImageFetchError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = T>,
    {
        let image = self.acquire(url).await?;
        let output = f(image.path().to_path_buf()).await;
        drop(image);
        Ok(output)
    }
}

/// File extension taken from the URL path, or the default.
fn image_extension(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let name = parsed.path_segments()?.next_back()?.to_string();
            let (_, ext) = name.rsplit_once('.')?;
            let valid = !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric());
            valid.then(|| ext.to_ascii_lowercase())
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockImageSource;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_acquire_writes_bytes_and_deletes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockImageSource::new().with_image("https://cdn.test/a.png", b"PNGDATA".to_vec());
        let manager = ImageLifecycleManager::new(source, dir.path().join("images"));

        let image = manager.acquire("https://cdn.test/a.png").await.unwrap();
        let path = image.path().to_path_buf();

        assert_eq!(std::fs::read(&path).unwrap(), b"PNGDATA");
        assert_eq!(path.extension().unwrap(), "png");
        assert!(path.starts_with(manager.dir()));

        drop(image);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_with_image_deletes_after_use() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockImageSource::new().with_image("https://cdn.test/a.jpg", b"JPEG".to_vec());
        let manager = ImageLifecycleManager::new(source, dir.path());

        let seen = manager
            .with_image("https://cdn.test/a.jpg", |path| async move {
                assert!(path.exists());
                path
            })
            .await
            .unwrap();

        assert!(!seen.exists());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_with_image_deletes_when_caller_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockImageSource::new().with_image("https://cdn.test/a.jpg", b"JPEG".to_vec());
        let manager = ImageLifecycleManager::new(source, dir.path());

        let result: Result<(), &str> = manager
            .with_image("https://cdn.test/a.jpg", |_| async { Err("analysis failed") })
            .await
            .unwrap();

        assert!(result.is_err());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_download_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockImageSource::new().fail_url("https://cdn.test/refused.jpg");
        let manager = ImageLifecycleManager::new(source, dir.path());

        let err = manager.acquire("https://cdn.test/missing.jpg").await.unwrap_err();
        assert!(matches!(err, ImageFetchError::Status { status: 404, .. }));

        let err = manager.acquire("https://cdn.test/refused.jpg").await.unwrap_err();
        assert!(matches!(err, ImageFetchError::Http { .. }));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_empty_body_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockImageSource::new().with_image("https://cdn.test/empty.jpg", Vec::new());
        let manager = ImageLifecycleManager::new(source, dir.path());

        let err = manager.acquire("https://cdn.test/empty.jpg").await.unwrap_err();
        assert!(matches!(err, ImageFetchError::Empty { .. }));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockImageSource::new().with_image("https://cdn.test/a.jpg", b"JPEG".to_vec());
        let manager = ImageLifecycleManager::new(source, dir.path());

        let first = manager.acquire("https://cdn.test/a.jpg").await.unwrap();
        let second = manager.acquire("https://cdn.test/a.jpg").await.unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("https://cdn.test/x/label.PNG"), "png");
        assert_eq!(image_extension("https://cdn.test/x/label.webp?w=200"), "webp");
        assert_eq!(image_extension("https://cdn.test/x/label"), "jpg");
        assert_eq!(image_extension("https://cdn.test/x/label.php5x.toolong"), "jpg");
        assert_eq!(image_extension("not a url"), "jpg");
    }
}
