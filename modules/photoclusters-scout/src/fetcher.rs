use std::path::{Path, PathBuf};
use std::sync::Arc;

use photoclusters_common::{PendingPhoto, Photo};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::traits::ImageSource;

const SUPPORTED_EXTENSIONS: [&str; 2] = [".png", ".jpg"];

/// Downloads submission images into `<photo_root>/<subreddit>/<id><ext>`.
pub struct PhotoFetcher {
    source: Arc<dyn ImageSource>,
    photo_root: PathBuf,
}

/// Outcome of downloading one page of pending photos.
#[derive(Debug, Default)]
pub struct PhotoBatch {
    pub photos: Vec<Photo>,
    pub skipped: u32,
}

impl PhotoBatch {
    pub fn fetched(&self) -> usize {
        self.photos.len()
    }
}

impl PhotoFetcher {
    pub fn new(source: Arc<dyn ImageSource>, photo_root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            photo_root: photo_root.into(),
        }
    }

    pub fn photo_root(&self) -> &Path {
        &self.photo_root
    }

    /// Download one image, logging and swallowing any failure.
    pub async fn fetch(&self, url: &str, id: &str, subreddit: &str) -> Option<Photo> {
        match self.try_fetch(url, id, subreddit).await {
            Ok(photo) => Some(photo),
            Err(e) => {
                warn!(id, url, error = %e, "Skipping photo");
                None
            }
        }
    }

    pub async fn try_fetch(&self, url: &str, id: &str, subreddit: &str) -> Result<Photo, DownloadError> {
        let ext = image_extension(url)
            .ok_or_else(|| DownloadError::UnsupportedExtension(url.to_string()))?;
        for name in [subreddit, id] {
            if !is_plain_name(name) {
                return Err(DownloadError::UnsafeName(name.to_string()));
            }
        }

        let dir = self.photo_root.join(subreddit);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = format!("{id}{ext}");
        let path = dir.join(&filename);

        if let Err(e) = self.download_to(url, &path).await {
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %rm, "Failed to remove partial download");
                }
            }
            return Err(e);
        }

        // Size comes from the closed file, not from the byte counter.
        let size_bytes = tokio::fs::metadata(&path).await?.len() as i64;
        debug!(id, size_bytes, path = %path.display(), "Photo saved");

        Ok(Photo {
            id: id.to_string(),
            filename,
            subreddit: subreddit.to_string(),
            size_bytes,
            path: path.to_string_lossy().into_owned(),
        })
    }

    async fn download_to(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
        let mut file = tokio::fs::File::create(path).await?;
        let written = self.source.download(url, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }

    /// Download a page of pending photos one after another.
    pub async fn fetch_pending(&self, pending: &[PendingPhoto]) -> PhotoBatch {
        let mut batch = PhotoBatch::default();
        for p in pending {
            match self.fetch(&p.url, &p.id, &p.subreddit).await {
                Some(photo) => batch.photos.push(photo),
                None => batch.skipped += 1,
            }
        }
        info!(
            fetched = batch.fetched(),
            skipped = batch.skipped,
            "Photo page downloaded"
        );
        batch
    }
}

/// The lower-cased `.png`/`.jpg` extension of the URL's path, if it has one.
pub fn image_extension(raw: &str) -> Option<&'static str> {
    let path = match url::Url::parse(raw) {
        Ok(u) => u.path().to_ascii_lowercase(),
        Err(_) => raw.to_ascii_lowercase(),
    };
    SUPPORTED_EXTENSIONS
        .into_iter()
        .find(|ext| path.ends_with(ext))
}

/// A single non-empty path component with no separators and no dot segments.
/// Ids and subreddit names come from the API and become file system paths.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
}
