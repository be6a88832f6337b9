use photoclusters_store::StoreError;
use thiserror::Error;

/// An image that could not be downloaded. Always a per-item skip.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Not a .png/.jpg URL: {0}")]
    UnsupportedExtension(String),

    #[error("Refusing to build a photo path from {0:?}")]
    UnsafeName(String),

    #[error("Connection failed for {url}: {message}")]
    Connection { url: String, message: String },

    #[error("Image host returned status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

/// An image that could not be clustered. Nothing is persisted for it.
#[derive(Debug, Error)]
pub enum ClusteringError {
    #[error("Cannot read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image has no pixels")]
    EmptyImage,

    #[error("Degenerate bandwidth {0}")]
    DegenerateBandwidth(f64),

    #[error("No sample within bandwidth {0} of any seed")]
    NoConvergence(f64),

    #[error("Result shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Clustering worker failed: {0}")]
    Worker(String),
}

/// Failures that end a crawl before any paging happens.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Failed to load known submission ids: {0}")]
    Store(#[from] StoreError),
}

/// The closed set of per-item failures the pipeline skips over.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Clustering(#[from] ClusteringError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
