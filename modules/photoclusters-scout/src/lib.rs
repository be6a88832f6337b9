pub mod clustering;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use clustering::{ClusterConfig, ColorClusterer};
pub use crawler::{CrawlBatch, CrawlStop, FeedCrawler};
pub use error::{ClusteringError, CrawlError, DownloadError, ItemError};
pub use fetcher::{PhotoBatch, PhotoFetcher};
pub use pipeline::{Pipeline, PipelineSettings};
pub use stats::RunStats;
