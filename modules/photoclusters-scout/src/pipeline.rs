//! One harvest run: crawl, download, prune, cluster.

use std::path::PathBuf;
use std::sync::Arc;

use photoclusters_common::{ClusterJob, Config};
use photoclusters_store::PhotoStore;
use tracing::{error, info, warn};
use typed_builder::TypedBuilder;

use crate::clustering::{ClusterConfig, ColorClusterer};
use crate::crawler::FeedCrawler;
use crate::error::{ClusteringError, CrawlError, ItemError};
use crate::fetcher::PhotoFetcher;
use crate::stats::RunStats;
use crate::traits::{ImageSource, SubmissionSource};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// New submissions to collect per subreddit.
    pub crawl_target: usize,
    /// Photos smaller than this are pruned after downloading.
    pub min_photo_bytes: i64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            crawl_target: 500,
            min_photo_bytes: 3000,
        }
    }
}

#[derive(TypedBuilder)]
pub struct Pipeline {
    store: PhotoStore,
    crawler: FeedCrawler,
    fetcher: PhotoFetcher,
    #[builder(default)]
    clusterer: ColorClusterer,
    #[builder(default)]
    settings: PipelineSettings,
}

impl Pipeline {
    /// Wire a pipeline from config and the two network sources.
    pub fn from_config(
        store: PhotoStore,
        source: Arc<dyn SubmissionSource>,
        images: Arc<dyn ImageSource>,
        config: &Config,
    ) -> Self {
        Self::builder()
            .crawler(FeedCrawler::new(source, store.clone(), config.crawl.clone()))
            .fetcher(PhotoFetcher::new(images, config.photo_root.clone()))
            .clusterer(ColorClusterer::new(ClusterConfig {
                sample_size: config.cluster_sample_size,
                ..ClusterConfig::default()
            }))
            .settings(PipelineSettings {
                crawl_target: config.crawl.target,
                min_photo_bytes: config.min_photo_bytes,
            })
            .store(store)
            .build()
    }

    pub fn store(&self) -> &PhotoStore {
        &self.store
    }

    pub async fn run(&self, subreddits: &[String]) -> RunStats {
        let mut stats = RunStats::new();
        info!(subreddits = subreddits.len(), "Harvest run starting");

        for subreddit in subreddits {
            if let Err(e) = self.harvest(subreddit, &mut stats).await {
                error!(subreddit = subreddit.as_str(), error = %e, "Subreddit harvest failed");
                stats.record_skip(&e);
            }
        }

        match self.store.prune_undersized_photos(self.settings.min_photo_bytes).await {
            Ok(report) => stats.photos_pruned = report.rows_deleted as u32,
            Err(e) => {
                error!(error = %e, "Integrity sweep failed");
                stats.record_skip(&e.into());
            }
        }

        self.cluster_pending(&mut stats).await;

        stats.finish();
        info!(
            submissions = stats.submissions_stored,
            photos = stats.photos_stored,
            clustered = stats.files_clustered,
            skipped = stats.total_skips(),
            "Harvest run finished"
        );
        stats
    }

    /// Crawl one subreddit and download its pending photos.
    async fn harvest(&self, subreddit: &str, stats: &mut RunStats) -> Result<(), ItemError> {
        let batch = self
            .crawler
            .fetch_new(subreddit, self.settings.crawl_target)
            .await
            .map_err(|CrawlError::Store(e)| ItemError::Storage(e))?;
        stats.record_crawl(&batch.stop, batch.submissions.len());

        let report = self.store.insert_submissions(&batch.submissions).await?;
        stats.submissions_stored += report.inserted as u32;
        stats.storage_skips += report.skipped as u32;

        let pending = self.store.pending_photos(subreddit).await?;
        if pending.is_empty() {
            return Ok(());
        }

        let photos = self.fetcher.fetch_pending(&pending).await;
        stats.photos_downloaded += photos.fetched() as u32;
        stats.download_skips += photos.skipped;

        let report = self.store.insert_photos(&photos.photos).await?;
        stats.photos_stored += report.inserted as u32;
        stats.storage_skips += report.skipped as u32;

        info!(
            subreddit,
            submissions = batch.submissions.len(),
            photos = photos.fetched(),
            "Subreddit harvested"
        );
        Ok(())
    }

    async fn cluster_pending(&self, stats: &mut RunStats) {
        let jobs = match self.store.files_needing_clustering().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Failed to list files for clustering");
                stats.record_skip(&e.into());
                return;
            }
        };
        info!(files = jobs.len(), "Clustering photos");

        for job in jobs {
            match self.cluster_one(&job).await {
                Ok(true) => stats.files_clustered += 1,
                Ok(false) => stats.storage_skips += 1,
                Err(e) => {
                    warn!(file = job.filename.as_str(), error = %e, "Skipping clustering");
                    stats.record_skip(&e);
                }
            }
        }
    }

    /// Returns whether a new row was written.
    async fn cluster_one(&self, job: &ClusterJob) -> Result<bool, ItemError> {
        let clusterer = self.clusterer.clone();
        let path = PathBuf::from(&job.path);
        let subreddit = job.subreddit.clone();

        let result = tokio::task::spawn_blocking(move || clusterer.cluster(&path, &subreddit))
            .await
            .map_err(|e| ClusteringError::Worker(e.to_string()))??;

        let report = self.store.insert_cluster_result(&result).await?;
        Ok(report.inserted > 0)
    }
}
