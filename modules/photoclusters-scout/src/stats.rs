use chrono::{DateTime, Utc};

use crate::crawler::CrawlStop;
use crate::error::ItemError;

/// Stats from a harvest run.
#[derive(Debug)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub subreddits_crawled: u32,
    pub crawls_gave_up: u32,
    pub submissions_found: u32,
    pub submissions_stored: u32,
    pub photos_downloaded: u32,
    pub photos_stored: u32,
    pub photos_pruned: u32,
    pub files_clustered: u32,
    pub download_skips: u32,
    pub clustering_skips: u32,
    pub storage_skips: u32,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            subreddits_crawled: 0,
            crawls_gave_up: 0,
            submissions_found: 0,
            submissions_stored: 0,
            photos_downloaded: 0,
            photos_stored: 0,
            photos_pruned: 0,
            files_clustered: 0,
            download_skips: 0,
            clustering_skips: 0,
            storage_skips: 0,
        }
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_crawl(&mut self, stop: &CrawlStop, found: usize) {
        self.subreddits_crawled += 1;
        self.submissions_found += found as u32;
        if matches!(stop, CrawlStop::RetriesExhausted { .. }) {
            self.crawls_gave_up += 1;
        }
    }

    pub fn record_skip(&mut self, err: &ItemError) {
        match err {
            ItemError::Download(_) => self.download_skips += 1,
            ItemError::Clustering(_) => self.clustering_skips += 1,
            ItemError::Storage(_) => self.storage_skips += 1,
        }
    }

    pub fn total_skips(&self) -> u32 {
        self.download_skips + self.clustering_skips + self.storage_skips
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Harvest Run Complete ===")?;
        writeln!(f, "Subreddits crawled:  {}", self.subreddits_crawled)?;
        if self.crawls_gave_up > 0 {
            writeln!(f, "Crawls given up:     {}", self.crawls_gave_up)?;
        }
        writeln!(f, "Submissions found:   {}", self.submissions_found)?;
        writeln!(f, "Submissions stored:  {}", self.submissions_stored)?;
        writeln!(f, "Photos downloaded:   {}", self.photos_downloaded)?;
        writeln!(f, "Photos stored:       {}", self.photos_stored)?;
        writeln!(f, "Photos pruned:       {}", self.photos_pruned)?;
        writeln!(f, "Files clustered:     {}", self.files_clustered)?;
        writeln!(f, "\nSkipped:")?;
        writeln!(f, "  Downloads:  {}", self.download_skips)?;
        writeln!(f, "  Clustering: {}", self.clustering_skips)?;
        writeln!(f, "  Storage:    {}", self.storage_skips)?;
        if let Some(done) = self.finished_at {
            let secs = (done - self.started_at).num_milliseconds() as f64 / 1000.0;
            writeln!(f, "\nElapsed: {secs:.1}s")?;
        }
        Ok(())
    }
}
