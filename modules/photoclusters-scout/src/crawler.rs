//! FeedCrawler: pages the search API and collects submissions the store
//! has not seen.
//!
//! The API has no page token, only a ceiling on the sort key. Each round asks
//! for candidates strictly below the cursor, then lowers the cursor to the
//! key of the last candidate it kept (or, if the round kept nothing, the last
//! one it saw). Paging by score and paging by creation time share this loop.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use photoclusters_common::{BoundedBatch, CrawlSettings, Submission};
use photoclusters_store::PhotoStore;
use pushshift_client::{RawSubmission, SubmissionQuery};
use tracing::{debug, info, warn};

use crate::error::CrawlError;
use crate::traits::SubmissionSource;

/// Initial score ceiling; larger than any real score.
pub const SCORE_SENTINEL: i64 = 999_999_999;

/// Strictly decreasing ceiling on the page sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor(i64);

impl PageCursor {
    pub fn starting_at(ceiling: i64) -> Self {
        Self(ceiling)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Move below `key`. A page that ignored the ceiling still moves the
    /// cursor down by one, so paging always terminates.
    pub fn advance(&mut self, key: i64) {
        self.0 = key.min(self.0 - 1);
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::starting_at(SCORE_SENTINEL)
    }
}

/// The key pages are sorted and bounded by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paging {
    Score,
    CreatedTime,
}

impl Paging {
    fn query(self, subreddit: &str, ceiling: i64, size: u32) -> SubmissionQuery {
        match self {
            Paging::Score => SubmissionQuery::by_score(subreddit, ceiling, size),
            Paging::CreatedTime => SubmissionQuery::by_time(subreddit, ceiling, size),
        }
    }

    fn key(self, raw: &RawSubmission) -> i64 {
        match self {
            Paging::Score => raw.score,
            Paging::CreatedTime => raw.created_utc,
        }
    }
}

/// Why a crawl stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlStop {
    TargetReached,
    SourceExhausted,
    RetriesExhausted { attempts: u32, last_error: String },
}

/// New submissions for one subreddit, plus how the crawl went.
#[derive(Debug, Clone)]
pub struct CrawlBatch {
    pub subreddit: String,
    pub submissions: Vec<Submission>,
    /// Ceiling used by each successful round, in order.
    pub cursors: Vec<i64>,
    pub stop: CrawlStop,
}

pub struct FeedCrawler {
    source: Arc<dyn SubmissionSource>,
    store: PhotoStore,
    settings: CrawlSettings,
}

impl FeedCrawler {
    pub fn new(source: Arc<dyn SubmissionSource>, store: PhotoStore, settings: CrawlSettings) -> Self {
        Self {
            source,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Collect up to `target` submissions of `subreddit` that are not in the
    /// store, highest score first.
    pub async fn fetch_new(&self, subreddit: &str, target: usize) -> Result<CrawlBatch, CrawlError> {
        self.crawl(subreddit, target, Paging::Score, SCORE_SENTINEL).await
    }

    /// Collect up to `target` unseen submissions created strictly before
    /// `before` (epoch seconds, default now), newest first.
    pub async fn fetch_by_time(
        &self,
        subreddit: &str,
        target: usize,
        before: Option<i64>,
    ) -> Result<CrawlBatch, CrawlError> {
        let ceiling = before.unwrap_or_else(|| Utc::now().timestamp());
        self.crawl(subreddit, target, Paging::CreatedTime, ceiling).await
    }

    async fn crawl(
        &self,
        subreddit: &str,
        target: usize,
        paging: Paging,
        ceiling: i64,
    ) -> Result<CrawlBatch, CrawlError> {
        let known = self.store.existing_ids(subreddit).await?;
        info!(
            subreddit,
            target_count = target,
            known = known.len(),
            paging = ?paging,
            "Crawling for new submissions"
        );

        let mut batch = BoundedBatch::with_capacity(target);
        let mut taken: HashSet<String> = HashSet::new();
        let mut cursor = PageCursor::starting_at(ceiling);
        let mut cursors = Vec::new();
        let mut failures = 0u32;

        let stop = loop {
            if batch.is_full() {
                break CrawlStop::TargetReached;
            }

            let query = paging.query(subreddit, cursor.value(), self.settings.page_size);
            let page = match self.source.search_submissions(&query).await {
                Ok(page) => {
                    failures = 0;
                    page
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        subreddit,
                        status = ?e.status(),
                        attempt = failures,
                        error = %e,
                        "Search request failed"
                    );
                    if failures > self.settings.max_retries {
                        break CrawlStop::RetriesExhausted {
                            attempts: failures,
                            last_error: e.to_string(),
                        };
                    }
                    tokio::time::sleep(self.settings.backoff_for(failures - 1)).await;
                    continue;
                }
            };

            cursors.push(cursor.value());
            tokio::time::sleep(self.settings.request_delay).await;

            let Some(last_seen) = page.last().map(|p| paging.key(p)) else {
                break CrawlStop::SourceExhausted;
            };

            let page_len = page.len();
            let mut last_kept = None;
            for raw in page {
                if known.contains(&raw.id) || taken.contains(&raw.id) {
                    continue;
                }
                let key = paging.key(&raw);
                taken.insert(raw.id.clone());
                if !batch.push(to_submission(raw)) {
                    break;
                }
                last_kept = Some(key);
            }

            debug!(
                subreddit,
                below = cursor.value(),
                page = page_len,
                accumulated = batch.len(),
                "Crawl round complete"
            );
            cursor.advance(last_kept.unwrap_or(last_seen));
        };

        let submissions = batch.into_inner();
        match &stop {
            CrawlStop::RetriesExhausted { attempts, .. } => warn!(
                subreddit,
                attempts,
                collected = submissions.len(),
                "Giving up on subreddit after repeated search failures"
            ),
            _ => info!(
                subreddit,
                collected = submissions.len(),
                rounds = cursors.len(),
                stop = ?stop,
                "Crawl finished"
            ),
        }

        Ok(CrawlBatch {
            subreddit: subreddit.to_string(),
            submissions,
            cursors,
            stop,
        })
    }
}

pub fn to_submission(raw: RawSubmission) -> Submission {
    Submission {
        id: raw.id,
        title: raw.title,
        url: raw.url,
        url_domain: raw.domain,
        subreddit: raw.subreddit,
        subreddit_id: raw.subreddit_id,
        permalink: raw.full_link,
        created_at: raw.created_utc,
        author: raw.author,
        score: raw.score,
    }
}
