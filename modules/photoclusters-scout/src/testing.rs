// Test mocks for the harvest pipeline.
//
// Two mocks matching the two network trait boundaries:
// - MockSource (SubmissionSource): an in-memory search index with scripted
//   failures and a log of every query it answered
// - MockImageSource (ImageSource): HashMap-based URL→bytes
//
// Plus helpers for building raw submissions and writing synthetic images.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use pushshift_client::{PushshiftError, RawSubmission, SortType, SubmissionQuery};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::DownloadError;
use crate::traits::{ImageSource, SubmissionSource};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn raw_submission(id: &str, subreddit: &str, score: i64, url: &str) -> RawSubmission {
    RawSubmission {
        id: id.to_string(),
        title: format!("post {id}"),
        url: url.to_string(),
        domain: "i.imgur.com".to_string(),
        subreddit: subreddit.to_string(),
        subreddit_id: "t5_mock".to_string(),
        full_link: format!("https://www.reddit.com/r/{subreddit}/comments/{id}/"),
        created_utc: 1_600_000_000 + score,
        author: "mock".to_string(),
        score,
    }
}

/// `n` image submissions with ids `{prefix}{i}` and descending scores from
/// `top_score`.
pub fn ranked(prefix: &str, subreddit: &str, n: usize, top_score: i64) -> Vec<RawSubmission> {
    (0..n)
        .map(|i| {
            let id = format!("{prefix}{i}");
            let url = format!("https://i.imgur.com/{id}.jpg");
            raw_submission(&id, subreddit, top_score - i as i64, &url)
        })
        .collect()
}

pub fn write_solid_png(path: &Path, width: u32, height: u32, rgb: [u8; 3]) -> image::ImageResult<()> {
    RgbImage::from_pixel(width, height, Rgb(rgb)).save(path)
}

/// Left half `left`, right half `right`.
pub fn write_split_png(path: &Path, width: u32, height: u32, left: [u8; 3], right: [u8; 3]) -> image::ImageResult<()> {
    RgbImage::from_fn(width, height, |x, _| if x < width / 2 { Rgb(left) } else { Rgb(right) })
        .save(path)
}

/// PNG bytes of a solid image, for serving from `MockImageSource`.
pub fn solid_png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb(rgb))
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .expect("encoding an in-memory PNG cannot fail");
    out.into_inner()
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Answers score- or time-ceiling queries from a fixed universe of
/// submissions, highest key first. Failures can be scripted ahead of time.
/// Queued pages and failures are served in order before the universe is used.
pub struct MockSource {
    universe: Vec<RawSubmission>,
    scripted: Mutex<VecDeque<Option<Vec<RawSubmission>>>>,
    failures_left: Mutex<u32>,
    always_fail: bool,
    queries: Mutex<Vec<SubmissionQuery>>,
}

impl MockSource {
    pub fn new(universe: Vec<RawSubmission>) -> Self {
        Self {
            universe,
            scripted: Mutex::new(VecDeque::new()),
            failures_left: Mutex::new(0),
            always_fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `n` requests with a 503.
    pub fn failing_first(self, n: u32) -> Self {
        *self.failures_left.lock().unwrap() = n;
        self
    }

    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn then_page(self, page: Vec<RawSubmission>) -> Self {
        self.scripted.lock().unwrap().push_back(Some(page));
        self
    }

    /// Queue a single 503 after the pages scripted so far.
    pub fn then_fail(self) -> Self {
        self.scripted.lock().unwrap().push_back(None);
        self
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<SubmissionQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl SubmissionSource for MockSource {
    async fn search_submissions(
        &self,
        query: &SubmissionQuery,
    ) -> pushshift_client::Result<Vec<RawSubmission>> {
        self.queries.lock().unwrap().push(query.clone());

        let unavailable = || PushshiftError::Api {
            status: 503,
            message: "mock unavailable".to_string(),
        };

        {
            let mut left = self.failures_left.lock().unwrap();
            if self.always_fail || *left > 0 {
                *left = left.saturating_sub(1);
                return Err(unavailable());
            }
        }

        if let Some(next) = self.scripted.lock().unwrap().pop_front() {
            return next.ok_or_else(unavailable);
        }

        // Like the real API: subreddit matched without case, sorted by the
        // requested key, bounded by whichever ceiling was sent.
        let key = |s: &RawSubmission| match query.sort_type {
            SortType::Score => s.score,
            SortType::CreatedUtc => s.created_utc,
        };
        let ceiling = match query.sort_type {
            SortType::Score => query.score,
            SortType::CreatedUtc => query.before,
        }
        .unwrap_or(i64::MAX);

        let mut page: Vec<RawSubmission> = self
            .universe
            .iter()
            .filter(|s| s.subreddit.eq_ignore_ascii_case(&query.subreddit) && key(*s) < ceiling)
            .cloned()
            .collect();
        page.sort_by_key(|s| std::cmp::Reverse(key(s)));
        page.truncate(query.size as usize);
        Ok(page)
    }
}

// ---------------------------------------------------------------------------
// MockImageSource
// ---------------------------------------------------------------------------

/// HashMap-based image host. Unregistered URLs fail as connection errors.
pub struct MockImageSource {
    images: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl MockImageSource {
    pub fn new() -> Self {
        Self {
            images: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn on_url(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.images.insert(url.to_string(), bytes);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Default for MockImageSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageSource for MockImageSource {
    async fn download(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, DownloadError> {
        self.requested.lock().unwrap().push(url.to_string());
        let bytes = self.images.get(url).ok_or_else(|| DownloadError::Connection {
            url: url.to_string(),
            message: "no mock registered".to_string(),
        })?;
        // Two chunks, like a streamed body.
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        sink.write_all(head).await?;
        sink.write_all(tail).await?;
        Ok(bytes.len() as u64)
    }
}
