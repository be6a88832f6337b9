pub mod error;
pub mod types;

pub use error::{PushshiftError, Result};
pub use types::{RawSubmission, SearchResponse, SortType, SubmissionQuery, MAX_PAGE_SIZE};

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.pushshift.io";

pub struct PushshiftClient {
    client: reqwest::Client,
    base_url: String,
}

impl PushshiftClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, kind: &str) -> String {
        format!("{}/reddit/search/{}/", self.base_url, kind)
    }

    /// Run one submission search. A non-success status is returned as
    /// `PushshiftError::Api`; callers decide whether to retry.
    pub async fn search_submissions(&self, query: &SubmissionQuery) -> Result<Vec<RawSubmission>> {
        let url = self.endpoint("submission");
        let resp = self.client.get(&url).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PushshiftError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let parsed: SearchResponse<RawSubmission> = serde_json::from_str(&body)?;
        tracing::debug!(
            subreddit = %query.subreddit,
            count = parsed.data.len(),
            "Pushshift search returned"
        );

        Ok(parsed.data)
    }
}
