// Trait seams for the two network dependencies.
//
// SubmissionSource: the paginated search API (Pushshift in production).
// ImageSource: plain image downloads from hosts like imgur.
//
// Both have scripted mocks in `testing` so the crawler and fetcher run
// without network access.

use std::time::Duration;

use async_trait::async_trait;
use pushshift_client::{PushshiftClient, RawSubmission, SubmissionQuery};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::DownloadError;

#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// One page of candidates matching `query`.
    async fn search_submissions(
        &self,
        query: &SubmissionQuery,
    ) -> pushshift_client::Result<Vec<RawSubmission>>;
}

#[async_trait]
impl SubmissionSource for PushshiftClient {
    async fn search_submissions(
        &self,
        query: &SubmissionQuery,
    ) -> pushshift_client::Result<Vec<RawSubmission>> {
        PushshiftClient::search_submissions(self, query).await
    }
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Stream the body at `url` into `sink`. Returns bytes written.
    async fn download(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, DownloadError>;
}

/// Plain HTTP GET image source.
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    pub fn new() -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }
}

fn connection_error(url: &str, err: reqwest::Error) -> DownloadError {
    DownloadError::Connection {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn download(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, DownloadError> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| connection_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(|e| connection_error(url, e))? {
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        Ok(written)
    }
}
