use serde::{Deserialize, Deserializer, Serialize};

/// Largest page the search endpoint will return.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Wrapper for Pushshift search responses.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse<T> {
    pub data: Vec<T>,
}

/// Ordering key for a submission search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortType {
    Score,
    CreatedUtc,
}

/// Query parameters for `/reddit/search/submission/`.
///
/// Pushshift has no stable page token, so callers page with either a score
/// ceiling (`score=<N`) or a time ceiling (`before=N`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionQuery {
    pub subreddit: String,
    pub sort_type: SortType,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "below")]
    pub score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<&'static str>,
    pub size: u32,
}

impl SubmissionQuery {
    /// Highest-scoring submissions strictly below `below`.
    pub fn by_score(subreddit: &str, below: i64, size: u32) -> Self {
        Self {
            subreddit: subreddit.to_string(),
            sort_type: SortType::Score,
            score: Some(below),
            before: None,
            sort: Some("desc"),
            size: size.min(MAX_PAGE_SIZE),
        }
    }

    /// Newest submissions created strictly before `before` (epoch seconds).
    pub fn by_time(subreddit: &str, before: i64, size: u32) -> Self {
        Self {
            subreddit: subreddit.to_string(),
            sort_type: SortType::CreatedUtc,
            score: None,
            before: Some(before),
            sort: Some("desc"),
            size: size.min(MAX_PAGE_SIZE),
        }
    }
}

fn below<S: serde::Serializer>(score: &Option<i64>, s: S) -> Result<S::Ok, S::Error> {
    match score {
        Some(n) => s.serialize_str(&format!("<{n}")),
        None => s.serialize_none(),
    }
}

/// A single submission as returned by the search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSubmission {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub domain: String,
    pub subreddit: String,
    #[serde(default)]
    pub subreddit_id: String,
    #[serde(default)]
    pub full_link: String,
    #[serde(deserialize_with = "epoch_seconds")]
    pub created_utc: i64,
    #[serde(default)]
    pub author: String,
    pub score: i64,
}

/// Older archive dumps serialise `created_utc` as a float.
fn epoch_seconds<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Epoch {
        Int(i64),
        Float(f64),
    }

    Ok(match Epoch::deserialize(d)? {
        Epoch::Int(n) => n,
        Epoch::Float(f) => f as i64,
    })
}
