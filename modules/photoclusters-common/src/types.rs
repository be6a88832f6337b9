use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

// --- Records ---

/// A forum post that may link to an image. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub title: String,
    pub url: String,
    pub url_domain: String,
    pub subreddit: String,
    pub subreddit_id: String,
    pub permalink: String,
    /// Epoch seconds.
    pub created_at: i64,
    pub author: String,
    pub score: i64,
}

impl Submission {
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }
}

/// A downloaded image. `id` is the id of the submission it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub filename: String,
    pub subreddit: String,
    pub size_bytes: i64,
    pub path: String,
}

/// Dominant-colour clusters for one image file.
///
/// `sampled_pixels` is N×3 (L, a, b); `labels` has one entry per sample;
/// `cluster_centers` is K×3 and `cluster_weights` has one count per centre.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    pub file: String,
    pub subreddit: String,
    pub sampled_pixels: Array2<f64>,
    pub bandwidth: f64,
    pub labels: Array1<i64>,
    pub cluster_centers: Array2<f64>,
    pub cluster_weights: Array1<i64>,
}

impl ClusterResult {
    pub fn cluster_count(&self) -> usize {
        self.cluster_centers.nrows()
    }

    pub fn sample_count(&self) -> usize {
        self.sampled_pixels.nrows()
    }
}

// --- Work items ---

/// A stored submission whose image has not been downloaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPhoto {
    pub id: String,
    pub url: String,
    pub subreddit: String,
}

/// A stored photo with no cluster result yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterJob {
    pub path: String,
    pub filename: String,
    pub subreddit: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn posted_at_converts_epoch_seconds() {
        let s = Submission {
            id: "a".into(),
            title: String::new(),
            url: String::new(),
            url_domain: String::new(),
            subreddit: "desert".into(),
            subreddit_id: String::new(),
            permalink: String::new(),
            created_at: 1_577_836_800,
            author: String::new(),
            score: 1,
        };
        assert_eq!(s.posted_at().unwrap().to_rfc3339(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn cluster_result_counts() {
        let r = ClusterResult {
            file: "a.png".into(),
            subreddit: "goth".into(),
            sampled_pixels: Array2::zeros((4, 3)),
            bandwidth: 1.0,
            labels: array![0, 0, 1, 1],
            cluster_centers: Array2::zeros((2, 3)),
            cluster_weights: array![2, 2],
        };
        assert_eq!(r.sample_count(), 4);
        assert_eq!(r.cluster_count(), 2);
    }
}
