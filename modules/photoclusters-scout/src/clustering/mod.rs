//! Dominant-colour extraction.
//!
//! An image is decoded, a random subset of its pixels is moved into CIELAB,
//! and mean-shift finds the colour modes. The result is what the `clusters`
//! table stores: samples, bandwidth, per-sample labels, centres and weights.

pub mod bandwidth;
pub mod lab;
pub mod mean_shift;

use std::path::Path;

use ndarray::Array2;
use photoclusters_common::ClusterResult;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::error::ClusteringError;
pub use bandwidth::{estimate_bandwidth, MIN_BANDWIDTH};
pub use mean_shift::{fit, MeanShiftFit, Point};

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Pixels kept per image after shuffling.
    pub sample_size: usize,
    /// Neighbour quantile used by the bandwidth estimate.
    pub quantile: f64,
    pub max_iterations: usize,
    /// Fixed shuffle seed. `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            sample_size: 5000,
            quantile: 0.3,
            max_iterations: 300,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColorClusterer {
    config: ClusterConfig,
}

impl ColorClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster the image at `path`. Blocking and CPU heavy; async callers
    /// should run it on a blocking thread.
    pub fn cluster(&self, path: &Path, subreddit: &str) -> Result<ClusterResult, ClusteringError> {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let pixels = load_pixels(path)?;
        self.cluster_pixels(pixels, &file, subreddit)
    }

    /// Cluster already-decoded RGB pixels.
    pub fn cluster_pixels(
        &self,
        mut pixels: Vec<[u8; 3]>,
        file: &str,
        subreddit: &str,
    ) -> Result<ClusterResult, ClusteringError> {
        if pixels.is_empty() {
            return Err(ClusteringError::EmptyImage);
        }

        match self.config.seed {
            Some(seed) => pixels.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => pixels.shuffle(&mut rand::rng()),
        }
        pixels.truncate(self.config.sample_size.max(1));

        let samples = lab::rgb_to_lab(&pixels);
        let points = to_points(&samples);

        let estimate = estimate_bandwidth(&points, self.config.quantile);
        if !estimate.is_finite() {
            return Err(ClusteringError::DegenerateBandwidth(estimate));
        }
        let bandwidth = estimate.max(MIN_BANDWIDTH);

        let MeanShiftFit {
            centers,
            labels,
            weights,
        } = fit(&points, bandwidth, self.config.max_iterations)?;

        debug!(
            file,
            samples = points.len(),
            bandwidth,
            clusters = centers.nrows(),
            "Image clustered"
        );

        Ok(ClusterResult {
            file: file.to_string(),
            subreddit: subreddit.to_string(),
            sampled_pixels: samples,
            bandwidth,
            labels,
            cluster_centers: centers,
            cluster_weights: weights,
        })
    }
}

/// Decode with the format sniffed from content and drop any alpha channel.
fn load_pixels(path: &Path) -> Result<Vec<[u8; 3]>, ClusteringError> {
    let img = image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgb8();
    Ok(img.pixels().map(|p| p.0).collect())
}

fn to_points(samples: &Array2<f64>) -> Vec<Point> {
    samples
        .rows()
        .into_iter()
        .map(|r| [r[0], r[1], r[2]])
        .collect()
}
