use std::collections::BTreeSet;
use std::thread;

use ndarray::{Array1, Array2};

use crate::error::ClusteringError;

pub type Point = [f64; 3];

/// Converged modes with their labelling of the input samples.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanShiftFit {
    pub centers: Array2<f64>,
    pub labels: Array1<i64>,
    pub weights: Array1<i64>,
}

pub(crate) fn sq_dist(a: &Point, b: &Point) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// Flat-kernel mean-shift with bin seeding.
pub fn fit(points: &[Point], bandwidth: f64, max_iterations: usize) -> Result<MeanShiftFit, ClusteringError> {
    if !bandwidth.is_finite() || bandwidth <= 0.0 {
        return Err(ClusteringError::DegenerateBandwidth(bandwidth));
    }

    let seeds = bin_seeds(points, bandwidth);
    let converged = par_map(&seeds, |seed| shift_seed(points, *seed, bandwidth, max_iterations));

    // Identical modes collapse to one entry.
    let mut modes: Vec<(usize, Point)> = converged.into_iter().flatten().collect();
    modes.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| b.1[0].total_cmp(&a.1[0]))
            .then_with(|| b.1[1].total_cmp(&a.1[1]))
            .then_with(|| b.1[2].total_cmp(&a.1[2]))
    });
    modes.dedup_by(|a, b| a.1 == b.1);

    if modes.is_empty() {
        return Err(ClusteringError::NoConvergence(bandwidth));
    }

    let bw2 = bandwidth * bandwidth;
    let mut kept = vec![true; modes.len()];
    for i in 0..modes.len() {
        if !kept[i] {
            continue;
        }
        for j in (i + 1)..modes.len() {
            if kept[j] && sq_dist(&modes[i].1, &modes[j].1) <= bw2 {
                kept[j] = false;
            }
        }
    }
    let centers: Vec<Point> = modes
        .into_iter()
        .zip(kept)
        .filter_map(|((_, c), keep)| keep.then_some(c))
        .collect();

    let labels: Vec<i64> = par_map(points, |p| nearest(&centers, p) as i64);
    let mut weights = vec![0i64; centers.len()];
    for &l in &labels {
        weights[l as usize] += 1;
    }

    let flat: Vec<f64> = centers.iter().flatten().copied().collect();
    Ok(MeanShiftFit {
        centers: Array2::from_shape_vec((centers.len(), 3), flat)?,
        labels: Array1::from(labels),
        weights: Array1::from(weights),
    })
}

/// Centres of the occupied grid bins of width `bin_size`. Falls back to the
/// points themselves when binning does not reduce the seed count.
fn bin_seeds(points: &[Point], bin_size: f64) -> Vec<Point> {
    let bins: BTreeSet<[i64; 3]> = points
        .iter()
        .map(|p| p.map(|v| (v / bin_size).round() as i64))
        .collect();

    if bins.len() == points.len() {
        return points.to_vec();
    }
    bins.into_iter()
        .map(|b| b.map(|v| v as f64 * bin_size))
        .collect()
}

/// Run one seed to convergence. Returns the mode and how many samples lie
/// within the bandwidth of it, or `None` if the seed has no neighbours.
fn shift_seed(points: &[Point], seed: Point, bandwidth: f64, max_iterations: usize) -> Option<(usize, Point)> {
    let bw2 = bandwidth * bandwidth;
    let stop = 1e-3 * bandwidth;
    let mut mean = seed;
    let mut iterations = 0;

    loop {
        let mut sum = [0.0; 3];
        let mut within = 0usize;
        for p in points {
            if sq_dist(p, &mean) <= bw2 {
                sum[0] += p[0];
                sum[1] += p[1];
                sum[2] += p[2];
                within += 1;
            }
        }
        if within == 0 {
            return None;
        }

        let old = mean;
        mean = sum.map(|s| s / within as f64);
        if sq_dist(&mean, &old).sqrt() <= stop || iterations == max_iterations {
            return Some((within, mean));
        }
        iterations += 1;
    }
}

fn nearest(centers: &[Point], p: &Point) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centers.iter().enumerate() {
        let d = sq_dist(c, p);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// Apply `f` to every item across the available cores, preserving order.
pub(crate) fn par_map<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let workers = thread::available_parallelism().map_or(1, |n| n.get());
    let chunk = items.len().div_ceil(workers);
    let f = &f;

    thread::scope(|s| {
        let handles: Vec<_> = items
            .chunks(chunk)
            .map(|part| s.spawn(move || part.iter().map(f).collect::<Vec<R>>()))
            .collect();

        let mut out = Vec::with_capacity(items.len());
        for h in handles {
            match h.join() {
                Ok(part) => out.extend(part),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        out
    })
}
