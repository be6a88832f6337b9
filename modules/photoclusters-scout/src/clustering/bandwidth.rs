use super::mean_shift::{par_map, sq_dist, Point};

/// Smallest bandwidth handed to mean-shift. A uniform image has every sample
/// at distance zero from its neighbours.
pub const MIN_BANDWIDTH: f64 = 1e-3;

/// Mean distance from each sample to its k-th nearest sample, with
/// `k = max(1, floor(n * quantile))` and the sample itself counted as the
/// first neighbour.
pub fn estimate_bandwidth(points: &[Point], quantile: f64) -> f64 {
    if points.is_empty() {
        return f64::NAN;
    }
    let k = ((points.len() as f64 * quantile) as usize).clamp(1, points.len());

    let kth: Vec<f64> = par_map(points, |p| {
        let mut d: Vec<f64> = points.iter().map(|q| sq_dist(p, q)).collect();
        let (_, nth, _) = d.select_nth_unstable_by(k - 1, f64::total_cmp);
        nth.sqrt()
    });

    kth.iter().sum::<f64>() / kth.len() as f64
}
