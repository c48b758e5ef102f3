//! Clustering quality metrics.
//!
//! Cluster and noise counts are always reported.  Silhouette and
//! Calinski-Harabasz are computed on raw lat/lng over non-noise points, only
//! when at least two clusters exist and there are fewer clusters than
//! points; anything else leaves them `None` rather than failing the run.
//! Silhouette is O(n²), so it runs on an evenly strided subsample above
//! [`SILHOUETTE_SAMPLE_CAP`].

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::point::{sq_dist, WeightedPoint, NOISE};

pub const SILHOUETTE_SAMPLE_CAP: usize = 4_000;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Distinct labels, noise excluded.
    pub n_clusters: usize,
    pub n_noise: usize,
    pub n_points: usize,
    pub silhouette: Option<f64>,
    pub calinski_harabasz: Option<f64>,
}

pub fn quality_metrics(points: &[WeightedPoint], labels: &[i32]) -> QualityMetrics {
    let n_noise = labels.iter().filter(|&&l| l == NOISE).count();
    let mut clustered: Vec<([f64; 2], i32)> = points
        .iter()
        .zip(labels)
        .filter(|&(_, &l)| l != NOISE)
        .map(|(p, &l)| ([p.lat, p.lng], l))
        .collect();
    let mut ids: Vec<i32> = clustered.iter().map(|&(_, l)| l).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut m = QualityMetrics {
        n_clusters: ids.len(),
        n_noise,
        n_points: labels.len(),
        ..Default::default()
    };
    if m.n_clusters < 2 || m.n_clusters >= clustered.len() {
        return m;
    }

    m.calinski_harabasz = calinski_harabasz(&clustered).filter(|v| v.is_finite());
    if clustered.len() > SILHOUETTE_SAMPLE_CAP {
        let stride = clustered.len().div_ceil(SILHOUETTE_SAMPLE_CAP);
        clustered = clustered.into_iter().step_by(stride).collect();
    }
    m.silhouette = silhouette(&clustered).filter(|v| v.is_finite());
    if m.silhouette.is_none() || m.calinski_harabasz.is_none() {
        debug!(clusters = m.n_clusters, "auxiliary clustering metric unavailable");
    }
    m
}

/// Mean silhouette coefficient; `None` unless 2 ≤ clusters < points.
pub fn silhouette(points: &[([f64; 2], i32)]) -> Option<f64> {
    let mut sizes: FxHashMap<i32, usize> = FxHashMap::default();
    for &(_, l) in points {
        *sizes.entry(l).or_insert(0) += 1;
    }
    if sizes.len() < 2 || sizes.len() >= points.len() {
        return None;
    }

    let mut total = 0.0;
    for &(x, own) in points {
        let mut sums: FxHashMap<i32, f64> = FxHashMap::default();
        for &(y, l) in points {
            *sums.entry(l).or_insert(0.0) += sq_dist(x, y).sqrt();
        }
        let own_size = sizes[&own];
        if own_size == 1 {
            continue;
        }
        let a = sums[&own] / (own_size - 1) as f64;
        let b = sums
            .iter()
            .filter(|&(&l, _)| l != own)
            .map(|(l, s)| s / sizes[l] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    Some(total / points.len() as f64)
}

/// Between/within dispersion ratio; `None` unless 2 ≤ clusters < points.
pub fn calinski_harabasz(points: &[([f64; 2], i32)]) -> Option<f64> {
    let n = points.len();
    let mut acc: FxHashMap<i32, ([f64; 2], usize)> = FxHashMap::default();
    for &(x, l) in points {
        let e = acc.entry(l).or_insert(([0.0; 2], 0));
        e.0[0] += x[0];
        e.0[1] += x[1];
        e.1 += 1;
    }
    let k = acc.len();
    if k < 2 || k >= n {
        return None;
    }
    let centroids: FxHashMap<i32, ([f64; 2], usize)> = acc
        .into_iter()
        .map(|(l, (s, c))| (l, ([s[0] / c as f64, s[1] / c as f64], c)))
        .collect();
    let overall = [
        points.iter().map(|(x, _)| x[0]).sum::<f64>() / n as f64,
        points.iter().map(|(x, _)| x[1]).sum::<f64>() / n as f64,
    ];

    let between: f64 = centroids.values().map(|&(c, size)| size as f64 * sq_dist(c, overall)).sum();
    let within: f64 = points.iter().map(|&(x, l)| sq_dist(x, centroids[&l].0)).sum();
    if within == 0.0 {
        return Some(1.0);
    }
    Some(between * (n - k) as f64 / (within * (k - 1) as f64))
}
