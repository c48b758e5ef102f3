//! Agglomerative clustering on standardized coordinates.
//!
//! Nearest-neighbour-chain over a condensed distance matrix with
//! Lance-Williams updates, O(n²) time and memory.  All four linkages are
//! reducible, so sorting the recorded merges by height reproduces the
//! sequential dendrogram; the first `n - k` merges give `k` clusters.
//! Ward works on squared Euclidean distances, the others on Euclidean.
//!
//! Inputs above `max_points` are clustered on an evenly strided sample;
//! every other point takes the label of the nearest sample-cluster centroid.

use crate::algorithm::{HierarchicalParams, Linkage};
use crate::point::{sq_dist, standardize, WeightedPoint};

struct Condensed {
    n: usize,
    d: Vec<f64>,
}

impl Condensed {
    fn new(n: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        let mut d = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in i + 1..n {
                d.push(f(i, j));
            }
        }
        Self { n, d }
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        i * (2 * self.n - i - 1) / 2 + (j - i - 1)
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> f64 {
        self.d[self.idx(i, j)]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, v: f64) {
        let k = self.idx(i, j);
        self.d[k] = v;
    }
}

/// Distance from `k` to the union of `i` and `j`.
fn lance_williams(linkage: Linkage, dki: f64, dkj: f64, dij: f64, ni: f64, nj: f64, nk: f64) -> f64 {
    match linkage {
        Linkage::Single => dki.min(dkj),
        Linkage::Complete => dki.max(dkj),
        Linkage::Average => (ni * dki + nj * dkj) / (ni + nj),
        Linkage::Ward => ((ni + nk) * dki + (nj + nk) * dkj - nk * dij) / (ni + nj + nk),
    }
}

pub(crate) fn agglomerative(points: &[WeightedPoint], params: &HierarchicalParams) -> Vec<i32> {
    if points.len() > params.max_points.max(1) {
        return sampled(points, params);
    }
    linkage_labels(&standardize(points), params)
}

/// Evenly spaced indices, always including the first and last.
pub(crate) fn stride_indices(n: usize, target: usize) -> Vec<usize> {
    match target {
        _ if target >= n => (0..n).collect(),
        0 => Vec::new(),
        1 => vec![0],
        _ => (0..target).map(|i| i * (n - 1) / (target - 1)).collect(),
    }
}

fn sampled(points: &[WeightedPoint], params: &HierarchicalParams) -> Vec<i32> {
    let xs = standardize(points);
    let keep = stride_indices(points.len(), params.max_points);
    let sample: Vec<[f64; 2]> = keep.iter().map(|&i| xs[i]).collect();
    let sample_labels = linkage_labels(&sample, params);

    let clusters = sample_labels.iter().copied().max().map_or(0, |m| m as usize + 1);
    let mut sums = vec![([0.0f64; 2], 0.0f64); clusters];
    for (x, &l) in sample.iter().zip(&sample_labels) {
        let (sum, count) = &mut sums[l as usize];
        sum[0] += x[0];
        sum[1] += x[1];
        *count += 1.0;
    }
    let centroids: Vec<[f64; 2]> =
        sums.iter().map(|(s, c)| [s[0] / c.max(1.0), s[1] / c.max(1.0)]).collect();

    let mut labels: Vec<i32> = xs
        .iter()
        .map(|&x| {
            centroids
                .iter()
                .enumerate()
                .min_by(|a, b| sq_dist(x, *a.1).total_cmp(&sq_dist(x, *b.1)))
                .map_or(0, |(c, _)| c as i32)
        })
        .collect();
    for (&i, &l) in keep.iter().zip(&sample_labels) {
        labels[i] = l;
    }
    labels
}

fn linkage_labels(xs: &[[f64; 2]], params: &HierarchicalParams) -> Vec<i32> {
    let n = xs.len();
    if n == 0 {
        return Vec::new();
    }
    let k = (params.k as usize).clamp(1, n);
    let linkage = params.linkage;
    let mut d = Condensed::new(n, |i, j| match linkage {
        Linkage::Ward => sq_dist(xs[i], xs[j]),
        _ => sq_dist(xs[i], xs[j]).sqrt(),
    });

    let mut size = vec![1.0f64; n];
    let mut active = vec![true; n];
    let mut merges: Vec<(f64, usize, usize)> = Vec::with_capacity(n - 1);
    let mut chain: Vec<usize> = Vec::new();

    while merges.len() < n - 1 {
        if chain.is_empty() {
            match active.iter().position(|&a| a) {
                Some(first) => chain.push(first),
                None => break,
            }
        }
        let Some((a, b)) = grow_chain(&mut chain, &d, &active) else {
            break;
        };
        chain.truncate(chain.len() - 2);

        let (keep, gone) = (a.min(b), a.max(b));
        let dij = d.get(keep, gone);
        for m in (0..n).filter(|&m| active[m] && m != keep && m != gone) {
            let v = lance_williams(linkage, d.get(m, keep), d.get(m, gone), dij, size[keep], size[gone], size[m]);
            d.set(m, keep, v);
        }
        active[gone] = false;
        size[keep] += size[gone];
        merges.push((dij, keep, gone));
    }

    merges.sort_by(|x, y| x.0.total_cmp(&y.0));
    let mut parent: Vec<usize> = (0..n).collect();
    for &(_, i, j) in merges.iter().take(n - k) {
        let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
        if ri != rj {
            parent[rj] = ri;
        }
    }

    let mut label_of = vec![-1i32; n];
    let mut next = 0;
    (0..n)
        .map(|i| {
            let r = find(&mut parent, i);
            if label_of[r] < 0 {
                label_of[r] = next;
                next += 1;
            }
            label_of[r]
        })
        .collect()
}

/// Extend the chain until its last two entries are reciprocal nearest
/// neighbours.  Ties prefer the previous chain entry, which guarantees
/// termination.
fn grow_chain(chain: &mut Vec<usize>, d: &Condensed, active: &[bool]) -> Option<(usize, usize)> {
    loop {
        let &a = chain.last()?;
        let prev = chain.len().checked_sub(2).map(|i| chain[i]);
        let mut best = prev;
        let mut best_d = prev.map_or(f64::INFINITY, |p| d.get(a, p));
        for c in (0..active.len()).filter(|&c| c != a && active[c]) {
            let dac = d.get(a, c);
            if dac < best_d {
                best = Some(c);
                best_d = dac;
            }
        }
        let b = best?;
        if Some(b) == prev {
            return Some((a, b));
        }
        chain.push(b);
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}
