//! Weighted k-means on standardized coordinates.
//!
//! k-means++ seeding (weight × D² sampling) from a `SmallRng` seeded per
//! restart, then Lloyd iterations until assignments stop changing.  The
//! restart with the lowest weighted inertia wins.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::algorithm::KMeansParams;
use crate::point::{sq_dist, standardize, WeightedPoint};

pub(crate) struct KMeansFit {
    pub labels: Vec<i32>,
    pub inertia: f64,
}

pub(crate) fn kmeans(points: &[WeightedPoint], params: &KMeansParams) -> KMeansFit {
    if points.is_empty() {
        return KMeansFit { labels: Vec::new(), inertia: 0.0 };
    }
    let xs = standardize(points);
    let weights: Vec<f64> = points.iter().map(|p| p.weight).collect();
    let k = (params.k as usize).min(points.len());

    let mut best: Option<KMeansFit> = None;
    for run in 0..u64::from(params.n_init) {
        let mut rng = SmallRng::seed_from_u64(params.seed.wrapping_add(run));
        let fit = lloyd(&xs, &weights, seed_centres(&xs, &weights, k, &mut rng), params.max_iter);
        if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }
    best.unwrap_or(KMeansFit { labels: vec![0; points.len()], inertia: 0.0 })
}

fn nearest(x: [f64; 2], centres: &[[f64; 2]]) -> (usize, f64) {
    centres
        .iter()
        .enumerate()
        .map(|(c, &m)| (c, sq_dist(x, m)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, 0.0))
}

/// Draw an index with probability proportional to `mass`; uniform if all zero.
fn draw(mass: &[f64], rng: &mut SmallRng) -> usize {
    let total: f64 = mass.iter().sum();
    if !(total > 0.0) {
        return rng.gen_range(0..mass.len());
    }
    let mut r = rng.r#gen::<f64>() * total;
    for (i, &m) in mass.iter().enumerate() {
        if r < m {
            return i;
        }
        r -= m;
    }
    mass.iter().rposition(|&m| m > 0.0).unwrap_or(0)
}

fn seed_centres(xs: &[[f64; 2]], w: &[f64], k: usize, rng: &mut SmallRng) -> Vec<[f64; 2]> {
    let mut centres = Vec::with_capacity(k);
    centres.push(xs[draw(w, rng)]);
    let mut d2: Vec<f64> = xs.iter().map(|&x| sq_dist(x, centres[0])).collect();
    while centres.len() < k {
        let mass: Vec<f64> = d2.iter().zip(w).map(|(d, w)| d * w).collect();
        let c = xs[draw(&mass, rng)];
        centres.push(c);
        for (d, &x) in d2.iter_mut().zip(xs) {
            *d = d.min(sq_dist(x, c));
        }
    }
    centres
}

fn lloyd(xs: &[[f64; 2]], w: &[f64], mut centres: Vec<[f64; 2]>, max_iter: u32) -> KMeansFit {
    let k = centres.len();
    let mut labels = vec![usize::MAX; xs.len()];

    for _ in 0..max_iter.max(1) {
        let mut changed = false;
        for (l, &x) in labels.iter_mut().zip(xs) {
            let (c, _) = nearest(x, &centres);
            if *l != c {
                *l = c;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![[0.0f64; 2]; k];
        let mut mass = vec![0.0f64; k];
        for ((&l, &x), &wi) in labels.iter().zip(xs).zip(w) {
            sums[l][0] += wi * x[0];
            sums[l][1] += wi * x[1];
            mass[l] += wi;
        }
        for c in 0..k {
            if mass[c] > 0.0 {
                centres[c] = [sums[c][0] / mass[c], sums[c][1] / mass[c]];
            } else if let Some(far) = farthest(xs, &centres) {
                // Empty cluster: re-seed at the worst-served point.
                centres[c] = xs[far];
            }
        }
    }

    let inertia = labels.iter().zip(xs).zip(w).map(|((&l, &x), &wi)| wi * sq_dist(x, centres[l])).sum();
    KMeansFit { labels: labels.into_iter().map(|l| l as i32).collect(), inertia }
}

fn farthest(xs: &[[f64; 2]], centres: &[[f64; 2]]) -> Option<usize> {
    xs.iter()
        .enumerate()
        .map(|(i, &x)| (i, nearest(x, centres).1))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}
