//! Density-based clustering with a haversine neighbourhood.
//!
//! Neighbour candidates come from an R-tree envelope query sized to cover
//! `eps` in degrees at the point's latitude; candidates are then filtered by
//! true great-circle distance.
//!
//! A point of weight `w` counts as `max(1, trunc(w))` coincident copies.
//! Copies of one point always share a label, so the multiplicity is folded
//! into the neighbourhood count instead of materializing duplicates.

use std::collections::VecDeque;

use rstar::{RTree, RTreeObject, AABB};

use tg_core::geo::METRES_PER_DEG_LAT;
use tg_core::GeoPoint;

use crate::algorithm::DbscanParams;
use crate::point::{WeightedPoint, NOISE};

struct Indexed {
    idx: usize,
    pos: [f64; 2],
}

impl RTreeObject for Indexed {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pos)
    }
}

struct Neighbourhoods<'a> {
    points: &'a [WeightedPoint],
    tree: RTree<Indexed>,
    eps_m: f64,
}

impl<'a> Neighbourhoods<'a> {
    fn new(points: &'a [WeightedPoint], eps_km: f64) -> Self {
        let entries =
            points.iter().enumerate().map(|(idx, p)| Indexed { idx, pos: [p.lat, p.lng] }).collect();
        Self { points, tree: RTree::bulk_load(entries), eps_m: eps_km * 1_000.0 }
    }

    fn of(&self, i: usize) -> Vec<usize> {
        let c = self.points[i].position();
        let d_lat = self.eps_m / METRES_PER_DEG_LAT;
        // Widest longitude span occurs at the poleward edge of the box.
        let d_lng = GeoPoint::new(c.lat.abs() + d_lat, c.lng).lng_degrees_for(self.eps_m);
        let env = AABB::from_corners([c.lat - d_lat, c.lng - d_lng], [c.lat + d_lat, c.lng + d_lng]);
        self.tree
            .locate_in_envelope_intersecting(&env)
            .filter(|e| c.distance_m(self.points[e.idx].position()) <= self.eps_m)
            .map(|e| e.idx)
            .collect()
    }

    fn mass(&self, members: &[usize]) -> u64 {
        members.iter().map(|&j| self.points[j].multiplicity()).sum()
    }
}

pub(crate) fn dbscan(points: &[WeightedPoint], params: &DbscanParams) -> Vec<i32> {
    const UNVISITED: i32 = i32::MIN;

    let hood = Neighbourhoods::new(points, params.eps_km);
    let min = u64::from(params.min_samples);
    let mut labels = vec![UNVISITED; points.len()];
    let mut next = 0i32;

    for i in 0..points.len() {
        if labels[i] != UNVISITED {
            continue;
        }
        let seeds = hood.of(i);
        if hood.mass(&seeds) < min {
            labels[i] = NOISE;
            continue;
        }

        let cluster = next;
        next += 1;
        labels[i] = cluster;

        let mut queue: VecDeque<usize> = seeds.into_iter().filter(|&j| j != i).collect();
        while let Some(j) = queue.pop_front() {
            match labels[j] {
                NOISE => labels[j] = cluster,
                UNVISITED => {
                    labels[j] = cluster;
                    let more = hood.of(j);
                    if hood.mass(&more) >= min {
                        queue.extend(more.into_iter().filter(|&m| labels[m] == UNVISITED || labels[m] == NOISE));
                    }
                }
                _ => {}
            }
        }
    }
    labels
}
