//! Unit tests for tg-query.

#[cfg(test)]
mod fixtures {
    use std::collections::BTreeMap;
    use std::path::Path;

    use tg_core::TrajectoryPoint;
    use tg_store::{IndexBuilder, IngestOutput, StoreConfig};

    use crate::{AnalyticsEngine, EngineConfig};

    pub const T0: i64 = 86_400;

    /// V1 drives north for 10 min, parks for 1000 s, drives on for 9 min,
    /// all in the first hour.  V2 drives east through the second hour.
    pub fn city_points() -> Vec<TrajectoryPoint> {
        let mut points = Vec::new();
        for i in 0..=10 {
            points.push(TrajectoryPoint::new("V1", T0 + 60 * i, 36.600 + 0.001 * i as f64, 117.0, 30.0, true));
        }
        for i in 0..10 {
            points.push(TrajectoryPoint::new("V1", T0 + 1_600 + 60 * i, 36.610 + 0.001 * i as f64, 117.0, 30.0, true));
        }
        for i in 0..30 {
            points.push(TrajectoryPoint::new("V2", T0 + 3_600 + 60 * i, 36.650, 117.0 + 0.001 * i as f64, 40.0, false));
        }
        points
    }

    /// Friday 1970-01-02 07:00 three taxis, Saturday 18:00 one, Sunday
    /// 12:00 two.  Two fixes each.
    pub fn week_points() -> Vec<TrajectoryPoint> {
        let days: [(i64, &[&str]); 3] = [
            (T0 + 7 * 3_600, &["V1", "V2", "V3"]),
            (2 * T0 + 18 * 3_600, &["V1"]),
            (3 * T0 + 12 * 3_600, &["V1", "V2"]),
        ];
        let mut points = Vec::new();
        for (t, vehicles) in days {
            for (i, v) in vehicles.iter().enumerate() {
                for dt in [0, 60] {
                    points.push(TrajectoryPoint::new(*v, t + dt, 36.60 + 0.01 * i as f64, 117.0, 30.0, true));
                }
            }
        }
        points
    }

    pub fn build_store(root: &Path) {
        build_store_with(root, city_points());
    }

    pub fn build_store_with(root: &Path, points: Vec<TrajectoryPoint>) {
        let mut buckets: BTreeMap<_, Vec<TrajectoryPoint>> = BTreeMap::new();
        for p in points {
            buckets.entry(p.bucket()).or_default().push(p);
        }
        IndexBuilder::new(StoreConfig::with_root(root))
            .unwrap()
            .build_from(IngestOutput { buckets, ..IngestOutput::default() })
            .unwrap();
    }

    pub fn config(root: &Path) -> EngineConfig {
        EngineConfig { store: StoreConfig::with_root(root), ..EngineConfig::default() }
    }

    pub fn engine(root: &Path) -> AnalyticsEngine {
        build_store(root);
        AnalyticsEngine::open(config(root)).unwrap()
    }
}

#[cfg(test)]
mod cache {
    use crate::BoundedCache;

    #[test]
    fn evicts_oldest_inserted() {
        let cache: BoundedCache<u32, &str> = BoundedCache::new("t", 2);
        cache.insert(1, "a");
        cache.insert(2, "b");
        assert_eq!(cache.get(&1).as_deref(), Some(&"a"));
        cache.insert(3, "c");
        // 1 was read most recently but inserted first.
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.len(), 2);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.capacity, 2);
    }

    #[test]
    fn reinsert_keeps_position() {
        let cache: BoundedCache<u32, u32> = BoundedCache::new("t", 2);
        cache.insert(1, 10);
        cache.insert(2, 20);
        cache.insert(1, 11);
        cache.insert(3, 30);
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.get(&2).as_deref(), Some(&20));
        cache.clear();
        assert!(cache.is_empty());
    }
}

#[cfg(test)]
mod sampling {
    use tg_core::TrajectoryPoint;

    use crate::sampling::{per_vehicle_quota, stratified_sample, uniform_indices, uniform_sample};

    fn track(vehicle: &str, n: i64) -> Vec<TrajectoryPoint> {
        (0..n).map(|i| TrajectoryPoint::new(vehicle, i * 10, 36.6, 117.0, 20.0, false)).collect()
    }

    #[test]
    fn uniform_keeps_endpoints() {
        let idx = uniform_indices(100, 10);
        assert_eq!(idx.len(), 10);
        assert_eq!(idx[0], 0);
        assert_eq!(idx[9], 99);
        assert!(idx.windows(2).all(|w| w[0] < w[1]));

        let kept = uniform_sample(track("V1", 100), 10);
        assert_eq!(kept.first().unwrap().timestamp, 0);
        assert_eq!(kept.last().unwrap().timestamp, 990);
    }

    #[test]
    fn uniform_is_noop_under_target() {
        assert_eq!(uniform_indices(3, 10), vec![0, 1, 2]);
        assert_eq!(uniform_sample(track("V1", 3), 10).len(), 3);
    }

    #[test]
    fn stratified_floor_per_vehicle() {
        assert_eq!(per_vehicle_quota(10, 20, 2), 2);
        assert_eq!(per_vehicle_quota(100, 4, 2), 25);

        let mut points = track("A", 50);
        points.extend(track("B", 50));
        points.extend(track("C", 3));
        let out = stratified_sample(points, 6, 2);
        for v in ["A", "B", "C"] {
            assert_eq!(out.iter().filter(|p| p.vehicle_id.as_str() == v).count(), 2, "vehicle {v}");
        }
        assert!(out.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}

#[cfg(test)]
mod loading {
    use super::fixtures::{build_store, config, engine, T0};
    use crate::{AnalyticsEngine, CancelToken, PointQuery, SamplingStrategy};

    #[test]
    fn range_before_domain_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let resp = engine.points(&PointQuery::new(0, 1_000));
        assert!(resp.success);
        assert!(resp.data.is_empty());
        assert!(resp.meta.out_of_domain);
        assert_eq!(resp.meta.partitions_read, 0);
    }

    #[test]
    fn vehicle_query_is_subset_of_range_query() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let all = engine.points(&PointQuery::new(T0, T0 + 7_200));
        let v1 = engine.points(&PointQuery::new(T0, T0 + 7_200).vehicle("V1"));
        assert_eq!(all.data.len(), 51);
        assert_eq!(v1.data.len(), 21);
        assert!(v1.meta.vehicle_pruned);
        assert_eq!(v1.meta.partitions_read, 1);
        assert!(v1.data.iter().all(|p| all.data.contains(p)));
        assert!(all.data.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn unknown_vehicle_scans_range() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let resp = engine.points(&PointQuery::new(T0, T0 + 7_200).vehicle("nobody"));
        assert!(resp.success);
        assert!(resp.data.is_empty());
        assert!(!resp.meta.vehicle_pruned);
        assert_eq!(resp.meta.partitions_read, 2);
    }

    #[test]
    fn long_range_is_truncated_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        build_store(dir.path());
        let mut cfg = config(dir.path());
        cfg.query.max_span_secs = 1_800;
        let engine = AnalyticsEngine::open(cfg).unwrap();

        let resp = engine.points(&PointQuery::new(T0, T0 + 100_000));
        assert!(resp.success);
        assert!(resp.meta.truncated);
        let effective = resp.meta.effective.unwrap();
        assert_eq!(effective.start, T0);
        assert_eq!(effective.span_secs(), 1_800);
        assert!(resp.data.iter().all(|p| p.timestamp <= T0 + 1_800));
        // The first leg plus four fixes after the park.
        assert_eq!(resp.data.len(), 15);
    }

    #[test]
    fn caps_trigger_the_right_sampler() {
        let dir = tempfile::tempdir().unwrap();
        build_store(dir.path());
        let mut cfg = config(dir.path());
        cfg.query.max_points = 10;
        let engine = AnalyticsEngine::open(cfg).unwrap();

        let single = engine.points(&PointQuery::new(T0, T0 + 7_200).vehicle("V2"));
        assert_eq!(single.meta.sampling, Some(SamplingStrategy::Uniform));
        assert_eq!(single.meta.raw_points, 30);
        assert_eq!(single.data.len(), 10);
        assert_eq!(single.data.first().unwrap().timestamp, T0 + 3_600);
        assert_eq!(single.data.last().unwrap().timestamp, T0 + 3_600 + 29 * 60);

        let multi = engine.points(&PointQuery::new(T0, T0 + 7_200));
        assert_eq!(multi.meta.sampling, Some(SamplingStrategy::Stratified));
        assert_eq!(multi.meta.points_used, 4);
        for v in ["V1", "V2"] {
            assert_eq!(multi.data.iter().filter(|p| p.vehicle_id.as_str() == v).count(), 2);
        }
    }

    #[test]
    fn repeated_load_hits_point_cache() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let q = PointQuery::new(T0, T0 + 7_200);
        assert!(!engine.points(&q).meta.cached);
        assert!(engine.points(&q).meta.cached);

        let stats = engine.cache_stats();
        assert_eq!(stats[0].name, "points");
        assert_eq!(stats[0].hits, 1);

        engine.invalidate();
        assert!(!engine.points(&q).meta.cached);
    }

    #[test]
    fn cancelled_query_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let token = CancelToken::new();
        token.cancel();
        let resp = engine.tracks(&PointQuery::new(T0, T0 + 7_200).with_cancel(token));
        assert!(!resp.success);
        assert!(resp.data.is_empty());
        assert!(resp.message.contains("cancelled"));
    }

    #[test]
    fn inverted_range_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let resp = engine.heatmap(&PointQuery::new(T0 + 10, T0), None);
        assert!(!resp.success);
        assert!(resp.data.is_empty());
    }
}

#[cfg(test)]
mod views {
    use tg_store::HeatmapKind;

    use super::fixtures::{build_store, config, engine, T0};
    use crate::{AnalyticsEngine, PointQuery};

    #[test]
    fn live_heatmap_counts_every_point() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let resp = engine.heatmap(&PointQuery::new(T0, T0 + 7_200), Some(0.001));
        assert!(resp.success);
        assert_eq!(resp.data.iter().map(|c| c.count).sum::<u64>(), 51);
        assert!(resp.data.windows(2).all(|w| w[0].count >= w[1].count));
        // V1's parked fixes share one cell.
        assert!(resp.data[0].count >= 2);
    }

    #[test]
    fn precomputed_heatmaps_merge_over_range() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let q = PointQuery::new(T0, T0 + 7_200);
        for kind in [HeatmapKind::Hourly, HeatmapKind::Daily] {
            let resp = engine.precomputed_heatmap(&q, kind);
            assert!(resp.success);
            assert_eq!(resp.data.iter().map(|c| c.count).sum::<u64>(), 51, "{kind:?}");
        }
        let first_hour = engine.precomputed_heatmap(&PointQuery::new(T0, T0 + 3_599), HeatmapKind::Hourly);
        assert_eq!(first_hour.data.iter().map(|c| c.count).sum::<u64>(), 21);
    }

    #[test]
    fn heatmap_top_n_truncates() {
        let dir = tempfile::tempdir().unwrap();
        build_store(dir.path());
        let mut cfg = config(dir.path());
        cfg.query.heatmap_top_n = 3;
        let engine = AnalyticsEngine::open(cfg).unwrap();
        let resp = engine.grid_snapshot(0.001);
        assert!(resp.success);
        assert_eq!(resp.data.len(), 3);
    }

    #[test]
    fn tracks_are_per_vehicle_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        build_store(dir.path());
        let mut cfg = config(dir.path());
        cfg.query.max_track_vehicles = 1;
        let engine = AnalyticsEngine::open(cfg).unwrap();

        let resp = engine.tracks(&PointQuery::new(T0, T0 + 7_200));
        assert_eq!(resp.data.len(), 1);
        let track = &resp.data[0];
        assert_eq!(track.vehicle_id.as_str(), "V1");
        assert_eq!(track.points.len(), 21);
        assert_eq!((track.start_time, track.end_time), (T0, T0 + 2_140));
        // 0.019° of latitude.
        assert!((track.distance_km - 2.11).abs() < 0.02, "{}", track.distance_km);
    }

    #[test]
    fn overview_counts_vehicles_and_hours() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let o = engine.traffic_overview(&PointQuery::new(T0, T0 + 7_200)).data;
        assert_eq!(o.total_points, 51);
        assert_eq!(o.total_vehicles, 2);
        assert_eq!(o.active_vehicles, 2);
        assert_eq!(o.occupied_points, 21);
        assert_eq!(o.hourly_distribution[0], 21);
        assert_eq!(o.hourly_distribution[1], 30);
        assert!((o.average_speed_kmh - (21.0 * 30.0 + 30.0 * 40.0) / 51.0).abs() < 1e-9);
    }
}

#[cfg(test)]
mod analytics {
    use tg_cluster::{ClusterType, ParamOverrides};
    use tg_core::{GeoPoint, TrajectoryPoint};
    use tg_road::{RoadNetworkBuilder, RoadType};

    use super::fixtures::{build_store_with, config, engine, T0};
    use crate::{AnalyticsEngine, ClusterRequest, PointQuery};

    fn q() -> PointQuery {
        PointQuery::new(T0, T0 + 7_200)
    }

    #[test]
    fn od_pairs_split_at_the_park() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let resp = engine.od_pairs(&q());
        assert!(resp.success);
        let trips = &resp.data.trips;
        assert_eq!(trips.len(), 3);
        assert_eq!(trips.iter().filter(|t| t.vehicle_id.as_str() == "V1").count(), 2);
        assert_eq!(resp.data.report.vehicles, 2);

        let flows = engine.od_flows(&q()).data;
        assert_eq!(flows.total_flows, 3);
        assert!(flows.grid.is_some());
        assert_eq!(flows.top_flows.iter().map(|f| f.flow_count).sum::<u32>(), 3);
    }

    #[test]
    fn od_statistics_cached_after_first_call() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let first = engine.od_statistics(&q());
        let stats = first.data.as_ref().unwrap();
        assert_eq!(stats.total_trips, 3);
        assert_eq!(stats.total_vehicles, 2);
        assert!(!first.meta.cached);
        assert!(engine.od_statistics(&q()).meta.cached);

        let empty = engine.od_statistics(&PointQuery::new(0, 10));
        assert!(empty.success);
        assert!(empty.data.is_none());
    }

    #[test]
    fn hotspot_clusters_with_dbscan() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let request = ClusterRequest {
            algorithm: "dbscan".into(),
            params: ParamOverrides { eps_km: Some(0.5), min_samples: Some(3), ..ParamOverrides::default() },
            cluster_type: ClusterType::Hotspot,
        };
        let resp = engine.clusters(&q(), &request);
        assert!(resp.success, "{}", resp.message);
        assert!(resp.data.metrics.n_clusters >= 2);
        assert_eq!(resp.data.metrics.n_points, 51);
        assert!(resp.data.clusters.windows(2).all(|w| w[0].density >= w[1].density));
        assert!(resp.data.clusters.iter().all(|c| c.cluster_type == ClusterType::Hotspot));
    }

    #[test]
    fn hierarchical_runs_over_large_ranges() {
        // 70 taxis × 50 fixes in two districts: 3500 points.
        let mut points = Vec::new();
        for v in 0..70 {
            let (lat0, lng0) = if v < 35 { (36.60, 117.00) } else { (36.75, 117.20) };
            let row = (v % 35) as f64;
            for i in 0..50 {
                points.push(TrajectoryPoint::new(
                    format!("H{v:02}"),
                    T0 + 60 * i,
                    lat0 + row * 0.0002,
                    lng0 + i as f64 * 0.0002,
                    25.0,
                    false,
                ));
            }
        }
        let dir = tempfile::tempdir().unwrap();
        build_store_with(dir.path(), points);
        let engine = AnalyticsEngine::open(config(dir.path())).unwrap();

        let request = ClusterRequest {
            algorithm: "hierarchical".into(),
            params: ParamOverrides { k: Some(2), ..ParamOverrides::default() },
            cluster_type: ClusterType::Hotspot,
        };
        let resp = engine.clusters(&q(), &request);
        assert!(resp.success, "{}", resp.message);
        assert_eq!(resp.data.metrics.n_points, 3_500);
        assert_eq!(resp.data.metrics.n_clusters, 2);
        assert_eq!(resp.data.clusters.iter().map(|c| c.point_count).sum::<usize>(), 3_500);
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let request = ClusterRequest { algorithm: "meanshift".into(), ..ClusterRequest::default() };
        let resp = engine.clusters(&q(), &request);
        assert!(!resp.success);
        assert!(resp.message.contains("meanshift"));
        assert!(resp.data.clusters.is_empty());

        assert!(!engine.optimize_clusters(&q(), "meanshift", ClusterType::Hotspot).success);
    }

    #[test]
    fn pickup_clusters_use_trip_origins() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let request = ClusterRequest {
            algorithm: "kmeans".into(),
            params: ParamOverrides { k: Some(2), ..ParamOverrides::default() },
            cluster_type: ClusterType::Pickup,
        };
        let resp = engine.clusters(&q(), &request);
        assert!(resp.success, "{}", resp.message);
        assert_eq!(resp.data.metrics.n_points, 3);
        assert_eq!(resp.data.clusters.iter().map(|c| c.point_count).sum::<usize>(), 3);
    }

    #[test]
    fn segment_report_needs_a_network() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let bare = engine.segment_report(&q());
        assert!(bare.success);
        assert!(bare.data.statistics.is_empty());

        let mut b = RoadNetworkBuilder::new();
        b.add(1, GeoPoint::new(36.600, 117.0), GeoPoint::new(36.619, 117.0), RoadType::Arterial);
        let engine = engine.with_network(b.build().unwrap());
        let resp = engine.segment_report(&q());
        assert!(resp.success, "{}", resp.message);
        assert_eq!(resp.data.statistics.len(), 1);
        assert!(resp.data.summary.is_some());
        assert!(!resp.data.speed_distribution.is_empty());
    }

    #[test]
    fn order_congestion_bins_pickups() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let resp = engine.order_congestion(&q());
        assert!(resp.success, "{}", resp.message);
        assert_eq!(resp.data.iter().map(|c| c.order_count).sum::<u32>(), 3);
    }
}

#[cfg(test)]
mod config {
    use crate::EngineConfig;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{ "query": { "max_points": 1000 }, "od": { "stop_duration_secs": 600 } }"#)
            .unwrap();
        assert_eq!(cfg.query.max_points, 1_000);
        assert_eq!(cfg.query.max_span_secs, 86_400);
        assert_eq!(cfg.od.stop_duration_secs, 600);
        assert!(cfg.road_network.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(EngineConfig::from_json_str(r#"{ "query": { "sample_ratio": 0.0 } }"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{ "query": { "point_cache_capacity": 0 } }"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{ "od": { "min_trip_secs": 9000 } }"#).is_err());
    }
}

#[cfg(test)]
mod anomalies {
    use tg_core::TrajectoryPoint;

    use crate::anomaly::{
        anomaly_heatmap, anomaly_statistics, detect_abnormal_routes, detect_anomalies, detect_cluster_anomalies,
        detect_long_stops, detect_speed_anomalies,
    };
    use crate::{AnomalyDetail, AnomalyKind, AnomalyThresholds, Severity};

    fn fix(vehicle: &str, t: i64, lat: f64, lng: f64, speed: f64) -> TrajectoryPoint {
        TrajectoryPoint::new(vehicle, t, lat, lng, speed, false)
    }

    #[test]
    fn long_gap_in_place_is_a_stop() {
        let pts = [
            fix("V1", 0, 36.6, 117.0, 20.0),
            fix("V1", 700, 36.6, 117.00005, 20.0),
            fix("V1", 760, 36.6, 117.00005, 20.0),
            // Long gap but moved.
            fix("V1", 2_000, 36.7, 117.0, 20.0),
        ];
        let found = detect_long_stops(&pts, &AnomalyThresholds::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "long_stop_V1_0");
        assert_eq!(found[0].end_timestamp, Some(700));
        assert_eq!(found[0].severity, Severity::Medium);
        assert_eq!(found[0].detail, AnomalyDetail::LongStop { duration_secs: 700 });
    }

    #[test]
    fn speeds_outside_band_are_flagged() {
        let pts = [
            fix("V1", 0, 36.6, 117.0, 0.0),
            fix("V1", 10, 36.6, 117.0, 3.0),
            fix("V1", 20, 36.6, 117.0, 50.0),
            fix("V1", 30, 36.6, 117.0, 90.0),
            fix("V1", 40, 36.6, 117.0, 120.0),
        ];
        let found = detect_speed_anomalies(&pts, &AnomalyThresholds::default());
        let severities: Vec<Severity> = found.iter().map(|a| a.severity).collect();
        assert_eq!(severities, [Severity::Medium, Severity::Medium, Severity::High]);
        assert_eq!(found[0].id, "speed_low_V1_10");
        assert_eq!(found[2].id, "speed_high_V1_40");
    }

    #[test]
    fn crowded_cell_is_a_cluster() {
        let th = AnomalyThresholds { cluster_vehicles: 2, ..AnomalyThresholds::default() };
        let mut pts: Vec<TrajectoryPoint> =
            ["A", "B", "C"].iter().map(|v| fix(v, 1_000, 36.6, 117.0, 20.0)).collect();
        // Same cell, next window.
        pts.push(fix("D", 5_000, 36.6, 117.0, 20.0));
        let found = detect_cluster_anomalies(&pts, &th);
        assert_eq!(found.len(), 1);
        let a = &found[0];
        assert!(a.vehicle_id.is_none());
        assert_eq!(a.timestamp, 1_000);
        assert!((a.position.lat - 36.6).abs() < 1e-9);
        assert!(matches!(a.detail, AnomalyDetail::Cluster { vehicle_count: 3, .. }));
    }

    #[test]
    fn zigzag_is_a_detour_and_straight_is_not() {
        let pts = [
            fix("Z", 0, 36.600, 117.000, 30.0),
            fix("Z", 60, 36.610, 117.000, 30.0),
            fix("Z", 120, 36.600, 117.003, 30.0),
            fix("S", 0, 36.600, 117.000, 30.0),
            fix("S", 60, 36.605, 117.000, 30.0),
            fix("S", 120, 36.610, 117.000, 30.0),
        ];
        let found = detect_abnormal_routes(&pts, &AnomalyThresholds::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].vehicle_id.as_ref().map(|v| v.as_str()), Some("Z"));
        assert_eq!(found[0].severity, Severity::High);
        let AnomalyDetail::Detour { ratio, straight_km, .. } = found[0].detail else {
            panic!("expected a detour");
        };
        assert!(straight_km > 0.1);
        assert!(ratio > 3.0);
    }

    #[test]
    fn merged_findings_are_deduplicated_newest_first() {
        let pts = [
            fix("V1", 10, 36.6, 117.0, 90.0),
            fix("V1", 10, 36.6, 117.0, 90.0),
            fix("V2", 50, 36.6, 117.0, 2.0),
            fix("V2", 1_000, 36.6, 117.0, 2.0),
        ];
        let th = AnomalyThresholds::default();
        let all = detect_anomalies(&pts, &[], &th);
        let ids: Vec<&str> = all.iter().map(|a| a.id.as_str()).collect();
        // Equal timestamps keep detector order.
        assert_eq!(ids, ["speed_low_V2_1000", "long_stop_V2_50", "speed_low_V2_50", "speed_high_V1_10"]);

        let speed_only = detect_anomalies(&pts, &[AnomalyKind::SpeedAnomaly], &th);
        assert_eq!(speed_only.len(), 3);
        assert!(speed_only.iter().all(|a| a.kind == AnomalyKind::SpeedAnomaly));
    }

    #[test]
    fn statistics_and_heatmap_summarize_findings() {
        let mut pts: Vec<TrajectoryPoint> = (0..60).map(|i| fix("V1", i * 10, 36.6, 117.0, 120.0)).collect();
        pts.push(fix("V2", 3_600, 36.7, 117.1, 3.0));
        let found = detect_anomalies(&pts, &[], &AnomalyThresholds::default());
        assert_eq!(found.len(), 61);

        let stats = anomaly_statistics(&found, 0);
        assert_eq!(stats.total_count, 61);
        assert_eq!(stats.by_kind[&AnomalyKind::SpeedAnomaly], 61);
        assert_eq!((stats.by_severity.high, stats.by_severity.medium), (60, 1));
        assert_eq!(stats.hourly_distribution[0], 60);
        assert_eq!(stats.hourly_distribution[1], 1);
        assert_eq!(stats.top_locations[0].count, 60);

        let heat = anomaly_heatmap(&found, 0.002);
        assert_eq!(heat.len(), 2);
        assert_eq!(heat[0].count, 60);
        assert_eq!(heat[0].intensity, 100.0);
        assert_eq!(heat[1].intensity, 2.0);
    }

    #[test]
    fn inverted_speed_band_is_rejected() {
        let th = AnomalyThresholds { speed_low_kmh: 90.0, ..AnomalyThresholds::default() };
        assert!(th.validate().is_err());
        assert!(AnomalyThresholds::default().validate().is_ok());
    }
}

#[cfg(test)]
mod temporal {
    use tg_core::TrajectoryPoint;

    use crate::temporal::{dynamic_heatmap, slope, spatiotemporal_heatmap};
    use crate::{FrameParams, Trend};

    fn at(t: i64, lng: f64) -> TrajectoryPoint {
        TrajectoryPoint::new("V1", t, 36.6, lng, 30.0, false)
    }

    fn raw() -> FrameParams {
        FrameParams { smoothing: false, ..FrameParams::default() }
    }

    #[test]
    fn frames_start_at_first_fix_and_skip_gaps() {
        let pts = [at(0, 117.0), at(100, 117.0), at(1_000, 117.0), at(3_000, 117.0)];
        let frames = dynamic_heatmap(&pts, &raw(), 0);
        let starts: Vec<i64> = frames.iter().map(|f| f.start).collect();
        assert_eq!(starts, [0, 900, 2_700]);
        assert_eq!(frames[0].total_intensity, 2.0);
        assert_eq!(frames[0].label, "00:00-00:15");
        assert_eq!(frames[2].label, "00:45-01:00");
        assert_eq!(dynamic_heatmap(&pts, &raw(), 3_600)[0].label, "01:00-01:15");
    }

    #[test]
    fn interior_frames_are_averaged_over_three() {
        let mut pts = Vec::new();
        pts.extend((0..3).map(|i| at(i, 117.0)));
        pts.push(at(900, 117.1));
        pts.extend((0..3).map(|i| at(1_800 + i, 117.0)));
        let frames = dynamic_heatmap(&pts, &FrameParams::default(), 0);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].total_intensity, 3.0);
        assert_eq!(frames[2].total_intensity, 3.0);
        let mid = &frames[1];
        assert_eq!(mid.cell_count, 2);
        assert!((mid.cells[0].intensity - 2.0).abs() < 1e-12);
        assert!((mid.cells[0].lng - 117.0).abs() < 1e-9);
        assert!((mid.cells[1].intensity - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn slope_sets_trend() {
        assert_eq!(slope(&[1.0, 2.0, 3.0]), 1.0);
        assert_eq!(slope(&[5.0]), 0.0);
        assert_eq!(Trend::from_slope(slope(&[3.0, 2.0, 1.0]), 0.1), Trend::Decreasing);
        assert_eq!(Trend::from_slope(0.05, 0.1), Trend::Stable);
    }

    #[test]
    fn report_combines_frames_and_spatial_stats() {
        assert!(spatiotemporal_heatmap(&[], &raw(), 0).is_none());

        let mut pts = vec![at(0, 117.0)];
        pts.extend((0..2).map(|i| at(900 + i, 117.01)));
        pts.extend((0..3).map(|i| at(1_800 + i, 117.02)));
        pts.push(TrajectoryPoint::new("V2", 1_805, 36.61, 117.02, 30.0, false));
        let report = spatiotemporal_heatmap(&pts, &raw(), 0).unwrap();
        assert_eq!((report.time_range.start, report.time_range.end), (0, 1_805));

        let ts = report.time_series.unwrap();
        assert_eq!(ts.total_frames, 3);
        assert_eq!(ts.trend, Trend::Increasing);
        assert_eq!(ts.peak_time, 1_800);
        assert_eq!(ts.max_intensity, 4.0);
        assert_eq!(ts.min_intensity, 1.0);

        assert_eq!(report.spatial.total_points, 7);
        assert_eq!(report.spatial.unique_vehicles, 2);
        assert!(report.spatial.extent_km > 1.0);
        assert!((report.bounds.max_lng - 117.02).abs() < 1e-9);
    }
}

#[cfg(test)]
mod weekly {
    use super::fixtures::week_points;
    use crate::weekly::weekly_passenger_flow;
    use crate::{DayPeriod, Trend};

    #[test]
    fn weekday_and_weekend_are_split() {
        let r = weekly_passenger_flow(&week_points(), 0).unwrap();
        let days: Vec<(&str, u8, usize)> = r.daily.iter().map(|d| (d.date.as_str(), d.weekday, d.vehicles)).collect();
        assert_eq!(days, [("1970-01-02", 4, 3), ("1970-01-03", 5, 1), ("1970-01-04", 6, 2)]);
        assert_eq!((r.first_day.as_str(), r.last_day.as_str()), ("1970-01-02", "1970-01-04"));

        let c = r.comparison;
        assert_eq!((c.weekday_avg, c.weekend_avg), (3.0, 1.5));
        assert_eq!(c.difference_pct, -50.0);
        assert_eq!((c.weekday_days, c.weekend_days), (1, 2));
        assert!(!c.weekend_higher);

        assert_eq!(r.pattern.peak_day.unwrap().weekday, 4);
        assert_eq!(r.pattern.lowest_day.unwrap().weekday, 5);
    }

    #[test]
    fn hours_and_periods_peak_per_day_type() {
        let r = weekly_passenger_flow(&week_points(), 0).unwrap();
        assert_eq!(r.hourly.weekday[7], 3.0);
        assert_eq!(r.hourly.weekday_peak_hour, Some(7));
        assert_eq!(r.hourly.weekend_peak_hour, Some(12));

        let wd = r.peaks.weekday_peak.unwrap();
        assert_eq!((wd.period, wd.avg_vehicles), (DayPeriod::MorningPeak, 3.0));
        let we = r.peaks.weekend_peak.unwrap();
        assert_eq!((we.period, we.avg_vehicles), (DayPeriod::Daytime, 2.0));
    }

    #[test]
    fn single_iso_week_is_stable() {
        let r = weekly_passenger_flow(&week_points(), 0).unwrap();
        assert_eq!(r.total_weeks, 1);
        assert_eq!((r.trend.weeks[0].iso_year, r.trend.weeks[0].iso_week), (1970, 1));
        assert_eq!(r.trend.weeks[0].total_vehicles, 6);
        assert_eq!(r.trend.trend, Trend::Stable);

        let s = r.statistics;
        assert_eq!((s.total_unique_vehicles, s.total_points, s.analysis_days), (3, 12, 3));
        assert_eq!(s.avg_daily_vehicles, 2.0);
        assert_eq!((s.max_daily_vehicles, s.min_daily_vehicles), (3, 1));
        assert_eq!(s.data_completeness_pct, 42.9);
    }

    #[test]
    fn local_offset_moves_day_boundaries() {
        // Saturday 18:00 UTC is Sunday 02:00 at UTC+8.
        let r = weekly_passenger_flow(&week_points(), 8 * 3_600).unwrap();
        assert_eq!(r.daily.len(), 2);
        assert_eq!(r.daily[1].vehicles, 2);
        assert!(weekly_passenger_flow(&[], 0).is_none());
    }
}

#[cfg(test)]
mod insights {
    use super::fixtures::{build_store_with, config, engine, week_points, T0};
    use crate::{AnalyticsEngine, AnomalyKind, AnomalyRequest, AnomalyThresholds, FrameParams, PointQuery, Severity};

    fn q() -> PointQuery {
        PointQuery::new(T0, T0 + 7_200)
    }

    #[test]
    fn park_is_the_only_anomaly() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let resp = engine.detect_anomalies(&q(), &AnomalyRequest::default());
        assert!(resp.success, "{}", resp.message);
        let report = &resp.data;
        assert_eq!(report.anomalies.len(), 1);
        let stop = &report.anomalies[0];
        assert_eq!(stop.kind, AnomalyKind::LongStop);
        assert_eq!(stop.id, format!("long_stop_V1_{}", T0 + 600));
        assert_eq!(stop.severity, Severity::Medium);
        assert_eq!(report.statistics.total_count, 1);
        assert_eq!(report.heatmap.len(), 1);
        assert_eq!(report.heatmap[0].intensity, 2.0);

        assert!(engine.detect_anomalies(&q(), &AnomalyRequest::default()).meta.cached);
    }

    #[test]
    fn request_thresholds_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let request = AnomalyRequest {
            kinds: vec![AnomalyKind::SpeedAnomaly],
            thresholds: Some(AnomalyThresholds { speed_high_kmh: 35.0, ..AnomalyThresholds::default() }),
        };
        let resp = engine.detect_anomalies(&q(), &request);
        assert_eq!(resp.data.anomalies.len(), 30);
        assert!(resp.data.anomalies.iter().all(|a| a.vehicle_id.as_ref().map(|v| v.as_str()) == Some("V2")));

        let bad = AnomalyRequest {
            thresholds: Some(AnomalyThresholds { detour_ratio: 0.5, ..AnomalyThresholds::default() }),
            ..AnomalyRequest::default()
        };
        let resp = engine.detect_anomalies(&q(), &bad);
        assert!(!resp.success);
        assert!(resp.data.anomalies.is_empty());
    }

    #[test]
    fn frames_cover_every_point() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let raw = FrameParams { smoothing: false, ..FrameParams::default() };
        let frames = engine.dynamic_heatmap(&q(), &raw).data;
        // Fifteen-minute frames from T0; the 45–60 minute frame is empty.
        assert_eq!(frames.len(), 5);
        assert_eq!(frames.iter().map(|f| f.total_intensity).sum::<f64>(), 51.0);
        assert_eq!(frames[0].total_intensity, 11.0);

        let smoothed = engine.dynamic_heatmap(&q(), &FrameParams::default()).data;
        assert_eq!(smoothed.len(), 5);
        assert_eq!(smoothed[0].total_intensity, 11.0);
        assert_eq!(smoothed[4].total_intensity, 15.0);

        let bad = FrameParams { frame_minutes: 0, ..FrameParams::default() };
        assert!(!engine.dynamic_heatmap(&q(), &bad).success);
    }

    #[test]
    fn spatiotemporal_report_over_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let report = engine.spatiotemporal_heatmap(&q(), &FrameParams::default()).data.unwrap();
        assert_eq!(report.spatial.total_points, 51);
        assert_eq!(report.spatial.unique_vehicles, 2);
        assert_eq!(report.time_range.start, T0);
        assert_eq!(report.time_range.end, T0 + 3_600 + 29 * 60);
        assert_eq!(report.time_series.unwrap().total_frames, 5);

        assert!(engine.spatiotemporal_heatmap(&PointQuery::new(0, 10), &FrameParams::default()).data.is_none());
    }

    #[test]
    fn weekly_flow_reads_past_the_daily_span() {
        let dir = tempfile::tempdir().unwrap();
        build_store_with(dir.path(), week_points());
        let engine = AnalyticsEngine::open(config(dir.path())).unwrap();
        let q = PointQuery::new(T0, 4 * T0 - 1);

        let resp = engine.weekly_passenger_flow(&q);
        assert!(resp.success, "{}", resp.message);
        assert!(!resp.meta.truncated);
        let report = resp.data.unwrap();
        assert_eq!(report.statistics.analysis_days, 3);
        assert_eq!(report.comparison.weekend_days, 2);

        // The ordinary span cap still applies elsewhere.
        assert!(engine.points(&q).meta.truncated);
    }
}
