//! Unit tests for tg-road.

#[cfg(test)]
mod fixtures {
    use tg_core::{GeoPoint, SegmentId};

    use crate::{
        RoadConfig, RoadNetwork, RoadNetworkBuilder, RoadType, SegmentTrafficSample,
        SpeedRatioClassifier,
    };

    /// Segment 1: east-west highway along lat 36.66 from lng 117.00 to 117.02.
    /// Segment 2: north-south arterial along lng 117.01 crossing it.
    /// Segment 3: a local road far to the south.
    pub fn network() -> RoadNetwork {
        let mut b = RoadNetworkBuilder::new();
        b.add(1, GeoPoint::new(36.66, 117.00), GeoPoint::new(36.66, 117.02), RoadType::Highway)
            .add(2, GeoPoint::new(36.65, 117.01), GeoPoint::new(36.67, 117.01), RoadType::Arterial)
            .add(3, GeoPoint::new(36.60, 117.10), GeoPoint::new(36.601, 117.10), RoadType::Local);
        b.build().unwrap()
    }

    pub fn sample(segment: u32, road_type: RoadType, window_start: i64, speed: f64, vehicles: u32) -> SegmentTrafficSample {
        let cfg = RoadConfig::default();
        let classifier = SpeedRatioClassifier::from_config(&cfg);
        SegmentTrafficSample {
            segment_id: SegmentId(segment),
            road_type,
            window_start,
            window_secs: cfg.window_secs,
            vehicle_count: vehicles,
            point_count: vehicles,
            avg_speed: speed,
            min_speed: speed,
            max_speed: speed,
            density: f64::from(vehicles),
            flow_rate: f64::from(vehicles) / cfg.window_hours(),
            congestion: classifier.classify(road_type, speed),
        }
    }
}

#[cfg(test)]
mod network {
    use std::io::Cursor;

    use tg_core::{GeoPoint, SegmentId};

    use crate::{load_network_reader, LengthThresholds, RoadError, RoadNetworkBuilder, RoadType};

    #[test]
    fn road_type_by_length() {
        let t = LengthThresholds::default();
        assert_eq!(RoadType::from_length_m(1_500.0, &t), RoadType::Highway);
        assert_eq!(RoadType::from_length_m(1_000.0, &t), RoadType::Arterial);
        assert_eq!(RoadType::from_length_m(501.0, &t), RoadType::Arterial);
        assert_eq!(RoadType::from_length_m(300.0, &t), RoadType::Urban);
        assert_eq!(RoadType::from_length_m(200.0, &t), RoadType::Local);
    }

    #[test]
    fn csv_maps_x_to_longitude() {
        let csv = "ID,Start_X,Start_Y,END_X,END_Y,Length\n\
                   7,117.0012,36.6601,117.0150,36.6605,1240.5\n\
                   8,117.1,36.7,117.1,36.701,150\n";
        let net = load_network_reader(Cursor::new(csv), &LengthThresholds::default()).unwrap();
        assert_eq!(net.len(), 2);
        let s = net.segment(SegmentId(7)).unwrap();
        assert_eq!(s.start, GeoPoint::new(36.6601, 117.0012));
        assert!((s.length_km - 1.2405).abs() < 1e-9);
        assert_eq!(s.road_type, RoadType::Highway);
        assert_eq!(s.name(), "Road_7");
        assert_eq!(net.segment(SegmentId(8)).unwrap().road_type, RoadType::Local);
        assert_eq!(net.type_counts()[&RoadType::Highway], 1);
    }

    #[test]
    fn csv_rejects_bad_rows() {
        let csv = "ID,Start_X,Start_Y,END_X,END_Y,Length\nx,1,2,3,4,5\n";
        assert!(matches!(
            load_network_reader(Cursor::new(csv), &LengthThresholds::default()),
            Err(RoadError::Parse(_))
        ));
    }

    #[test]
    fn csv_rejects_continental_segments() {
        // Sign flip on one longitude: 234° of span.
        let csv = "ID,Start_X,Start_Y,END_X,END_Y,Length\n\
                   9,117.0,36.66,-117.0,36.66,800\n";
        let err = load_network_reader(Cursor::new(csv), &LengthThresholds::default()).unwrap_err();
        assert!(matches!(err, RoadError::Parse(ref m) if m.contains("segment 9")));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut b = RoadNetworkBuilder::new();
        let p = GeoPoint::new(36.6, 117.0);
        b.add(1, p, p, RoadType::Local).add(1, p, p, RoadType::Local);
        assert!(matches!(b.build(), Err(RoadError::DuplicateSegment(1))));
    }
}

#[cfg(test)]
mod matcher {
    use tg_core::{GeoPoint, TrajectoryPoint};

    use super::fixtures::network;
    use crate::{RoadNetworkBuilder, RoadType, SegmentMatcher, MAX_CELLS_PER_SEGMENT};

    fn matches(m: &SegmentMatcher, lat: f64, lng: f64) -> Vec<usize> {
        let mut v: Vec<usize> = m.segments_for(GeoPoint::new(lat, lng)).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn overlapping_boxes_match_both() {
        let net = network();
        let m = SegmentMatcher::new(&net, 0.001, 0.001).unwrap();
        assert_eq!(matches(&m, 36.66, 117.01), vec![0, 1]);
        assert_eq!(matches(&m, 36.6605, 117.005), vec![0]);
        assert_eq!(matches(&m, 36.655, 117.0102), vec![1]);
        assert!(matches(&m, 36.70, 117.05).is_empty());
    }

    #[test]
    fn buffer_edge_is_inclusive_and_configurable() {
        let net = network();
        let tight = SegmentMatcher::new(&net, 0.001, 0.0).unwrap();
        let wide = SegmentMatcher::new(&net, 0.001, 0.002).unwrap();
        // 0.0015° north of the highway.
        assert!(matches(&tight, 36.6615, 117.005).is_empty());
        assert_eq!(matches(&wide, 36.6615, 117.005), vec![0]);
    }

    #[test]
    fn wide_segment_stays_off_the_grid() {
        let mut b = RoadNetworkBuilder::new();
        b.add(1, GeoPoint::new(36.66, 117.00), GeoPoint::new(36.66, 117.02), RoadType::Highway)
            .add(2, GeoPoint::new(30.0, 110.0), GeoPoint::new(40.0, 120.0), RoadType::Highway);
        let net = b.build().unwrap();
        let m = SegmentMatcher::new(&net, 0.001, 0.001).unwrap();
        assert!(m.cell_count() as i64 <= MAX_CELLS_PER_SEGMENT);
        assert_eq!(matches(&m, 36.66, 117.01), vec![0, 1]);
        assert_eq!(matches(&m, 35.0, 115.0), vec![1]);
        assert!(matches(&m, 45.0, 115.0).is_empty());
    }

    #[test]
    fn match_points_groups_by_segment() {
        let net = network();
        let m = SegmentMatcher::new(&net, 0.001, 0.001).unwrap();
        let pts = [
            TrajectoryPoint::new("A", 0, 36.66, 117.01, 30.0, false),
            TrajectoryPoint::new("B", 0, 36.66, 117.001, 30.0, false),
            TrajectoryPoint::new("C", 0, 36.0, 116.0, 30.0, false),
        ];
        let refs: Vec<&TrajectoryPoint> = pts.iter().collect();
        let grouped = m.match_points(&refs);
        assert_eq!(grouped[&0], vec![0, 1]);
        assert_eq!(grouped[&1], vec![0]);
        assert!(!grouped.contains_key(&2));
    }
}

#[cfg(test)]
mod congestion {
    use crate::{
        CompositeClassifier, CompositeInputs, CongestionLevel, RoadConfig, RoadType,
        SpeedRatioClassifier,
    };

    #[test]
    fn highway_free_and_jam() {
        let c = SpeedRatioClassifier::from_config(&RoadConfig::default());
        assert!((c.ratio(RoadType::Highway, 75.0) - 0.9375).abs() < 1e-12);
        assert_eq!(c.classify(RoadType::Highway, 75.0), CongestionLevel::Free);
        assert!((c.ratio(RoadType::Highway, 20.0) - 0.25).abs() < 1e-12);
        assert_eq!(c.classify(RoadType::Highway, 20.0), CongestionLevel::Jam);
    }

    #[test]
    fn thresholds_are_strict() {
        let c = SpeedRatioClassifier::from_config(&RoadConfig::default());
        // Arterial free-flow 50: ratio exactly 0.8 is not free.
        assert_eq!(c.classify(RoadType::Arterial, 40.0), CongestionLevel::Moderate);
        assert_eq!(c.classify(RoadType::Arterial, 30.0), CongestionLevel::Heavy);
        assert_eq!(c.classify(RoadType::Arterial, 15.0), CongestionLevel::Jam);
    }

    #[test]
    fn speed_ratio_is_monotonic() {
        let c = SpeedRatioClassifier::from_config(&RoadConfig::default());
        for rt in RoadType::ALL {
            let mut prev = CongestionLevel::Jam;
            for step in 0..=300 {
                let level = c.classify(rt, step as f64 * 0.5);
                assert!(level <= prev, "{rt}: {level} after {prev} at {}", step as f64 * 0.5);
                prev = level;
            }
        }
    }

    #[test]
    fn composite_buckets_and_weights() {
        let c = CompositeClassifier::from_config(&RoadConfig::default());
        let calm = c.score(&CompositeInputs { avg_speed_kmh: 30.0, spatial_density: 50.0, temporal_density: 5.0 });
        assert_eq!((calm.speed, calm.spatial, calm.temporal), (1, 1, 1));
        assert!((calm.composite - 1.0).abs() < 1e-12);
        assert_eq!(calm.level, CongestionLevel::Free);

        let busy = c.score(&CompositeInputs { avg_speed_kmh: 4.0, spatial_density: 900.0, temporal_density: 100.0 });
        assert_eq!((busy.speed, busy.spatial, busy.temporal), (4, 4, 4));
        assert_eq!(busy.level, CongestionLevel::Jam);

        // 0.4*3 + 0.3*2 + 0.3*2 = 2.4 → moderate
        let mid = c.score(&CompositeInputs { avg_speed_kmh: 8.0, spatial_density: 300.0, temporal_density: 30.0 });
        assert!((mid.composite - 2.4).abs() < 1e-12);
        assert_eq!(mid.level, CongestionLevel::Moderate);
    }

    #[test]
    fn composite_is_monotonic_in_speed() {
        let c = CompositeClassifier::from_config(&RoadConfig::default());
        for density in [10.0, 300.0, 1_000.0] {
            let mut prev = CongestionLevel::Jam;
            for speed in 0..60 {
                let level = c.classify(&CompositeInputs {
                    avg_speed_kmh: f64::from(speed),
                    spatial_density: density,
                    temporal_density: density / 10.0,
                });
                assert!(level <= prev);
                prev = level;
            }
        }
    }
}

#[cfg(test)]
mod traffic {
    use tg_core::{SegmentId, TrajectoryPoint};

    use super::fixtures::network;
    use crate::{aggregate, CongestionLevel, RoadConfig, SpeedRatioClassifier, TrafficAnalyzer};

    #[test]
    fn aggregate_counts_distinct_vehicles_and_moving_speeds() {
        let net = network();
        let seg = &net.segments()[0];
        let classifier = SpeedRatioClassifier::from_config(&RoadConfig::default());
        let pts = [
            TrajectoryPoint::new("V1", 0, 36.66, 117.005, 40.0, false),
            TrajectoryPoint::new("V1", 30, 36.66, 117.006, 60.0, false),
            TrajectoryPoint::new("V2", 40, 36.66, 117.007, 0.0, true),
        ];
        let refs: Vec<&TrajectoryPoint> = pts.iter().collect();
        let s = aggregate(seg, 0, 900, &refs, &classifier).unwrap();
        assert_eq!(s.vehicle_count, 2);
        assert_eq!(s.point_count, 3);
        assert!((s.avg_speed - 50.0).abs() < 1e-12);
        assert_eq!((s.min_speed, s.max_speed), (40.0, 60.0));
        assert!((s.flow_rate - 8.0).abs() < 1e-12);
        assert!((s.density - 2.0 / seg.length_km).abs() < 1e-9);
        // 50 / 80 = 0.625
        assert_eq!(s.congestion, CongestionLevel::Moderate);
    }

    #[test]
    fn stationary_window_yields_nothing() {
        let net = network();
        let classifier = SpeedRatioClassifier::from_config(&RoadConfig::default());
        let p = TrajectoryPoint::new("V1", 0, 36.66, 117.005, 0.0, false);
        assert!(aggregate(&net.segments()[0], 0, 900, &[&p], &classifier).is_none());
    }

    #[test]
    fn analyzer_splits_windows_and_shares_points() {
        let net = network();
        let analyzer = TrafficAnalyzer::new(&net, &RoadConfig::default()).unwrap();
        let pts = vec![
            TrajectoryPoint::new("V1", 100, 36.66, 117.01, 70.0, false),
            TrajectoryPoint::new("V2", 1_000, 36.66, 117.005, 30.0, false),
        ];
        let samples = analyzer.analyze(&pts);
        let keys: Vec<(i64, SegmentId)> = samples.iter().map(|s| (s.window_start, s.segment_id)).collect();
        assert_eq!(keys, vec![(0, SegmentId(1)), (0, SegmentId(2)), (900, SegmentId(1))]);
    }
}

#[cfg(test)]
mod stats {
    use tg_core::{SegmentId, TimeRange};

    use super::fixtures::sample;
    use crate::{
        hourly_patterns, identify_bottlenecks, network_summary, segment_statistics,
        speed_distribution, CongestionLevel, EfficiencyScore, RoadConfig, RoadType,
    };

    const H: i64 = 3_600;

    fn samples() -> Vec<crate::SegmentTrafficSample> {
        vec![
            sample(1, RoadType::Highway, 8 * H, 80.0, 10),
            sample(1, RoadType::Highway, 8 * H + 900, 60.0, 10),
            sample(1, RoadType::Highway, 12 * H, 20.0, 2),
            sample(1, RoadType::Highway, 12 * H + 900, 40.0, 2),
            sample(2, RoadType::Arterial, 9 * H, 45.0, 3),
            sample(3, RoadType::Local, 13 * H, 10.0, 1),
            sample(3, RoadType::Local, 14 * H, 12.0, 1),
        ]
    }

    #[test]
    fn single_segment_numbers() {
        let range = TimeRange::new(0, 24 * H).unwrap();
        let stats = segment_statistics(&samples(), range, &RoadConfig::default());
        let ids: Vec<u32> = stats.iter().map(|s| s.segment_id.0).collect();
        assert_eq!(ids, vec![1, 3], "segment 2 has a single sample");

        let s = &stats[0];
        assert_eq!(s.samples, 4);
        assert_eq!(s.total_vehicles, 24);
        assert!((s.avg_speed - 50.0).abs() < 1e-12);
        assert!((s.speed_variance - 500.0).abs() < 1e-9);
        assert!((s.peak_hour_flow - 40.0).abs() < 1e-12);
        assert!((s.off_peak_flow - 8.0).abs() < 1e-12);
        // 20 km/h → jam, 40 km/h → heavy on a highway.
        assert!((s.congestion_hours - 0.5).abs() < 1e-12);
        assert_eq!(s.free_flow_speed, 80.0);
        assert!((s.capacity_utilization - 40.0 / 6_000.0).abs() < 1e-12);

        let expected = EfficiencyScore::compute(50.0, 80.0, 8.0, 40.0, 0.5);
        assert!((expected.speed - 62.5).abs() < 1e-12);
        assert!((expected.flow - 20.0).abs() < 1e-12);
        assert_eq!(s.efficiency, expected);
    }

    #[test]
    fn range_filters_samples() {
        let range = TimeRange::new(12 * H, 24 * H).unwrap();
        let stats = segment_statistics(&samples(), range, &RoadConfig::default());
        assert_eq!(stats[0].samples, 2);
        assert_eq!(stats[0].peak_hour_flow, 0.0);
    }

    #[test]
    fn efficiency_caps() {
        let e = EfficiencyScore::compute(100.0, 50.0, 500.0, 0.0, 48.0);
        assert_eq!(e.speed, 100.0);
        assert_eq!(e.flow, 100.0);
        assert_eq!(e.congestion, 0.0);
        assert!((e.overall - 200.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn slow_segment_is_bottleneck() {
        let cfg = RoadConfig::default();
        let stats = segment_statistics(&samples(), TimeRange::new(0, 24 * H).unwrap(), &cfg);
        assert_eq!(identify_bottlenecks(&stats, &cfg.bottleneck), vec![SegmentId(3)]);
    }

    #[test]
    fn speed_bands() {
        let bands = speed_distribution(&samples());
        assert_eq!(bands.len(), 6);
        let labels: Vec<&str> = bands.iter().map(|b| b.range.as_str()).collect();
        assert_eq!(labels, ["0-20", "20-40", "40-60", "60-80", "80-100", "100+"]);
        // 10 + 12 km/h (1 + 1 vehicles) → 0-20; 20, 40 km/h → 20-40 and 40-60.
        assert_eq!(bands[0].vehicle_count, 2);
        assert_eq!(bands[1].vehicle_count, 2);
        assert_eq!(bands[2].vehicle_count, 2 + 3);
        assert_eq!(bands[3].vehicle_count, 10);
        assert_eq!(bands[4].vehicle_count, 10);
        let total: f64 = bands.iter().map(|b| b.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn hourly_has_24_entries() {
        let p = hourly_patterns(&samples(), 0);
        assert_eq!(p.len(), 24);
        assert_eq!(p[8].samples, 2);
        assert!((p[8].avg_flow - 40.0).abs() < 1e-12);
        assert!((p[12].congestion_index - 1.0).abs() < 1e-12);
        assert_eq!(p[0].samples, 0);

        // A +8h offset moves UTC 0h samples to local 8h.
        let shifted = hourly_patterns(&samples(), 8 * H);
        assert_eq!(shifted[16].samples, 2);
    }

    #[test]
    fn network_summary_totals() {
        let cfg = RoadConfig::default();
        let all = samples();
        let stats = segment_statistics(&all, TimeRange::new(0, 24 * H).unwrap(), &cfg);
        let bottlenecks = identify_bottlenecks(&stats, &cfg.bottleneck);
        let summary = network_summary(&stats, &all, &bottlenecks).unwrap();
        assert_eq!(summary.total_segments, 2);
        assert_eq!(summary.bottleneck_count, 1);
        assert!((summary.bottleneck_percentage - 50.0).abs() < 1e-12);
        assert_eq!(summary.road_type_distribution[&RoadType::Local], 1);
        assert_eq!(summary.congestion_distribution.values().sum::<usize>(), all.len());
        assert_eq!(summary.congestion_distribution[&CongestionLevel::Jam], 1);
        assert_eq!(summary.congestion_distribution[&CongestionLevel::Heavy], 3);
        assert!(network_summary(&[], &all, &[]).is_none());
    }
}

#[cfg(test)]
mod orders {
    use tg_core::GeoPoint;

    use crate::{order_congestion, CompositeClassifier, CongestionLevel, OrderSample, RoadConfig};

    fn order(lat: f64, lng: f64, km: f64, secs: i64) -> OrderSample {
        OrderSample { pickup: GeoPoint::new(lat, lng), pickup_time: 0, distance_km: km, duration_secs: secs }
    }

    #[test]
    fn dense_slow_cell_ranks_first() {
        let classifier = CompositeClassifier::from_config(&RoadConfig::default());
        let mut orders: Vec<OrderSample> = (0..100).map(|_| order(36.650, 117.120, 0.5, 600)).collect();
        orders.push(order(36.700, 117.000, 10.0, 900));

        let cells = order_congestion(&orders, 0.001, 1.0, &classifier).unwrap();
        assert_eq!(cells.len(), 2);
        let hot = &cells[0];
        assert_eq!(hot.order_count, 100);
        assert!((hot.inputs.avg_speed_kmh - 3.0).abs() < 1e-9);
        assert!((hot.inputs.temporal_density - 100.0).abs() < 1e-9);
        assert_eq!(hot.score.level, CongestionLevel::Jam);

        let calm = &cells[1];
        assert!((calm.inputs.avg_speed_kmh - 40.0).abs() < 1e-9);
        assert_eq!(calm.score.speed, 1);
        assert!(calm.score.level < hot.score.level);
    }

    #[test]
    fn zero_duration_orders_do_not_set_speed() {
        assert_eq!(order(36.6, 117.0, 1.0, 0).speed_kmh(), None);
    }
}

#[cfg(test)]
mod config {
    use crate::RoadConfig;

    #[test]
    fn defaults_validate() {
        assert!(RoadConfig::default().validate().is_ok());
        assert!((RoadConfig::default().window_hours() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut cfg = RoadConfig::default();
        cfg.speed_ratio.free = 0.5;
        assert!(cfg.validate().is_err());

        let mut cfg = RoadConfig::default();
        cfg.composite.speed_weight = 0.9;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: RoadConfig = serde_json::from_str(r#"{"buffer_deg":0.002}"#).unwrap();
        assert_eq!(cfg.buffer_deg, 0.002);
        assert_eq!(cfg.window_secs, 900);
    }
}
