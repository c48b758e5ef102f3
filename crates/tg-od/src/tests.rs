//! Unit tests for tg-od.

#[cfg(test)]
mod fixtures {
    use tg_core::TrajectoryPoint;

    use crate::Trip;

    pub fn fix(vehicle: &str, t: i64, lat: f64, lng: f64) -> TrajectoryPoint {
        TrajectoryPoint::new(vehicle, t, lat, lng, 30.0, true)
    }

    pub fn trip(vehicle: &str, o: (f64, f64, i64), d: (f64, f64, i64)) -> Trip {
        let a = fix(vehicle, o.2, o.0, o.1);
        let b = fix(vehicle, d.2, d.0, d.1);
        Trip::from_run(&[&a, &b]).unwrap()
    }

    /// Drives north, parks at 36.61 for 820 s, then drives on.
    pub fn park_and_go(vehicle: &str) -> Vec<TrajectoryPoint> {
        vec![
            fix(vehicle, 0, 36.600, 117.0),
            fix(vehicle, 60, 36.605, 117.0),
            fix(vehicle, 120, 36.610, 117.0),
            fix(vehicle, 180, 36.610, 117.0),
            fix(vehicle, 1_000, 36.610, 117.0),
            fix(vehicle, 1_060, 36.615, 117.0),
            fix(vehicle, 1_120, 36.620, 117.0),
        ]
    }
}

#[cfg(test)]
mod stops {
    use tg_core::TrajectoryPoint;

    use super::fixtures::{fix, park_and_go};
    use crate::{OdConfig, StopDetector};

    fn refs(points: &[TrajectoryPoint]) -> Vec<&TrajectoryPoint> {
        points.iter().collect()
    }

    #[test]
    fn stationary_gap_is_a_stop() {
        let pts = park_and_go("V1");
        let stops = StopDetector::from_config(&OdConfig::default()).detect(&refs(&pts));
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].after_index, 3);
        assert_eq!(stops[0].duration_secs(), 820);
    }

    #[test]
    fn short_gap_is_not_a_stop() {
        let pts = vec![fix("V1", 0, 36.6, 117.0), fix("V1", 300, 36.6, 117.0)];
        let d = StopDetector::new(20.0, 300);
        assert!(d.detect(&refs(&pts)).is_empty());
    }

    #[test]
    fn moving_gap_without_settling_is_not_a_stop() {
        let pts = vec![
            fix("V1", 0, 36.60, 117.0),
            fix("V1", 60, 36.61, 117.0),
            fix("V1", 2_000, 36.70, 117.0),
        ];
        assert!(StopDetector::new(20.0, 300).detect(&refs(&pts)).is_empty());
    }

    #[test]
    fn out_of_range_index_is_not_a_stop() {
        let pts = vec![fix("V1", 0, 36.6, 117.0)];
        let d = StopDetector::new(20.0, 300);
        assert!(!d.is_stop_after(&refs(&pts), 0));
        assert!(!d.is_stop_after(&refs(&pts), 5));
    }
}

#[cfg(test)]
mod trips {
    use tg_core::TrajectoryPoint;

    use super::fixtures::{fix, park_and_go};
    use crate::{extract_trips, segment_trips, OdConfig, StopDetector, TripExtractor, TripFilter};

    #[test]
    fn settled_then_distant_fix_splits_into_two_trips() {
        // V1 idles for 100 s, goes dark for 1900 s, reappears far away.
        let pts = [
            fix("V1", 0, 36.65, 117.0),
            fix("V1", 100, 36.65, 117.00001),
            fix("V1", 2_000, 36.70, 117.05),
            fix("V1", 2_060, 36.705, 117.05),
        ];
        let refs: Vec<&TrajectoryPoint> = pts.iter().collect();
        let trips = segment_trips(&refs, &StopDetector::new(20.0, 300));
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].end_time(), 100);
        assert_eq!(trips[1].start_time(), 2_000);
    }

    #[test]
    fn single_fix_runs_are_not_candidates() {
        // Parked before the last fix, so the final run holds one point.
        let mut pts = park_and_go("V1");
        pts.truncate(5);
        let refs: Vec<&TrajectoryPoint> = pts.iter().collect();
        let trips = segment_trips(&refs, &StopDetector::new(20.0, 300));
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].end_time(), 180);

        let (_, report) = TripExtractor::from_config(&OdConfig::default()).extract(&pts);
        assert_eq!(report.candidates, 1);
        assert_eq!(report.accepted, 1);
    }

    #[test]
    fn no_stops_yields_one_trip_over_the_whole_trajectory() {
        let pts: Vec<TrajectoryPoint> =
            (0..10).map(|i| fix("V9", i * 30, 36.60 + i as f64 * 0.001, 117.0)).collect();
        let trips = extract_trips(&pts, &OdConfig::default());
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].start_time(), 0);
        assert_eq!(trips[0].end_time(), 270);
        assert_eq!(trips[0].trip_id, "V9_0");
        assert!((trips[0].distance_km - 1.0).abs() < 0.01);
    }

    #[test]
    fn stop_splits_and_both_trips_pass_the_filter() {
        let trips = extract_trips(&park_and_go("V1"), &OdConfig::default());
        let ids: Vec<&str> = trips.iter().map(|t| t.trip_id.as_str()).collect();
        assert_eq!(ids, ["V1_0", "V1_1000"]);
        assert_eq!(trips[0].duration_secs, 180);
        assert_eq!(trips[1].duration_secs, 120);
    }

    #[test]
    fn unsorted_input_is_ordered_per_vehicle() {
        let mut pts = park_and_go("V1");
        pts.reverse();
        let trips = extract_trips(&pts, &OdConfig::default());
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].origin.t, 0);
    }

    #[test]
    fn returned_trips_satisfy_the_filter() {
        let cfg = OdConfig::default();
        let mut pts = park_and_go("A");
        // Too short in distance.
        pts.extend([fix("B", 0, 36.6, 117.0), fix("B", 120, 36.6001, 117.0)]);
        // Too long in time.
        pts.extend([fix("C", 0, 36.6, 117.0), fix("C", 8_000, 36.7, 117.0)]);
        // Too short in time.
        pts.extend([fix("D", 0, 36.6, 117.0), fix("D", 30, 36.61, 117.0)]);
        // Single fix.
        pts.push(fix("E", 0, 36.6, 117.0));

        let (trips, report) = TripExtractor::from_config(&cfg).extract(&pts);
        let filter = TripFilter::from_config(&cfg);
        assert!(trips.iter().all(|t| filter.accepts(t)));
        assert!(trips.iter().all(|t| t.vehicle_id.as_str() == "A"));
        assert_eq!(report.vehicles, 5);
        assert_eq!(report.vehicles_skipped, 1);
        assert_eq!(report.candidates, 5);
        assert_eq!(report.accepted, 2);
    }

    #[test]
    fn avg_speed_is_none_for_instant_trips() {
        let p = fix("V", 5, 36.6, 117.0);
        let t = crate::Trip::from_run(&[&p]).unwrap();
        assert_eq!(t.duration_secs, 0);
        assert!(t.avg_speed_kmh().is_none());
    }
}

#[cfg(test)]
mod flow {
    use super::fixtures::trip;
    use crate::{flow_matrix, top_flows, OdError};

    fn trips() -> Vec<crate::Trip> {
        vec![
            trip("A", (36.600, 117.0, 0), (36.625, 117.0, 600)),
            trip("B", (36.600, 117.0, 0), (36.625, 117.0, 1_200)),
            trip("C", (36.625, 117.0, 0), (36.600, 117.0, 900)),
        ]
    }

    #[test]
    fn matrix_counts_origin_destination_cells() {
        let m = flow_matrix(&trips(), 0.01).unwrap().unwrap();
        assert_eq!(m.grid().n_lat, 3);
        assert_eq!(m.grid().n_lng, 1);
        assert_eq!(m.dimension(), 3);
        assert_eq!(m.get(0, 2), 2);
        assert_eq!(m.get(2, 0), 1);
        assert_eq!(m.get(1, 1), 0);
        assert_eq!(m.total_flows(), 3);

        let dense = m.to_dense();
        assert_eq!(dense.len(), 3);
        assert_eq!(dense.iter().flatten().map(|&c| u64::from(c)).sum::<u64>(), 3);
        assert_eq!(m.entries()[0].count, 2);
    }

    #[test]
    fn no_trips_no_matrix() {
        assert!(flow_matrix(&[], 0.01).unwrap().is_none());
    }

    #[test]
    fn bad_grid_size_is_rejected() {
        assert!(matches!(flow_matrix(&trips(), 0.0), Err(OdError::Core(_))));
    }

    #[test]
    fn top_flows_rank_by_frequency_with_means() {
        let top = top_flows(&trips(), 0.001, 1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].flow_count, 2);
        assert!((top[0].avg_duration_secs - 900.0).abs() < 1e-9);
        assert!((top[0].origin.lat - 36.6).abs() < 1e-9);

        let all = top_flows(&trips(), 0.001, 10).unwrap();
        assert_eq!(all.len(), 2);
    }
}

#[cfg(test)]
mod patterns {
    use super::fixtures::trip;
    use crate::{od_statistics, spatial_patterns, temporal_patterns, DescriptiveStats, OdConfig};

    // 1970-01-01 was a Thursday.
    const SAT_0830: i64 = 2 * 86_400 + 8 * 3_600 + 30 * 60;

    #[test]
    fn temporal_histograms() {
        let trips = vec![
            trip("A", (36.6, 117.0, 0), (36.7, 117.0, 600)),
            trip("B", (36.6, 117.0, SAT_0830), (36.7, 117.0, SAT_0830 + 600)),
        ];
        let p = temporal_patterns(&trips, 60, 0);
        assert_eq!(p.total_trips, 2);
        assert_eq!(p.weekday_trips, 1);
        assert_eq!(p.weekend_trips, 1);
        assert_eq!(p.hourly_distribution[0], 1);
        assert_eq!(p.hourly_distribution[8], 1);
        assert_eq!(p.time_window_distribution.get("08:00"), Some(&1));

        let fine = temporal_patterns(&trips, 15, 0);
        assert_eq!(fine.time_window_distribution.get("08:30"), Some(&1));

        let shifted = temporal_patterns(&trips, 60, 3_600);
        assert_eq!(shifted.hourly_distribution[9], 1);
    }

    #[test]
    fn descriptive_stats() {
        let s = DescriptiveStats::of(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!((s.min, s.max), (1.0, 4.0));
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert!((s.median - 2.5).abs() < 1e-12);
        assert!((s.std - 1.25f64.sqrt()).abs() < 1e-12);
        assert!(DescriptiveStats::of(&[]).is_none());
    }

    #[test]
    fn spatial_summary_counts_unique_ends() {
        let trips = vec![
            trip("A", (36.6, 117.0, 0), (36.7, 117.1, 600)),
            trip("B", (36.6, 117.0, 0), (36.8, 117.2, 900)),
        ];
        let s = spatial_patterns(&trips).unwrap();
        assert_eq!(s.unique_origins, 1);
        assert_eq!(s.unique_destinations, 2);
        assert!((s.lat_range - 0.2).abs() < 1e-9);
        assert_eq!(s.duration_secs.max, 900.0);
        assert!(spatial_patterns(&[]).is_none());
    }

    #[test]
    fn statistics_of_nothing_are_empty() {
        let s = od_statistics(&[], &OdConfig::default()).unwrap();
        assert_eq!(s.total_trips, 0);
        assert!(s.temporal.is_none() && s.spatial.is_none() && s.top_flows.is_empty());
    }

    #[test]
    fn statistics_serialize() {
        let trips = vec![trip("A", (36.6, 117.0, 0), (36.7, 117.0, 600))];
        let s = od_statistics(&trips, &OdConfig::default()).unwrap();
        assert_eq!(s.total_vehicles, 1);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["top_flows"][0]["flow_count"], 1);
    }
}

#[cfg(test)]
mod config {
    use crate::{OdConfig, OdError};

    #[test]
    fn defaults_validate() {
        OdConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_duration_bounds_rejected() {
        let cfg = OdConfig { min_trip_secs: 500, max_trip_secs: 100, ..OdConfig::default() };
        assert!(matches!(cfg.validate(), Err(OdError::Config(_))));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: OdConfig = serde_json::from_str(r#"{"stop_duration_secs": 600}"#).unwrap();
        assert_eq!(cfg.stop_duration_secs, 600);
        assert_eq!(cfg.stop_distance_m, 20.0);
    }
}
