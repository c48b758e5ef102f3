//! `AnalyticsEngine`: the one object an application holds.
//!
//! The engine owns the read-side store view, the road network, and two
//! bounded caches.  Construct it once; call [`AnalyticsEngine::invalidate`]
//! (or [`AnalyticsEngine::reload`] after a rebuild) to drop cached state.
//! There is no global state.
//!
//! Every analytical call returns a [`QueryResponse`] and never an `Err`:
//! failures degrade to `success = false` with an empty payload.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tg_cluster::{
    analyze_clusters, cluster_data, optimize_params, AlgorithmKind, ClusterAlgorithm, ClusterSummary,
    ClusterType, ParamOverrides, QualityMetrics, SearchOutcome, WeightedPoint,
};
use tg_core::grid::validate_resolution;
use tg_core::time::HOUR_SECS;
use tg_core::{SegmentId, TimeRange, TrajectoryPoint};
use tg_od::{
    flow_matrix, od_statistics, top_flows, ExtractReport, FlowEntry, FlowGrid, FlowSummary, OdStatistics,
    Trip, TripExtractor,
};
use tg_road::{
    hourly_patterns, identify_bottlenecks, load_network_csv, network_summary, order_congestion,
    segment_statistics, speed_distribution, CompositeClassifier, HourlyPattern, NetworkSummary,
    OrderCongestionCell, OrderSample, RoadNetwork, SegmentStatistics, SpeedBand, TrafficAnalyzer,
};
use tg_store::{HeatmapKind, IndexedStore, SpatialGridIndex};

use crate::anomaly::{
    anomaly_heatmap, anomaly_statistics, detect_anomalies, Anomaly, AnomalyHeatCell, AnomalyKind,
    AnomalyStatistics, AnomalyThresholds,
};
use crate::cache::{BoundedCache, CacheStats};
use crate::config::EngineConfig;
use crate::heatmap::{from_grid, grid_heatmap, HeatmapPoint};
use crate::loader::{load_points, plan_read, CancelToken};
use crate::overview::{traffic_overview, TrafficOverview};
use crate::result::{QueryMeta, QueryResponse};
use crate::sampling::{stratified_sample, uniform_indices, uniform_sample, SamplingStrategy};
use crate::temporal::{dynamic_heatmap, spatiotemporal_heatmap, FrameParams, HeatFrame, SpatiotemporalReport};
use crate::tracks::{build_tracks, VehicleTrack};
use crate::weekly::{weekly_passenger_flow, WeeklyFlowReport};
use crate::{QueryError, QueryResult};

// ── Requests ──────────────────────────────────────────────────────────────────

/// `{start_time, end_time, vehicle_id?}` plus an optional cancel handle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PointQuery {
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(skip)]
    pub cancel: CancelToken,
}

impl PointQuery {
    pub fn new(start_time: i64, end_time: i64) -> Self {
        Self { start_time, end_time, ..Self::default() }
    }

    pub fn vehicle(mut self, id: impl Into<String>) -> Self {
        self.vehicle_id = Some(id.into());
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn range(&self) -> QueryResult<TimeRange> {
        Ok(TimeRange::new(self.start_time, self.end_time)?)
    }

    fn cache_key(&self, op: &str, extra: &str) -> String {
        format!(
            "{op}|{}|{}|{}|{extra}",
            self.start_time,
            self.end_time,
            self.vehicle_id.as_deref().unwrap_or("*")
        )
    }
}

/// Algorithm selection for [`AnalyticsEngine::clusters`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterRequest {
    pub algorithm: String,
    pub params: ParamOverrides,
    pub cluster_type: ClusterType,
}

impl Default for ClusterRequest {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmKind::Dbscan.to_string(),
            params: ParamOverrides::default(),
            cluster_type: ClusterType::Hotspot,
        }
    }
}

/// Detector selection for [`AnalyticsEngine::detect_anomalies`].  An empty
/// `kinds` runs every detector; `thresholds` overrides the engine's.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyRequest {
    pub kinds: Vec<AnomalyKind>,
    pub thresholds: Option<AnomalyThresholds>,
}

// ── Payloads ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadedPoints {
    pub points: Vec<TrajectoryPoint>,
    pub meta: QueryMeta,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub algorithm: Option<ClusterAlgorithm>,
    pub metrics: QualityMetrics,
    pub clusters: Vec<ClusterSummary>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OdPairs {
    pub trips: Vec<Trip>,
    pub report: ExtractReport,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OdFlows {
    /// Absent when there are no trips.
    pub grid: Option<FlowGrid>,
    /// Non-zero matrix entries.
    pub entries: Vec<FlowEntry>,
    pub total_flows: u64,
    pub top_flows: Vec<FlowSummary>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    pub statistics: Vec<SegmentStatistics>,
    pub bottlenecks: Vec<SegmentId>,
    pub summary: Option<NetworkSummary>,
    pub speed_distribution: Vec<SpeedBand>,
    pub hourly_patterns: Vec<HourlyPattern>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// Newest first.
    pub anomalies: Vec<Anomaly>,
    pub statistics: AnomalyStatistics,
    pub heatmap: Vec<AnomalyHeatCell>,
}

#[derive(Clone, Debug)]
enum CachedResult {
    Anomalies(QueryResponse<AnomalyReport>),
    Clusters(QueryResponse<ClusterReport>),
    Segments(QueryResponse<SegmentReport>),
    OdStatistics(QueryResponse<Option<OdStatistics>>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct LoadKey {
    start: i64,
    end: i64,
    vehicle: Option<String>,
    max_span: i64,
    max_points: usize,
    sample_target: usize,
    min_per_vehicle: usize,
}

// ── Engine ────────────────────────────────────────────────────────────────────

pub struct AnalyticsEngine {
    config: EngineConfig,
    store: IndexedStore,
    network: RoadNetwork,
    points: BoundedCache<LoadKey, LoadedPoints>,
    results: BoundedCache<String, CachedResult>,
}

impl AnalyticsEngine {
    /// Validate `config`, open the store, and load the road network if one
    /// is configured.
    pub fn open(config: EngineConfig) -> QueryResult<Self> {
        config.validate()?;
        let store = IndexedStore::open(&config.store)?;
        let network = match &config.road_network {
            Some(path) => load_network_csv(path, &config.road.length_thresholds)?,
            None => RoadNetwork::empty(),
        };
        info!(
            root = %config.store.root.display(),
            buckets = store.buckets().len(),
            segments = network.len(),
            "analytics engine opened"
        );
        Ok(Self {
            points: BoundedCache::new("points", config.query.point_cache_capacity),
            results: BoundedCache::new("results", config.query.result_cache_capacity),
            config,
            store,
            network,
        })
    }

    /// Replace the road network.  Cached results are dropped.
    pub fn with_network(mut self, network: RoadNetwork) -> Self {
        self.network = network;
        self.results.clear();
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &IndexedStore {
        &self.store
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// Drop every cached point set and result.
    pub fn invalidate(&self) {
        self.points.clear();
        self.results.clear();
        debug!("engine caches cleared");
    }

    /// Re-read published indexes after an offline rebuild.
    pub fn reload(&mut self) -> QueryResult<()> {
        self.store.reload()?;
        self.invalidate();
        Ok(())
    }

    pub fn cache_stats(&self) -> Vec<CacheStats> {
        vec![self.points.stats(), self.results.stats()]
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    /// Plan, read, and sample the points for `q`.  The returned flag is true
    /// on a point-cache hit.
    pub fn load(&self, q: &PointQuery) -> QueryResult<(Arc<LoadedPoints>, bool)> {
        self.load_span(q, self.config.query.max_span_secs)
    }

    fn load_span(&self, q: &PointQuery, max_span: i64) -> QueryResult<(Arc<LoadedPoints>, bool)> {
        let requested = q.range()?;
        let cfg = &self.config.query;
        let key = LoadKey {
            start: q.start_time,
            end: q.end_time,
            vehicle: q.vehicle_id.clone(),
            max_span,
            max_points: cfg.max_points,
            sample_target: cfg.multi_vehicle_target(),
            min_per_vehicle: cfg.min_points_per_vehicle,
        };
        if let Some(hit) = self.points.get(&key) {
            debug!(range = %requested, "point cache hit");
            return Ok((hit, true));
        }

        q.cancel.check()?;
        let vehicle = q.vehicle_id.as_deref();
        let plan = plan_read(&self.store, requested, vehicle, max_span);
        let raw = load_points(&self.store, &plan, vehicle, &q.cancel)?;

        let mut meta = QueryMeta::from_plan(&plan);
        meta.raw_points = raw.len();
        let points = if raw.len() <= cfg.max_points {
            raw
        } else if vehicle.is_some() {
            meta.sampling = Some(SamplingStrategy::Uniform);
            uniform_sample(raw, cfg.max_points)
        } else {
            meta.sampling = Some(SamplingStrategy::Stratified);
            stratified_sample(raw, cfg.multi_vehicle_target(), cfg.min_points_per_vehicle)
        };
        meta.points_used = points.len();
        if let Some(strategy) = meta.sampling {
            debug!(?strategy, raw = meta.raw_points, kept = meta.points_used, "sampled query points");
        }
        Ok((self.points.insert(key, LoadedPoints { points, meta }), false))
    }

    /// Raw (possibly sampled) points.
    pub fn points(&self, q: &PointQuery) -> QueryResponse<Vec<TrajectoryPoint>> {
        self.with_points("points", q, |points, _| Ok(points.to_vec()))
    }

    fn with_points<T: Default>(
        &self,
        op: &'static str,
        q: &PointQuery,
        f: impl FnOnce(&[TrajectoryPoint], &QueryMeta) -> QueryResult<T>,
    ) -> QueryResponse<T> {
        self.with_points_over(op, q, self.config.query.max_span_secs, f)
    }

    fn with_points_over<T: Default>(
        &self,
        op: &'static str,
        q: &PointQuery,
        max_span: i64,
        f: impl FnOnce(&[TrajectoryPoint], &QueryMeta) -> QueryResult<T>,
    ) -> QueryResponse<T> {
        let result = self.load_span(q, max_span).and_then(|(loaded, hit)| {
            let mut meta = loaded.meta.clone();
            meta.cached = hit;
            let data = f(&loaded.points, &meta)?;
            Ok((data, meta))
        });
        self.respond(op, result)
    }

    fn respond<T: Default>(&self, op: &'static str, result: QueryResult<(T, QueryMeta)>) -> QueryResponse<T> {
        match result {
            Ok((data, meta)) => QueryResponse::ok(data, meta),
            Err(e) => {
                warn!(op, error = %e, "query failed");
                QueryResponse::failure(e.to_string())
            }
        }
    }

    fn cached<T: Clone>(
        &self,
        key: String,
        open: fn(&CachedResult) -> Option<&QueryResponse<T>>,
        wrap: fn(QueryResponse<T>) -> CachedResult,
        compute: impl FnOnce() -> QueryResponse<T>,
    ) -> QueryResponse<T> {
        if let Some(hit) = self.results.get(&key) {
            if let Some(resp) = open(&hit) {
                debug!(key = %key, "result cache hit");
                let mut resp = resp.clone();
                resp.meta.cached = true;
                return resp;
            }
        }
        let resp = compute();
        if resp.success {
            self.results.insert(key, wrap(resp.clone()));
        }
        resp
    }

    // ── Heatmaps & tracks ─────────────────────────────────────────────────────

    /// Live heatmap over the loaded points at `resolution` (defaults to the
    /// store's heatmap resolution).
    pub fn heatmap(&self, q: &PointQuery, resolution: Option<f64>) -> QueryResponse<Vec<HeatmapPoint>> {
        let resolution = resolution.unwrap_or(self.store.heatmap_resolution());
        let top_n = self.config.query.heatmap_top_n;
        self.with_points("heatmap", q, |points, _| {
            validate_resolution(resolution)?;
            Ok(grid_heatmap(points, resolution, top_n))
        })
    }

    /// Merge the persisted day or hour heatmaps overlapping the range.
    pub fn precomputed_heatmap(&self, q: &PointQuery, kind: HeatmapKind) -> QueryResponse<Vec<HeatmapPoint>> {
        let result = q.range().and_then(|requested| {
            let plan = plan_read(&self.store, requested, None, self.config.query.max_span_secs);
            let meta = QueryMeta::from_plan(&plan);
            let Some(effective) = plan.effective else {
                return Ok((Vec::new(), meta));
            };
            let starts: Vec<i64> = match kind {
                HeatmapKind::Daily => effective.day_buckets().map(|d| d.start()).collect(),
                HeatmapKind::Hourly => effective.hour_buckets().map(|h| h.start()).collect(),
            };
            let mut merged = SpatialGridIndex::new(self.store.heatmap_resolution());
            for start in starts {
                q.cancel.check()?;
                if let Some(grid) = self.store.heatmap(kind, start)? {
                    merged.merge(&grid);
                }
            }
            Ok((from_grid(&merged, self.config.query.heatmap_top_n), meta))
        });
        self.respond("precomputed_heatmap", result)
    }

    /// Whole-domain grid at the maintained resolution nearest `resolution`.
    pub fn grid_snapshot(&self, resolution: f64) -> QueryResponse<Vec<HeatmapPoint>> {
        let result = match self.store.nearest_resolution(resolution) {
            Some(res) => self
                .store
                .spatial_grid(res)
                .map(|grid| (from_grid(&grid, self.config.query.heatmap_top_n), QueryMeta::default()))
                .map_err(QueryError::from),
            None => Ok((Vec::new(), QueryMeta::default())),
        };
        self.respond("grid_snapshot", result)
    }

    pub fn tracks(&self, q: &PointQuery) -> QueryResponse<Vec<VehicleTrack>> {
        let cap = self.config.query.max_track_vehicles;
        self.with_points("tracks", q, |points, _| {
            let (tracks, dropped) = build_tracks(points, cap);
            if dropped {
                debug!(cap, "track vehicles capped");
            }
            Ok(tracks)
        })
    }

    pub fn traffic_overview(&self, q: &PointQuery) -> QueryResponse<TrafficOverview> {
        let offset = self.config.road.local_offset_secs;
        self.with_points("traffic_overview", q, |points, _| Ok(traffic_overview(points, offset)))
    }

    // ── Time-sliced views ─────────────────────────────────────────────────────

    /// Heatmap frames of `params.frame_minutes` across the range.
    pub fn dynamic_heatmap(&self, q: &PointQuery, params: &FrameParams) -> QueryResponse<Vec<HeatFrame>> {
        let offset = self.config.road.local_offset_secs;
        self.with_points("dynamic_heatmap", q, |points, _| {
            params.validate()?;
            Ok(dynamic_heatmap(points, params, offset))
        })
    }

    /// Frames plus time-series and spatial statistics.  `None` data when the
    /// range holds no points.
    pub fn spatiotemporal_heatmap(
        &self,
        q: &PointQuery,
        params: &FrameParams,
    ) -> QueryResponse<Option<SpatiotemporalReport>> {
        let offset = self.config.road.local_offset_secs;
        self.with_points("spatiotemporal_heatmap", q, |points, _| {
            params.validate()?;
            Ok(spatiotemporal_heatmap(points, params, offset))
        })
    }

    /// Distinct vehicles per local day, split by weekday and weekend.  Ranges
    /// are capped at `max_weekly_span_secs` instead of the usual span.
    pub fn weekly_passenger_flow(&self, q: &PointQuery) -> QueryResponse<Option<WeeklyFlowReport>> {
        let offset = self.config.road.local_offset_secs;
        let span = self.config.query.max_weekly_span_secs;
        self.with_points_over("weekly_passenger_flow", q, span, |points, _| {
            Ok(weekly_passenger_flow(points, offset))
        })
    }

    // ── Anomalies ─────────────────────────────────────────────────────────────

    /// Run the requested detectors and summarize what they found.
    pub fn detect_anomalies(&self, q: &PointQuery, request: &AnomalyRequest) -> QueryResponse<AnomalyReport> {
        let extra = serde_json::to_string(request).unwrap_or_default();
        self.cached(
            q.cache_key("anomalies", &extra),
            |c| match c {
                CachedResult::Anomalies(r) => Some(r),
                _ => None,
            },
            CachedResult::Anomalies,
            || {
                self.with_points("detect_anomalies", q, |points, _| {
                    let thresholds = request.thresholds.as_ref().unwrap_or(&self.config.anomaly);
                    thresholds.validate()?;
                    let anomalies = detect_anomalies(points, &request.kinds, thresholds);
                    debug!(found = anomalies.len(), "anomaly detection finished");
                    Ok(AnomalyReport {
                        statistics: anomaly_statistics(&anomalies, self.config.road.local_offset_secs),
                        heatmap: anomaly_heatmap(&anomalies, thresholds.heatmap_resolution),
                        anomalies,
                    })
                })
            },
        )
    }

    // ── Clustering ────────────────────────────────────────────────────────────

    fn cluster_input(&self, points: &[TrajectoryPoint], cluster_type: ClusterType) -> Vec<WeightedPoint> {
        let cap = self.config.query.cluster_point_cap;
        match cluster_type {
            ClusterType::Pickup | ClusterType::Dropoff => {
                let (trips, _) = TripExtractor::from_config(&self.config.od).extract(points);
                let ends: Vec<WeightedPoint> = trips
                    .iter()
                    .map(|t| if cluster_type == ClusterType::Pickup { &t.origin } else { &t.destination })
                    .map(|e| WeightedPoint::unit(e.lat, e.lng))
                    .collect();
                uniform_indices(ends.len(), cap).into_iter().map(|i| ends[i]).collect()
            }
            ClusterType::Hotspot => uniform_indices(points.len(), cap)
                .into_iter()
                .map(|i| WeightedPoint::unit(points[i].lat, points[i].lng))
                .collect(),
        }
    }

    /// Cluster trip origins (pickup), destinations (dropoff), or raw points
    /// (hotspot).  Unknown algorithms and invalid parameters fail the call.
    pub fn clusters(&self, q: &PointQuery, request: &ClusterRequest) -> QueryResponse<ClusterReport> {
        let extra = serde_json::to_string(request).unwrap_or_default();
        self.cached(
            q.cache_key("clusters", &extra),
            |c| match c {
                CachedResult::Clusters(r) => Some(r),
                _ => None,
            },
            CachedResult::Clusters,
            || {
                self.with_points("clusters", q, |points, _| {
                    let algorithm = ClusterAlgorithm::resolve(&request.algorithm, &request.params)?;
                    let input = self.cluster_input(points, request.cluster_type);
                    q.cancel.check()?;
                    let outcome = cluster_data(&input, &algorithm)?;
                    let clusters = analyze_clusters(&input, &outcome.labels, request.cluster_type)?;
                    Ok(ClusterReport { algorithm: Some(outcome.algorithm), metrics: outcome.metrics, clusters })
                })
            },
        )
    }

    /// Grid-search parameters for `algorithm` over the query's points.
    pub fn optimize_clusters(
        &self,
        q: &PointQuery,
        algorithm: &str,
        cluster_type: ClusterType,
    ) -> QueryResponse<Option<SearchOutcome>> {
        self.with_points("optimize_clusters", q, |points, _| {
            let kind: AlgorithmKind = algorithm.parse()?;
            let input = self.cluster_input(points, cluster_type);
            Ok(Some(optimize_params(&input, kind, None)))
        })
    }

    // ── OD ────────────────────────────────────────────────────────────────────

    pub fn od_pairs(&self, q: &PointQuery) -> QueryResponse<OdPairs> {
        self.with_points("od_pairs", q, |points, _| {
            let (trips, report) = TripExtractor::from_config(&self.config.od).extract(points);
            Ok(OdPairs { trips, report })
        })
    }

    pub fn od_flows(&self, q: &PointQuery) -> QueryResponse<OdFlows> {
        let od = &self.config.od;
        self.with_points("od_flows", q, |points, _| {
            let (trips, _) = TripExtractor::from_config(od).extract(points);
            let top = top_flows(&trips, od.top_flow_precision_deg, od.top_flow_count)?;
            Ok(match flow_matrix(&trips, od.flow_grid_deg)? {
                Some(m) => OdFlows {
                    grid: Some(*m.grid()),
                    entries: m.entries(),
                    total_flows: m.total_flows(),
                    top_flows: top,
                },
                None => OdFlows { top_flows: top, ..OdFlows::default() },
            })
        })
    }

    /// `None` data when the range holds no points.
    pub fn od_statistics(&self, q: &PointQuery) -> QueryResponse<Option<OdStatistics>> {
        self.cached(
            q.cache_key("od_statistics", ""),
            |c| match c {
                CachedResult::OdStatistics(r) => Some(r),
                _ => None,
            },
            CachedResult::OdStatistics,
            || {
                self.with_points("od_statistics", q, |points, _| {
                    if points.is_empty() {
                        return Ok(None);
                    }
                    let (trips, _) = TripExtractor::from_config(&self.config.od).extract(points);
                    Ok(Some(od_statistics(&trips, &self.config.od)?))
                })
            },
        )
    }

    // ── Road traffic ──────────────────────────────────────────────────────────

    /// Segment statistics, bottlenecks, and network-level summaries.
    /// Empty without a road network.
    pub fn segment_report(&self, q: &PointQuery) -> QueryResponse<SegmentReport> {
        self.cached(
            q.cache_key("segments", ""),
            |c| match c {
                CachedResult::Segments(r) => Some(r),
                _ => None,
            },
            CachedResult::Segments,
            || {
                self.with_points("segment_report", q, |points, meta| {
                    let Some(range) = meta.effective else {
                        return Ok(SegmentReport::default());
                    };
                    if self.network.is_empty() {
                        return Ok(SegmentReport::default());
                    }
                    let road = &self.config.road;
                    let samples = TrafficAnalyzer::new(&self.network, road)?.analyze(points);
                    q.cancel.check()?;
                    let statistics = segment_statistics(&samples, range, road);
                    let bottlenecks = identify_bottlenecks(&statistics, &road.bottleneck);
                    Ok(SegmentReport {
                        summary: network_summary(&statistics, &samples, &bottlenecks),
                        speed_distribution: speed_distribution(&samples),
                        hourly_patterns: hourly_patterns(&samples, road.local_offset_secs),
                        statistics,
                        bottlenecks,
                    })
                })
            },
        )
    }

    /// Composite congestion over trip pickups, binned at the match cell size.
    pub fn order_congestion(&self, q: &PointQuery) -> QueryResponse<Vec<OrderCongestionCell>> {
        self.with_points("order_congestion", q, |points, meta| {
            let Some(range) = meta.effective else {
                return Ok(Vec::new());
            };
            let (trips, _) = TripExtractor::from_config(&self.config.od).extract(points);
            let orders: Vec<OrderSample> = trips.iter().map(order_sample).collect();
            let hours = range.span_secs() as f64 / HOUR_SECS as f64;
            let classifier = CompositeClassifier::from_config(&self.config.road);
            Ok(order_congestion(&orders, self.config.road.match_cell_deg, hours, &classifier)?)
        })
    }
}

fn order_sample(trip: &Trip) -> OrderSample {
    OrderSample {
        pickup: trip.origin.position(),
        pickup_time: trip.start_time(),
        distance_km: trip.distance_km,
        duration_secs: trip.duration_secs,
    }
}
