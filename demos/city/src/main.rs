//! city — end-to-end run of the taxigrid pipeline on synthetic data.
//!
//! Writes raw taxi feeds and a road grid, rebuilds the partition store,
//! then runs every analytical query once and prints the responses as JSON.
//!
//! ```text
//! cargo run -p city [-- <store-root> [engine-config.json]]
//! RUST_LOG=debug cargo run -p city
//! ```

mod synth;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tg_cluster::{ClusterType, ParamOverrides};
use tg_query::{AnalyticsEngine, AnomalyRequest, ClusterRequest, EngineConfig, FrameParams, PointQuery, QueryResponse};
use tg_store::{HeatmapKind, IndexBuilder, StoreConfig};

use synth::{road_grid_csv, Fleet};

// ── Constants ─────────────────────────────────────────────────────────────────

const VEHICLES:   usize = 60;
const FEED_FILES: usize = 4;
const HOURS:      i64   = 6;
const SEED:       u64   = 42;
const START:      i64   = 1_225_584_000; // 2008-11-02 00:00 UTC

fn print_json<T: Serialize>(label: &str, resp: &QueryResponse<T>) -> Result<()> {
    println!("── {label} ── success={} message={:?}", resp.success, resp.message);
    println!("{}", serde_json::to_string_pretty(resp)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let root = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("target/taxigrid-city"));
    let mut config = match args.next() {
        Some(path) => EngineConfig::from_json_file(path.as_ref())?,
        None => EngineConfig::default(),
    };
    config.store = StoreConfig { root: root.join("store"), ..config.store };

    // 1. Synthetic inputs.
    let fleet = Fleet { vehicles: VEHICLES, start: START, hours: HOURS, seed: SEED };
    let feeds = fleet.write_feeds(&root.join("raw"), FEED_FILES)?;
    let network_path = root.join("road_network.csv");
    road_grid_csv(&network_path)?;
    config.road_network = Some(network_path);

    // 2. Offline build.
    let t = Instant::now();
    let built = IndexBuilder::new(config.store.clone())?.rebuild(&feeds)?;
    info!(
        partitions = built.partitions.len(),
        accepted = built.report.accepted,
        dropped = built.report.dropped(),
        elapsed_ms = t.elapsed().as_millis() as u64,
        "store rebuilt"
    );

    // 3. Queries.
    let engine = AnalyticsEngine::open(config)?;
    let rush = PointQuery::new(START + 3_600, START + 3 * 3_600);

    print_json("traffic overview", &engine.traffic_overview(&rush))?;
    print_json("heatmap (top 5)", &engine.heatmap(&rush, Some(0.005)).map(|mut h| {
        h.truncate(5);
        h
    }))?;
    print_json("precomputed daily heatmap (top 5)", &engine.precomputed_heatmap(&rush, HeatmapKind::Daily).map(
        |mut h| {
            h.truncate(5);
            h
        },
    ))?;
    print_json("track T0001", &engine.tracks(&rush.clone().vehicle("T0001")))?;

    let pickups = ClusterRequest {
        algorithm: "dbscan".into(),
        params: ParamOverrides { eps_km: Some(0.8), min_samples: Some(3), ..ParamOverrides::default() },
        cluster_type: ClusterType::Pickup,
    };
    print_json("pickup clusters", &engine.clusters(&rush, &pickups).map(|mut r| {
        for c in &mut r.clusters {
            c.members.clear();
        }
        r
    }))?;
    print_json("kmeans search", &engine.optimize_clusters(&rush, "kmeans", ClusterType::Hotspot))?;

    print_json("od statistics", &engine.od_statistics(&rush))?;
    print_json("od flows", &engine.od_flows(&rush))?;
    print_json("segment report", &engine.segment_report(&rush).map(|mut r| {
        r.statistics.truncate(5);
        r
    }))?;
    print_json("order congestion", &engine.order_congestion(&rush))?;

    print_json("anomalies (newest 5)", &engine.detect_anomalies(&rush, &AnomalyRequest::default()).map(|mut r| {
        r.anomalies.truncate(5);
        r.heatmap.truncate(5);
        r
    }))?;
    let frames = FrameParams { frame_minutes: 30, ..FrameParams::default() };
    print_json("spatiotemporal summary", &engine.spatiotemporal_heatmap(&rush, &frames).map(|r| {
        r.map(|r| (r.time_series, r.spatial))
    }))?;
    let whole_feed = PointQuery::new(START, START + HOURS * 3_600);
    print_json("weekly passenger flow", &engine.weekly_passenger_flow(&whole_feed).map(|r| {
        r.map(|r| (r.comparison, r.statistics))
    }))?;

    // Before the feed starts: typed empty result, not an error.
    print_json("out of domain", &engine.tracks(&PointQuery::new(0, 3_600)))?;

    // Same query again is served from cache.
    let again = engine.od_statistics(&rush);
    info!(cached = again.meta.cached, "repeat od statistics");
    println!("{}", serde_json::to_string_pretty(&engine.cache_stats())?);
    Ok(())
}
