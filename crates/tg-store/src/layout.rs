//! Filesystem layout of a published store.

use std::fs;
use std::path::{Path, PathBuf};

use tg_core::grid::resolution_label;

use crate::StoreResult;

const PARTITIONS_DIR: &str = "partitions";
const INDEXES_DIR: &str = "indexes";

/// Granularity of a precomputed heatmap file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatmapKind {
    Daily,
    Hourly,
}

/// Resolves every published path from a single root.
#[derive(Clone, Debug)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn partitions_dir(&self) -> PathBuf {
        self.root.join(PARTITIONS_DIR)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join(INDEXES_DIR)
    }

    pub fn vehicle_index_path(&self) -> PathBuf {
        self.index_dir().join("vehicle_index.json")
    }

    pub fn vehicle_stats_path(&self) -> PathBuf {
        self.index_dir().join("vehicle_stats.json")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.index_dir().join("data_summary.json")
    }

    pub fn grid_path(&self, resolution: f64) -> PathBuf {
        self.index_dir()
            .join(format!("spatial_grid_{}.json", resolution_label(resolution)))
    }

    /// `start` is the day or hour bucket start timestamp.
    pub fn heatmap_path(&self, kind: HeatmapKind, start: i64) -> PathBuf {
        let name = match kind {
            HeatmapKind::Daily => format!("heatmap_day_{start}.json"),
            HeatmapKind::Hourly => format!("heatmap_hour_{start}.json"),
        };
        self.index_dir().join(name)
    }

    pub fn ensure_dirs(&self) -> StoreResult<()> {
        fs::create_dir_all(self.partitions_dir())?;
        fs::create_dir_all(self.index_dir())?;
        Ok(())
    }
}
