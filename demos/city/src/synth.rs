//! Synthetic raw feeds in the taxi CSV format, plus a matching road grid.
//!
//! Each taxi alternates between driving legs (one fix per minute along a
//! fixed heading) and parked spells long enough to register as stops.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use tg_core::units::{coord_to_raw, occupied_to_raw, speed_to_raw};

const CENTER: (f64, f64) = (36.66, 117.02);
const FIX_INTERVAL_SECS: i64 = 60;

pub struct Fleet {
    pub vehicles: usize,
    pub start: i64,
    pub hours: i64,
    pub seed: u64,
}

impl Fleet {
    /// One CSV per vehicle-group under `dir`; returns the written paths.
    pub fn write_feeds(&self, dir: &Path, files: usize) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut bodies = vec![String::from("COMMADDR,UTC,LAT,LON,HEAD,SPEED,TFLAG\n"); files.max(1)];

        let groups = bodies.len();
        for v in 0..self.vehicles {
            self.drive(&format!("T{v:04}"), &mut rng, &mut bodies[v % groups])?;
        }

        let mut paths = Vec::with_capacity(bodies.len());
        for (i, body) in bodies.iter().enumerate() {
            let path = dir.join(format!("feed_{i:02}.csv"));
            fs::write(&path, body)?;
            paths.push(path);
        }
        Ok(paths)
    }

    fn drive(&self, id: &str, rng: &mut SmallRng, out: &mut String) -> Result<()> {
        let end = self.start + self.hours * 3_600;
        let mut t = self.start + rng.gen_range(0..1_800);
        let mut lat = CENTER.0 + rng.gen_range(-0.05..0.05);
        let mut lng = CENTER.1 + rng.gen_range(-0.05..0.05);

        while t < end {
            let occupied = rng.gen_bool(0.6);
            let speed_kmh: f64 = rng.gen_range(15.0..60.0);
            let heading: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
            let step_deg = speed_kmh / 60.0 / 111.0;
            for _ in 0..rng.gen_range(5..25) {
                writeln!(
                    out,
                    "{id},{t},{},{},{},{},{}",
                    coord_to_raw(lat),
                    coord_to_raw(lng),
                    (heading.to_degrees() as i64).rem_euclid(360),
                    speed_to_raw(speed_kmh),
                    occupied_to_raw(occupied)
                )?;
                lat = (lat + step_deg * heading.cos()).clamp(36.55, 36.77);
                lng = (lng + step_deg * heading.sin()).clamp(116.9, 117.15);
                t += FIX_INTERVAL_SECS;
            }
            // Parked: one stationary fix, then silence.
            writeln!(out, "{id},{t},{},{},0,0,0", coord_to_raw(lat), coord_to_raw(lng))?;
            t += rng.gen_range(400..1_500);
        }
        Ok(())
    }
}

/// A lattice of north-south and east-west segments around the centre, in
/// the road-network CSV format.
pub fn road_grid_csv(path: &Path) -> Result<()> {
    let mut out = String::from("ID,Start_X,Start_Y,END_X,END_Y,Length\n");
    let step = 0.01;
    let mut id = 0;
    for i in -5..5 {
        for j in -5..5 {
            let lat = CENTER.0 + f64::from(i) * step;
            let lng = CENTER.1 + f64::from(j) * step;
            let ns_m = step * 111_000.0;
            let ew_m = step * 111_000.0 * lat.to_radians().cos();
            writeln!(out, "{id},{lng:.6},{lat:.6},{lng:.6},{:.6},{ns_m:.1}", lat + step)?;
            writeln!(out, "{},{lng:.6},{lat:.6},{:.6},{lat:.6},{ew_m:.1}", id + 1, lng + step)?;
            id += 2;
        }
    }
    fs::write(path, out)?;
    Ok(())
}
