//! Weekly passenger-flow analysis.
//!
//! Flow is counted as distinct vehicles, per local calendar day.  Averages
//! are taken over the days that actually have data, so a missing day lowers
//! `data_completeness_pct` but not the averages.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use tg_core::time::{hour_of_day, DayBucket};
use tg_core::{TrajectoryPoint, VehicleId};

use crate::temporal::{sample_variance, slope, Trend};

// ── Day periods ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPeriod {
    /// 06:00–09:00.
    MorningPeak,
    /// 09:00–17:00.
    Daytime,
    /// 17:00–20:00.
    EveningPeak,
    Night,
}

impl DayPeriod {
    pub fn of_hour(hour: u8) -> Self {
        match hour {
            6..=8 => Self::MorningPeak,
            9..=16 => Self::Daytime,
            17..=19 => Self::EveningPeak,
            _ => Self::Night,
        }
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyFlow {
    /// Local `YYYY-MM-DD`.
    pub date: String,
    /// 0 = Monday.
    pub weekday: u8,
    pub is_weekend: bool,
    pub vehicles: usize,
    pub points: usize,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DayTypeComparison {
    pub weekday_avg: f64,
    pub weekend_avg: f64,
    /// `(weekend − weekday) / weekday × 100`; 0 without weekday data.
    pub difference_pct: f64,
    pub weekday_days: usize,
    pub weekend_days: usize,
    pub weekend_higher: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeekdayFlow {
    pub weekday: u8,
    pub avg_vehicles: f64,
    pub days: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPattern {
    /// Only weekdays with data, Monday first.
    pub days: Vec<WeekdayFlow>,
    pub peak_day: Option<WeekdayFlow>,
    pub lowest_day: Option<WeekdayFlow>,
    pub variance: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyByDayType {
    /// Average distinct vehicles per local hour on weekdays.
    pub weekday: Vec<f64>,
    pub weekend: Vec<f64>,
    pub weekday_peak_hour: Option<u8>,
    pub weekend_peak_hour: Option<u8>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeekFlow {
    pub iso_year: i32,
    pub iso_week: u32,
    pub avg_daily_vehicles: f64,
    /// Sum of the daily vehicle counts.
    pub total_vehicles: usize,
    pub days: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowTrend {
    pub weeks: Vec<WeekFlow>,
    pub slope: f64,
    pub trend: Trend,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodFlow {
    pub weekend: bool,
    pub period: DayPeriod,
    pub avg_vehicles: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeakPeriods {
    pub periods: Vec<PeriodFlow>,
    pub weekday_peak: Option<PeriodFlow>,
    pub weekend_peak: Option<PeriodFlow>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyStatistics {
    pub total_unique_vehicles: usize,
    pub total_points: usize,
    pub analysis_days: usize,
    pub avg_daily_vehicles: f64,
    pub max_daily_vehicles: usize,
    pub min_daily_vehicles: usize,
    pub daily_variance: f64,
    /// Days with data out of seven, capped at 100.
    pub data_completeness_pct: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyFlowReport {
    pub daily: Vec<DailyFlow>,
    pub comparison: DayTypeComparison,
    pub pattern: WeeklyPattern,
    pub hourly: HourlyByDayType,
    pub trend: FlowTrend,
    pub peaks: PeakPeriods,
    pub statistics: WeeklyStatistics,
    pub first_day: String,
    pub last_day: String,
    pub total_weeks: usize,
}

// ── Analysis ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Day<'a> {
    vehicles: FxHashSet<&'a VehicleId>,
    points: usize,
    hours: BTreeMap<u8, FxHashSet<&'a VehicleId>>,
    periods: BTreeMap<DayPeriod, FxHashSet<&'a VehicleId>>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() { 0.0 } else { values.iter().sum::<f64>() / values.len() as f64 }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// First entry with the largest `key`.
fn argmax<T: Copy>(items: impl IntoIterator<Item = T>, key: impl Fn(&T) -> f64) -> Option<T> {
    let mut best: Option<T> = None;
    for item in items {
        if best.as_ref().is_none_or(|b| key(&item) > key(b)) {
            best = Some(item);
        }
    }
    best
}

fn argmin<T: Copy>(items: impl IntoIterator<Item = T>, key: impl Fn(&T) -> f64) -> Option<T> {
    argmax(items, |t| -key(t))
}

/// `None` without points or when no fix maps to a representable date.
pub fn weekly_passenger_flow(points: &[TrajectoryPoint], local_offset_secs: i64) -> Option<WeeklyFlowReport> {
    let mut days: BTreeMap<DayBucket, Day<'_>> = BTreeMap::new();
    let mut all_vehicles = FxHashSet::default();
    for p in points {
        let local = p.timestamp + local_offset_secs;
        let day = days.entry(DayBucket::of(local)).or_default();
        let hour = hour_of_day(local);
        day.vehicles.insert(&p.vehicle_id);
        day.points += 1;
        day.hours.entry(hour).or_default().insert(&p.vehicle_id);
        day.periods.entry(DayPeriod::of_hour(hour)).or_default().insert(&p.vehicle_id);
        all_vehicles.insert(&p.vehicle_id);
    }

    // Calendar facts per day; days chrono cannot represent are dropped.
    let dated: Vec<(&Day<'_>, DateTime<Utc>)> = days
        .iter()
        .filter_map(|(bucket, day)| DateTime::<Utc>::from_timestamp(bucket.start(), 0).map(|dt| (day, dt)))
        .collect();
    let (first, last) = (dated.first()?, dated.last()?);

    let daily: Vec<DailyFlow> = dated
        .iter()
        .map(|(day, dt)| {
            let weekday = dt.weekday().num_days_from_monday() as u8;
            DailyFlow {
                date: dt.format("%Y-%m-%d").to_string(),
                weekday,
                is_weekend: weekday >= 5,
                vehicles: day.vehicles.len(),
                points: day.points,
            }
        })
        .collect();
    let counts: Vec<f64> = daily.iter().map(|d| d.vehicles as f64).collect();

    // Weekday vs weekend.
    let split = |weekend: bool| -> Vec<f64> {
        daily.iter().filter(|d| d.is_weekend == weekend).map(|d| d.vehicles as f64).collect()
    };
    let (wd, we) = (split(false), split(true));
    let (weekday_avg, weekend_avg) = (mean(&wd), mean(&we));
    let comparison = DayTypeComparison {
        weekday_avg: round1(weekday_avg),
        weekend_avg: round1(weekend_avg),
        difference_pct: if weekday_avg > 0.0 { round1((weekend_avg - weekday_avg) / weekday_avg * 100.0) } else { 0.0 },
        weekday_days: wd.len(),
        weekend_days: we.len(),
        weekend_higher: weekend_avg > weekday_avg,
    };

    // Per weekday.
    let mut by_weekday: BTreeMap<u8, Vec<f64>> = BTreeMap::new();
    for d in &daily {
        by_weekday.entry(d.weekday).or_default().push(d.vehicles as f64);
    }
    let weekday_flows: Vec<WeekdayFlow> = by_weekday
        .iter()
        .map(|(&weekday, v)| WeekdayFlow { weekday, avg_vehicles: mean(v), days: v.len() })
        .collect();
    let pattern = WeeklyPattern {
        peak_day: argmax(weekday_flows.iter().copied(), |w| w.avg_vehicles),
        lowest_day: argmin(weekday_flows.iter().copied(), |w| w.avg_vehicles),
        variance: sample_variance(&weekday_flows.iter().map(|w| w.avg_vehicles).collect::<Vec<_>>()),
        days: weekday_flows,
    };

    // Hour of day by day type.
    let mut hour_sums = [[(0.0f64, 0usize); 24]; 2];
    let mut period_sums: BTreeMap<(bool, DayPeriod), Vec<f64>> = BTreeMap::new();
    for ((day, _), flow) in dated.iter().zip(&daily) {
        let slot = usize::from(flow.is_weekend);
        for (&hour, vehicles) in &day.hours {
            let cell = &mut hour_sums[slot][usize::from(hour)];
            cell.0 += vehicles.len() as f64;
            cell.1 += 1;
        }
        for (&period, vehicles) in &day.periods {
            period_sums.entry((flow.is_weekend, period)).or_default().push(vehicles.len() as f64);
        }
    }
    let hourly_avg = |slot: usize| -> Vec<f64> {
        hour_sums[slot].iter().map(|&(sum, n)| if n > 0 { sum / n as f64 } else { 0.0 }).collect()
    };
    let peak_hour = |slot: usize| -> Option<u8> {
        argmax((0..24u8).filter(|&h| hour_sums[slot][usize::from(h)].1 > 0), |&h| {
            let (sum, n) = hour_sums[slot][usize::from(h)];
            sum / n as f64
        })
    };
    let hourly = HourlyByDayType {
        weekday: hourly_avg(0),
        weekend: hourly_avg(1),
        weekday_peak_hour: peak_hour(0),
        weekend_peak_hour: peak_hour(1),
    };

    // ISO weeks.
    let mut by_week: BTreeMap<(i32, u32), Vec<f64>> = BTreeMap::new();
    for ((_, dt), flow) in dated.iter().zip(&daily) {
        let w = dt.iso_week();
        by_week.entry((w.year(), w.week())).or_default().push(flow.vehicles as f64);
    }
    let weeks: Vec<WeekFlow> = by_week
        .into_iter()
        .map(|((iso_year, iso_week), v)| WeekFlow {
            iso_year,
            iso_week,
            avg_daily_vehicles: mean(&v),
            total_vehicles: v.iter().sum::<f64>() as usize,
            days: v.len(),
        })
        .collect();
    let week_slope = slope(&weeks.iter().map(|w| w.avg_daily_vehicles).collect::<Vec<_>>());
    let trend = FlowTrend {
        slope: (week_slope * 100.0).round() / 100.0,
        trend: if weeks.len() > 1 { Trend::from_slope(week_slope, 0.0) } else { Trend::Stable },
        weeks,
    };

    // Day periods.
    let periods: Vec<PeriodFlow> = period_sums
        .into_iter()
        .map(|((weekend, period), v)| PeriodFlow { weekend, period, avg_vehicles: mean(&v) })
        .collect();
    let peak_of = |weekend: bool| argmax(periods.iter().copied().filter(|p| p.weekend == weekend), |p| p.avg_vehicles);
    let peaks = PeakPeriods { weekday_peak: peak_of(false), weekend_peak: peak_of(true), periods };

    let statistics = WeeklyStatistics {
        total_unique_vehicles: all_vehicles.len(),
        total_points: points.len(),
        analysis_days: daily.len(),
        avg_daily_vehicles: round1(mean(&counts)),
        max_daily_vehicles: daily.iter().map(|d| d.vehicles).max().unwrap_or(0),
        min_daily_vehicles: daily.iter().map(|d| d.vehicles).min().unwrap_or(0),
        daily_variance: (sample_variance(&counts) * 100.0).round() / 100.0,
        data_completeness_pct: round1((daily.len() as f64 / 7.0 * 100.0).min(100.0)),
    };

    Some(WeeklyFlowReport {
        first_day: first.1.format("%Y-%m-%d").to_string(),
        last_day: last.1.format("%Y-%m-%d").to_string(),
        total_weeks: trend.weeks.len(),
        daily,
        comparison,
        pattern,
        hourly,
        trend,
        peaks,
        statistics,
    })
}
