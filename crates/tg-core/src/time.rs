//! Time buckets and ranges.
//!
//! # Design
//!
//! All timestamps are Unix seconds (UTC) held as `i64`.  The partitioning
//! unit is the clock hour:
//!
//!   bucket = floor(ts / 3600) * 3600
//!
//! A bucket is identified by its start timestamp, which is also the integer
//! encoded in partition filenames.  `div_euclid` keeps the mapping correct
//! for pre-epoch timestamps.

use std::fmt;

use chrono::{DateTime, Datelike, Utc, Weekday};

use crate::{CoreError, CoreResult};

pub const HOUR_SECS: i64 = 3_600;
pub const DAY_SECS: i64 = 86_400;

/// Start of the hour bucket containing `ts`.
#[inline]
pub fn bucket_start(ts: i64) -> i64 {
    ts.div_euclid(HOUR_SECS) * HOUR_SECS
}

/// UTC hour of day (0–23).
#[inline]
pub fn hour_of_day(ts: i64) -> u8 {
    (ts.rem_euclid(DAY_SECS) / HOUR_SECS) as u8
}

/// UTC weekday, or `None` when `ts` is outside chrono's representable range.
pub fn weekday(ts: i64) -> Option<Weekday> {
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.weekday())
}

/// `true` for Saturday and Sunday (UTC).
pub fn is_weekend(ts: i64) -> bool {
    matches!(weekday(ts), Some(Weekday::Sat | Weekday::Sun))
}

/// `YYYY-MM-DD HH:MM:SS` rendering for reports.  Falls back to the raw
/// integer when out of range.
pub fn format_utc(ts: i64) -> String {
    match DateTime::<Utc>::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}

// ── HourBucket ────────────────────────────────────────────────────────────────

/// An hour bucket, identified by its start timestamp.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct HourBucket(pub i64);

impl HourBucket {
    /// The bucket containing `ts`.
    #[inline]
    pub fn of(ts: i64) -> Self {
        Self(bucket_start(ts))
    }

    /// First second of the bucket.
    #[inline]
    pub fn start(self) -> i64 {
        self.0
    }

    /// Last second of the bucket (inclusive).
    #[inline]
    pub fn end(self) -> i64 {
        self.0 + HOUR_SECS - 1
    }

    #[inline]
    pub fn next(self) -> Self {
        Self(self.0 + HOUR_SECS)
    }

    pub fn day(self) -> DayBucket {
        DayBucket::of(self.0)
    }

    pub fn hour_of_day(self) -> u8 {
        hour_of_day(self.0)
    }

    /// Time range covered by this bucket.
    pub fn range(self) -> TimeRange {
        TimeRange { start: self.start(), end: self.end() }
    }
}

impl fmt::Display for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── DayBucket ─────────────────────────────────────────────────────────────────

/// A UTC calendar day, identified by its midnight timestamp.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DayBucket(pub i64);

impl DayBucket {
    #[inline]
    pub fn of(ts: i64) -> Self {
        Self(ts.div_euclid(DAY_SECS) * DAY_SECS)
    }

    #[inline]
    pub fn start(self) -> i64 {
        self.0
    }

    pub fn range(self) -> TimeRange {
        TimeRange { start: self.0, end: self.0 + DAY_SECS - 1 }
    }
}

impl fmt::Display for DayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── TimeRange ─────────────────────────────────────────────────────────────────

/// Closed interval `[start, end]` of Unix seconds.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// Validating constructor; rejects `start > end`.
    pub fn new(start: i64, end: i64) -> CoreResult<Self> {
        if start > end {
            return Err(CoreError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn span_secs(&self) -> i64 {
        self.end - self.start
    }

    #[inline]
    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// Overlap with `other`, or `None` if disjoint.
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(TimeRange { start, end })
    }

    /// Clamp the span to at most `max_secs`, keeping `start`.
    ///
    /// Returns the clamped range and whether truncation happened.
    pub fn truncated(&self, max_secs: i64) -> (TimeRange, bool) {
        if self.span_secs() > max_secs {
            (TimeRange { start: self.start, end: self.start + max_secs }, true)
        } else {
            (*self, false)
        }
    }

    /// Every hour bucket intersecting the range, ascending.
    pub fn hour_buckets(&self) -> impl Iterator<Item = HourBucket> {
        let first = bucket_start(self.start);
        let last = bucket_start(self.end);
        (first..=last).step_by(HOUR_SECS as usize).map(HourBucket)
    }

    /// Every day bucket intersecting the range, ascending.
    pub fn day_buckets(&self) -> impl Iterator<Item = DayBucket> {
        let first = DayBucket::of(self.start).0;
        let last = DayBucket::of(self.end).0;
        (first..=last).step_by(DAY_SECS as usize).map(DayBucket)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", format_utc(self.start), format_utc(self.end))
    }
}
