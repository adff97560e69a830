//! Time windows around a reference timestamp.
//!
//! A [`Window`] declares which bins are tracked relative to a reference
//! (usually kickoff): offsets `start*unit ..= end*unit`, stepped by the bin
//! width. All flooring happens in the aggregation timezone through
//! [`BinWidth::floor`], and the query range handed to the post source is
//! derived from the very same bin boundaries, so the first and last bins
//! are always fully covered.
//!
//! Sub-daily bins are offset from the reference by elapsed time; daily bins
//! step through local calendar dates.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset as _, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised when declaring a window.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("window start {start} is after end {end}")]
    Reversed { start: i64, end: i64 },

    #[error("{bin} bins cannot tile a window declared in {unit}s")]
    BinTooWide { unit: WindowUnit, bin: BinWidth },

    #[error("sub-window {inner} is not contained in {outer}")]
    NotContained { inner: String, outer: String },

    #[error("window bound {bound} {unit}s is beyond the supported {max_days} days")]
    OutOfRange {
        bound: i64,
        unit: WindowUnit,
        max_days: i64,
    },
}

/// Largest distance from the reference either window bound may reach.
pub const MAX_WINDOW_DAYS: i64 = 3_660;

/// Width of one bucket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BinWidth {
    Day,
    Hour,
    HalfHour,
}

impl BinWidth {
    /// Bin width in minutes.
    pub fn minutes(self) -> i64 {
        match self {
            BinWidth::Day => 24 * 60,
            BinWidth::Hour => 60,
            BinWidth::HalfHour => 30,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Floor an instant to the start of its bin in `tz`.
    ///
    /// Daily bins start at local midnight. Sub-daily bins are floored on the
    /// local wall clock while keeping the instant's own UTC offset, so the
    /// repeated hour of a fall-back transition yields two distinct bins.
    pub fn floor(self, instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        let local = instant.with_timezone(&tz);
        match self {
            BinWidth::Day => local_midnight(tz, local.date_naive()),
            BinWidth::Hour | BinWidth::HalfHour => {
                let offset_secs = i64::from(local.offset().fix().local_minus_utc());
                let into_bin = (instant.timestamp() + offset_secs).rem_euclid(self.minutes() * 60);
                instant
                    - Duration::seconds(into_bin)
                    - Duration::nanoseconds(i64::from(instant.timestamp_subsec_nanos()))
            }
        }
    }
}

impl fmt::Display for BinWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinWidth::Day => write!(f, "1d"),
            BinWidth::Hour => write!(f, "1h"),
            BinWidth::HalfHour => write!(f, "30min"),
        }
    }
}

/// Unit in which window bounds are declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowUnit {
    Day,
    Hour,
}

impl WindowUnit {
    pub fn minutes(self) -> i64 {
        match self {
            WindowUnit::Day => 24 * 60,
            WindowUnit::Hour => 60,
        }
    }
}

impl fmt::Display for WindowUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowUnit::Day => write!(f, "day"),
            WindowUnit::Hour => write!(f, "hour"),
        }
    }
}

/// Position of a bin relative to the reference, counted in bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset {
    index: i64,
    bin: BinWidth,
}

impl Offset {
    pub fn new(index: i64, bin: BinWidth) -> Self {
        Self { index, bin }
    }

    /// Offset in bins from the reference bin.
    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn bin(&self) -> BinWidth {
        self.bin
    }

    /// Elapsed time from the reference.
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.index * self.bin.minutes())
    }

    /// Offset in hours (fractional for half-hour bins).
    pub fn hours(&self) -> f64 {
        (self.index * self.bin.minutes()) as f64 / 60.0
    }

    /// Human label such as `Kickoff`, `2h before`, `1.5h after`, `3d before`.
    pub fn label(&self) -> String {
        let (amount, suffix, zero) = match self.bin {
            BinWidth::Day => (self.index.abs() as f64, "d", "Gameday"),
            BinWidth::Hour | BinWidth::HalfHour => (self.hours().abs(), "h", "Kickoff"),
        };
        let amount = if amount.fract() == 0.0 {
            format!("{amount:.0}{suffix}")
        } else {
            format!("{amount:.1}{suffix}")
        };
        match self.index {
            0 => zero.to_string(),
            i if i < 0 => format!("{amount} before"),
            _ => format!("{amount} after"),
        }
    }
}

/// Declared set of bins around a reference timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// First offset, in `unit`s (inclusive)
    pub start: i64,
    /// Last offset, in `unit`s (inclusive)
    pub end: i64,
    pub unit: WindowUnit,
    pub bin: BinWidth,
}

impl Window {
    /// Declare a window, checking that it is ordered, bounded and tileable.
    pub fn new(start: i64, end: i64, unit: WindowUnit, bin: BinWidth) -> Result<Self, WindowError> {
        let limit = MAX_WINDOW_DAYS * WindowUnit::Day.minutes() / unit.minutes();
        if let Some(bound) = [start, end].into_iter().find(|b| b.unsigned_abs() > limit as u64) {
            return Err(WindowError::OutOfRange {
                bound,
                unit,
                max_days: MAX_WINDOW_DAYS,
            });
        }
        if start > end {
            return Err(WindowError::Reversed { start, end });
        }
        if bin.minutes() > unit.minutes() {
            return Err(WindowError::BinTooWide { unit, bin });
        }
        Ok(Self {
            start,
            end,
            unit,
            bin,
        })
    }

    /// Daily window, e.g. `days(-7, 7)` for ±1 week around gameday.
    pub fn days(start: i64, end: i64) -> Result<Self, WindowError> {
        Self::new(start, end, WindowUnit::Day, BinWidth::Day)
    }

    /// Hour-bounded window with hourly or half-hourly bins.
    pub fn hours(start: i64, end: i64, bin: BinWidth) -> Result<Self, WindowError> {
        Self::new(start, end, WindowUnit::Hour, bin)
    }

    fn bins_per_unit(&self) -> i64 {
        self.unit.minutes() / self.bin.minutes()
    }

    pub fn first_index(&self) -> i64 {
        self.start * self.bins_per_unit()
    }

    pub fn last_index(&self) -> i64 {
        self.end * self.bins_per_unit()
    }

    /// Every declared offset, in order.
    pub fn offsets(&self) -> impl Iterator<Item = Offset> {
        let bin = self.bin;
        (self.first_index()..=self.last_index()).map(move |i| Offset::new(i, bin))
    }

    /// Number of bins in the window.
    pub fn len(&self) -> usize {
        (self.last_index() - self.first_index() + 1) as usize
    }

    /// Always false: a valid window has at least one bin.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, offset: Offset) -> bool {
        offset.bin == self.bin && (self.first_index()..=self.last_index()).contains(&offset.index)
    }

    /// Check that `self` is a sub-window of `outer` with the same bin width.
    pub fn ensure_within(&self, outer: &Window) -> Result<(), WindowError> {
        let inside = self.bin == outer.bin
            && self.first_index() >= outer.first_index()
            && self.last_index() <= outer.last_index();
        if inside {
            Ok(())
        } else {
            Err(WindowError::NotContained {
                inner: self.to_string(),
                outer: outer.to_string(),
            })
        }
    }

    /// Start instant of the bin at `offset`, for a reference in `tz`.
    pub fn bin_start(&self, reference: DateTime<Utc>, offset: Offset, tz: Tz) -> DateTime<Utc> {
        match self.bin {
            BinWidth::Day => {
                let day = reference.with_timezone(&tz).date_naive();
                local_midnight(tz, shift_days(day, offset.index))
            }
            BinWidth::Hour | BinWidth::HalfHour => self.bin.floor(reference + offset.duration(), tz),
        }
    }

    /// End instant (exclusive) of the bin at `offset`.
    pub fn bin_end(&self, reference: DateTime<Utc>, offset: Offset, tz: Tz) -> DateTime<Utc> {
        match self.bin {
            BinWidth::Day => {
                let day = reference.with_timezone(&tz).date_naive();
                local_midnight(tz, shift_days(day, offset.index + 1))
            }
            BinWidth::Hour | BinWidth::HalfHour => {
                self.bin_start(reference, offset, tz) + self.bin.duration()
            }
        }
    }

    /// Bin start instants for every declared offset.
    pub fn bin_starts(
        &self,
        reference: DateTime<Utc>,
        tz: Tz,
    ) -> impl Iterator<Item = (Offset, DateTime<Utc>)> + '_ {
        self.offsets()
            .map(move |offset| (offset, self.bin_start(reference, offset, tz)))
    }

    /// Query range covering every bin of this window.
    pub fn query_range(&self, reference: DateTime<Utc>, tz: Tz) -> QueryRange {
        let mut boundaries: Vec<DateTime<Utc>> =
            self.bin_starts(reference, tz).map(|(_, start)| start).collect();
        let last = Offset::new(self.last_index(), self.bin);
        boundaries.push(self.bin_end(reference, last, tz));
        QueryRange { boundaries }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:+}, {:+}] {}s @ {}",
            self.start, self.end, self.unit, self.bin
        )
    }
}

/// Ordered bin boundaries handed to a post source.
///
/// Holds every bin start followed by the closing boundary of the last bin;
/// a post belongs to the range when `start <= created_at < end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRange {
    boundaries: Vec<DateTime<Utc>>,
}

impl QueryRange {
    /// Inclusive lower bound.
    pub fn start(&self) -> DateTime<Utc> {
        self.boundaries[0]
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> DateTime<Utc> {
        self.boundaries[self.boundaries.len() - 1]
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start() && instant < self.end()
    }

    /// Every boundary timestamp, in order.
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.boundaries
    }
}

/// Interpret a local wall-clock time in `tz`.
///
/// Ambiguous times (fall-back overlap) pick the standard-time instance;
/// non-existent times (spring-forward gap) are read with the zone's
/// standard offset.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&local) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(earliest, latest) => {
            let chosen = if earliest.offset().dst_offset() == Duration::zero() {
                earliest
            } else {
                latest
            };
            tracing::warn!(%local, tz = %tz, resolved = %chosen, "Ambiguous local time, using standard time");
            chosen
        }
        chrono::LocalResult::None => {
            let standard = tz.offset_from_utc_datetime(&local).base_utc_offset();
            let chosen = tz.from_utc_datetime(&(local - standard));
            tracing::warn!(%local, tz = %tz, resolved = %chosen, "Local time falls in a DST gap, using standard offset");
            chosen
        }
    }
}

fn local_midnight(tz: Tz, day: NaiveDate) -> DateTime<Utc> {
    resolve_local(tz, day.and_time(NaiveTime::MIN)).with_timezone(&Utc)
}

fn shift_days(day: NaiveDate, by: i64) -> NaiveDate {
    let days = Days::new(by.unsigned_abs());
    let shifted = if by >= 0 {
        day.checked_add_days(days)
    } else {
        day.checked_sub_days(days)
    };
    shifted.unwrap_or(day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::US::Eastern;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_window_validation() {
        assert_eq!(
            Window::days(2, -2),
            Err(WindowError::Reversed { start: 2, end: -2 })
        );
        assert!(matches!(
            Window::new(-1, 1, WindowUnit::Hour, BinWidth::Day),
            Err(WindowError::BinTooWide { .. })
        ));
    }

    #[test]
    fn test_window_bounds_are_range_checked() {
        assert_eq!(
            Window::hours(-9_000_000_000_000_000, 24, BinWidth::Hour),
            Err(WindowError::OutOfRange {
                bound: -9_000_000_000_000_000,
                unit: WindowUnit::Hour,
                max_days: MAX_WINDOW_DAYS,
            })
        );
        assert!(matches!(
            Window::days(0, i64::MAX),
            Err(WindowError::OutOfRange { bound: i64::MAX, .. })
        ));
        assert!(matches!(
            Window::days(i64::MIN, 0),
            Err(WindowError::OutOfRange { .. })
        ));
        assert!(Window::days(-MAX_WINDOW_DAYS, MAX_WINDOW_DAYS).is_ok());
        assert!(Window::hours(-24 * MAX_WINDOW_DAYS - 1, 0, BinWidth::Hour).is_err());

        let edge = Window::hours(-24 * MAX_WINDOW_DAYS, 0, BinWidth::Hour).unwrap();
        let range = edge.query_range(utc(2013, 9, 8, 17, 0), Eastern);
        assert_eq!(range.timestamps().len(), edge.len() + 1);
    }

    #[test]
    fn test_window_lengths() {
        assert_eq!(Window::days(-1, 1).unwrap().len(), 3);
        assert_eq!(Window::days(-7, 7).unwrap().len(), 15);
        assert_eq!(Window::hours(-5, 24, BinWidth::Hour).unwrap().len(), 30);
        assert_eq!(Window::hours(-5, 15, BinWidth::HalfHour).unwrap().len(), 41);
        let week_hourly = Window::new(-7, 7, WindowUnit::Day, BinWidth::Hour).unwrap();
        assert_eq!(week_hourly.len(), 337);
        assert_eq!(week_hourly.offsets().count(), 337);
    }

    #[test]
    fn test_offset_labels() {
        assert_eq!(Offset::new(0, BinWidth::Hour).label(), "Kickoff");
        assert_eq!(Offset::new(-2, BinWidth::Hour).label(), "2h before");
        assert_eq!(Offset::new(3, BinWidth::HalfHour).label(), "1.5h after");
        assert_eq!(Offset::new(-3, BinWidth::Day).label(), "3d before");
        assert_eq!(Offset::new(0, BinWidth::Day).label(), "Gameday");
    }

    #[test]
    fn test_floor_half_hour_and_hour() {
        let t = utc(2013, 9, 8, 20, 47);
        assert_eq!(BinWidth::HalfHour.floor(t, Eastern), utc(2013, 9, 8, 20, 30));
        assert_eq!(BinWidth::Hour.floor(t, Eastern), utc(2013, 9, 8, 20, 0));
    }

    #[test]
    fn test_floor_day_uses_local_date() {
        // 02:00 UTC on the 9th is still the evening of the 8th in New York.
        let t = utc(2013, 9, 9, 2, 0);
        assert_eq!(BinWidth::Day.floor(t, Eastern), utc(2013, 9, 8, 4, 0));
    }

    #[test]
    fn test_floor_respects_half_hour_zone_offsets() {
        let t = utc(2013, 9, 8, 20, 10);
        // Kolkata is UTC+05:30, so local hours start at :30 UTC.
        assert_eq!(
            BinWidth::Hour.floor(t, chrono_tz::Asia::Kolkata),
            utc(2013, 9, 8, 19, 30)
        );
    }

    #[test]
    fn test_query_range_covers_first_and_last_bins() {
        let kickoff = utc(2013, 9, 8, 17, 25);
        let window = Window::hours(-5, 24, BinWidth::Hour).unwrap();
        let range = window.query_range(kickoff, Eastern);

        assert_eq!(range.timestamps().len(), window.len() + 1);
        assert_eq!(range.start(), utc(2013, 9, 8, 12, 0));
        assert_eq!(range.end(), utc(2013, 9, 9, 18, 0));
        assert!(range.contains(utc(2013, 9, 8, 12, 5)));
        assert!(range.contains(utc(2013, 9, 9, 17, 59)));
        assert!(!range.contains(utc(2013, 9, 9, 18, 0)));
    }

    #[test]
    fn test_daily_bins_follow_calendar_across_fall_back() {
        // Kickoff just after midnight two days before the 2013-11-03 fall-back.
        let kickoff = Eastern
            .with_ymd_and_hms(2013, 11, 2, 0, 30, 0)
            .unwrap()
            .with_timezone(&Utc);
        let window = Window::days(0, 2).unwrap();

        let starts: Vec<_> = window.bin_starts(kickoff, Eastern).map(|(_, s)| s).collect();
        assert_eq!(
            starts,
            vec![
                utc(2013, 11, 2, 4, 0),
                utc(2013, 11, 3, 4, 0),
                utc(2013, 11, 4, 5, 0),
            ]
        );
        assert_eq!(window.query_range(kickoff, Eastern).end(), utc(2013, 11, 5, 5, 0));
    }

    #[test]
    fn test_resolve_ambiguous_prefers_standard_time() {
        let local = NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let resolved = resolve_local(Eastern, local).with_timezone(&Utc);
        assert_eq!(resolved, utc(2024, 11, 3, 6, 30));
    }

    #[test]
    fn test_resolve_gap_uses_standard_offset() {
        let local = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let resolved = resolve_local(Eastern, local).with_timezone(&Utc);
        assert_eq!(resolved, utc(2024, 3, 10, 7, 30));
    }

    #[test]
    fn test_sub_window_containment() {
        let full = Window::new(-7, 7, WindowUnit::Day, BinWidth::Hour).unwrap();
        let narrow = Window::hours(-72, 72, BinWidth::Hour).unwrap();
        assert!(narrow.ensure_within(&full).is_ok());
        assert!(full.ensure_within(&narrow).is_err());
        let daily = Window::days(-1, 1).unwrap();
        assert!(daily.ensure_within(&full).is_err());
    }
}
