//! Bucketing post timestamps into window offsets.

use crate::core::windowing::{BinWidth, Offset, Window};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap};

/// Post counts per offset, covering every offset of a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketMap {
    bin: BinWidth,
    counts: BTreeMap<Offset, u64>,
}

impl BucketMap {
    /// A map with every offset of `window` set to zero.
    pub fn zeroed(window: &Window) -> Self {
        Self {
            bin: window.bin,
            counts: window.offsets().map(|o| (o, 0)).collect(),
        }
    }

    /// Rebuild a map from counts listed in offset order.
    ///
    /// Returns `None` if the number of counts does not match the window.
    pub fn from_counts(window: &Window, counts: &[u64]) -> Option<Self> {
        if counts.len() != window.len() {
            return None;
        }
        Some(Self {
            bin: window.bin,
            counts: window.offsets().zip(counts.iter().copied()).collect(),
        })
    }

    pub fn bin(&self) -> BinWidth {
        self.bin
    }

    /// Count at `offset`, or `None` if the offset is outside the window.
    pub fn get(&self, offset: Offset) -> Option<u64> {
        self.counts.get(&offset).copied()
    }

    /// Count at a bin index relative to the reference.
    pub fn at(&self, index: i64) -> Option<u64> {
        self.get(Offset::new(index, self.bin))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Offset, u64)> + '_ {
        self.counts.iter().map(|(o, c)| (*o, *c))
    }

    /// Counts in offset order.
    pub fn counts(&self) -> Vec<u64> {
        self.counts.values().copied().collect()
    }

    /// Sum over all offsets.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Sum over the offsets that fall inside `sub`.
    pub fn total_within(&self, sub: &Window) -> u64 {
        self.iter()
            .filter(|(o, _)| sub.contains(*o))
            .map(|(_, c)| c)
            .sum()
    }
}

/// Bucket timestamps into the bins of `window` around `reference`.
///
/// Timestamps are floored in `tz` into a histogram; each declared offset
/// then looks up its own floored bin start, so the result holds exactly
/// one entry per offset and timestamps outside the window are ignored.
pub fn bucket_timestamps<I>(window: &Window, reference: DateTime<Utc>, tz: Tz, timestamps: I) -> BucketMap
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut histogram: HashMap<DateTime<Utc>, u64> = HashMap::new();
    for ts in timestamps {
        *histogram.entry(window.bin.floor(ts, tz)).or_insert(0) += 1;
    }

    let counts = window
        .bin_starts(reference, tz)
        .map(|(offset, start)| (offset, histogram.get(&start).copied().unwrap_or(0)))
        .collect();

    BucketMap {
        bin: window.bin,
        counts,
    }
}

/// Bucketed attention for one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub game_id: String,
    pub away_team: String,
    pub home_team: String,
    /// Reference timestamp the offsets are relative to
    pub kickoff: DateTime<Utc>,
    /// Posts returned by the source across all anchors (after de-duplication)
    pub fetched: u64,
    pub buckets: BucketMap,
}

impl Observation {
    /// Whether the fetch returned no posts at all.
    pub fn is_empty(&self) -> bool {
        self.fetched == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::US::Eastern;

    fn kickoff() -> DateTime<Utc> {
        Eastern
            .with_ymd_and_hms(2013, 9, 8, 16, 25, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_bucket_map_has_every_offset_without_posts() {
        let window = Window::hours(-5, 24, BinWidth::Hour).unwrap();
        let map = bucket_timestamps(&window, kickoff(), Eastern, Vec::new());
        assert_eq!(map.len(), window.len());
        assert_eq!(map.total(), 0);
        assert_eq!(map, BucketMap::zeroed(&window));
    }

    #[test]
    fn test_half_hour_round_trip() {
        let reference = Eastern
            .with_ymd_and_hms(2013, 9, 8, 13, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let window = Window::hours(-5, 15, BinWidth::HalfHour).unwrap();

        let mut posts = vec![reference + Duration::hours(1); 3];
        posts.extend(vec![reference + Duration::minutes(90); 2]);
        let map = bucket_timestamps(&window, reference, Eastern, posts);

        assert_eq!(map.len(), 41);
        assert_eq!(map.get(Offset::new(2, BinWidth::HalfHour)), Some(3));
        assert_eq!(map.get(Offset::new(3, BinWidth::HalfHour)), Some(2));
        let elsewhere: u64 = map
            .iter()
            .filter(|(o, _)| o.index() != 2 && o.index() != 3)
            .map(|(_, c)| c)
            .sum();
        assert_eq!(elsewhere, 0);
    }

    #[test]
    fn test_posts_outside_window_are_ignored() {
        let window = Window::days(-1, 1).unwrap();
        let posts = vec![kickoff() + Duration::days(5), kickoff()];
        let map = bucket_timestamps(&window, kickoff(), Eastern, posts);
        assert_eq!(map.total(), 1);
        assert_eq!(map.at(0), Some(1));
    }

    #[test]
    fn test_unaligned_kickoff_floors_like_posts() {
        // 16:25 kickoff: a post at 16:05 shares the kickoff hour bin.
        let window = Window::hours(-1, 1, BinWidth::Hour).unwrap();
        let post = Eastern
            .with_ymd_and_hms(2013, 9, 8, 16, 5, 0)
            .unwrap()
            .with_timezone(&Utc);
        let map = bucket_timestamps(&window, kickoff(), Eastern, vec![post]);
        assert_eq!(map.at(0), Some(1));
    }

    #[test]
    fn test_total_within_sub_window() {
        let full = Window::hours(-3, 3, BinWidth::Hour).unwrap();
        let narrow = Window::hours(-1, 1, BinWidth::Hour).unwrap();
        let counts = [1, 1, 2, 5, 2, 1, 1];
        let map = BucketMap::from_counts(&full, &counts).unwrap();
        assert_eq!(map.total(), 13);
        assert_eq!(map.total_within(&narrow), 9);
        assert!(BucketMap::from_counts(&full, &counts[..3]).is_none());
    }
}
