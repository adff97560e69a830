//! Cross-game reduction of bucket maps.
//!
//! An [`Accumulator`] sums bucket maps per reporting key and tracks how many
//! games contributed. Games whose fetch came back empty either count as zero
//! observations or are left out of the denominator entirely, depending on
//! the skip-empty policy chosen for the aggregation.

use crate::core::bucketing::Observation;
use crate::core::windowing::{Offset, Window};
use crate::schedule::Game;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How per-offset totals are reduced across games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    /// Running total per offset
    Sum,
    /// Total divided by the number of contributing games
    Mean,
}

/// Key results are reported under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReportKey {
    Global,
    Week(u32),
    SeasonWeek { season: i32, week: u32 },
    Team(String),
}

impl fmt::Display for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKey::Global => write!(f, "all games"),
            ReportKey::Week(week) => write!(f, "week {week}"),
            ReportKey::SeasonWeek { season, week } => write!(f, "{season} week {week}"),
            ReportKey::Team(team) => write!(f, "{team}"),
        }
    }
}

/// How games map onto report keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Global,
    Week,
    SeasonWeek,
    /// Each game counts once for each of its two teams
    Team,
}

impl Grouping {
    pub fn keys(self, game: &Game) -> Vec<ReportKey> {
        match self {
            Grouping::Global => vec![ReportKey::Global],
            Grouping::Week => vec![ReportKey::Week(game.week)],
            Grouping::SeasonWeek => vec![ReportKey::SeasonWeek {
                season: game.season,
                week: game.week,
            }],
            Grouping::Team => {
                let mut keys = vec![ReportKey::Team(game.away_team.clone())];
                if game.home_team != game.away_team {
                    keys.push(ReportKey::Team(game.home_team.clone()));
                }
                keys
            }
        }
    }
}

/// Running totals for one report key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyTotals {
    totals: BTreeMap<Offset, u64>,
    contributing: usize,
    skipped_empty: usize,
}

impl KeyTotals {
    fn new(window: &Window) -> Self {
        Self {
            totals: window.offsets().map(|o| (o, 0)).collect(),
            contributing: 0,
            skipped_empty: 0,
        }
    }
}

/// Accumulates observations per report key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulator {
    window: Window,
    skip_empty_observations: bool,
    keys: BTreeMap<ReportKey, KeyTotals>,
}

impl Accumulator {
    pub fn new(window: Window, skip_empty_observations: bool) -> Self {
        Self {
            window,
            skip_empty_observations,
            keys: BTreeMap::new(),
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Fold one observation into `key`.
    ///
    /// An empty observation still registers the key, so it shows up in the
    /// result with zero totals even if nothing else contributes.
    pub fn add(&mut self, key: ReportKey, observation: &Observation) {
        let entry = self
            .keys
            .entry(key)
            .or_insert_with(|| KeyTotals::new(&self.window));

        if observation.is_empty() && self.skip_empty_observations {
            entry.skipped_empty += 1;
            return;
        }

        for (offset, count) in observation.buckets.iter() {
            if let Some(total) = entry.totals.get_mut(&offset) {
                *total += count;
            }
        }
        entry.contributing += 1;
    }

    /// Merge another accumulator over the same window into this one.
    pub fn merge(&mut self, other: Accumulator) {
        for (key, theirs) in other.keys {
            let ours = self
                .keys
                .entry(key)
                .or_insert_with(|| KeyTotals::new(&self.window));
            for (offset, count) in theirs.totals {
                if let Some(total) = ours.totals.get_mut(&offset) {
                    *total += count;
                }
            }
            ours.contributing += theirs.contributing;
            ours.skipped_empty += theirs.skipped_empty;
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &ReportKey> {
        self.keys.keys()
    }

    /// Per-offset totals for `key`.
    pub fn totals(&self, key: &ReportKey) -> Option<&BTreeMap<Offset, u64>> {
        self.keys.get(key).map(|k| &k.totals)
    }

    /// Number of games counted in the denominator for `key`.
    pub fn contributing(&self, key: &ReportKey) -> usize {
        self.keys.get(key).map_or(0, |k| k.contributing)
    }

    /// Reduce every key.
    ///
    /// A mean over zero contributing games is reported as all zeros.
    pub fn reduce(&self, reduction: Reduction) -> AggregateResult {
        let rows = self
            .keys
            .iter()
            .map(|(key, totals)| {
                let values = totals
                    .totals
                    .iter()
                    .map(|(offset, total)| {
                        let value = match reduction {
                            Reduction::Sum => *total as f64,
                            Reduction::Mean if totals.contributing == 0 => 0.0,
                            Reduction::Mean => *total as f64 / totals.contributing as f64,
                        };
                        (*offset, value)
                    })
                    .collect();
                let row = KeyAggregate {
                    values,
                    contributing: totals.contributing,
                    skipped_empty: totals.skipped_empty,
                };
                (key.clone(), row)
            })
            .collect();

        AggregateResult {
            reduction,
            window: self.window,
            rows,
        }
    }
}

/// Reduced values for one report key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAggregate {
    pub values: BTreeMap<Offset, f64>,
    pub contributing: usize,
    pub skipped_empty: usize,
}

impl KeyAggregate {
    /// Sum of the reduced values across offsets.
    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }
}

/// Reduced values for every report key.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub reduction: Reduction,
    pub window: Window,
    pub rows: BTreeMap<ReportKey, KeyAggregate>,
}

impl AggregateResult {
    pub fn get(&self, key: &ReportKey) -> Option<&KeyAggregate> {
        self.rows.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bucketing::BucketMap;
    use crate::core::windowing::BinWidth;
    use chrono::Utc;

    fn window() -> Window {
        Window::days(-1, 1).unwrap()
    }

    fn observation(id: &str, counts: [u64; 3]) -> Observation {
        let buckets = BucketMap::from_counts(&window(), &counts).unwrap();
        Observation {
            game_id: id.to_string(),
            away_team: "A".to_string(),
            home_team: "B".to_string(),
            kickoff: Utc::now(),
            fetched: buckets.total(),
            buckets,
        }
    }

    fn at(result: &AggregateResult, key: &ReportKey, index: i64) -> f64 {
        result.get(key).unwrap().values[&Offset::new(index, BinWidth::Day)]
    }

    #[test]
    fn test_sum_is_order_independent() {
        let observations = [
            observation("g1", [1, 4, 0]),
            observation("g2", [0, 2, 3]),
            observation("g3", [5, 0, 1]),
        ];

        let mut forward = Accumulator::new(window(), false);
        for obs in &observations {
            forward.add(ReportKey::Global, obs);
        }
        let mut backward = Accumulator::new(window(), false);
        for obs in observations.iter().rev() {
            backward.add(ReportKey::Global, obs);
        }

        assert_eq!(forward.reduce(Reduction::Sum), backward.reduce(Reduction::Sum));
        let sum = forward.reduce(Reduction::Sum);
        assert_eq!(at(&sum, &ReportKey::Global, -1), 6.0);
        assert_eq!(at(&sum, &ReportKey::Global, 0), 6.0);
        assert_eq!(at(&sum, &ReportKey::Global, 1), 4.0);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let a = observation("g1", [1, 4, 0]);
        let b = observation("g2", [0, 2, 3]);

        let mut single = Accumulator::new(window(), false);
        single.add(ReportKey::Global, &a);
        single.add(ReportKey::Global, &b);

        let mut left = Accumulator::new(window(), false);
        left.add(ReportKey::Global, &a);
        let mut right = Accumulator::new(window(), false);
        right.add(ReportKey::Global, &b);
        left.merge(right);

        assert_eq!(left, single);
    }

    #[test]
    fn test_mean_skip_empty_excludes_from_denominator() {
        let full = observation("g1", [2, 4, 0]);
        let empty = observation("g2", [0, 0, 0]);

        let mut skipping = Accumulator::new(window(), true);
        skipping.add(ReportKey::Global, &full);
        skipping.add(ReportKey::Global, &empty);
        let mean = skipping.reduce(Reduction::Mean);
        assert_eq!(mean.get(&ReportKey::Global).unwrap().contributing, 1);
        assert_eq!(mean.get(&ReportKey::Global).unwrap().skipped_empty, 1);
        assert_eq!(at(&mean, &ReportKey::Global, 0), 4.0);

        let mut counting = Accumulator::new(window(), false);
        counting.add(ReportKey::Global, &full);
        counting.add(ReportKey::Global, &empty);
        let mean = counting.reduce(Reduction::Mean);
        assert_eq!(mean.get(&ReportKey::Global).unwrap().contributing, 2);
        assert_eq!(at(&mean, &ReportKey::Global, 0), 2.0);
        assert_eq!(at(&mean, &ReportKey::Global, -1), 1.0);
    }

    #[test]
    fn test_all_empty_key_reports_zeros() {
        let mut acc = Accumulator::new(window(), true);
        acc.add(ReportKey::Week(3), &observation("g", [0, 0, 0]));
        let mean = acc.reduce(Reduction::Mean);
        let row = mean.get(&ReportKey::Week(3)).unwrap();
        assert_eq!(row.contributing, 0);
        assert_eq!(row.values.len(), 3);
        assert_eq!(row.total(), 0.0);
    }

    #[test]
    fn test_team_grouping_counts_both_teams() {
        let game = crate::schedule::types::fixtures::game("g", "SEA", "SF", "2013-12-08", "16:25");
        assert_eq!(
            Grouping::Team.keys(&game),
            vec![
                ReportKey::Team("SEA".to_string()),
                ReportKey::Team("SF".to_string())
            ]
        );
        assert_eq!(
            Grouping::SeasonWeek.keys(&game),
            vec![ReportKey::SeasonWeek { season: 2013, week: 1 }]
        );
    }
}
