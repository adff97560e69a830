//! Diagnostic scans over observations.

use crate::core::bucketing::Observation;
use crate::core::windowing::Window;
use crate::source::Post;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// A game whose fetch returned no posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZeroAttentionGame {
    pub game_id: String,
    pub away_team: String,
    pub home_team: String,
    pub kickoff: DateTime<Utc>,
}

/// Flag every observation with zero fetched posts.
pub fn flag_zero_attention<'a, I>(observations: I) -> Vec<ZeroAttentionGame>
where
    I: IntoIterator<Item = &'a Observation>,
{
    observations
        .into_iter()
        .filter(|obs| obs.is_empty())
        .map(|obs| ZeroAttentionGame {
            game_id: obs.game_id.clone(),
            away_team: obs.away_team.clone(),
            home_team: obs.home_team.clone(),
            kickoff: obs.kickoff,
        })
        .collect()
}

/// How much of a game's attention falls close to the event.
///
/// Accumulates post counts inside a narrow sub-window and inside the full
/// window across games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Concentration {
    pub narrow_total: u64,
    pub full_total: u64,
    pub games: usize,
}

impl Concentration {
    /// Add one game's bucket map, observed over the full window.
    pub fn add(&mut self, narrow: &Window, observation: &Observation) {
        self.narrow_total += observation.buckets.total_within(narrow);
        self.full_total += observation.buckets.total();
        self.games += 1;
    }

    /// Narrow total as a percentage of the full total; `None` when the full
    /// window saw no posts.
    pub fn percentage(&self) -> Option<f64> {
        if self.full_total == 0 {
            None
        } else {
            Some(self.narrow_total as f64 / self.full_total as f64 * 100.0)
        }
    }
}

/// Count the values of `field` across posts, most common first.
///
/// Values are trimmed; posts without the field are ignored. Ties are broken
/// alphabetically.
pub fn tally_field<'a, I>(posts: I, field: &str) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = &'a Post>,
{
    let mut counts: HashMap<String, u64> = HashMap::new();
    for value in posts.into_iter().filter_map(|p| p.field(field)) {
        let value = value.trim();
        if !value.is_empty() {
            *counts.entry(value.to_string()).or_insert(0) += 1;
        }
    }

    let mut tally: Vec<(String, u64)> = counts.into_iter().collect();
    tally.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bucketing::BucketMap;
    use crate::core::windowing::BinWidth;

    fn observation(id: &str, window: &Window, counts: &[u64]) -> Observation {
        let buckets = BucketMap::from_counts(window, counts).unwrap();
        Observation {
            game_id: id.to_string(),
            away_team: "A".to_string(),
            home_team: "B".to_string(),
            kickoff: Utc::now(),
            fetched: buckets.total(),
            buckets,
        }
    }

    #[test]
    fn test_flag_only_empty_games() {
        let window = Window::days(-1, 1).unwrap();
        let observations = vec![
            observation("g1", &window, &[1, 0, 0]),
            observation("g2", &window, &[0, 0, 0]),
            observation("g3", &window, &[0, 3, 1]),
        ];
        let flagged = flag_zero_attention(&observations);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].game_id, "g2");
    }

    #[test]
    fn test_concentration_percentage() {
        let full = Window::hours(-2, 2, BinWidth::Hour).unwrap();
        let narrow = Window::hours(-1, 1, BinWidth::Hour).unwrap();

        let mut concentration = Concentration::default();
        assert_eq!(concentration.percentage(), None);

        concentration.add(&narrow, &observation("g1", &full, &[1, 2, 3, 2, 2]));
        concentration.add(&narrow, &observation("g2", &full, &[0, 0, 0, 0, 0]));
        assert_eq!(concentration.narrow_total, 7);
        assert_eq!(concentration.full_total, 10);
        assert_eq!(concentration.games, 2);
        assert!((concentration.percentage().unwrap() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_tally_field() {
        let posts = vec![
            Post::new(Utc::now()).with_field("city_state", "Dallas, TX"),
            Post::new(Utc::now()).with_field("city_state", " Dallas, TX "),
            Post::new(Utc::now()).with_field("city_state", "Austin, TX"),
            Post::new(Utc::now()).with_field("city_state", serde_json::Value::Null),
            Post::new(Utc::now()),
        ];
        let tally = tally_field(&posts, "city_state");
        assert_eq!(
            tally,
            vec![
                ("Dallas, TX".to_string(), 2),
                ("Austin, TX".to_string(), 1)
            ]
        );
    }
}
