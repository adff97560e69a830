//! Schedule types: games, outcomes and the filters applied to them.

use crate::core::windowing::resolve_local;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Final score information for a played game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Combined points of both teams
    pub total_score: i32,
    /// Home score minus away score
    pub result: i32,
    /// Whether the game went to overtime
    pub overtime: bool,
}

impl Outcome {
    /// Absolute margin of victory.
    pub fn score_differential(&self) -> i32 {
        self.result.abs()
    }
}

/// A scheduled game between two teams.
///
/// Kickoff is stored as a local wall-clock date and time; it only becomes an
/// instant once a timezone is applied (see [`Game::kickoff`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    pub season: i32,
    /// Game type code, e.g. `REG` or `POST`
    pub game_type: String,
    pub week: u32,
    pub gameday: NaiveDate,
    pub weekday: Option<String>,
    pub gametime: NaiveTime,
    pub away_team: String,
    pub home_team: String,
    /// `None` for games without a recorded result
    pub outcome: Option<Outcome>,
}

impl Game {
    /// Kickoff as local wall-clock time.
    pub fn kickoff_local(&self) -> NaiveDateTime {
        self.gameday.and_time(self.gametime)
    }

    /// Kickoff as an instant in `tz`.
    ///
    /// Wall-clock times inside a DST gap or overlap resolve to their
    /// standard-time reading.
    pub fn kickoff(&self, tz: Tz) -> DateTime<Tz> {
        resolve_local(tz, self.kickoff_local())
    }

    /// Whether `team` plays in this game.
    pub fn involves(&self, team: &str) -> bool {
        self.away_team == team || self.home_team == team
    }

    /// Whether this game is between `a` and `b`, in either home/away order.
    pub fn is_matchup(&self, a: &str, b: &str) -> bool {
        (self.away_team == a && self.home_team == b) || (self.away_team == b && self.home_team == a)
    }

    /// The opponent of `team`, if `team` plays in this game.
    pub fn opponent_of(&self, team: &str) -> Option<&str> {
        if self.home_team == team {
            Some(&self.away_team)
        } else if self.away_team == team {
            Some(&self.home_team)
        } else {
            None
        }
    }

    /// Order-insensitive matchup key such as `DAL_vs_NYG`.
    pub fn matchup_key(&self) -> String {
        let mut teams = [self.away_team.as_str(), self.home_team.as_str()];
        teams.sort_unstable();
        format!("{}_vs_{}", teams[0], teams[1])
    }
}

/// Selects the games an analysis runs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFilter {
    /// Only keep games of this type (e.g. `REG`); `None` keeps all
    pub game_type: Option<String>,
    /// Inclusive season range
    pub seasons: RangeInclusive<i32>,
}

impl Default for GameFilter {
    fn default() -> Self {
        Self {
            game_type: Some("REG".to_string()),
            seasons: 2013..=2017,
        }
    }
}

impl GameFilter {
    /// Check whether a game passes the filter.
    pub fn matches(&self, game: &Game) -> bool {
        let type_ok = self
            .game_type
            .as_deref()
            .map_or(true, |t| game.game_type == t);
        type_ok && self.seasons.contains(&game.season)
    }

    /// Keep only the games that pass the filter, preserving order.
    pub fn apply(&self, games: Vec<Game>) -> Vec<Game> {
        games.into_iter().filter(|g| self.matches(g)).collect()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::game;
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_matchup_is_order_insensitive() {
        let g = game("2013_01_NYG_DAL", "NYG", "DAL", "2013-09-08", "20:30");
        assert!(g.is_matchup("DAL", "NYG"));
        assert!(g.is_matchup("NYG", "DAL"));
        assert!(!g.is_matchup("DAL", "PHI"));
        assert_eq!(g.matchup_key(), "DAL_vs_NYG");
        assert_eq!(g.opponent_of("DAL"), Some("NYG"));
        assert_eq!(g.opponent_of("PHI"), None);
    }

    #[test]
    fn test_kickoff_uses_local_offset() {
        let g = game("g", "NYG", "DAL", "2013-09-08", "20:30");
        let kickoff = g.kickoff(chrono_tz::US::Eastern);
        assert_eq!(
            kickoff.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2013, 9, 9, 0, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_filter_by_type_and_season() {
        let mut post = game("p", "SEA", "SF", "2014-01-19", "18:30");
        post.game_type = "POST".to_string();
        let mut late = game("l", "SEA", "SF", "2018-09-09", "16:25");
        late.season = 2018;
        let reg = game("r", "SEA", "SF", "2013-12-08", "16:25");

        let kept = GameFilter::default().apply(vec![post, late, reg]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].game_id, "r");
    }

    #[test]
    fn test_score_differential_is_absolute() {
        let outcome = Outcome {
            total_score: 30,
            result: -10,
            overtime: false,
        };
        assert_eq!(outcome.score_differential(), 10);
    }
}
