//! Report shaping: turns aggregate results and observations into the
//! tables and rows the command line prints or exports.

use crate::core::bucketing::Observation;
use crate::core::reduction::{AggregateResult, ReportKey};
use crate::schedule::{Game, GameStats};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::io::Write;
use thiserror::Error;

/// Errors raised while writing reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// ============================================================================
// Kickoff curve
// ============================================================================

/// One point of the attention curve around kickoff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurvePoint {
    pub index: i64,
    /// Signed hours from kickoff to the bin start
    pub hours: f64,
    pub label: String,
    pub value: f64,
}

/// Curve for `key`, ordered by offset.
pub fn curve(result: &AggregateResult, key: &ReportKey) -> Vec<CurvePoint> {
    result
        .get(key)
        .map(|row| {
            row.values
                .iter()
                .map(|(offset, value)| CurvePoint {
                    index: offset.index(),
                    hours: offset.hours(),
                    label: offset.label(),
                    value: *value,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Global kickoff curve.
pub fn kickoff_curve(result: &AggregateResult) -> Vec<CurvePoint> {
    curve(result, &ReportKey::Global)
}

pub fn kickoff_curve_table(points: &[CurvePoint]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<14} {:>8} {:>12}", "offset", "hours", "posts");
    for point in points {
        let _ = writeln!(
            out,
            "{:<14} {:>8.1} {:>12.2}",
            point.label, point.hours, point.value
        );
    }
    out
}

// ============================================================================
// Weekly attention
// ============================================================================

/// Per (season, week) attention totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeeklyTotals {
    pub totals: BTreeMap<(i32, u32), f64>,
}

impl WeeklyTotals {
    /// Collect the season/week rows of `result`; other keys are ignored.
    pub fn from_result(result: &AggregateResult) -> Self {
        let totals = result
            .rows
            .iter()
            .filter_map(|(key, row)| match key {
                ReportKey::SeasonWeek { season, week } => Some(((*season, *week), row.total())),
                _ => None,
            })
            .collect();
        Self { totals }
    }

    /// Week to mean of that week's total over the seasons that played it.
    pub fn average_across_seasons(&self) -> BTreeMap<u32, f64> {
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for (&(_, week), total) in &self.totals {
            let entry = sums.entry(week).or_insert((0.0, 0));
            entry.0 += total;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(week, (sum, n))| (week, sum / n as f64))
            .collect()
    }

    /// Season to total attention over all of its weeks.
    pub fn season_totals(&self) -> BTreeMap<i32, f64> {
        let mut seasons = BTreeMap::new();
        for (&(season, _), total) in &self.totals {
            *seasons.entry(season).or_insert(0.0) += total;
        }
        seasons
    }

    pub fn summary(&self) -> Option<AttentionSummary> {
        let values: Vec<f64> = self.totals.values().copied().collect();
        AttentionSummary::from_values(&values)
    }

    pub fn table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:>6} {:>4} {:>12}", "season", "week", "posts");
        for ((season, week), total) in &self.totals {
            let _ = writeln!(out, "{season:>6} {week:>4} {total:>12.0}");
        }

        let _ = writeln!(out, "\nMean across seasons:");
        for (week, mean) in self.average_across_seasons() {
            let _ = writeln!(out, "  week {week:>2}: {mean:>12.1}");
        }

        let _ = writeln!(out, "\nSeason totals:");
        for (season, total) in self.season_totals() {
            let _ = writeln!(out, "  {season}: {total:>12.0}");
        }

        if let Some(summary) = self.summary() {
            let _ = writeln!(out, "\nPer-week totals: {summary}");
        }
        out
    }
}

// ============================================================================
// Team ranking
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRank {
    pub team: String,
    /// Sum of the team's mean curve
    pub score: f64,
    pub games: usize,
}

/// Teams ordered by the sum of their mean curve, highest first.
pub fn team_ranking(result: &AggregateResult) -> Vec<TeamRank> {
    let mut ranks: Vec<TeamRank> = result
        .rows
        .iter()
        .filter_map(|(key, row)| match key {
            ReportKey::Team(team) => Some(TeamRank {
                team: team.clone(),
                score: row.total(),
                games: row.contributing,
            }),
            _ => None,
        })
        .collect();
    ranks.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.team.cmp(&b.team)));
    ranks
}

pub fn team_ranking_table(ranks: &[TeamRank], top: Option<usize>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>4} {:<6} {:>12} {:>6}", "rank", "team", "score", "games");
    for (i, rank) in ranks.iter().take(top.unwrap_or(ranks.len())).enumerate() {
        let _ = writeln!(
            out,
            "{:>4} {:<6} {:>12.2} {:>6}",
            i + 1,
            rank.team,
            rank.score,
            rank.games
        );
    }
    out
}

// ============================================================================
// Modeling rows
// ============================================================================

/// One row per game for downstream regression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRow {
    pub date: NaiveDate,
    pub game_id: String,
    pub season: i32,
    pub week: u32,
    pub weekday: Option<String>,
    pub gametime: String,
    pub home_team: String,
    pub away_team: String,
    pub home_win_pct: Option<f64>,
    pub away_win_pct: Option<f64>,
    #[serde(rename = "num_lead_changes")]
    pub lead_changes: Option<u32>,
    pub total_score: Option<i32>,
    pub score_differential: Option<i32>,
    pub overtime: Option<bool>,
    /// Posts inside the observation window
    pub attention: u64,
}

impl GameRow {
    pub fn new(game: &Game, observation: &Observation) -> Self {
        Self {
            date: game.gameday,
            game_id: game.game_id.clone(),
            season: game.season,
            week: game.week,
            weekday: game.weekday.clone(),
            gametime: game.gametime.format("%H:%M").to_string(),
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            home_win_pct: None,
            away_win_pct: None,
            lead_changes: None,
            total_score: game.outcome.map(|o| o.total_score),
            score_differential: game.outcome.map(|o| o.score_differential()),
            overtime: game.outcome.map(|o| o.overtime),
            attention: observation.buckets.total(),
        }
    }

    pub fn with_stats(mut self, stats: &GameStats) -> Self {
        self.home_win_pct = stats.home_win_pct;
        self.away_win_pct = stats.away_win_pct;
        self.lead_changes = stats.lead_changes;
        self
    }
}

/// Pair games with their observations by game id, keeping schedule order.
///
/// Statistics are left-joined on game id; games absent from `stats` keep
/// empty statistic columns.
pub fn game_rows(
    games: &[Game],
    observations: &[Observation],
    stats: &HashMap<String, GameStats>,
) -> Vec<GameRow> {
    let by_id: BTreeMap<&str, &Observation> = observations
        .iter()
        .map(|o| (o.game_id.as_str(), o))
        .collect();
    games
        .iter()
        .filter_map(|g| {
            let row = GameRow::new(g, by_id.get(g.game_id.as_str())?);
            Some(match stats.get(&g.game_id) {
                Some(s) => row.with_stats(s),
                None => row,
            })
        })
        .collect()
}

/// Write rows as CSV with a header line.
pub fn write_game_rows<W: Write>(writer: W, rows: &[GameRow]) -> Result<(), ReportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

// ============================================================================
// Matchups
// ============================================================================

/// Per-game line for a matchup query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchupLine {
    pub game_id: String,
    pub season: i32,
    pub week: u32,
    pub kickoff: DateTime<Utc>,
    pub away_team: String,
    pub home_team: String,
    pub fetched: u64,
    pub in_window: u64,
    pub total_score: Option<i32>,
    pub score_differential: Option<i32>,
}

pub fn matchup_lines(games: &[Game], observations: &[Observation]) -> Vec<MatchupLine> {
    games
        .iter()
        .zip(observations)
        .map(|(game, obs)| MatchupLine {
            game_id: game.game_id.clone(),
            season: game.season,
            week: game.week,
            kickoff: obs.kickoff,
            away_team: game.away_team.clone(),
            home_team: game.home_team.clone(),
            fetched: obs.fetched,
            in_window: obs.buckets.total(),
            total_score: game.outcome.map(|o| o.total_score),
            score_differential: game.outcome.map(|o| o.score_differential()),
        })
        .collect()
}

pub fn matchup_table(lines: &[MatchupLine]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<18} {:>6} {:>4} {:<11} {:>8} {:>9} {:>6} {:>5}",
        "game", "season", "week", "matchup", "fetched", "in_window", "total", "diff"
    );
    for line in lines {
        let opt = |v: Option<i32>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        let _ = writeln!(
            out,
            "{:<18} {:>6} {:>4} {:<11} {:>8} {:>9} {:>6} {:>5}",
            line.game_id,
            line.season,
            line.week,
            format!("{}@{}", line.away_team, line.home_team),
            line.fetched,
            line.in_window,
            opt(line.total_score),
            opt(line.score_differential)
        );
    }
    out
}

// ============================================================================
// Summary statistics
// ============================================================================

/// Descriptive statistics over a set of attention totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttentionSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; zero for a single value
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl AttentionSummary {
    /// `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let std_dev = if values.len() > 1 {
            values.iter().copied().std_dev()
        } else {
            0.0
        };
        Some(Self {
            count: values.len(),
            mean: values.iter().copied().mean(),
            std_dev,
            min: Statistics::min(values.iter().copied()),
            max: Statistics::max(values.iter().copied()),
        })
    }

    pub fn from_rows(rows: &[GameRow]) -> Option<Self> {
        let values: Vec<f64> = rows.iter().map(|r| r.attention as f64).collect();
        Self::from_values(&values)
    }
}

impl std::fmt::Display for AttentionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n={} mean={:.1} sd={:.1} min={:.0} max={:.0}",
            self.count, self.mean, self.std_dev, self.min, self.max
        )
    }
}

// ============================================================================
// Field tally
// ============================================================================

pub fn tally_table(tally: &[(String, u64)], top: Option<usize>) -> String {
    let mut out = String::new();
    for (value, count) in tally.iter().take(top.unwrap_or(tally.len())) {
        let _ = writeln!(out, "{count:>8}  {value}");
    }
    out
}
