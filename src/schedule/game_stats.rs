//! Per-game statistics joined onto modeling rows by `game_id`.
//!
//! The file carries pre-game win percentages and the number of lead changes.
//! Any column may be empty (or `NA`); games missing from the file simply
//! get no statistics.

use crate::schedule::loader::{parse_optional, present};
use crate::schedule::ScheduleError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Statistics for one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub home_win_pct: Option<f64>,
    pub away_win_pct: Option<f64>,
    pub lead_changes: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStatsRow {
    game_id: Option<String>,
    home_win_pct: Option<String>,
    away_win_pct: Option<String>,
    lead_changes: Option<String>,
}

/// Load game statistics from a CSV file, keyed by `game_id`.
pub fn load_game_stats(path: &Path) -> Result<HashMap<String, GameStats>, ScheduleError> {
    let file = File::open(path)?;
    read_game_stats(file)
}

/// Read game statistics from CSV data, keyed by `game_id`.
///
/// A repeated `game_id` keeps its last row.
pub fn read_game_stats<R: Read>(reader: R) -> Result<HashMap<String, GameStats>, ScheduleError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut stats = HashMap::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let raw: RawStatsRow =
            record
                .deserialize(Some(&headers))
                .map_err(|e| ScheduleError::Malformed {
                    line,
                    reason: e.to_string(),
                })?;

        let game_id = present(&raw.game_id)
            .map(str::to_string)
            .ok_or(ScheduleError::MissingField {
                line,
                field: "game_id",
            })?;
        let row = GameStats {
            home_win_pct: parse_optional(&raw.home_win_pct, "home_win_pct", line)?,
            away_win_pct: parse_optional(&raw.away_win_pct, "away_win_pct", line)?,
            lead_changes: parse_optional(&raw.lead_changes, "lead_changes", line)?,
        };
        if stats.insert(game_id.clone(), row).is_some() {
            tracing::warn!(game = %game_id, line, "Repeated game in stats file, keeping the later row");
        }
    }

    tracing::debug!(games = stats.len(), "Loaded game statistics");
    Ok(stats)
}
