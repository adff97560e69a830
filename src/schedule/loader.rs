//! CSV schedule loading with validation.
//!
//! Rows are validated as they are read: a missing or malformed required
//! field aborts the load with the offending line number instead of silently
//! dropping the row. Outcome columns may be empty (or `NA`) for games that
//! have not been played.

use crate::schedule::types::{Game, Outcome};
use crate::schedule::ScheduleError;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

const DATE_FORMATS: [&str; 2] = ["%m/%d/%y", "%Y-%m-%d"];
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

/// One raw CSV row. Every column is optional here so that missing values
/// can be reported by name during validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGameRow {
    game_id: Option<String>,
    season: Option<String>,
    game_type: Option<String>,
    week: Option<String>,
    gameday: Option<String>,
    weekday: Option<String>,
    gametime: Option<String>,
    away_team: Option<String>,
    home_team: Option<String>,
    total: Option<String>,
    result: Option<String>,
    overtime: Option<String>,
}

/// Load and validate all games from a CSV file.
pub fn load_games(path: &Path) -> Result<Vec<Game>, ScheduleError> {
    let file = File::open(path)?;
    read_games(file)
}

/// Read and validate all games from CSV data.
pub fn read_games<R: Read>(reader: R) -> Result<Vec<Game>, ScheduleError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut games = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let raw: RawGameRow =
            record
                .deserialize(Some(&headers))
                .map_err(|e| ScheduleError::Malformed {
                    line,
                    reason: e.to_string(),
                })?;
        games.push(raw.validate(line)?);
    }

    tracing::debug!(games = games.len(), "Loaded schedule");
    Ok(games)
}

/// Treat empty cells and `NA` as missing.
pub(super) fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "NA")
}

impl RawGameRow {
    fn validate(self, line: u64) -> Result<Game, ScheduleError> {
        let required = |value: &Option<String>, field: &'static str| {
            present(value)
                .map(str::to_string)
                .ok_or(ScheduleError::MissingField { line, field })
        };
        let invalid = |field: &'static str, value: &str| ScheduleError::InvalidField {
            line,
            field,
            value: value.to_string(),
        };

        let game_id = required(&self.game_id, "game_id")?;
        let away_team = required(&self.away_team, "away_team")?;
        let home_team = required(&self.home_team, "home_team")?;
        let game_type = required(&self.game_type, "game_type")?;

        let season_raw = required(&self.season, "season")?;
        let season = season_raw
            .parse::<i32>()
            .map_err(|_| invalid("season", &season_raw))?;

        let week_raw = required(&self.week, "week")?;
        let week = week_raw
            .parse::<u32>()
            .map_err(|_| invalid("week", &week_raw))?;

        let gameday_raw = required(&self.gameday, "gameday")?;
        let gameday = DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(&gameday_raw, f).ok())
            .ok_or_else(|| invalid("gameday", &gameday_raw))?;

        let gametime_raw = required(&self.gametime, "gametime")?;
        let gametime = TIME_FORMATS
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(&gametime_raw, f).ok())
            .ok_or_else(|| invalid("gametime", &gametime_raw))?;

        let total = parse_optional(&self.total, "total", line)?;
        let result = parse_optional(&self.result, "result", line)?;
        let overtime = parse_optional::<i32>(&self.overtime, "overtime", line)?;

        let outcome = match (total, result) {
            (Some(total_score), Some(result)) => Some(Outcome {
                total_score,
                result,
                overtime: overtime.unwrap_or(0) != 0,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ScheduleError::MissingField { line, field: "result" }),
            (None, Some(_)) => return Err(ScheduleError::MissingField { line, field: "total" }),
        };

        Ok(Game {
            game_id,
            season,
            game_type,
            week,
            gameday,
            weekday: present(&self.weekday).map(str::to_string),
            gametime,
            away_team,
            home_team,
            outcome,
        })
    }
}

pub(super) fn parse_optional<T: FromStr>(
    value: &Option<String>,
    field: &'static str,
    line: u64,
) -> Result<Option<T>, ScheduleError> {
    present(value)
        .map(|v| {
            v.parse::<T>().map_err(|_| ScheduleError::InvalidField {
                line,
                field,
                value: v.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "game_id,season,game_type,week,gameday,weekday,gametime,away_team,home_team,total,result,overtime";

    fn csv(rows: &[&str]) -> String {
        let mut data = String::from(HEADER);
        for row in rows {
            data.push('\n');
            data.push_str(row);
        }
        data
    }

    #[test]
    fn test_load_valid_rows() {
        let data = csv(&[
            "2013_01_NYG_DAL,2013,REG,1,09/08/13,Sunday,20:30,NYG,DAL,67,5,0",
            "2013_01_SF_SEA,2013,REG,2,2013-09-15,Sunday,20:30,SF,SEA,32,26,1",
        ]);
        let games = read_games(data.as_bytes()).unwrap();

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].gameday, NaiveDate::from_ymd_opt(2013, 9, 8).unwrap());
        assert_eq!(games[0].gametime, NaiveTime::from_hms_opt(20, 30, 0).unwrap());
        assert_eq!(games[0].weekday.as_deref(), Some("Sunday"));
        assert_eq!(games[1].gameday, NaiveDate::from_ymd_opt(2013, 9, 15).unwrap());
        let outcome = games[1].outcome.unwrap();
        assert_eq!(outcome.total_score, 32);
        assert!(outcome.overtime);
    }

    #[test]
    fn test_unplayed_game_has_no_outcome() {
        let data = csv(&["2025_01_NYG_DAL,2025,REG,1,2025-09-07,Sunday,16:25,NYG,DAL,NA,NA,NA"]);
        let games = read_games(data.as_bytes()).unwrap();
        assert!(games[0].outcome.is_none());
    }

    #[test]
    fn test_missing_field_fails_fast() {
        let data = csv(&[
            "2013_01_NYG_DAL,2013,REG,1,09/08/13,Sunday,20:30,NYG,DAL,67,5,0",
            "2013_01_SF_SEA,2013,REG,1,09/08/13,Sunday,,SF,SEA,32,26,0",
        ]);
        let err = read_games(data.as_bytes()).unwrap_err();
        match err {
            ScheduleError::MissingField { line, field } => {
                assert_eq!(line, 3);
                assert_eq!(field, "gametime");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_value_fails_fast() {
        let data = csv(&["2013_01_NYG_DAL,2013,REG,one,09/08/13,Sunday,20:30,NYG,DAL,67,5,0"]);
        let err = read_games(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::InvalidField { field: "week", .. }
        ));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let data = "game_id,season,game_type,week,gameday,gametime,home_team\n\
                    g1,2013,REG,1,09/08/13,20:30,DAL";
        let err = read_games(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::MissingField { field: "away_team", .. }
        ));
    }
}
