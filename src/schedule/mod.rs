//! Game schedules.
//!
//! The aggregator reads games through the [`ScheduleProvider`] trait so the
//! CSV loader can be swapped for an in-memory list in tests.

pub mod game_stats;
pub mod loader;
pub mod types;

use std::path::PathBuf;
use thiserror::Error;

// Re-export commonly used types
pub use game_stats::{load_game_stats, read_game_stats, GameStats};
pub use loader::{load_games, read_games};
pub use types::{Game, GameFilter, Outcome};

/// Errors raised while loading a schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: malformed row: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("line {line}: missing required field `{field}`")]
    MissingField { line: u64, field: &'static str },

    #[error("line {line}: invalid {field} `{value}`")]
    InvalidField {
        line: u64,
        field: &'static str,
        value: String,
    },
}

/// Source of scheduled games.
pub trait ScheduleProvider {
    /// Return every game known to the provider.
    fn games(&self) -> Result<Vec<Game>, ScheduleError>;
}

impl ScheduleProvider for Vec<Game> {
    fn games(&self) -> Result<Vec<Game>, ScheduleError> {
        Ok(self.clone())
    }
}

/// Schedule read from a CSV file on each call.
#[derive(Debug, Clone)]
pub struct CsvSchedule {
    path: PathBuf,
}

impl CsvSchedule {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ScheduleProvider for CsvSchedule {
    fn games(&self) -> Result<Vec<Game>, ScheduleError> {
        load_games(&self.path)
    }
}
