//! Configuration for gameday-attention.

use crate::core::Window;
use crate::schedule::GameFilter;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schedule CSV (nflverse `games.csv` layout)
    pub schedule_path: PathBuf,

    /// JSON-lines dump of posts
    pub posts_path: PathBuf,

    /// Directory for bucket caches and exports
    pub data_path: PathBuf,

    /// Whether per-game bucket rows are cached between runs
    pub use_cache: bool,

    /// IANA zone kickoffs are given in (e.g. `US/Eastern`)
    pub timezone: String,

    /// Seasons to analyse
    pub seasons: SeasonRange,

    /// Game type to keep (`REG`, `POST`, ...); `None` keeps every game
    pub game_type: Option<String>,

    /// Drop posts returned by more than one anchor for the same game
    pub dedupe_posts: bool,

    /// Optional per-game statistics CSV joined onto modeling rows
    pub game_stats_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gameday-attention");

        Self {
            schedule_path: PathBuf::from("games.csv"),
            posts_path: PathBuf::from("posts.jsonl"),
            data_path: data_dir,
            use_cache: true,
            timezone: "US/Eastern".to_string(),
            seasons: SeasonRange::default(),
            game_type: Some("REG".to_string()),
            dedupe_posts: true,
            game_stats_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if the file
    /// does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gameday-attention")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(self.cache_dir())?;
        Ok(())
    }

    /// Directory holding bucket caches.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_path.join("cache")
    }

    /// Cache file for a named analysis, e.g. `kickoff-hourly`.
    pub fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir().join(format!("{name}.csv"))
    }

    /// Cache name for `window` under the current timezone and
    /// de-duplication policy.
    pub fn cache_name(&self, window: &Window) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            window.unit,
            window.start,
            window.end,
            window.bin,
            self.timezone.replace('/', "-"),
            if self.dedupe_posts { "dedupe" } else { "raw" }
        )
    }

    /// Parse the configured timezone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }

    /// Game filter built from the season range and game type.
    pub fn game_filter(&self) -> GameFilter {
        GameFilter {
            game_type: self.game_type.clone(),
            seasons: self.seasons.first..=self.seasons.last,
        }
    }

    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        if self.seasons.first > self.seasons.last {
            return Err(ConfigError::InvalidSeasons {
                first: self.seasons.first,
                last: self.seasons.last,
            });
        }
        Ok(())
    }
}

/// Inclusive range of seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRange {
    pub first: i32,
    pub last: i32,
}

impl Default for SeasonRange {
    fn default() -> Self {
        Self {
            first: 2013,
            last: 2017,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown timezone `{0}`")]
    UnknownTimezone(String),

    #[error("Invalid season range {first}..={last}")]
    InvalidSeasons { first: i32, last: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tz().unwrap(), chrono_tz::US::Eastern);
        assert_eq!(config.seasons, SeasonRange { first: 2013, last: 2017 });
        assert_eq!(config.game_type.as_deref(), Some("REG"));
        assert!(config.dedupe_posts);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"timezone": "America/Chicago", "use_cache": false}"#).unwrap();
        assert_eq!(config.tz().unwrap(), chrono_tz::America::Chicago);
        assert!(!config.use_cache);
        assert_eq!(config.seasons, SeasonRange::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir()
            .join("gameday-attention-config-test")
            .join("config.json");
        let mut config = Config::default();
        config.seasons = SeasonRange { first: 2014, last: 2015 };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.game_filter().seasons, 2014..=2015);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        config.timezone = "Mars/Olympus".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::UnknownTimezone(_))));

        let mut config = Config::default();
        config.seasons = SeasonRange { first: 2017, last: 2013 };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSeasons { .. })
        ));
    }

    #[test]
    fn test_cache_name_tracks_dedupe_policy() {
        let window = Window::days(-7, 7).unwrap();
        let mut config = Config::default();
        let deduped = config.cache_name(&window);
        config.dedupe_posts = false;
        let raw = config.cache_name(&window);

        assert_ne!(deduped, raw);
        assert!(deduped.ends_with("US-Eastern_dedupe"));
        assert!(raw.ends_with("US-Eastern_raw"));
        assert!(!raw.contains('/'));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("gameday-attention-no-such-config.json");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }
}
