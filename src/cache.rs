//! Keyed on-disk cache of per-game bucket rows.
//!
//! One CSV row per game, keyed by (away team, home team, kickoff). Writes
//! are upserts: re-observing a game replaces its row, so re-running an
//! analysis never duplicates rows. A cache file is bound to one window and
//! one de-duplication policy; the header records both and is checked on
//! open.

use crate::core::bucketing::{BucketMap, Observation};
use crate::core::windowing::{Offset, Window};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const KEY_COLUMNS: [&str; 4] = ["away_team", "home_team", "kickoff", "game_id"];
const KEY_WIDTH: usize = KEY_COLUMNS.len() + 1;

/// Errors raised by the bucket cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cache {path:?} was written for a different window or policy (expected {expected})")]
    WindowMismatch { path: PathBuf, expected: String },

    #[error("cache {path:?} line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

/// Cache key for one game.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub away_team: String,
    pub home_team: String,
    pub kickoff: DateTime<Utc>,
}

impl CacheKey {
    pub fn new(away_team: &str, home_team: &str, kickoff: DateTime<Utc>) -> Self {
        Self {
            away_team: away_team.to_string(),
            home_team: home_team.to_string(),
            kickoff,
        }
    }
}

impl From<&Observation> for CacheKey {
    fn from(obs: &Observation) -> Self {
        Self::new(&obs.away_team, &obs.home_team, obs.kickoff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedRow {
    game_id: String,
    fetched: u64,
    counts: Vec<u64>,
}

/// Bucket rows keyed by game, optionally backed by a CSV file.
#[derive(Debug, Clone)]
pub struct BucketCache {
    path: Option<PathBuf>,
    window: Window,
    dedupe_by_id: bool,
    rows: BTreeMap<CacheKey, CachedRow>,
}

impl BucketCache {
    /// Cache that lives only for this run.
    pub fn in_memory(window: Window, dedupe_by_id: bool) -> Self {
        Self {
            path: None,
            window,
            dedupe_by_id,
            rows: BTreeMap::new(),
        }
    }

    /// Open the cache at `path`, loading existing rows if the file exists.
    pub fn open(
        path: impl Into<PathBuf>,
        window: Window,
        dedupe_by_id: bool,
    ) -> Result<Self, CacheError> {
        let path = path.into();
        let mut cache = Self {
            path: Some(path.clone()),
            window,
            dedupe_by_id,
            rows: BTreeMap::new(),
        };

        if path.exists() {
            cache.load(&path)?;
            tracing::info!(rows = cache.len(), path = %path.display(), "Loaded bucket cache");
        }

        Ok(cache)
    }

    /// Column header for a window and de-duplication policy.
    ///
    /// Raw (non de-duplicated) counts are stored under `fetched_raw`.
    pub fn header(window: &Window, dedupe_by_id: bool) -> Vec<String> {
        let fetched = if dedupe_by_id { "fetched" } else { "fetched_raw" };
        KEY_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(std::iter::once(fetched.to_string()))
            .chain(window.offsets().map(|o| offset_column(&o)))
            .collect()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn dedupe_by_id(&self) -> bool {
        self.dedupe_by_id
    }

    /// Whether rows in this cache are valid for `window` under `dedupe_by_id`.
    pub fn serves(&self, window: &Window, dedupe_by_id: bool) -> bool {
        self.window == *window && self.dedupe_by_id == dedupe_by_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cached observation for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<Observation> {
        let row = self.rows.get(key)?;
        let buckets = BucketMap::from_counts(&self.window, &row.counts)?;
        Some(Observation {
            game_id: row.game_id.clone(),
            away_team: key.away_team.clone(),
            home_team: key.home_team.clone(),
            kickoff: key.kickoff,
            fetched: row.fetched,
            buckets,
        })
    }

    /// Insert or replace the row for an observation.
    pub fn upsert(&mut self, observation: &Observation) {
        let row = CachedRow {
            game_id: observation.game_id.clone(),
            fetched: observation.fetched,
            counts: observation.buckets.counts(),
        };
        self.rows.insert(CacheKey::from(observation), row);
    }

    /// Write every row back to disk. A no-op for in-memory caches.
    ///
    /// The file is written to a sibling temp file and renamed into place.
    pub fn save(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(Self::header(&self.window, self.dedupe_by_id))?;
            for (key, row) in &self.rows {
                let mut record = vec![
                    key.away_team.clone(),
                    key.home_team.clone(),
                    key.kickoff.to_rfc3339(),
                    row.game_id.clone(),
                    row.fetched.to_string(),
                ];
                record.extend(row.counts.iter().map(u64::to_string));
                writer.write_record(&record)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;

        tracing::debug!(rows = self.len(), path = %path.display(), "Saved bucket cache");
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), CacheError> {
        let mut reader = csv::Reader::from_path(path)?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if header != Self::header(&self.window, self.dedupe_by_id) {
            let policy = if self.dedupe_by_id { "deduplicated" } else { "raw" };
            return Err(CacheError::WindowMismatch {
                path: path.to_path_buf(),
                expected: format!("{}, {policy} counts", self.window),
            });
        }

        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let malformed = |reason: String| CacheError::Malformed {
                path: path.to_path_buf(),
                line,
                reason,
            };

            let kickoff = DateTime::parse_from_rfc3339(&record[2])
                .map_err(|e| malformed(format!("kickoff: {e}")))?
                .with_timezone(&Utc);
            let fetched = record[4]
                .parse::<u64>()
                .map_err(|e| malformed(format!("fetched: {e}")))?;
            let counts = record
                .iter()
                .skip(KEY_WIDTH)
                .map(|c| c.parse::<u64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| malformed(format!("bucket count: {e}")))?;

            let key = CacheKey::new(&record[0], &record[1], kickoff);
            self.rows.insert(
                key,
                CachedRow {
                    game_id: record[3].to_string(),
                    fetched,
                    counts,
                },
            );
        }
        Ok(())
    }
}

/// Column name for an offset, e.g. `bin_-5` or `bin_12`.
fn offset_column(offset: &Offset) -> String {
    format!("bin_{}", offset.index())
}
