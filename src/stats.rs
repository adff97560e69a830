//! Run statistics.
//!
//! Counts what a run fetched and how each game was handled, so a report can
//! state how many games fed its averages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters for one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Games bucketed (fetched or served from cache)
    pub games_observed: u64,
    /// Games whose fetch returned no posts
    pub empty_games: u64,
    /// Fetch calls issued to the post source
    pub fetches: u64,
    /// Posts returned across all fetches
    pub posts_fetched: u64,
    /// Posts dropped because another anchor already returned them
    pub duplicates_dropped: u64,
    /// Games served from the bucket cache
    pub cache_hits: u64,
    /// Run start time
    pub started_at: DateTime<Utc>,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            games_observed: 0,
            empty_games: 0,
            fetches: 0,
            posts_fetched: 0,
            duplicates_dropped: 0,
            cache_hits: 0,
            started_at: Utc::now(),
        }
    }

    /// Record a single fetch call and how many posts it returned.
    pub fn record_fetch(&mut self, posts: u64) {
        self.fetches += 1;
        self.posts_fetched += posts;
    }

    pub fn record_duplicates(&mut self, count: u64) {
        self.duplicates_dropped += count;
    }

    /// Record a bucketed game.
    pub fn record_game(&mut self, empty: bool) {
        self.games_observed += 1;
        if empty {
            self.empty_games += 1;
        }
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    /// Seconds since the run started.
    pub fn elapsed_secs(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        format!(
            "Run Statistics:\n\
             - Games observed: {}\n\
             - Games with no posts: {}\n\
             - Fetch calls: {}\n\
             - Posts fetched: {}\n\
             - Duplicate posts dropped: {}\n\
             - Cache hits: {}\n\
             - Total runtime: {:.2} seconds",
            self.games_observed,
            self.empty_games,
            self.fetches,
            self.posts_fetched,
            self.duplicates_dropped,
            self.cache_hits,
            self.elapsed_secs()
        )
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}
