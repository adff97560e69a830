//! Gameday Attention - social-media attention windows around sporting events.
//!
//! This library measures how much public attention a scheduled game draws
//! in fixed time bins around its kickoff, then reduces those bins across
//! many games (sum or mean, per week, per team, or globally).
//!
//! # Guarantees
//!
//! - **Declared windows**: every bin a window declares is present in every
//!   bucket map, zero-filled when nothing landed in it
//! - **Closed query range**: the fetch range covers the closing edge of the
//!   last declared bin
//! - **Local-time flooring**: bins follow the wall clock of the kickoff's
//!   timezone, including across DST transitions
//! - **Explicit empties**: games with no posts either count as zeros or are
//!   left out of mean denominators, never silently both
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Gameday Attention                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Schedule   │──▶│  Windowing  │──▶│ Post Source │       │
//! │  │  (games)    │   │ (query rng) │   │  (fetch)    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │  ┌─────────────┐   ┌─────────────┐          ▼               │
//! │  │   Report    │◀──│  Reduction  │◀──┌─────────────┐       │
//! │  │  (tables)   │   │ (sum/mean)  │   │  Bucketing  │──┐    │
//! │  └─────────────┘   └─────────────┘   └─────────────┘  │    │
//! │                                             ▲          ▼    │
//! │                                      ┌─────────────┐        │
//! │                                      │Bucket Cache │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use gameday_attention::{
//!     AggregationParams, AttentionAggregator, CsvSchedule, GameFilter, Grouping,
//!     JsonlSource, Reduction, Window,
//! };
//!
//! let schedule = CsvSchedule::new("games.csv");
//! let source = JsonlSource::open(Path::new("posts.jsonl")).expect("readable dump");
//! let mut aggregator = AttentionAggregator::new(schedule, source);
//!
//! let games = aggregator.games(&GameFilter::default()).expect("schedule");
//! let params = AggregationParams::new(Window::days(-1, 1).expect("valid window"));
//! let _weekly = aggregator
//!     .aggregate(&games, Grouping::Week, &params)
//!     .expect("aggregation")
//!     .reduce(Reduction::Sum);
//! ```

pub mod cache;
pub mod config;
pub mod core;
pub mod report;
pub mod schedule;
pub mod source;
pub mod stats;

// Re-export key types at crate root for convenience
pub use cache::{BucketCache, CacheError, CacheKey};
pub use config::{Config, ConfigError};
pub use core::{
    AggregateResult, AggregationParams, AggregatorError, AttentionAggregator, BinWidth, BucketMap,
    Grouping, Observation, Offset, QueryRange, Reduction, ReportKey, Window, WindowUnit,
};
pub use schedule::{CsvSchedule, Game, GameFilter, GameStats, ScheduleError, ScheduleProvider};
pub use source::{JsonlSource, MemorySource, Post, PostSource, SourceError};
pub use stats::RunStats;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
