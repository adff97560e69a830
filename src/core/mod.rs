//! Core functionality for attention aggregation.
//!
//! This module contains:
//! - Anchor construction for team pairs
//! - Window declaration, timezone-aware flooring and query ranges
//! - Bucketing of post timestamps relative to kickoff
//! - Cross-game reduction (sum / mean with a skip-empty policy)
//! - Diagnostic scans (zero attention, concentration, field tallies)
//! - The aggregator that drives a post source through all of the above

pub mod aggregator;
pub mod anchors;
pub mod bucketing;
pub mod diagnostics;
pub mod reduction;
pub mod windowing;

// Re-export commonly used types
pub use aggregator::{AggregationParams, AggregatorError, AttentionAggregator};
pub use anchors::{anchors, game_anchors};
pub use bucketing::{bucket_timestamps, BucketMap, Observation};
pub use diagnostics::{flag_zero_attention, tally_field, Concentration, ZeroAttentionGame};
pub use reduction::{Accumulator, AggregateResult, Grouping, KeyAggregate, Reduction, ReportKey};
pub use windowing::{resolve_local, BinWidth, Offset, QueryRange, Window, WindowError, WindowUnit};
