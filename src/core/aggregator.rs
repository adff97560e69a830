//! The attention aggregator.
//!
//! Ties the pieces together for each game: build anchors, derive the query
//! range from the window, fetch from the post source, de-duplicate, bucket
//! relative to kickoff, and fold the result into a reduction. No state is
//! shared between runs other than the optional bucket cache.

use crate::cache::{BucketCache, CacheError, CacheKey};
use crate::core::anchors::game_anchors;
use crate::core::bucketing::{bucket_timestamps, Observation};
use crate::core::diagnostics::{flag_zero_attention, tally_field, Concentration, ZeroAttentionGame};
use crate::core::reduction::{Accumulator, Grouping};
use crate::core::windowing::{QueryRange, Window, WindowError};
use crate::schedule::{Game, GameFilter, ScheduleError, ScheduleProvider};
use crate::source::{Post, PostSource, SourceError};
use crate::stats::RunStats;
use chrono::Utc;
use chrono_tz::Tz;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while aggregating attention.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("fetch failed for game {game_id} ({anchor}): {source}")]
    Fetch {
        game_id: String,
        anchor: String,
        #[source]
        source: SourceError,
    },

    #[error("window error: {0}")]
    Window(#[from] WindowError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Parameters for one aggregation call.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationParams {
    /// Bins tracked around each kickoff
    pub window: Window,
    /// Zone used to read kickoffs and floor post timestamps
    pub timezone: Tz,
    /// Leave games with no posts out of mean denominators
    pub skip_empty_observations: bool,
    /// Drop posts returned by more than one anchor for the same game
    pub dedupe_by_id: bool,
}

impl AggregationParams {
    /// Parameters with US Eastern time, no skipping and de-duplication on.
    pub fn new(window: Window) -> Self {
        Self {
            window,
            timezone: chrono_tz::US::Eastern,
            skip_empty_observations: false,
            dedupe_by_id: true,
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn skip_empty(mut self, skip: bool) -> Self {
        self.skip_empty_observations = skip;
        self
    }

    pub fn dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe_by_id = dedupe;
        self
    }
}

/// Fetches, buckets and reduces attention for scheduled games.
pub struct AttentionAggregator<G, P> {
    schedule: G,
    source: P,
    cache: Option<BucketCache>,
    stats: RunStats,
}

impl<G: ScheduleProvider, P: PostSource> AttentionAggregator<G, P> {
    pub fn new(schedule: G, source: P) -> Self {
        Self {
            schedule,
            source,
            cache: None,
            stats: RunStats::new(),
        }
    }

    /// Serve and store observations through `cache`.
    ///
    /// Cached rows are only used when the call's window and de-duplication
    /// policy match the cache's.
    pub fn with_cache(mut self, cache: BucketCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn cache(&self) -> Option<&BucketCache> {
        self.cache.as_ref()
    }

    /// Persist the cache, if one is attached.
    pub fn save_cache(&self) -> Result<(), AggregatorError> {
        if let Some(cache) = &self.cache {
            cache.save()?;
        }
        Ok(())
    }

    /// Games from the schedule that pass `filter`.
    pub fn games(&self, filter: &GameFilter) -> Result<Vec<Game>, AggregatorError> {
        let games = filter.apply(self.schedule.games()?);
        tracing::info!(games = games.len(), "Selected games");
        Ok(games)
    }

    /// Fetch every post for `game` inside `window`, across both anchors.
    ///
    /// Returns the query range used and the posts, de-duplicated by id when
    /// `params.dedupe_by_id` is set.
    pub fn fetch_posts(
        &mut self,
        game: &Game,
        window: &Window,
        params: &AggregationParams,
    ) -> Result<(QueryRange, Vec<Post>), AggregatorError> {
        self.fetch_anchors(game, &game_anchors(game), window, params)
    }

    /// Fetch posts for `game` under each of `anchors`, in order.
    pub fn fetch_anchors(
        &mut self,
        game: &Game,
        anchors: &[String],
        window: &Window,
        params: &AggregationParams,
    ) -> Result<(QueryRange, Vec<Post>), AggregatorError> {
        let kickoff = game.kickoff(params.timezone).with_timezone(&Utc);
        let range = window.query_range(kickoff, params.timezone);

        let mut posts = Vec::new();
        for anchor in anchors {
            let fetch_error = |source: SourceError| AggregatorError::Fetch {
                game_id: game.game_id.clone(),
                anchor: anchor.clone(),
                source,
            };
            let before = posts.len();
            for post in self.source.fetch(&anchor, &range).map_err(fetch_error)? {
                posts.push(post.map_err(fetch_error)?);
            }
            self.stats.record_fetch((posts.len() - before) as u64);
        }

        if params.dedupe_by_id {
            let before = posts.len();
            let mut seen = HashSet::new();
            posts.retain(|p| match &p.id {
                Some(id) => seen.insert(id.clone()),
                None => true,
            });
            self.stats.record_duplicates((before - posts.len()) as u64);
        }

        Ok((range, posts))
    }

    /// Bucket one game over `params.window`.
    pub fn observe(
        &mut self,
        game: &Game,
        params: &AggregationParams,
    ) -> Result<Observation, AggregatorError> {
        let kickoff = game.kickoff(params.timezone).with_timezone(&Utc);
        let key = CacheKey::new(&game.away_team, &game.home_team, kickoff);

        let cached = self
            .cache
            .as_ref()
            .filter(|c| c.serves(&params.window, params.dedupe_by_id))
            .and_then(|c| c.get(&key));
        if let Some(observation) = cached {
            self.stats.record_cache_hit();
            self.stats.record_game(observation.is_empty());
            return Ok(observation);
        }

        let (_, posts) = self.fetch_posts(game, &params.window, params)?;
        let buckets = bucket_timestamps(
            &params.window,
            kickoff,
            params.timezone,
            posts.iter().map(|p| p.created_at),
        );
        let observation = Observation {
            game_id: game.game_id.clone(),
            away_team: game.away_team.clone(),
            home_team: game.home_team.clone(),
            kickoff,
            fetched: posts.len() as u64,
            buckets,
        };

        tracing::debug!(
            game = %game.game_id,
            fetched = observation.fetched,
            in_window = observation.buckets.total(),
            "Observed game"
        );
        self.stats.record_game(observation.is_empty());

        if let Some(cache) = self
            .cache
            .as_mut()
            .filter(|c| c.serves(&params.window, params.dedupe_by_id))
        {
            cache.upsert(&observation);
        }

        Ok(observation)
    }

    /// Observe every game and fold it into the keys chosen by `grouping`.
    pub fn aggregate(
        &mut self,
        games: &[Game],
        grouping: Grouping,
        params: &AggregationParams,
    ) -> Result<Accumulator, AggregatorError> {
        let mut accumulator = Accumulator::new(params.window, params.skip_empty_observations);
        for game in games {
            let observation = self.observe(game, params)?;
            for key in grouping.keys(game) {
                accumulator.add(key, &observation);
            }
        }
        tracing::info!(
            games = games.len(),
            keys = accumulator.keys().count(),
            "Aggregated attention"
        );
        Ok(accumulator)
    }

    /// Observe every game, returning the observations in schedule order.
    pub fn observe_all(
        &mut self,
        games: &[Game],
        params: &AggregationParams,
    ) -> Result<Vec<Observation>, AggregatorError> {
        games.iter().map(|g| self.observe(g, params)).collect()
    }

    /// Games whose fetch over the full window returned no posts.
    pub fn zero_attention(
        &mut self,
        games: &[Game],
        params: &AggregationParams,
    ) -> Result<Vec<ZeroAttentionGame>, AggregatorError> {
        let observations = self.observe_all(games, params)?;
        Ok(flag_zero_attention(&observations))
    }

    /// Share of attention inside `narrow`, relative to `params.window`.
    ///
    /// Games with no posts contribute nothing to either total.
    pub fn concentration(
        &mut self,
        games: &[Game],
        narrow: &Window,
        params: &AggregationParams,
    ) -> Result<Concentration, AggregatorError> {
        narrow.ensure_within(&params.window)?;

        let mut concentration = Concentration::default();
        for game in games {
            let observation = self.observe(game, params)?;
            if observation.is_empty() {
                continue;
            }
            concentration.add(narrow, &observation);
        }
        Ok(concentration)
    }

    /// Tally `field` across the posts of every game inside `params.window`.
    ///
    /// `extra_anchors` (brand tags such as `#DallasCowboys`) are searched
    /// for every game alongside its two matchup anchors.
    pub fn tally_field(
        &mut self,
        games: &[Game],
        field: &str,
        extra_anchors: &[String],
        params: &AggregationParams,
    ) -> Result<Vec<(String, u64)>, AggregatorError> {
        let mut posts = Vec::new();
        for game in games {
            let mut anchors = game_anchors(game);
            for extra in extra_anchors {
                if !anchors.contains(extra) {
                    anchors.push(extra.clone());
                }
            }
            let (_, game_posts) = self.fetch_anchors(game, &anchors, &params.window, params)?;
            posts.extend(game_posts);
        }
        Ok(tally_field(&posts, field))
    }
}
