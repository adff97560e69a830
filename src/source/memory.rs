//! In-memory post source.

use crate::core::windowing::QueryRange;
use crate::source::{Post, PostSource, PostStream, SourceError};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};

/// Posts held in memory, indexed by the anchor they were filed under.
///
/// Used for tests and for replaying small captured datasets.
#[derive(Debug, Default)]
pub struct MemorySource {
    posts: HashMap<String, Vec<Post>>,
    failing: HashSet<String>,
    fetches: Cell<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a post under `anchor`.
    pub fn insert(&mut self, anchor: impl Into<String>, post: Post) {
        self.posts.entry(anchor.into()).or_default().push(post);
    }

    /// Builder form of [`MemorySource::insert`].
    pub fn with_post(mut self, anchor: impl Into<String>, post: Post) -> Self {
        self.insert(anchor, post);
        self
    }

    /// Make every fetch for `anchor` fail.
    pub fn fail_on(mut self, anchor: impl Into<String>) -> Self {
        self.failing.insert(anchor.into());
        self
    }

    /// Number of fetch calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl PostSource for MemorySource {
    fn fetch<'a>(&'a self, anchor: &str, range: &QueryRange) -> Result<PostStream<'a>, SourceError> {
        self.fetches.set(self.fetches.get() + 1);
        if self.failing.contains(anchor) {
            return Err(SourceError::Unavailable(format!("fetch for {anchor} failed")));
        }

        let range = range.clone();
        let posts = self.posts.get(anchor).map(Vec::as_slice).unwrap_or_default();
        Ok(Box::new(
            posts
                .iter()
                .filter(move |p| range.contains(p.created_at))
                .cloned()
                .map(Ok),
        ))
    }
}
