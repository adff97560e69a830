//! Post sources.
//!
//! A post source answers one kind of query: every post matching an anchor
//! whose creation time lies inside a [`QueryRange`]. Results are lazy; an
//! empty result is not an error.

pub mod jsonl;
pub mod memory;
pub mod post;

use crate::core::windowing::QueryRange;
use thiserror::Error;

// Re-export commonly used types
pub use jsonl::JsonlSource;
pub use memory::MemorySource;
pub use post::Post;

/// Errors raised by a post source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("post source unavailable: {0}")]
    Unavailable(String),
}

/// Lazy sequence of posts returned by a fetch.
pub type PostStream<'a> = Box<dyn Iterator<Item = Result<Post, SourceError>> + 'a>;

/// Read-only handle onto a store of posts.
pub trait PostSource {
    /// Fetch posts matching `anchor` inside `range`.
    fn fetch<'a>(&'a self, anchor: &str, range: &QueryRange) -> Result<PostStream<'a>, SourceError>;
}

impl<S: PostSource + ?Sized> PostSource for &S {
    fn fetch<'a>(&'a self, anchor: &str, range: &QueryRange) -> Result<PostStream<'a>, SourceError> {
        (**self).fetch(anchor, range)
    }
}
