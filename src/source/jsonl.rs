//! Post source backed by a JSON-lines dump.
//!
//! Each non-empty line is one post object. The whole file is parsed up
//! front so malformed lines surface before any aggregation starts.

use crate::core::windowing::QueryRange;
use crate::source::{Post, PostSource, PostStream, SourceError};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Posts loaded from a JSON-lines file, sorted by creation time.
#[derive(Debug, Clone, Default)]
pub struct JsonlSource {
    posts: Vec<Post>,
}

impl JsonlSource {
    /// Load posts from a file.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        let source = Self::from_reader(file)?;
        tracing::info!(posts = source.len(), path = %path.display(), "Loaded post dump");
        Ok(source)
    }

    /// Load posts from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SourceError> {
        let mut posts = Vec::new();
        for (idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let post: Post = serde_json::from_str(&line).map_err(|e| SourceError::Parse {
                line: idx + 1,
                reason: e.to_string(),
            })?;
            posts.push(post);
        }
        posts.sort_by_key(|p| p.created_at);
        Ok(Self { posts })
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

impl PostSource for JsonlSource {
    fn fetch<'a>(&'a self, anchor: &str, range: &QueryRange) -> Result<PostStream<'a>, SourceError> {
        // Posts are sorted, so the range maps onto a contiguous slice.
        let lo = self.posts.partition_point(|p| p.created_at < range.start());
        let hi = self.posts.partition_point(|p| p.created_at < range.end());
        let anchor = anchor.to_string();

        Ok(Box::new(
            self.posts[lo..hi.max(lo)]
                .iter()
                .filter(move |p| p.matches_anchor(&anchor))
                .cloned()
                .map(Ok),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::windowing::{BinWidth, Window, WindowUnit};
    use chrono::{TimeZone, Utc};

    const DUMP: &str = r##"
{"id": "1", "created_at": "2013-09-08T18:10:00Z", "hashtags": ["#NYGvsDAL"]}
{"id": "2", "created_at": "2013-09-08T19:40:00Z", "text": "Big night #DALvsNYG"}
{"id": "3", "created_at": "2013-09-20T19:40:00Z", "text": "#DALvsNYG rematch?"}
{"id": "4", "created_at": "2013-09-08T19:45:00Z", "text": "#dalvsnyg"}
"##;

    #[test]
    fn test_fetch_filters_by_anchor_and_range() {
        let source = JsonlSource::from_reader(DUMP.as_bytes()).unwrap();
        assert_eq!(source.len(), 4);

        let kickoff = Utc.with_ymd_and_hms(2013, 9, 8, 20, 30, 0).unwrap();
        let window = Window::new(-5, 5, WindowUnit::Hour, BinWidth::Hour).unwrap();
        let range = window.query_range(kickoff, chrono_tz::UTC);

        let ids: Vec<_> = source
            .fetch("#DALvsNYG", &range)
            .unwrap()
            .map(|p| p.unwrap().id.unwrap())
            .collect();
        assert_eq!(ids, vec!["2".to_string()]);

        assert_eq!(source.fetch("#NYGvsDAL", &range).unwrap().count(), 1);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let dump = "{\"created_at\": \"2013-09-08T18:10:00Z\"}\nnot json\n";
        match JsonlSource::from_reader(dump.as_bytes()) {
            Err(SourceError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
