//! Post records returned by a post source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A social-media post.
///
/// The aggregator only reads `created_at` (and `id` for de-duplication);
/// everything else is carried through for diagnostics such as field tallies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Post identifier, when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Creation time (UTC)
    #[serde(alias = "tweet_created_at", with = "timestamp_serde")]
    pub created_at: DateTime<Utc>,
    /// Post body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Hashtags attached to the post, verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashtags: Vec<String>,
    /// Any other fields (e.g. `city_state`)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Post {
    /// Create a post with only a timestamp.
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            created_at,
            text: None,
            hashtags: Vec::new(),
            fields: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_hashtag(mut self, tag: impl Into<String>) -> Self {
        self.hashtags.push(tag.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Whether this post matches `anchor`. Matching is case-sensitive and
    /// verbatim against the hashtag list and the text.
    ///
    /// In text the anchor must end at a tag boundary, so `#SFvsLA` does not
    /// match `#SFvsLAC`.
    pub fn matches_anchor(&self, anchor: &str) -> bool {
        self.hashtags.iter().any(|tag| tag == anchor)
            || self.text.as_deref().is_some_and(|t| contains_tag(t, anchor))
    }

    /// Read an extra field as a display string. Nulls count as absent.
    pub fn field(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn contains_tag(text: &str, anchor: &str) -> bool {
    if anchor.is_empty() {
        return false;
    }
    text.match_indices(anchor).any(|(at, _)| {
        text[at + anchor.len()..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
    })
}

/// Serde support for post timestamps.
///
/// Accepts RFC 3339 or a naive `%Y-%m-%d %H:%M:%S` string read as UTC;
/// always writes RFC 3339.
mod timestamp_serde {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`")))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_anchor_matching_is_case_sensitive() {
        let post = Post::new(Utc::now()).with_text("What a game #SEAvsSF");
        assert!(post.matches_anchor("#SEAvsSF"));
        assert!(!post.matches_anchor("#seavssf"));
        assert!(!post.matches_anchor("#SFvsSEA"));

        let tagged = Post::new(Utc::now()).with_hashtag("#SFvsSEA");
        assert!(tagged.matches_anchor("#SFvsSEA"));
    }

    #[test]
    fn test_anchor_must_end_at_tag_boundary() {
        let longer = Post::new(Utc::now()).with_text("big game #SFvsLAC today");
        assert!(!longer.matches_anchor("#SFvsLA"));
        assert!(longer.matches_anchor("#SFvsLAC"));

        let suffixed = Post::new(Utc::now()).with_text("#SFvsLA_2013 recap");
        assert!(!suffixed.matches_anchor("#SFvsLA"));

        assert!(Post::new(Utc::now()).with_text("#SFvsLA!").matches_anchor("#SFvsLA"));
        assert!(Post::new(Utc::now())
            .with_text("#SFvsLAC and #SFvsLA tonight")
            .matches_anchor("#SFvsLA"));
        assert!(!Post::new(Utc::now()).with_text("#sfvsla").matches_anchor("#SFvsLA"));
    }

    #[test]
    fn test_deserialize_naive_timestamp_as_utc() {
        let post: Post = serde_json::from_str(
            r##"{"id": "1", "tweet_created_at": "2013-09-08 20:45:00", "city_state": "Dallas, TX"}"##,
        )
        .unwrap();

        assert_eq!(
            post.created_at,
            Utc.with_ymd_and_hms(2013, 9, 8, 20, 45, 0).unwrap()
        );
        assert_eq!(post.field("city_state").as_deref(), Some("Dallas, TX"));
        assert_eq!(post.field("missing"), None);
    }

    #[test]
    fn test_deserialize_rfc3339_with_offset() {
        let post: Post =
            serde_json::from_str(r#"{"created_at": "2013-09-08T20:45:00-04:00"}"#).unwrap();
        assert_eq!(
            post.created_at,
            Utc.with_ymd_and_hms(2013, 9, 9, 0, 45, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_timestamp_is_rejected() {
        let result: Result<Post, _> = serde_json::from_str(r#"{"created_at": "yesterday"}"#);
        assert!(result.is_err());
    }
}
