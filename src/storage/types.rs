//! Core data types for the stratum storage layer
//!
//! This module defines the fundamental types used throughout the engine:
//! - `Tag` and `Tagset`: key/value labels in canonical sorted order
//! - `DataPoint`: a single timestamped measurement
//! - `QueryOptions`: time bounds and limit for range reads
//! - `SeriesMeta`: persisted description of a series

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a time series.
///
/// Computed as xxHash64 of the metric name followed by the canonical tagset
/// (see [`crate::storage::series::compute_series_id`]).
pub type SeriesId = u64;

/// A key/value label attached to a series
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Label name (e.g. "host")
    pub key: String,
    /// Label value (e.g. "h-1")
    pub value: String,
}

impl Tag {
    /// Create a new tag
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An ordered set of tags in canonical form
///
/// Canonical form is sorted ascending by key, ties broken by value. Every
/// constructor sorts, so a `Tagset` is canonical by construction; equality,
/// hashing, and serialization are all defined on the canonical order. Two
/// tagsets with the same sorted contents are the same tagset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Tag>")]
pub struct Tagset(Vec<Tag>);

impl Tagset {
    /// Create an empty tagset
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a canonical tagset from a key/value map
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        map.iter()
            .map(|(k, v)| Tag::new(k.clone(), v.clone()))
            .collect::<Vec<_>>()
            .into()
    }

    /// Build a canonical tagset from key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| Tag::new(k, v))
            .collect::<Vec<_>>()
            .into()
    }

    /// Get the value for a key, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }

    /// Iterate over tags in canonical order
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the tagset has no tags
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Tag>> for Tagset {
    fn from(mut tags: Vec<Tag>) -> Self {
        tags.sort();
        Tagset(tags)
    }
}

impl<'a> IntoIterator for &'a Tagset {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A single time-series data point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Unix timestamp in nanoseconds
    pub timestamp: i64,
    /// The measured value
    pub value: f64,
}

impl DataPoint {
    /// Create a new data point
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Time bounds and limit for a range read
///
/// Zero means unbounded on each axis: `start == 0` reads back to the oldest
/// point, `end == 0` reads from the newest point, `limit == 0` returns every
/// matching point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Start timestamp (inclusive), 0 means no lower bound
    pub start: i64,
    /// End timestamp (inclusive), 0 means no upper bound
    pub end: i64,
    /// Maximum number of points to return, 0 means no limit
    pub limit: usize,
}

/// Persisted metadata describing one series
///
/// Written exactly once, when the series is first registered. Field names
/// are shortened in the serialized form to keep the record compact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMeta {
    /// Metric name
    #[serde(rename = "m")]
    pub metric: String,
    /// Canonical tagset
    #[serde(rename = "t", default, skip_serializing_if = "Tagset::is_empty")]
    pub tags: Tagset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagset_canonical_ordering() {
        let a = Tagset::from_pairs([("host", "h1"), ("env", "prod")]);
        let b = Tagset::from_pairs([("env", "prod"), ("host", "h1")]);
        assert_eq!(a, b);

        let keys: Vec<_> = a.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["env", "host"]);
    }

    #[test]
    fn test_tagset_sorts_by_value_on_equal_keys() {
        let tags = Tagset::from(vec![Tag::new("k", "b"), Tag::new("k", "a")]);
        let values: Vec<_> = tags.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_tagset_from_empty_map() {
        let tags = Tagset::from_map(&HashMap::new());
        assert!(tags.is_empty());
        assert_eq!(tags, Tagset::new());
    }

    #[test]
    fn test_tagset_get() {
        let tags = Tagset::from_pairs([("env", "prod"), ("host", "h1")]);
        assert_eq!(tags.get("env"), Some("prod"));
        assert_eq!(tags.get("host"), Some("h1"));
        assert_eq!(tags.get("missing"), None);
    }

    #[test]
    fn test_series_meta_roundtrip() {
        let meta = SeriesMeta {
            metric: "cpu.total".to_string(),
            tags: Tagset::from_pairs([("env", "prod"), ("host", "h1")]),
        };

        let json = serde_json::to_string(&meta).unwrap();
        let restored: SeriesMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, restored);

        // Short field names keep the persisted record compact
        assert!(json.contains("\"m\""));
        assert!(json.contains("\"t\""));
    }

    #[test]
    fn test_series_meta_empty_tags_omitted() {
        let meta = SeriesMeta {
            metric: "uptime".to_string(),
            tags: Tagset::new(),
        };

        let json = serde_json::to_string(&meta).unwrap();
        assert!(!json.contains("\"t\""));

        let restored: SeriesMeta = serde_json::from_str(&json).unwrap();
        assert!(restored.tags.is_empty());
    }

    #[test]
    fn test_series_meta_deserialize_resorts_tags() {
        // Tags arriving in non-canonical order are canonicalized on read
        let json = r#"{"m":"cpu","t":[{"key":"z","value":"1"},{"key":"a","value":"2"}]}"#;
        let meta: SeriesMeta = serde_json::from_str(json).unwrap();
        let keys: Vec<_> = meta.tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "z"]);
    }
}
