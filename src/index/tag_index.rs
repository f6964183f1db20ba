//! Tag Index - inverted index for tag-based series lookup
//!
//! Maps posting keys to 64-bit roaring bitmaps of series ids. Every metric
//! has a metric-wide posting (key = metric name) containing all of its
//! series, and one posting per distinct tag pair (key =
//! `metric#tagKey:tagValue`). Boolean filters reduce to set algebra over
//! these bitmaps.
//!
//! The in-memory map is the authoritative hot copy; each posting touched by
//! an `index` call is rewritten to the store in full within one transaction,
//! so postings are durable by the time `index` returns. Postings only ever
//! grow, and only the creator of a series mutates them for that series, so
//! the bitmap inserts are idempotent.

use crate::storage::encoding::{index_key, posting_key};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::store::Store;
use crate::storage::types::{SeriesId, Tagset};
use dashmap::DashMap;
use roaring::RoaringTreemap;
use std::sync::Arc;
use tracing::debug;

/// Inverted index from postings to series ids
pub struct TagIndex {
    store: Arc<Store>,
    cache: DashMap<String, RoaringTreemap>,
}

impl TagIndex {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Add a series to the index for all its tags
    ///
    /// Inserts the id into the metric-wide posting and into one posting per
    /// tag, then persists every touched posting atomically. Callers invoke
    /// this once, when the series is first created.
    pub fn index(&self, metric: &str, tags: &Tagset, series_id: SeriesId) -> StorageResult<()> {
        self.add(metric.to_string(), series_id);
        for tag in tags {
            self.add(posting_key(metric, &tag.key, &tag.value), series_id);
        }
        self.persist(metric, tags)
    }

    fn add(&self, key: String, series_id: SeriesId) {
        self.cache.entry(key).or_default().insert(series_id);
    }

    fn persist(&self, metric: &str, tags: &Tagset) -> StorageResult<()> {
        let mut keys = Vec::with_capacity(tags.len() + 1);
        keys.push(metric.to_string());
        for tag in tags {
            keys.push(posting_key(metric, &tag.key, &tag.value));
        }

        self.store.update(|txn| {
            for key in &keys {
                if let Some(bitmap) = self.cache.get(key) {
                    let mut buf = Vec::with_capacity(bitmap.serialized_size());
                    bitmap.serialize_into(&mut buf).map_err(|e| {
                        StorageError::Serialization(format!("encode posting {key}: {e}"))
                    })?;
                    txn.set(&index_key(key), &buf);
                }
            }
            Ok(())
        })?;

        debug!(metric, postings = keys.len(), "persisted tag postings");
        Ok(())
    }

    /// Series ids matching a (metric, tag key, tag value) combination
    ///
    /// An unknown combination yields an empty bitmap, not an error.
    pub fn get_series_ids(
        &self,
        metric: &str,
        tag_key: &str,
        tag_value: &str,
    ) -> StorageResult<RoaringTreemap> {
        self.posting(&posting_key(metric, tag_key, tag_value))
    }

    /// All series ids registered under a metric
    pub fn get_all_series_ids(&self, metric: &str) -> StorageResult<RoaringTreemap> {
        self.posting(metric)
    }

    fn posting(&self, key: &str) -> StorageResult<RoaringTreemap> {
        if let Some(bitmap) = self.cache.get(key) {
            return Ok(bitmap.clone());
        }

        let loaded = match self.store.get(&index_key(key))? {
            Some(bytes) => RoaringTreemap::deserialize_from(&bytes[..])
                .map_err(|e| StorageError::Serialization(format!("decode posting {key}: {e}")))?,
            None => RoaringTreemap::new(),
        };

        let bitmap = self.cache.entry(key.to_string()).or_insert(loaded);
        Ok(bitmap.clone())
    }
}

/// Intersection of bitmaps, as a fresh bitmap
///
/// Empty input yields an empty bitmap; a single input is cloned. Inputs are
/// never mutated.
pub fn intersect(bitmaps: &[&RoaringTreemap]) -> RoaringTreemap {
    match bitmaps {
        [] => RoaringTreemap::new(),
        [only] => (*only).clone(),
        [first, rest @ ..] => {
            let mut result = (*first).clone();
            for bitmap in rest {
                result &= *bitmap;
            }
            result
        }
    }
}

/// Union of bitmaps, as a fresh bitmap
pub fn union(bitmaps: &[&RoaringTreemap]) -> RoaringTreemap {
    match bitmaps {
        [] => RoaringTreemap::new(),
        [only] => (*only).clone(),
        [first, rest @ ..] => {
            let mut result = (*first).clone();
            for bitmap in rest {
                result |= *bitmap;
            }
            result
        }
    }
}
