//! Series identity and registry
//!
//! A series is the unique combination of a metric name and a canonical
//! tagset. Its id is a deterministic 64-bit hash, so any process computes
//! the same id for the same (metric, tags) without coordination. The
//! registry persists one metadata record per series and keeps an existence
//! cache so repeat registrations cost one hash and one set lookup.

use crate::storage::encoding::encode_series_key;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::store::Store;
use crate::storage::types::{SeriesId, SeriesMeta, Tagset};
use dashmap::DashSet;
use std::sync::Arc;
use xxhash_rust::xxh64::Xxh64;

/// Compute the stable identifier for a (metric, canonical tags) pair
///
/// Streams xxHash64 (seed 0) over the raw UTF-8 bytes of the metric name,
/// then each tag's key and value in canonical order. Deterministic across
/// processes and platforms; collision-freedom is the hash's, not a promise.
pub fn compute_series_id(metric: &str, tags: &Tagset) -> SeriesId {
    let mut hasher = Xxh64::new(0);
    hasher.update(metric.as_bytes());
    for tag in tags {
        hasher.update(tag.key.as_bytes());
        hasher.update(tag.value.as_bytes());
    }
    hasher.digest()
}

/// Registry of known series
///
/// The store is the source of truth; the cache only records ids whose
/// metadata is known to be persisted. Cache inserts are idempotent, and the
/// created-or-not decision happens inside a store transaction, so two racing
/// registrations of the same series never both observe `created = true`.
pub struct SeriesRegistry {
    store: Arc<Store>,
    cache: DashSet<SeriesId>,
}

impl SeriesRegistry {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            cache: DashSet::new(),
        }
    }

    /// Return the series id for (metric, tags), registering it if new
    ///
    /// The boolean is true iff this call created the series.
    pub fn get_or_create(&self, metric: &str, tags: &Tagset) -> StorageResult<(SeriesId, bool)> {
        let id = compute_series_id(metric, tags);

        if self.cache.contains(&id) {
            return Ok((id, false));
        }

        let key = encode_series_key(id);
        let mut created = false;

        self.store.update(|txn| {
            if txn.get(&key)?.is_some() {
                return Ok(());
            }

            let meta = SeriesMeta {
                metric: metric.to_string(),
                tags: tags.clone(),
            };
            let value = serde_json::to_vec(&meta)?;
            txn.set(&key, &value);
            created = true;
            Ok(())
        })?;

        self.cache.insert(id);
        Ok((id, created))
    }

    /// Fetch the metadata for a series id
    pub fn get(&self, id: SeriesId) -> StorageResult<SeriesMeta> {
        let key = encode_series_key(id);
        match self.store.get(&key)? {
            Some(value) => Ok(serde_json::from_slice(&value)?),
            None => Err(StorageError::SeriesNotFound(id)),
        }
    }

    /// Check whether a series id is registered
    pub fn exists(&self, id: SeriesId) -> StorageResult<bool> {
        if self.cache.contains(&id) {
            return Ok(true);
        }

        let key = encode_series_key(id);
        if self.store.get(&key)?.is_some() {
            self.cache.insert(id);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
