//! Stratum storage engine
//!
//! The `Database` orchestrates all components:
//! - Write path: sample → canonical tagset → registry (register if new) →
//!   tag index postings → encoded key/value → store
//! - Read path: series id → newest-first prefix scan → decoded points
//!
//! All operations are synchronous and safe to call from any thread; the
//! only blocking points are the store's own.

use crate::index::TagIndex;
use crate::query::{AggregateQuery, Query};
use crate::storage::encoding::{
    data_key_prefix, decode_data_key, decode_data_value, encode_data_key, encode_data_value,
    DATA_PREFIX_SIZE,
};
use crate::storage::error::StorageResult;
use crate::storage::series::SeriesRegistry;
use crate::storage::store::{RawIter, Store};
use crate::storage::types::{DataPoint, QueryOptions, SeriesId, Tagset};
use chrono::Utc;
use rocksdb::WriteBatch;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for opening a database
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory where the store keeps its files
    pub path: PathBuf,
    /// Run the store fully in memory (no persistence); useful for testing
    pub in_memory: bool,
    /// Sync every commit to disk; slower but safer (default: false)
    pub sync_writes: bool,
}

impl Options {
    /// Default options for a database at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            in_memory: false,
            sync_writes: false,
        }
    }
}

/// The main database handle
///
/// Samples are keyed by metric name plus a set of key/value tags; each
/// unique combination is one series. Points are persisted on an ordered
/// keyspace whose layout makes per-series forward scans yield points
/// newest-first.
pub struct Database {
    store: Arc<Store>,
    series: SeriesRegistry,
    index: TagIndex,
    path: PathBuf,
}

impl Database {
    /// Open (or create) a database with the given options
    pub fn open(opts: Options) -> StorageResult<Database> {
        let store = Arc::new(Store::open(&opts.path, opts.in_memory, opts.sync_writes)?);
        info!(
            path = %opts.path.display(),
            in_memory = opts.in_memory,
            sync_writes = opts.sync_writes,
            "opened database"
        );

        Ok(Database {
            series: SeriesRegistry::new(Arc::clone(&store)),
            index: TagIndex::new(Arc::clone(&store)),
            path: opts.path,
            store,
        })
    }

    /// Close the database, releasing store resources
    pub fn close(self) {
        debug!(path = %self.path.display(), "closing database");
    }

    /// Filesystem path of the database
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The series registry
    pub fn series(&self) -> &SeriesRegistry {
        &self.series
    }

    /// The inverted tag index
    pub fn index(&self) -> &TagIndex {
        &self.index
    }

    /// Write a data point with the current wall-clock timestamp
    pub fn write(
        &self,
        metric: &str,
        value: f64,
        tags: &HashMap<String, String>,
    ) -> StorageResult<()> {
        self.write_at(metric, value, tags, now_nanos())
    }

    /// Write a data point with a specific timestamp (nanoseconds)
    pub fn write_at(
        &self,
        metric: &str,
        value: f64,
        tags: &HashMap<String, String>,
        timestamp: i64,
    ) -> StorageResult<()> {
        self.write_at_with_tagset(metric, value, &Tagset::from_map(tags), timestamp)
    }

    /// Write a data point using a pre-built canonical tagset
    ///
    /// Faster than [`Database::write_at`] when the tagset is reused across
    /// many writes.
    pub fn write_at_with_tagset(
        &self,
        metric: &str,
        value: f64,
        tags: &Tagset,
        timestamp: i64,
    ) -> StorageResult<()> {
        let (series_id, created) = self.series.get_or_create(metric, tags)?;
        if created {
            self.index.index(metric, tags, series_id)?;
        }

        let key = encode_data_key(series_id, timestamp);
        let value = encode_data_value(value);
        self.store.put(&key, &value)
    }

    /// Create a batch writer; call [`BatchWriter::flush`] to commit
    pub fn new_batch_writer(&self) -> BatchWriter<'_> {
        BatchWriter {
            db: self,
            batch: WriteBatch::default(),
        }
    }

    /// Retrieve data points for a series within a time range
    ///
    /// Points come back newest-first. An unregistered series id yields an
    /// empty vector, mirroring the empty bitmap of an unknown posting.
    pub fn query(&self, series_id: SeriesId, opts: &QueryOptions) -> StorageResult<Vec<DataPoint>> {
        self.iter(series_id, *opts).collect()
    }

    /// Retrieve data points for every series registered under a metric
    pub fn query_by_metric(
        &self,
        metric: &str,
        opts: &QueryOptions,
    ) -> StorageResult<HashMap<SeriesId, Vec<DataPoint>>> {
        let series_ids = self.index.get_all_series_ids(metric)?;

        let mut results = HashMap::new();
        for series_id in series_ids.iter() {
            let points = self.query(series_id, opts)?;
            if !points.is_empty() {
                results.insert(series_id, points);
            }
        }
        Ok(results)
    }

    /// Streaming newest-first cursor over one series' points
    ///
    /// The underlying store cursor is released when the iterator is dropped.
    pub fn iter(&self, series_id: SeriesId, opts: QueryOptions) -> SeriesIter<'_> {
        let prefix = data_key_prefix(series_id);
        let mut it = self.store.raw_iterator();

        // Seeking to the key encoded for `end` lands on the first sample at
        // or before `end`, thanks to the complemented-timestamp layout. The
        // bare prefix seeks to the newest sample.
        if opts.end > 0 {
            it.seek(encode_data_key(series_id, opts.end));
        } else {
            it.seek(prefix);
        }

        SeriesIter {
            it,
            prefix,
            opts,
            returned: 0,
            done: false,
        }
    }

    /// Start building a filtered query for a metric
    pub fn new_query(&self, metric: impl Into<String>) -> Query<'_> {
        Query::new(self, metric)
    }

    /// Start building an aggregation query for a metric
    pub fn new_aggregate_query(&self, metric: impl Into<String>) -> AggregateQuery<'_> {
        AggregateQuery::new(self, metric)
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &Store {
        &self.store
    }
}

fn now_nanos() -> i64 {
    // Saturates in year 2262; good until then
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Accumulates writes and commits them in one atomic batch
///
/// Registration and indexing of new series happen immediately per write;
/// the data points themselves become visible only after
/// [`BatchWriter::flush`]. Dropping the writer without flushing discards
/// the batch.
pub struct BatchWriter<'db> {
    db: &'db Database,
    batch: WriteBatch,
}

impl BatchWriter<'_> {
    /// Add a data point with the current wall-clock timestamp
    pub fn write(
        &mut self,
        metric: &str,
        value: f64,
        tags: &HashMap<String, String>,
    ) -> StorageResult<()> {
        self.write_at(metric, value, tags, now_nanos())
    }

    /// Add a data point with a specific timestamp
    pub fn write_at(
        &mut self,
        metric: &str,
        value: f64,
        tags: &HashMap<String, String>,
        timestamp: i64,
    ) -> StorageResult<()> {
        self.write_at_with_tagset(metric, value, &Tagset::from_map(tags), timestamp)
    }

    /// Add a data point using a pre-built canonical tagset
    pub fn write_at_with_tagset(
        &mut self,
        metric: &str,
        value: f64,
        tags: &Tagset,
        timestamp: i64,
    ) -> StorageResult<()> {
        let (series_id, created) = self.db.series.get_or_create(metric, tags)?;
        if created {
            self.db.index.index(metric, tags, series_id)?;
        }

        self.batch.put(
            encode_data_key(series_id, timestamp),
            encode_data_value(value),
        );
        Ok(())
    }

    /// Add a data point for a known series id, skipping registration
    ///
    /// Fastest path; callers promise the series is already registered.
    pub fn write_raw(&mut self, series_id: SeriesId, value: f64, timestamp: i64) {
        self.batch.put(
            encode_data_key(series_id, timestamp),
            encode_data_value(value),
        );
    }

    /// Number of staged points
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Check whether the batch has no staged points
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Commit all staged points atomically
    pub fn flush(self) -> StorageResult<()> {
        let points = self.batch.len();
        self.db.store.write_batch(self.batch)?;
        debug!(points, "flushed write batch");
        Ok(())
    }

    /// Discard the batch without writing
    pub fn cancel(self) {}
}

/// Streaming newest-first iterator over one series' points
///
/// Yields `StorageResult<DataPoint>` so store-level failures surface
/// in-band; iteration stops after the first error.
pub struct SeriesIter<'db> {
    it: RawIter<'db>,
    prefix: [u8; DATA_PREFIX_SIZE],
    opts: QueryOptions,
    returned: usize,
    done: bool,
}

impl Iterator for SeriesIter<'_> {
    type Item = StorageResult<DataPoint>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.opts.limit > 0 && self.returned >= self.opts.limit {
            self.done = true;
            return None;
        }

        loop {
            let decoded = match self.it.key() {
                Some(key) if key.starts_with(&self.prefix) => decode_data_key(key),
                _ => break,
            };
            let (_, timestamp) = match decoded {
                Ok(decoded) => decoded,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };

            // Keys are newest-first: falling below `start` ends the scan,
            // while keys above `end` can only appear at the seek boundary
            // and are skipped.
            if self.opts.start > 0 && timestamp < self.opts.start {
                break;
            }
            if self.opts.end > 0 && timestamp > self.opts.end {
                self.it.next();
                continue;
            }

            let value = match self.it.value().map(decode_data_value) {
                Some(Ok(value)) => value,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => break,
            };

            self.it.next();
            self.returned += 1;
            return Some(Ok(DataPoint { timestamp, value }));
        }

        self.done = true;
        match self.it.status() {
            Ok(()) => None,
            Err(err) => Some(Err(err.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::encoding::PREFIX_DATA;
    use tempfile::tempdir;

    fn open_db(dir: &std::path::Path) -> Database {
        Database::open(Options::new(dir)).unwrap()
    }

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Scan every raw key under the data prefix
    fn scan_data_keys(db: &Database) -> Vec<Vec<u8>> {
        let mut it = db.store().raw_iterator();
        it.seek([PREFIX_DATA]);

        let mut keys = Vec::new();
        while it.valid() {
            let key = it.key().unwrap();
            if key[0] != PREFIX_DATA {
                break;
            }
            keys.push(key.to_vec());
            it.next();
        }
        keys
    }

    #[test]
    fn test_open_close() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        assert_eq!(db.path(), dir.path());
        db.close();
    }

    #[test]
    fn test_in_memory_mode() {
        let dir = tempdir().unwrap();
        let mut opts = Options::new(dir.path());
        opts.in_memory = true;

        let db = Database::open(opts).unwrap();
        db.write_at("cpu", 1.0, &tags(&[("env", "prod")]), 1_000)
            .unwrap();

        let results = db.new_query("cpu").execute().unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_writes_scan_newest_first() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let host_tags = tags(&[("env", "prod"), ("host", "h1")]);

        db.write_at("cpu", 42.5, &host_tags, 1_000).unwrap();
        db.write_at("cpu", 43.5, &host_tags, 2_000).unwrap();

        // Exactly two raw entries under the data prefix, newest first
        let keys = scan_data_keys(&db);
        assert_eq!(keys.len(), 2);

        let decoded: Vec<i64> = keys
            .iter()
            .map(|key| decode_data_key(key).unwrap().1)
            .collect();
        assert_eq!(decoded, vec![2_000, 1_000]);
    }

    #[test]
    fn test_write_registers_and_indexes_once() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let host_tags = tags(&[("env", "prod")]);

        db.write_at("cpu", 1.0, &host_tags, 1_000).unwrap();
        db.write_at("cpu", 2.0, &host_tags, 2_000).unwrap();

        assert_eq!(db.index().get_all_series_ids("cpu").unwrap().len(), 1);
        assert_eq!(
            db.index()
                .get_series_ids("cpu", "env", "prod")
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_same_timestamp_overwrites() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let host_tags = tags(&[("host", "h1")]);

        db.write_at("cpu", 1.0, &host_tags, 1_000).unwrap();
        db.write_at("cpu", 9.0, &host_tags, 1_000).unwrap();

        let results = db.new_query("cpu").execute().unwrap();
        let points = results.values().next().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 9.0);
    }

    #[test]
    fn test_query_time_range() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let host_tags = tags(&[("host", "h1")]);

        for i in 1..=10i64 {
            db.write_at("cpu", i as f64, &host_tags, i * 1_000).unwrap();
        }

        let results = db.new_query("cpu").time_range(3_000, 7_000).execute().unwrap();
        let points = results.values().next().unwrap();

        let stamps: Vec<i64> = points.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![7_000, 6_000, 5_000, 4_000, 3_000]);
    }

    #[test]
    fn test_query_limit_returns_newest() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let host_tags = tags(&[("host", "h1")]);

        for i in 1..=100i64 {
            db.write_at("cpu", i as f64, &host_tags, i * 1_000).unwrap();
        }

        let results = db.new_query("cpu").limit(10).execute().unwrap();
        let points = results.values().next().unwrap();
        assert_eq!(points.len(), 10);

        let expected: Vec<i64> = (91..=100).rev().map(|i| i * 1_000).collect();
        let stamps: Vec<i64> = points.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, expected);
    }

    #[test]
    fn test_query_start_only_and_end_only() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let host_tags = tags(&[("host", "h1")]);

        for i in 1..=5i64 {
            db.write_at("cpu", i as f64, &host_tags, i * 1_000).unwrap();
        }
        let (series_id, _) = db
            .series()
            .get_or_create("cpu", &Tagset::from_map(&host_tags))
            .unwrap();

        let from_3000 = db
            .query(series_id, &QueryOptions { start: 3_000, end: 0, limit: 0 })
            .unwrap();
        assert_eq!(from_3000.len(), 3);
        assert!(from_3000.iter().all(|p| p.timestamp >= 3_000));

        let until_3000 = db
            .query(series_id, &QueryOptions { start: 0, end: 3_000, limit: 0 })
            .unwrap();
        assert_eq!(until_3000.len(), 3);
        assert!(until_3000.iter().all(|p| p.timestamp <= 3_000));
    }

    #[test]
    fn test_query_unknown_series_is_empty() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());

        let points = db.query(0xdead_beef, &QueryOptions::default()).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_series_do_not_bleed_into_each_other() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());

        db.write_at("cpu", 1.0, &tags(&[("host", "h1")]), 1_000)
            .unwrap();
        db.write_at("cpu", 2.0, &tags(&[("host", "h2")]), 2_000)
            .unwrap();

        let results = db.new_query("cpu").execute().unwrap();
        assert_eq!(results.len(), 2);
        for points in results.values() {
            assert_eq!(points.len(), 1);
        }
    }

    #[test]
    fn test_streaming_iterator_matches_query() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let host_tags = tags(&[("host", "h1")]);

        for i in 1..=5i64 {
            db.write_at("cpu", i as f64, &host_tags, i * 1_000).unwrap();
        }
        let (series_id, _) = db
            .series()
            .get_or_create("cpu", &Tagset::from_map(&host_tags))
            .unwrap();

        let opts = QueryOptions { start: 2_000, end: 4_000, limit: 0 };
        let streamed: Vec<DataPoint> = db
            .iter(series_id, opts)
            .collect::<StorageResult<_>>()
            .unwrap();
        let fetched = db.query(series_id, &opts).unwrap();
        assert_eq!(streamed, fetched);

        let stamps: Vec<i64> = streamed.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![4_000, 3_000, 2_000]);
    }

    #[test]
    fn test_query_by_metric() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());

        db.write_at("cpu", 1.0, &tags(&[("host", "h1")]), 1_000)
            .unwrap();
        db.write_at("cpu", 2.0, &tags(&[("host", "h2")]), 2_000)
            .unwrap();
        db.write_at("mem", 3.0, &tags(&[("host", "h1")]), 3_000)
            .unwrap();

        let results = db
            .query_by_metric("cpu", &QueryOptions::default())
            .unwrap();
        assert_eq!(results.len(), 2);

        let total: usize = results.values().map(|points| points.len()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_batch_writer_flush() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let host_tags = tags(&[("host", "h1")]);

        let mut batch = db.new_batch_writer();
        assert!(batch.is_empty());
        for i in 1..=50i64 {
            batch.write_at("cpu", i as f64, &host_tags, i * 1_000).unwrap();
        }
        assert_eq!(batch.len(), 50);
        batch.flush().unwrap();

        let results = db.new_query("cpu").execute().unwrap();
        assert_eq!(results.values().next().unwrap().len(), 50);
    }

    #[test]
    fn test_batch_writer_cancel_discards_points() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let host_tags = tags(&[("host", "h1")]);

        let mut batch = db.new_batch_writer();
        batch.write_at("cpu", 1.0, &host_tags, 1_000).unwrap();
        batch.cancel();

        // The series is registered (registration is immediate), but no
        // points were committed.
        let results = db.new_query("cpu").execute().unwrap();
        assert!(results.is_empty());
        assert_eq!(db.index().get_all_series_ids("cpu").unwrap().len(), 1);
    }

    #[test]
    fn test_batch_writer_write_raw() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let tagset = Tagset::from_pairs([("host", "h1")]);

        let (series_id, created) = db.series().get_or_create("cpu", &tagset).unwrap();
        assert!(created);
        db.index().index("cpu", &tagset, series_id).unwrap();

        let mut batch = db.new_batch_writer();
        for i in 1..=1_000i64 {
            batch.write_raw(series_id, i as f64, i);
        }
        batch.flush().unwrap();

        let points = db.query(series_id, &QueryOptions::default()).unwrap();
        assert_eq!(points.len(), 1_000);
        assert_eq!(points[0].timestamp, 1_000);
    }

    #[test]
    fn test_reopen_preserves_series_and_postings() {
        let dir = tempdir().unwrap();
        let h1 = tags(&[("host", "h1")]);
        let h2 = tags(&[("host", "h2")]);

        let original_id = {
            let db = open_db(dir.path());
            db.write_at("cpu", 1.0, &h1, 1_000).unwrap();
            db.write_at("cpu", 2.0, &h2, 2_000).unwrap();
            db.series()
                .get_or_create("cpu", &Tagset::from_map(&h1))
                .unwrap()
                .0
        };

        let db = open_db(dir.path());
        let (series_id, created) = db
            .series()
            .get_or_create("cpu", &Tagset::from_map(&h1))
            .unwrap();
        assert_eq!(series_id, original_id);
        assert!(!created);

        assert_eq!(db.index().get_all_series_ids("cpu").unwrap().len(), 2);

        let points = db.query(series_id, &QueryOptions::default()).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 1.0);
    }

    #[test]
    fn test_write_uses_current_time() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let before = now_nanos();

        db.write("cpu", 1.0, &tags(&[("host", "h1")])).unwrap();

        let results = db.new_query("cpu").execute().unwrap();
        let points = results.values().next().unwrap();
        assert_eq!(points.len(), 1);
        assert!(points[0].timestamp >= before);
    }
}
