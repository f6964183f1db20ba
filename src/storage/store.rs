//! Ordered key/value substrate
//!
//! Thin wrapper around RocksDB exposing exactly what the engine needs:
//! point gets, serialized read-modify-write transactions, atomic write
//! batches, and forward iteration over the sorted keyspace. RocksDB raw
//! iterators pin an implicit snapshot, so reads taken through one observe a
//! consistent view even while writes land.
//!
//! Read-modify-write sections are serialized through a single writer mutex;
//! the mutations they stage are committed as one atomic `WriteBatch`.

use crate::storage::error::StorageResult;
use parking_lot::Mutex;
use rocksdb::{
    DBRawIteratorWithThreadMode, DBWithThreadMode, Env, MultiThreaded, Options as RocksOptions,
    WriteBatch, WriteOptions,
};
use std::path::Path;

pub(crate) type Db = DBWithThreadMode<MultiThreaded>;
pub(crate) type RawIter<'a> = DBRawIteratorWithThreadMode<'a, Db>;

/// Handle to the underlying ordered store
pub(crate) struct Store {
    db: Db,
    sync_writes: bool,
    write_lock: Mutex<()>,
    // Keeps the in-memory environment alive for the lifetime of the DB.
    _env: Option<Env>,
}

impl Store {
    /// Open (or create) a store at `path`
    pub fn open(path: &Path, in_memory: bool, sync_writes: bool) -> StorageResult<Self> {
        let mut opts = RocksOptions::default();
        opts.create_if_missing(true);

        let env = if in_memory {
            let env = Env::mem_env()?;
            opts.set_env(&env);
            Some(env)
        } else {
            None
        };

        let db = Db::open(&opts, path)?;

        Ok(Self {
            db,
            sync_writes,
            write_lock: Mutex::new(()),
            _env: env,
        })
    }

    /// Read a single key
    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    /// Write a single key atomically
    pub fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.db.put_opt(key, value, &self.write_options())?;
        Ok(())
    }

    /// Run a read-modify-write transaction
    ///
    /// Writers are serialized: the closure observes the latest committed
    /// state, and every `set` it stages commits atomically when the closure
    /// returns `Ok`. Nothing is written if it returns `Err`.
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut WriteTxn<'_>) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let _guard = self.write_lock.lock();
        let mut txn = WriteTxn {
            store: self,
            batch: WriteBatch::default(),
        };
        let out = f(&mut txn)?;
        if !txn.batch.is_empty() {
            self.db.write_opt(txn.batch, &self.write_options())?;
        }
        Ok(out)
    }

    /// Commit a pre-assembled batch atomically
    pub fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        self.db.write_opt(batch, &self.write_options())?;
        Ok(())
    }

    /// Forward cursor over the sorted keyspace (snapshot-consistent)
    pub fn raw_iterator(&self) -> RawIter<'_> {
        self.db.raw_iterator()
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }
}

/// Staged mutations inside a [`Store::update`] transaction
pub(crate) struct WriteTxn<'a> {
    store: &'a Store,
    batch: WriteBatch,
}

impl WriteTxn<'_> {
    /// Read the latest committed value for a key
    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.store.get(key)
    }

    /// Stage a write; committed when the transaction closure returns `Ok`
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.batch.put(key, value);
    }
}
