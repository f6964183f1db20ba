//! Key and value codec for the ordered keyspace
//!
//! The whole database lives in one sorted keyspace, partitioned by a single
//! leading discriminator byte:
//!
//! ```text
//! 'd' | series_id (8, BE) | !timestamp (8, BE)   -> value (8, BE IEEE-754)
//! 's' | series_id (8, BE)                        -> series metadata (JSON)
//! 'i' | posting key (UTF-8)                      -> serialized roaring bitmap
//! ```
//!
//! The data-key timestamp is stored bitwise-complemented so that larger
//! timestamps sort lexicographically *earlier*: a forward scan over a series
//! prefix yields points newest-first. The complement preserves that ordering
//! for timestamps of a single sign; the supported domain is ts >= 0
//! (nanoseconds since the Unix epoch).
//!
//! Encoders return fixed-size arrays so the hot write path performs no heap
//! allocation per point.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::SeriesId;

/// Discriminator byte for data point keys
pub const PREFIX_DATA: u8 = b'd';
/// Discriminator byte for series metadata keys
pub const PREFIX_SERIES: u8 = b's';
/// Discriminator byte for tag posting keys
pub const PREFIX_INDEX: u8 = b'i';

/// Size of an encoded series id
pub const SERIES_ID_SIZE: usize = 8;
/// Size of an encoded timestamp
pub const TIMESTAMP_SIZE: usize = 8;
/// Size of a full data key: prefix + series id + timestamp
pub const DATA_KEY_SIZE: usize = 1 + SERIES_ID_SIZE + TIMESTAMP_SIZE;
/// Size of a series metadata key: prefix + series id
pub const SERIES_KEY_SIZE: usize = 1 + SERIES_ID_SIZE;
/// Size of the per-series data key prefix
pub const DATA_PREFIX_SIZE: usize = 1 + SERIES_ID_SIZE;
/// Size of an encoded data value
pub const DATA_VALUE_SIZE: usize = 8;

/// Encode a data point key
pub fn encode_data_key(series_id: SeriesId, timestamp: i64) -> [u8; DATA_KEY_SIZE] {
    let mut buf = [0u8; DATA_KEY_SIZE];
    buf[0] = PREFIX_DATA;
    buf[1..9].copy_from_slice(&series_id.to_be_bytes());
    buf[9..17].copy_from_slice(&(!(timestamp as u64)).to_be_bytes());
    buf
}

/// Decode a data point key back into (series id, timestamp)
pub fn decode_data_key(buf: &[u8]) -> StorageResult<(SeriesId, i64)> {
    if buf.len() != DATA_KEY_SIZE || buf[0] != PREFIX_DATA {
        return Err(StorageError::Corruption(format!(
            "invalid data key of {} bytes",
            buf.len()
        )));
    }
    let series_id = be_u64(&buf[1..9]);
    let timestamp = !be_u64(&buf[9..17]) as i64;
    Ok((series_id, timestamp))
}

/// Encode a data point value
pub fn encode_data_value(value: f64) -> [u8; DATA_VALUE_SIZE] {
    value.to_be_bytes()
}

/// Decode a data point value
pub fn decode_data_value(buf: &[u8]) -> StorageResult<f64> {
    if buf.len() != DATA_VALUE_SIZE {
        return Err(StorageError::Corruption(format!(
            "invalid data value of {} bytes",
            buf.len()
        )));
    }
    let mut raw = [0u8; DATA_VALUE_SIZE];
    raw.copy_from_slice(buf);
    Ok(f64::from_be_bytes(raw))
}

/// Encode a series metadata key
pub fn encode_series_key(series_id: SeriesId) -> [u8; SERIES_KEY_SIZE] {
    let mut buf = [0u8; SERIES_KEY_SIZE];
    buf[0] = PREFIX_SERIES;
    buf[1..9].copy_from_slice(&series_id.to_be_bytes());
    buf
}

/// Decode a series metadata key back into its series id
pub fn decode_series_key(buf: &[u8]) -> StorageResult<SeriesId> {
    if buf.len() != SERIES_KEY_SIZE || buf[0] != PREFIX_SERIES {
        return Err(StorageError::Corruption(format!(
            "invalid series key of {} bytes",
            buf.len()
        )));
    }
    Ok(be_u64(&buf[1..9]))
}

/// Prefix shared by every data key of one series
pub fn data_key_prefix(series_id: SeriesId) -> [u8; DATA_PREFIX_SIZE] {
    let mut buf = [0u8; DATA_PREFIX_SIZE];
    buf[0] = PREFIX_DATA;
    buf[1..9].copy_from_slice(&series_id.to_be_bytes());
    buf
}

/// Posting key for one (metric, tag key, tag value) combination
///
/// The metric-wide posting uses the bare metric name as its key.
pub fn posting_key(metric: &str, tag_key: &str, tag_value: &str) -> String {
    format!("{metric}#{tag_key}:{tag_value}")
}

/// Store key for a posting
pub fn index_key(posting_key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + posting_key.len());
    buf.push(PREFIX_INDEX);
    buf.extend_from_slice(posting_key.as_bytes());
    buf
}

fn be_u64(buf: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(buf);
    u64::from_be_bytes(raw)
}
