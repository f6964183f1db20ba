//! # Stratum
//!
//! An embedded time-series database on an ordered keyspace. Samples are
//! floating-point values tagged with a metric name and key/value labels;
//! queries filter series with a boolean tag expression and read time ranges
//! newest-first, optionally folded into fixed-width aggregation buckets.
//!
//! ## Features
//!
//! - **Single sorted keyspace**: data points, series metadata, and tag
//!   postings share one store, split by a leading discriminator byte
//! - **Newest-first scans**: complemented timestamps make forward iteration
//!   yield descending time
//! - **Stable series identity**: (metric, canonical tags) hash to the same
//!   64-bit id in any process
//! - **Inverted tag index**: roaring bitmaps per posting, combined with
//!   boolean set algebra
//! - **Filter DSL**: `env:prod AND (host:h1 OR host:h2)`
//! - **Batched writes**: atomic multi-point commits with a raw fast path
//!
//! ## Modules
//!
//! - [`storage`]: codec, substrate, series registry, and the database engine
//! - [`index`]: inverted tag index over roaring bitmaps
//! - [`query`]: filter parsing, query execution, and aggregation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stratum::{Database, Options};
//! use std::collections::HashMap;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::open(Options::new("./data"))?;
//!
//!     let mut tags = HashMap::new();
//!     tags.insert("env".to_string(), "prod".to_string());
//!     tags.insert("host".to_string(), "h-1".to_string());
//!
//!     // Write a few samples
//!     db.write("cpu.total", 42.5, &tags)?;
//!     db.write_at("cpu.total", 43.5, &tags, 1_700_000_000_000_000_000)?;
//!
//!     // Filtered range query, newest first
//!     let results = db
//!         .new_query("cpu.total")
//!         .filter("env:prod AND host:h-1")?
//!         .limit(100)
//!         .execute()?;
//!
//!     for (series_id, points) in &results {
//!         println!("series {series_id}: {} points", points.len());
//!     }
//!
//!     // Hourly averages per host
//!     let hourly = db
//!         .new_aggregate_query("cpu.total")
//!         .filter("env:prod")?
//!         .bucket_size(3_600_000_000_000)
//!         .avg()
//!         .group_by(["host"])
//!         .execute()?;
//!     println!("{} groups", hourly.len());
//!
//!     Ok(())
//! }
//! ```

pub mod index;
pub mod query;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    compute_series_id, BatchWriter, Database, DataPoint, Options, QueryOptions, SeriesId,
    SeriesIter, SeriesMeta, SeriesRegistry, StorageError, StorageResult, Tag, Tagset,
};

pub use index::{intersect, union, TagIndex};

pub use query::{
    aggregate, parse_filter, AggregateFunc, AggregateOptions, AggregateQuery, AggregateResult,
    Bucket, FilterExpr, Query, QueryError, QueryResult,
};
