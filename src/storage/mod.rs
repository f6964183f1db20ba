//! Stratum storage engine
//!
//! This module provides the core time-series storage functionality:
//!
//! - **types**: Core data structures (Tag, Tagset, DataPoint, SeriesMeta)
//! - **encoding**: Key/value codec for the ordered keyspace
//! - **store**: Ordered key/value substrate (RocksDB)
//! - **series**: Series identity hashing and the series registry
//! - **engine**: Main database handle orchestrating all components
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Sample → Canonical Tagset → Registry (+Index if new) → Encode → Store
//!
//! Read Path:
//!   Series ID → Prefix Scan (newest first) → Decode → Points
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use stratum::{Database, Options};
//! use std::collections::HashMap;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::open(Options::new("./data"))?;
//!
//!     let mut tags = HashMap::new();
//!     tags.insert("host".to_string(), "h-1".to_string());
//!
//!     db.write_at("cpu.total", 42.5, &tags, 1_000_000_000)?;
//!
//!     let results = db.query_by_metric("cpu.total", &Default::default())?;
//!     println!("found {} series", results.len());
//!
//!     Ok(())
//! }
//! ```

pub mod encoding;
pub mod engine;
pub mod error;
pub mod series;
pub(crate) mod store;
pub mod types;

// Re-export commonly used types
pub use engine::{BatchWriter, Database, Options, SeriesIter};
pub use error::{StorageError, StorageResult};
pub use series::{compute_series_id, SeriesRegistry};
pub use types::{DataPoint, QueryOptions, SeriesId, SeriesMeta, Tag, Tagset};
