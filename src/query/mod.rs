//! Stratum query engine
//!
//! Provides a boolean tag-filter language over the inverted index and
//! time-bucketed aggregation over the matching series:
//!
//! - **ast**: filter expression tree
//! - **parser**: parse filter strings into the AST
//! - **executor**: resolve filters to series ids and fetch points
//! - **aggregate**: fold points into fixed-width time buckets
//!
//! # Filter Language
//!
//! ```text
//! env:prod
//! env:prod AND service:api
//! (env:prod OR env:dev) AND host:h1
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let db = stratum::Database::open(stratum::Options::new("./data"))?;
//! let per_host = db
//!     .new_aggregate_query("cpu.total")
//!     .filter("env:prod")?
//!     .time_range(0, 0)
//!     .bucket_size(60_000_000_000)
//!     .max()
//!     .group_by(["host"])
//!     .execute()?;
//! # Ok(())
//! # }
//! ```

mod aggregate;
mod ast;
mod error;
mod executor;
mod parser;

pub use aggregate::{
    aggregate, AggregateFunc, AggregateOptions, AggregateQuery, AggregateResult, Bucket,
};
pub use ast::FilterExpr;
pub use error::{QueryError, QueryResult};
pub use executor::Query;
pub use parser::parse_filter;
