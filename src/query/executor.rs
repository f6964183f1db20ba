//! Query execution
//!
//! Resolves a filter expression to a bitmap of series ids through the tag
//! index, then fans out per-series range reads:
//!
//! ```text
//! filter string → AST → bitmap algebra → series ids → prefix scans → points
//! ```

use crate::index::{intersect, union};
use crate::query::ast::FilterExpr;
use crate::query::error::{QueryError, QueryResult};
use crate::query::parser::parse_filter;
use crate::storage::engine::Database;
use crate::storage::types::{DataPoint, QueryOptions, SeriesId};
use roaring::RoaringTreemap;
use std::collections::HashMap;

/// A query over one metric, built with the fluent interface
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let db = stratum::Database::open(stratum::Options::new("./data"))?;
/// let results = db
///     .new_query("cpu.total")
///     .filter("env:prod AND service:api")?
///     .time_range(1_000, 5_000)
///     .limit(100)
///     .execute()?;
/// # Ok(())
/// # }
/// ```
pub struct Query<'db> {
    pub(crate) db: &'db Database,
    pub(crate) metric: String,
    pub(crate) filter: Option<FilterExpr>,
    pub(crate) options: QueryOptions,
}

impl<'db> Query<'db> {
    pub(crate) fn new(db: &'db Database, metric: impl Into<String>) -> Self {
        Self {
            db,
            metric: metric.into(),
            filter: None,
            options: QueryOptions::default(),
        }
    }

    /// Set the tag filter expression (e.g. `"env:prod AND host:h1"`)
    pub fn filter(mut self, expr: &str) -> QueryResult<Self> {
        self.filter = parse_filter(expr)?;
        Ok(self)
    }

    /// Set the inclusive time bounds; zero leaves a bound open
    pub fn time_range(mut self, start: i64, end: i64) -> Self {
        self.options.start = start;
        self.options.end = end;
        self
    }

    /// Cap the number of points returned per series
    pub fn limit(mut self, n: usize) -> Self {
        self.options.limit = n;
        self
    }

    /// Run the query, returning points grouped by series, newest first
    pub fn execute(&self) -> QueryResult<HashMap<SeriesId, Vec<DataPoint>>> {
        self.validate()?;
        let series_ids = self.resolve_filter()?;

        let mut results = HashMap::new();
        for series_id in series_ids.iter() {
            let points = self.db.query(series_id, &self.options)?;
            if !points.is_empty() {
                results.insert(series_id, points);
            }
        }
        Ok(results)
    }

    /// Resolve the filter to matching series ids without fetching data
    pub fn execute_raw(&self) -> QueryResult<RoaringTreemap> {
        self.resolve_filter()
    }

    pub(crate) fn validate(&self) -> QueryResult<()> {
        let QueryOptions { start, end, .. } = self.options;
        if start > 0 && end > 0 && start > end {
            return Err(QueryError::InvalidArgument(format!(
                "time range start {start} is after end {end}"
            )));
        }
        Ok(())
    }

    pub(crate) fn resolve_filter(&self) -> QueryResult<RoaringTreemap> {
        match &self.filter {
            None => Ok(self.db.index().get_all_series_ids(&self.metric)?),
            Some(filter) => self.eval(filter),
        }
    }

    fn eval(&self, filter: &FilterExpr) -> QueryResult<RoaringTreemap> {
        match filter {
            FilterExpr::Tag { key, value } => {
                Ok(self.db.index().get_series_ids(&self.metric, key, value)?)
            }
            FilterExpr::And(left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(intersect(&[&left, &right]))
            }
            FilterExpr::Or(left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(union(&[&left, &right]))
            }
        }
    }
}
