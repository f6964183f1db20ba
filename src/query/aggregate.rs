//! Time-bucketed aggregation
//!
//! Folds a point stream into fixed-width time buckets, computing one value
//! per bucket (avg, sum, min, max, or count), with optional grouping by tag
//! keys. Bucketing is commutative, so the per-series read order never
//! affects the result.

use crate::query::error::{QueryError, QueryResult};
use crate::query::executor::Query;
use crate::storage::engine::Database;
use crate::storage::error::StorageError;
use crate::storage::types::{DataPoint, Tagset};
use roaring::RoaringTreemap;
use std::collections::HashMap;

/// Aggregation function applied within each bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregateFunc {
    /// Arithmetic mean of the bucket's values
    #[default]
    Avg,
    /// Sum of the bucket's values
    Sum,
    /// Smallest value in the bucket
    Min,
    /// Largest value in the bucket
    Max,
    /// Number of points in the bucket
    Count,
}

/// Configuration for [`aggregate`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOptions {
    /// Function computed per bucket
    pub func: AggregateFunc,
    /// Bucket width in nanoseconds
    pub bucket_size: i64,
}

/// One aggregated time bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// Bucket start (aligned to a multiple of the bucket size)
    pub timestamp: i64,
    /// Aggregated value
    pub value: f64,
    /// Number of points folded into the bucket
    pub count: usize,
}

/// Bucket a point stream by fixed-width time windows
///
/// Returns an empty vector when `points` is empty or `bucket_size` is not
/// positive. Bucket keys use floor division (`div_euclid`), so widths stay
/// uniform on both sides of zero. Output is sorted by bucket timestamp
/// ascending.
pub fn aggregate(points: &[DataPoint], opts: &AggregateOptions) -> Vec<Bucket> {
    if points.is_empty() || opts.bucket_size <= 0 {
        return Vec::new();
    }

    let mut buckets: HashMap<i64, Accumulator> = HashMap::new();
    for point in points {
        let key = point.timestamp.div_euclid(opts.bucket_size) * opts.bucket_size;
        buckets.entry(key).or_default().add(point.value);
    }

    let mut result: Vec<Bucket> = buckets
        .into_iter()
        .map(|(timestamp, acc)| Bucket {
            timestamp,
            value: acc.compute(opts.func),
            count: acc.count,
        })
        .collect();
    result.sort_by_key(|bucket| bucket.timestamp);
    result
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    min: f64,
    max: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            if value < self.min {
                self.min = value;
            }
            if value > self.max {
                self.max = value;
            }
        }
        self.sum += value;
        self.count += 1;
    }

    fn compute(&self, func: AggregateFunc) -> f64 {
        match func {
            AggregateFunc::Avg => {
                if self.count == 0 {
                    0.0
                } else {
                    self.sum / self.count as f64
                }
            }
            AggregateFunc::Sum => self.sum,
            AggregateFunc::Min => self.min,
            AggregateFunc::Max => self.max,
            AggregateFunc::Count => self.count as f64,
        }
    }
}

/// Aggregation results for one group
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    /// Group-by tag values (empty without group-by)
    pub tags: HashMap<String, String>,
    /// Buckets sorted by timestamp ascending
    pub buckets: Vec<Bucket>,
}

/// An aggregation query over one metric
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let db = stratum::Database::open(stratum::Options::new("./data"))?;
/// let hourly = db
///     .new_aggregate_query("cpu.total")
///     .filter("env:prod")?
///     .bucket_size(3_600_000_000_000)
///     .avg()
///     .group_by(["host"])
///     .execute()?;
/// # Ok(())
/// # }
/// ```
pub struct AggregateQuery<'db> {
    query: Query<'db>,
    func: AggregateFunc,
    bucket_size: i64,
    group_by: Vec<String>,
}

impl<'db> AggregateQuery<'db> {
    pub(crate) fn new(db: &'db Database, metric: impl Into<String>) -> Self {
        Self {
            query: Query::new(db, metric),
            func: AggregateFunc::default(),
            bucket_size: 0,
            group_by: Vec::new(),
        }
    }

    /// Set the tag filter expression
    pub fn filter(mut self, expr: &str) -> QueryResult<Self> {
        self.query = self.query.filter(expr)?;
        Ok(self)
    }

    /// Set the inclusive time bounds; zero leaves a bound open
    pub fn time_range(mut self, start: i64, end: i64) -> Self {
        self.query = self.query.time_range(start, end);
        self
    }

    /// Set the bucket width in nanoseconds
    pub fn bucket_size(mut self, ns: i64) -> Self {
        self.bucket_size = ns;
        self
    }

    /// Aggregate with the arithmetic mean
    pub fn avg(mut self) -> Self {
        self.func = AggregateFunc::Avg;
        self
    }

    /// Aggregate with the sum
    pub fn sum(mut self) -> Self {
        self.func = AggregateFunc::Sum;
        self
    }

    /// Aggregate with the minimum
    pub fn min(mut self) -> Self {
        self.func = AggregateFunc::Min;
        self
    }

    /// Aggregate with the maximum
    pub fn max(mut self) -> Self {
        self.func = AggregateFunc::Max;
        self
    }

    /// Aggregate with the point count
    pub fn count(mut self) -> Self {
        self.func = AggregateFunc::Count;
        self
    }

    /// Group results by the given tag keys, in the given order
    pub fn group_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Run the aggregation
    pub fn execute(&self) -> QueryResult<Vec<AggregateResult>> {
        if self.bucket_size <= 0 {
            return Err(QueryError::InvalidArgument(
                "bucket size must be positive".to_string(),
            ));
        }
        self.query.validate()?;

        let series_ids = self.query.resolve_filter()?;
        let opts = AggregateOptions {
            func: self.func,
            bucket_size: self.bucket_size,
        };

        if self.group_by.is_empty() {
            self.execute_flat(&series_ids, &opts)
        } else {
            self.execute_grouped(&series_ids, &opts)
        }
    }

    fn execute_flat(
        &self,
        series_ids: &RoaringTreemap,
        opts: &AggregateOptions,
    ) -> QueryResult<Vec<AggregateResult>> {
        let mut all_points = Vec::new();
        for series_id in series_ids.iter() {
            all_points.extend(self.query.db.query(series_id, &self.query.options)?);
        }

        Ok(vec![AggregateResult {
            tags: HashMap::new(),
            buckets: aggregate(&all_points, opts),
        }])
    }

    fn execute_grouped(
        &self,
        series_ids: &RoaringTreemap,
        opts: &AggregateOptions,
    ) -> QueryResult<Vec<AggregateResult>> {
        struct Group {
            tags: HashMap<String, String>,
            points: Vec<DataPoint>,
        }

        let mut groups: HashMap<String, Group> = HashMap::new();

        for series_id in series_ids.iter() {
            // A series indexed but missing its metadata record cannot be
            // grouped; skip it and keep aggregating the rest.
            let meta = match self.query.db.series().get(series_id) {
                Ok(meta) => meta,
                Err(StorageError::SeriesNotFound(_)) => continue,
                Err(err) => return Err(err.into()),
            };

            let group = groups
                .entry(self.group_key(&meta.tags))
                .or_insert_with(|| Group {
                    tags: self.group_tags(&meta.tags),
                    points: Vec::new(),
                });
            group
                .points
                .extend(self.query.db.query(series_id, &self.query.options)?);
        }

        Ok(groups
            .into_values()
            .map(|group| AggregateResult {
                tags: group.tags,
                buckets: aggregate(&group.points, opts),
            })
            .collect())
    }

    fn group_key(&self, tags: &Tagset) -> String {
        let mut key = String::new();
        for group_key in &self.group_by {
            key.push_str(group_key);
            key.push('=');
            key.push_str(tags.get(group_key).unwrap_or_default());
            key.push(',');
        }
        key
    }

    fn group_tags(&self, tags: &Tagset) -> HashMap<String, String> {
        self.group_by
            .iter()
            .map(|key| {
                (
                    key.clone(),
                    tags.get(key).unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}
