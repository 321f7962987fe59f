//! In-memory doubles shared by the engine and handler tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::{
    error::Error,
    model::SeriesPoint,
    provider::{
        CacheStore, SnapshotSource, Source, SourceQuery, SourceTransaction,
    },
};

/// Midnight of day `n` of January 2024, `day(1)` is 2024-01-01.
pub fn day(n: i64) -> DateTime<Utc> {
    day_at(n, 0)
}

pub fn day_at(n: i64, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
        + chrono::Duration::days(n - 1)
}

pub fn point(ts: DateTime<Utc>, field: &str, value: f64) -> SeriesPoint {
    SeriesPoint::new(ts).with(field, value)
}

type Rows = HashMap<String, Vec<SeriesPoint>>;

fn rows_key(query: &SourceQuery) -> String {
    format!("{}|{:?}", query.table, query.filters)
}

fn max_of(rows: &Rows, query: &SourceQuery) -> Option<DateTime<Utc>> {
    rows.get(&rows_key(query))
        .and_then(|points| points.iter().map(|p| p.ts).max())
}

fn after(
    rows: &Rows,
    query: &SourceQuery,
    since: DateTime<Utc>,
    inclusive: bool,
) -> Vec<SeriesPoint> {
    let mut selected: Vec<SeriesPoint> = rows
        .get(&rows_key(query))
        .map(|points| {
            points
                .iter()
                .filter(|p| if inclusive { p.ts >= since } else { p.ts > since })
                .map(|p| SeriesPoint {
                    ts: p.ts,
                    values: p
                        .values
                        .iter()
                        .filter(|(k, _)| query.columns.contains(k))
                        .map(|(k, v)| (k.to_owned(), *v))
                        .collect(),
                })
                .collect()
        })
        .unwrap_or_default();
    selected.sort_by(|a, b| a.ts.cmp(&b.ts));
    selected
}

#[derive(Default)]
struct Inner {
    rows: Mutex<Rows>,
    fail_on: Mutex<Option<String>>,
    max_queries: AtomicUsize,
    row_queries: AtomicUsize,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl Inner {
    fn check(&self, query: &SourceQuery) -> Result<(), Error> {
        match self.fail_on.lock().unwrap().as_deref() {
            Some(pattern) if query.table.contains(pattern) => {
                Err(Error::SourceQuery(sqlx::Error::PoolTimedOut))
            },
            _ => Ok(()),
        }
    }
}

/// Source backed by a map of `(table, filters)` to rows, cloning shares
/// the same data and counters.
#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<Inner>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds rows for the table and filters of `query`, replacing rows with
    /// an equal `ts`.
    pub fn insert(&self, query: &SourceQuery, points: Vec<SeriesPoint>) {
        let mut rows = self.inner.rows.lock().unwrap();
        let entry = rows.entry(rows_key(query)).or_default();
        for point in points {
            entry.retain(|p| p.ts != point.ts);
            entry.push(point);
        }
    }

    /// Every query on a table containing `pattern` fails from now on.
    pub fn fail_on(&self, pattern: &str) {
        *self.inner.fail_on.lock().unwrap() = Some(pattern.to_owned());
    }

    pub fn max_queries(&self) -> usize {
        self.inner.max_queries.load(Ordering::SeqCst)
    }

    pub fn row_queries(&self) -> usize {
        self.inner.row_queries.load(Ordering::SeqCst)
    }

    pub fn begins(&self) -> usize {
        self.inner.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn max_timestamp(
        &self,
        query: &SourceQuery,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        self.inner.max_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.check(query)?;
        Ok(max_of(&self.inner.rows.lock().unwrap(), query))
    }

    async fn rows_after(
        &self,
        query: &SourceQuery,
        since: DateTime<Utc>,
        inclusive: bool,
    ) -> Result<Vec<SeriesPoint>, Error> {
        self.inner.row_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.check(query)?;
        Ok(after(&self.inner.rows.lock().unwrap(), query, since, inclusive))
    }
}

#[async_trait]
impl SnapshotSource for MemorySource {
    fn as_source(&self) -> &dyn Source {
        self
    }

    async fn begin(&self) -> Result<Box<dyn SourceTransaction>, Error> {
        self.inner.begins.fetch_add(1, Ordering::SeqCst);
        let rows = self.inner.rows.lock().unwrap().clone();
        Ok(Box::new(MemoryTransaction {
            parent: self.clone(),
            rows,
        }))
    }
}

/// Reads from a copy of the rows taken at `begin`.
pub struct MemoryTransaction {
    parent: MemorySource,
    rows: Rows,
}

#[async_trait]
impl Source for MemoryTransaction {
    async fn max_timestamp(
        &self,
        query: &SourceQuery,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        self.parent.inner.max_queries.fetch_add(1, Ordering::SeqCst);
        self.parent.inner.check(query)?;
        Ok(max_of(&self.rows, query))
    }

    async fn rows_after(
        &self,
        query: &SourceQuery,
        since: DateTime<Utc>,
        inclusive: bool,
    ) -> Result<Vec<SeriesPoint>, Error> {
        self.parent.inner.row_queries.fetch_add(1, Ordering::SeqCst);
        self.parent.inner.check(query)?;
        Ok(after(&self.rows, query, since, inclusive))
    }
}

#[async_trait]
impl SourceTransaction for MemoryTransaction {
    fn as_source(&self) -> &dyn Source {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        self.parent.inner.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        self.parent.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A cache store that is always down.
pub struct FailingCache;

#[async_trait]
impl CacheStore for FailingCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Err(Error::CacheUnavailable(key.to_owned()))
    }

    async fn set(
        &self,
        key: &str,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), Error> {
        Err(Error::CacheUnavailable(key.to_owned()))
    }
}
