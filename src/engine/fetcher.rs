use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    error::Error,
    model::{SeriesPoint, SeriesSpec},
    provider::{Source, SourceQuery},
};

/// Reads the rows the cache is missing.
///
/// Without a marker the whole history from the series epoch is read.
/// Otherwise the lower bound comes from the series bucket, see
/// [`crate::model::Bucket::fetch_boundary`]. Rows come back ascending.
pub async fn fetch_incremental(
    source: &dyn Source,
    query: &SourceQuery,
    spec: &SeriesSpec,
    marker: Option<DateTime<Utc>>,
) -> Result<Vec<SeriesPoint>, Error> {
    let (since, inclusive) = match marker {
        Some(marker) => spec.bucket.fetch_boundary(marker),
        None => (spec.epoch, true),
    };

    let mut rows = source.rows_after(query, since, inclusive).await?;
    rows.sort_by(|a, b| a.ts.cmp(&b.ts));

    debug!(
        "Fetched {} rows from {} since {} (inclusive: {})",
        rows.len(),
        query.table,
        since,
        inclusive
    );

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::test_support::{day, day_at, point, MemorySource},
        model::{builtin_domains, metric_domain::DELEGATIONS, metric_domain::YIELD},
    };

    fn spec_of(name: &str) -> (SeriesSpec, SourceQuery) {
        let domain = builtin_domains(&[String::from("base_mainnet")])
            .into_iter()
            .find(|d| d.name == name)
            .unwrap();
        let query = domain.query(&domain.series, "base_mainnet", None);
        (domain.series, query)
    }

    #[tokio::test]
    async fn test_cold_fetch_reads_from_epoch() {
        let (spec, query) = spec_of(YIELD);
        let source = MemorySource::new();
        source.insert(&query, vec![point(day(2), "apy_28d", 2.0), point(day(1), "apy_28d", 1.0)]);

        let rows = fetch_incremental(&source, &query, &spec, None).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ts, day(1));
    }

    #[tokio::test]
    async fn test_instant_fetch_is_exclusive() {
        let (spec, query) = spec_of(YIELD);
        let source = MemorySource::new();
        source.insert(&query, vec![point(day(1), "apy_28d", 1.0), point(day(2), "apy_28d", 2.0)]);

        let rows = fetch_incremental(&source, &query, &spec, Some(day(1))).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ts, day(2));
    }

    #[tokio::test]
    async fn test_day_fetch_rereads_open_day() {
        let (spec, query) = spec_of(DELEGATIONS);
        let source = MemorySource::new();
        source.insert(
            &query,
            vec![
                point(day(1), "new_stakers", 1.0),
                point(day_at(2, 0), "new_stakers", 2.0),
                point(day_at(2, 12), "new_stakers", 3.0),
            ],
        );

        let rows = fetch_incremental(&source, &query, &spec, Some(day_at(2, 12))).await.unwrap();

        let ts: Vec<_> = rows.iter().map(|p| p.ts).collect();
        assert_eq!(ts, vec![day_at(2, 0), day_at(2, 12)]);
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let (spec, query) = spec_of(YIELD);
        let source = MemorySource::new();
        source.fail_on("fct_pool_apr");

        let result = fetch_incremental(&source, &query, &spec, None).await;

        assert!(matches!(result, Err(Error::SourceQuery(_))));
    }
}
