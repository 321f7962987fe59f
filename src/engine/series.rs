use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    cache_keys::{build_cache_key, Artifact},
    error::Error,
    model::{CachedSeries, MetricDomain, SeriesPoint, SeriesSpec, SummaryResult},
    provider::{CacheStore, Source},
};

use super::{
    fetcher::fetch_incremental,
    freshness::classify,
    merge::{apply_cumulative, merge},
    smoothing::SmoothingPolicy,
    store,
    summary::summarize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Fetch only when the source moved past the marker, fall back to the
    /// cached series when the source fails.
    Serve,
    /// Always fetch, propagate source failures.
    Force,
}

/// Keeps cached series of every metric domain in step with the source.
pub struct SeriesEngine<'a> {
    pub cache: &'a dyn CacheStore,
    pub source: &'a dyn Source,
    pub smoothing: &'a dyn SmoothingPolicy,
    pub ttl: Duration,
}

impl SeriesEngine<'_> {
    /// Brings one cached series up to date and returns it.
    pub async fn refresh(
        &self,
        domain: &MetricDomain,
        spec: &SeriesSpec,
        artifact: Artifact,
        chain: &str,
        key: Option<&str>,
        mode: RefreshMode,
    ) -> Result<Vec<SeriesPoint>, Error> {
        let cache_key = build_cache_key(&domain.name, chain, key, artifact);
        let query = domain.query(spec, chain, key);
        let cached = store::read_series(self.cache, &cache_key).await;
        let force = mode == RefreshMode::Force;

        let source_max = match self.source.max_timestamp(&query).await {
            Ok(max) => max,
            Err(e) => return Self::fallback(&cache_key, cached, mode, e),
        };

        let freshness = classify(&cached, source_max, force);
        if !freshness.needs_fetch() {
            debug!("{} is fresh", cache_key);
            return Ok(cached.into_points());
        }

        let Some(source_max) = source_max else {
            debug!("Source of {} holds no rows", cache_key);
            return Ok(cached.into_points());
        };

        let marker = cached.points.as_ref().and(cached.marker);
        let mut rows =
            match fetch_incremental(self.source, &query, spec, marker).await {
                Ok(rows) => rows,
                Err(e) => return Self::fallback(&cache_key, cached, mode, e),
            };

        let existing = cached.into_points();
        if let Some(cumulative) = &spec.cumulative {
            apply_cumulative(&existing, &mut rows, cumulative, spec.bucket);
        }

        let fetched = rows.len();
        let merged = merge(existing, rows, |point| spec.bucket.point_key(point));
        store::write_series(self.cache, &cache_key, &merged, source_max, self.ttl)
            .await;

        info!(
            "Refreshed {} ({:?}): {} rows fetched, {} cached, marker {}",
            cache_key,
            freshness,
            fetched,
            merged.len(),
            source_max
        );

        Ok(merged)
    }

    fn fallback(
        cache_key: &str,
        cached: CachedSeries,
        mode: RefreshMode,
        error: Error,
    ) -> Result<Vec<SeriesPoint>, Error> {
        match (mode, cached.points) {
            (RefreshMode::Serve, Some(points)) => {
                warn!("Serving stale {}, source failed: {}", cache_key, error);
                Ok(points)
            },
            _ => Err(error),
        }
    }

    pub async fn get_series(
        &self,
        domain: &MetricDomain,
        chain: &str,
        key: Option<&str>,
        mode: RefreshMode,
    ) -> Result<Vec<SeriesPoint>, Error> {
        self.refresh(domain, &domain.series, Artifact::Series, chain, key, mode)
            .await
    }

    pub async fn get_daily(
        &self,
        domain: &MetricDomain,
        chain: &str,
        key: Option<&str>,
        mode: RefreshMode,
    ) -> Result<Vec<SeriesPoint>, Error> {
        let spec = domain.daily.as_ref().ok_or_else(|| {
            Error::NotFound(format!("{} has no daily series", domain.name))
        })?;
        self.refresh(domain, spec, Artifact::Daily, chain, key, mode).await
    }

    pub async fn get_latest(
        &self,
        domain: &MetricDomain,
        chain: &str,
        key: Option<&str>,
        mode: RefreshMode,
    ) -> Result<Option<SeriesPoint>, Error> {
        let mut series = self.get_series(domain, chain, key, mode).await?;
        Ok(series.pop())
    }

    pub async fn get_summary(
        &self,
        domain: &MetricDomain,
        chain: &str,
        key: Option<&str>,
        mode: RefreshMode,
    ) -> Result<Option<SummaryResult>, Error> {
        let series = self.get_series(domain, chain, key, mode).await?;
        Ok(self
            .refresh_summary(domain, chain, key, &series, mode == RefreshMode::Force)
            .await)
    }

    /// Returns the cached summary while it is at least as new as the series
    /// it was derived from, recomputes it otherwise. The series is smoothed
    /// first for domains that ask for it.
    pub async fn refresh_summary(
        &self,
        domain: &MetricDomain,
        chain: &str,
        key: Option<&str>,
        series: &[SeriesPoint],
        force: bool,
    ) -> Option<SummaryResult> {
        let series_key =
            build_cache_key(&domain.name, chain, key, Artifact::Series);
        let summary_key =
            build_cache_key(&domain.name, chain, key, Artifact::Summary);

        let series_marker = store::read_marker(self.cache, &series_key).await;
        if !force {
            let summary_marker =
                store::read_marker(self.cache, &summary_key).await;
            if is_current(summary_marker, series_marker) {
                if let Some(summary) =
                    store::read_json::<SummaryResult>(self.cache, &summary_key)
                        .await
                {
                    return Some(summary);
                }
            }
        }

        let summary = if domain.smoothed {
            let smoothed = self.smoothing.smooth(series, &domain.summary_field);
            summarize(&smoothed, &domain.summary_field, None)?
        } else {
            summarize(series, &domain.summary_field, None)?
        };

        let marker = series_marker.or_else(|| series.last().map(|p| p.ts));
        if let Some(marker) = marker {
            if store::write_json(self.cache, &summary_key, &summary, self.ttl)
                .await
            {
                store::write_marker(self.cache, &summary_key, marker, self.ttl)
                    .await;
            }
        }

        debug!("Recomputed {}", summary_key);
        Some(summary)
    }
}

fn is_current(
    summary_marker: Option<DateTime<Utc>>,
    series_marker: Option<DateTime<Utc>>,
) -> bool {
    match (summary_marker, series_marker) {
        (Some(summary), Some(series)) => summary >= series,
        _ => false,
    }
}
