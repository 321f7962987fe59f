use chrono::{DateTime, Utc};

use crate::model::CachedSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Cache covers everything the source holds.
    Fresh,
    /// Source holds rows newer than the cache, or part of the cache is gone.
    Stale,
    /// Nothing cached yet.
    Unknown,
}

impl Freshness {
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, Freshness::Fresh)
    }
}

/// Compares a cached series against the source's current `MAX(ts)`.
///
/// A source without rows never makes a cache stale.
pub fn classify(
    cached: &CachedSeries,
    source_max: Option<DateTime<Utc>>,
    force: bool,
) -> Freshness {
    if force {
        return Freshness::Stale;
    }
    if cached.is_empty() {
        return Freshness::Unknown;
    }

    match (&cached.points, cached.marker) {
        (Some(_), Some(marker)) => match source_max {
            Some(max) if max > marker => Freshness::Stale,
            _ => Freshness::Fresh,
        },
        _ => Freshness::Stale,
    }
}
