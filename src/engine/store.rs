//! Typed, soft failing access to the cache store.
//!
//! An unreachable store reads as a miss and writes as a no-op, both logged.
//! A value that no longer decodes is treated the same way.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::{
    cache_keys::marker_key,
    model::{CachedSeries, SeriesPoint},
    provider::CacheStore,
};

pub async fn read_json<T: DeserializeOwned>(
    cache: &dyn CacheStore,
    key: &str,
) -> Option<T> {
    let bytes = match cache.get(key).await {
        Ok(bytes) => bytes?,
        Err(e) => {
            warn!("Cache read of {} failed, treating as miss: {}", key, e);
            return None;
        },
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Cached value under {} does not decode: {}", key, e);
            None
        },
    }
}

/// Returns whether the value reached the store.
pub async fn write_json<T: Serialize + ?Sized>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> bool {
    let bytes = match serde_json::to_vec(value) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to encode cache value for {}: {}", key, e);
            return false;
        },
    };

    match cache.set(key, bytes, ttl).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Cache write of {} failed, skipping: {}", key, e);
            false
        },
    }
}

pub async fn read_marker(
    cache: &dyn CacheStore,
    cache_key: &str,
) -> Option<DateTime<Utc>> {
    read_json(cache, &marker_key(cache_key)).await
}

pub async fn write_marker(
    cache: &dyn CacheStore,
    cache_key: &str,
    marker: DateTime<Utc>,
    ttl: Duration,
) -> bool {
    write_json(cache, &marker_key(cache_key), &marker, ttl).await
}

pub async fn read_series(cache: &dyn CacheStore, cache_key: &str) -> CachedSeries {
    CachedSeries {
        points: read_json::<Vec<SeriesPoint>>(cache, cache_key).await,
        marker: read_marker(cache, cache_key).await,
    }
}

/// Writes the points first and the marker only once they are stored, so a
/// marker never claims data the cache does not hold.
pub async fn write_series(
    cache: &dyn CacheStore,
    cache_key: &str,
    points: &[SeriesPoint],
    marker: DateTime<Utc>,
    ttl: Duration,
) -> bool {
    write_json(cache, cache_key, points, ttl).await
        && write_marker(cache, cache_key, marker, ttl).await
}
