//! Key/value store holding cached series, summaries and their markers.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use moka::{future::Cache, Expiry};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{cache_keys::MARKER_SUFFIX, error::Error};

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// A missing key is a normal cold cache, not an error.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), Error>;
}

#[derive(Clone)]
struct Blob {
    data: Arc<Vec<u8>>,
    ttl: Duration,
}

struct BlobExpiry;

impl Expiry<String, Blob> for BlobExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Blob,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Blob,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In process store backed by Moka, each entry expires after its own TTL.
pub struct MokaStore {
    entries: Cache<String, Blob>,
}

impl MokaStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(BlobExpiry)
                .build(),
        }
    }
}

impl std::fmt::Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

#[async_trait]
impl CacheStore for MokaStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self
            .entries
            .get(key)
            .await
            .map(|blob| blob.data.as_ref().clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), Error> {
        self.entries
            .insert(
                key.to_owned(),
                Blob {
                    data: Arc::new(value),
                    ttl,
                },
            )
            .await;
        Ok(())
    }
}

fn is_marker(key: &str) -> bool {
    key.strip_suffix(MARKER_SUFFIX)
        .is_some_and(|rest| rest.ends_with('_'))
}

/// Buffers writes on top of another store until `flush` is called.
///
/// Reads see staged values first, so a sequence of refresh steps observes
/// its own writes before anything reaches the shared store.
pub struct StagedCache<'a> {
    inner: &'a dyn CacheStore,
    staged: Mutex<HashMap<String, (Vec<u8>, Duration)>>,
}

impl<'a> StagedCache<'a> {
    pub fn new(inner: &'a dyn CacheStore) -> Self {
        Self {
            inner,
            staged: Mutex::new(HashMap::new()),
        }
    }

    /// Writes all staged entries through, returns how many were written.
    /// Marker keys go last so a marker never lands before its data. A
    /// failed write is logged and skipped.
    pub async fn flush(self) -> usize {
        let mut staged: Vec<_> = self.staged.into_inner().into_iter().collect();
        staged.sort_by_key(|(key, _)| is_marker(key));
        let mut written = 0;

        for (key, (value, ttl)) in staged {
            match self.inner.set(&key, value, ttl).await {
                Ok(()) => written += 1,
                Err(e) => warn!("Failed to write cache key {}: {}", key, e),
            }
        }

        written
    }
}

#[async_trait]
impl CacheStore for StagedCache<'_> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        if let Some((value, _)) = self.staged.lock().await.get(key) {
            return Ok(Some(value.clone()));
        }
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), Error> {
        self.staged
            .lock()
            .await
            .insert(key.to_owned(), (value, ttl));
        Ok(())
    }
}
