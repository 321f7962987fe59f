//! Scheduled full refresh of a metric domain.
//!
//! Chains are refreshed one after another. Each chain reads from a single
//! source snapshot and stages its cache writes until the snapshot commits,
//! a failing chain is rolled back and stops the pass.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::{
    configuration::State,
    engine::{RefreshMode, SeriesEngine, SmoothingPolicy},
    error::Error,
    model::MetricDomain,
    provider::{CacheStore, SnapshotSource, StagedCache},
};

pub async fn refresh_all(
    state: &State,
    domain: &str,
    key: Option<&str>,
) -> Result<usize, Error> {
    let domain = state.get_domain(domain)?;
    refresh_domain(
        state.source.as_ref(),
        state.cache.as_ref(),
        state.smoothing.as_ref(),
        state.config.cache_ttl(),
        domain,
        key,
    )
    .await
}

/// Returns the number of chains refreshed.
pub async fn refresh_domain(
    source: &dyn SnapshotSource,
    cache: &dyn CacheStore,
    smoothing: &dyn SmoothingPolicy,
    ttl: Duration,
    domain: &MetricDomain,
    key: Option<&str>,
) -> Result<usize, Error> {
    let keys = domain.refresh_keys(key)?;
    let mut refreshed = 0;

    for chain in &domain.chains {
        let transaction = source
            .begin()
            .await
            .map_err(|e| Error::orchestration(chain, e))?;
        let staged = StagedCache::new(cache);

        let engine = SeriesEngine {
            cache: &staged,
            source: transaction.as_source(),
            smoothing,
            ttl,
        };
        let result = refresh_chain(&engine, domain, chain, &keys).await;

        match result {
            Ok(()) => {
                transaction
                    .commit()
                    .await
                    .map_err(|e| Error::orchestration(chain, e))?;
                let written = staged.flush().await;
                info!(
                    "Refreshed {} on {}, {} cache entries written",
                    domain.name, chain, written
                );
                refreshed += 1;
            },
            Err(e) => {
                if let Err(rollback) = transaction.rollback().await {
                    warn!("Rollback on {} failed: {}", chain, rollback);
                }
                error!(
                    "Refresh of {} on {} rolled back: {}",
                    domain.name, chain, e
                );
                return Err(Error::orchestration(chain, e));
            },
        }
    }

    Ok(refreshed)
}

async fn refresh_chain(
    engine: &SeriesEngine<'_>,
    domain: &MetricDomain,
    chain: &str,
    keys: &[Option<String>],
) -> Result<(), Error> {
    for key in keys {
        let key = key.as_deref();
        let series = engine
            .get_series(domain, chain, key, RefreshMode::Force)
            .await?;
        engine
            .refresh_summary(domain, chain, key, &series, true)
            .await;
        if domain.daily.is_some() {
            engine.get_daily(domain, chain, key, RefreshMode::Force).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{
            store,
            test_support::{day, point, MemorySource},
            NoSmoothing,
        },
        model::{builtin_domains, metric_domain::TVL, metric_domain::YIELD},
        provider::MokaStore,
    };

    const TTL: Duration = Duration::from_secs(3600);

    fn domain(name: &str) -> MetricDomain {
        builtin_domains(&[
            String::from("base_mainnet"),
            String::from("arbitrum_mainnet"),
            String::from("optimism_mainnet"),
        ])
        .into_iter()
        .find(|d| d.name == name)
        .unwrap()
    }

    fn seed(source: &MemorySource, domain: &MetricDomain, key: Option<&str>) {
        for chain in &domain.chains {
            source.insert(
                &domain.query(&domain.series, chain, key),
                vec![point(day(1), &domain.summary_field, 1.0), point(day(2), &domain.summary_field, 2.0)],
            );
            if let Some(daily) = &domain.daily {
                source.insert(
                    &domain.query(daily, chain, key),
                    vec![point(day(1), &domain.summary_field, 1.0)],
                );
            }
        }
    }

    #[tokio::test]
    async fn test_refreshes_every_chain_artifact() {
        let tvl = domain(TVL);
        let source = MemorySource::new();
        seed(&source, &tvl, Some("USDC"));
        let cache = MokaStore::new(1000);

        let refreshed = refresh_domain(&source, &cache, &NoSmoothing, TTL, &tvl, Some("usdc"))
            .await
            .unwrap();

        assert_eq!(refreshed, 3);
        assert_eq!(source.begins(), 3);
        assert_eq!(source.commits(), 3);
        for chain in &tvl.chains {
            let base = format!("tvl_{}_USDC", chain);
            assert_eq!(store::read_series(&cache, &base).await.points.map(|p| p.len()), Some(2));
            assert!(store::read_marker(&cache, &format!("{}_summary", base)).await.is_some());
            assert_eq!(store::read_marker(&cache, &format!("{}_daily", base)).await, Some(day(1)));
        }
    }

    #[tokio::test]
    async fn test_refresh_without_key_covers_all_keys() {
        let tvl = domain(TVL);
        let source = MemorySource::new();
        seed(&source, &tvl, Some("WETH"));
        let cache = MokaStore::new(1000);

        refresh_domain(&source, &cache, &NoSmoothing, TTL, &tvl, None).await.unwrap();

        assert!(!store::read_series(&cache, "tvl_base_mainnet_WETH").await.is_empty());
        assert!(store::read_series(&cache, "tvl_base_mainnet_USDC").await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_chain_rolls_back_and_stops() {
        let apr = domain(YIELD);
        let source = MemorySource::new();
        seed(&source, &apr, None);
        source.fail_on("arbitrum");
        let cache = MokaStore::new(1000);

        let result = refresh_domain(&source, &cache, &NoSmoothing, TTL, &apr, None).await;

        match result {
            Err(Error::Orchestration { chain, source: inner }) => {
                assert_eq!(chain, "arbitrum_mainnet");
                assert!(matches!(*inner, Error::SourceQuery(_)));
            },
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(source.begins(), 2);
        assert_eq!(source.commits(), 1);
        assert_eq!(source.rollbacks(), 1);
        assert!(!store::read_series(&cache, "yield_base_mainnet").await.is_empty());
        assert!(store::read_series(&cache, "yield_arbitrum_mainnet").await.is_empty());
        assert!(store::read_series(&cache, "yield_optimism_mainnet").await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_key_is_rejected_before_any_snapshot() {
        let tvl = domain(TVL);
        let source = MemorySource::new();
        let cache = MokaStore::new(10);

        let result = refresh_domain(&source, &cache, &NoSmoothing, TTL, &tvl, Some("DOGE")).await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(source.begins(), 0);
    }
}
