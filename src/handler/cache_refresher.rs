//! Background cache refresh task
//!
//! Periodically runs the refresh orchestrator for every metric domain so
//! request handlers mostly find fresh series. Domains are refreshed with a
//! bounded concurrency to avoid load spikes on the source database.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::{
    configuration::{AppState, State},
    error::Error,
};

use super::refresh_orchestrator;

/// Main background task for cache refresh, runs until the process stops.
pub async fn cache_refresh_task(app_state: AppState<State>) -> Result<(), Error> {
    let seconds = app_state.config.refresh_interval;
    if seconds == 0 {
        info!("Background cache refresh disabled");
        return Ok(());
    }

    info!("Starting cache refresh background task, every {}s", seconds);
    let mut tick = interval(Duration::from_secs(seconds));

    loop {
        // first tick completes immediately and populates the cache on startup
        tick.tick().await;
        let failed = refresh_all_domains(&app_state).await;
        if failed > 0 {
            error!("{} domain refreshes failed in this cycle", failed);
        }
    }
}

/// Refreshes every domain, returns how many failed.
pub async fn refresh_all_domains(app_state: &AppState<State>) -> usize {
    let mut names: Vec<String> = app_state.domains.keys().cloned().collect();
    names.sort();

    debug!(
        "Refreshing {} domains (max {} in parallel)",
        names.len(),
        app_state.config.max_concurrent_refreshes
    );

    let results: Vec<_> = stream::iter(names)
        .map(|name| {
            let app_state = app_state.clone();
            async move {
                let result =
                    refresh_orchestrator::refresh_all(&app_state, &name, None)
                        .await;
                (name, result)
            }
        })
        .buffer_unordered(app_state.config.max_concurrent_refreshes)
        .collect()
        .await;

    let mut failed = 0;
    for (name, result) in results {
        match result {
            Ok(chains) => debug!("Refreshed {} on {} chains", name, chains),
            Err(e) => {
                failed += 1;
                error!("Failed to refresh {}: {}", name, e);
            },
        }
    }
    failed
}
