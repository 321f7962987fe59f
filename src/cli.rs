//! CLI module for the analytics service
//!
//! Runs the HTTP server, or a single refresh pass for the scheduler without
//! starting the server.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::{
    configuration::{get_configuration, Config, State},
    error::Error,
    handler::refresh_orchestrator,
    provider::DatabasePool,
};

/// Incremental time series cache and summary statistics service
#[derive(Parser)]
#[command(name = "analytics")]
#[command(about = "Cached protocol analytics API", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the API server and background refresher (default if no command specified)
    Serve,

    /// Refresh every chain of one metric domain and exit
    Refresh {
        /// Metric domain, e.g. tvl or perp_stats
        domain: String,

        /// Secondary key such as a collateral type, all keys when omitted
        #[arg(long)]
        key: Option<String>,
    },
}

pub async fn init_state(config: Config) -> Result<State, Error> {
    let database = DatabasePool::new(&config).await?;
    Ok(State::new(config, Arc::new(database.series)))
}

/// One orchestrator pass, errors make the process exit non zero.
pub async fn run_refresh(domain: &str, key: Option<&str>) -> Result<(), Error> {
    let config = get_configuration()?;
    let state = init_state(config).await?;

    info!("Refreshing {} ({})", domain, key.unwrap_or("all keys"));
    let chains = refresh_orchestrator::refresh_all(&state, domain, key).await?;
    info!("Refreshed {} on {} chains", domain, chains);

    Ok(())
}
