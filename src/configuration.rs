use std::{
    collections::HashMap, env, fs, ops::Deref, path::Path, sync::Arc,
    time::Duration,
};

use crate::{
    engine::{NoSmoothing, RollingMedianClamp, SeriesEngine, SmoothingPolicy},
    error::Error,
    helpers::{is_identifier, parse_list},
    model::{builtin_domains, MetricDomain},
    provider::{CacheStore, MokaStore, SnapshotSource},
};

#[derive(Debug)]
pub struct AppState<T>(Arc<T>);

impl<T> AppState<T> {
    pub fn new(state: T) -> AppState<T> {
        AppState(Arc::new(state))
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> AppState<T> {
        AppState(Arc::clone(&self.0))
    }
}

impl<T> Deref for AppState<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

pub struct State {
    pub config: Config,
    pub source: Arc<dyn SnapshotSource>,
    pub cache: Arc<dyn CacheStore>,
    pub smoothing: Arc<dyn SmoothingPolicy>,
    pub domains: HashMap<String, MetricDomain>,
}

impl State {
    pub fn new(config: Config, source: Arc<dyn SnapshotSource>) -> State {
        let cache = Arc::new(MokaStore::new(config.cache_max_capacity));
        Self::with_cache(config, source, cache)
    }

    pub fn with_cache(
        config: Config,
        source: Arc<dyn SnapshotSource>,
        cache: Arc<dyn CacheStore>,
    ) -> State {
        let smoothing: Arc<dyn SmoothingPolicy> =
            match config.smoothing_policy {
                SmoothingKind::None => Arc::new(NoSmoothing),
                SmoothingKind::Median => Arc::new(RollingMedianClamp {
                    window: config.smoothing_window,
                    tolerance: config.smoothing_tolerance,
                }),
            };
        let domains = config
            .domains
            .iter()
            .map(|domain| (domain.name.to_owned(), domain.clone()))
            .collect();

        State {
            config,
            source,
            cache,
            smoothing,
            domains,
        }
    }

    pub fn get_domain(&self, name: &str) -> Result<&MetricDomain, Error> {
        self.domains
            .get(name)
            .ok_or_else(|| Error::DomainNotFound(name.to_owned()))
    }

    pub fn engine(&self) -> SeriesEngine<'_> {
        SeriesEngine {
            cache: self.cache.as_ref(),
            source: self.source.as_source(),
            smoothing: self.smoothing.as_ref(),
            ttl: self.config.cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingKind {
    Median,
    None,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub domains: Vec<MetricDomain>,
    pub cache_ttl_secs: u64,
    pub cache_max_capacity: u64,
    /// Seconds between background refresh passes, 0 disables them.
    pub refresh_interval: u64,
    pub max_concurrent_refreshes: usize,
    pub smoothing_policy: SmoothingKind,
    pub smoothing_window: usize,
    pub smoothing_tolerance: f64,
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Builds the configuration from any key lookup, the process env in
    /// production.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                Error::ConfigurationError(format!("{} is not set", key))
            })
        };
        let optional =
            |key: &str, default: &str| lookup(key).unwrap_or(default.to_owned());

        let database_url = required("DATABASE_URL")?;
        let database_max_connections =
            optional("DATABASE_MAX_CONNECTIONS", "20").parse()?;
        let server_host = required("SERVER_HOST")?;
        let port: u16 = required("PORT")?.parse()?;
        let allowed_origins = parse_list(&optional("ALLOWED_ORIGINS", "*"));

        let chains = parse_chains("CHAINS", &required("CHAINS")?)?;
        let mut domains = builtin_domains(&chains);
        for domain in domains.iter_mut() {
            apply_overrides(domain, &lookup)?;
        }

        let cache_ttl_secs = optional("CACHE_TTL_SECS", "31536000").parse()?;
        let cache_max_capacity =
            optional("CACHE_MAX_CAPACITY", "10000").parse()?;
        let refresh_interval =
            optional("REFRESH_INTERVAL_SECS", "3600").parse()?;
        let max_concurrent_refreshes: usize =
            optional("MAX_CONCURRENT_REFRESHES", "2").parse()?;

        let smoothing_policy =
            match optional("SMOOTHING_POLICY", "median").as_str() {
                "median" => SmoothingKind::Median,
                "none" => SmoothingKind::None,
                other => {
                    return Err(Error::ConfigurationError(format!(
                        "unknown SMOOTHING_POLICY '{}', expected median or none",
                        other
                    )))
                },
            };
        let smoothing_window: usize =
            optional("SMOOTHING_WINDOW", "5").parse()?;
        if smoothing_window < 3 || smoothing_window % 2 == 0 {
            return Err(Error::ConfigurationError(format!(
                "SMOOTHING_WINDOW must be an odd number of at least 3, got {}",
                smoothing_window
            )));
        }
        let smoothing_tolerance =
            optional("SMOOTHING_TOLERANCE", "0.5").parse()?;

        Ok(Config {
            database_url,
            database_max_connections,
            server_host,
            port,
            allowed_origins,
            domains,
            cache_ttl_secs,
            cache_max_capacity,
            refresh_interval,
            max_concurrent_refreshes: max_concurrent_refreshes.max(1),
            smoothing_policy,
            smoothing_window,
            smoothing_tolerance,
        })
    }
}

fn parse_chains(key: &str, value: &str) -> Result<Vec<String>, Error> {
    let chains = parse_list(value);
    if chains.is_empty() {
        return Err(Error::ConfigurationError(format!("{} is empty", key)));
    }
    if let Some(bad) = chains.iter().find(|chain| !is_identifier(chain)) {
        return Err(Error::ConfigurationError(format!(
            "{} contains invalid chain name '{}'",
            key, bad
        )));
    }
    Ok(chains)
}

fn parse_table(key: &str, value: &str) -> Result<String, Error> {
    let valid = value
        .split('.')
        .all(|part| is_identifier(&part.replace("$0", "chain")));
    if !valid {
        return Err(Error::ConfigurationError(format!(
            "{} is not a valid table template: '{}'",
            key, value
        )));
    }
    Ok(value.to_owned())
}

/// Applies `<DOMAIN>_CHAINS`, `<DOMAIN>_KEYS`, `<DOMAIN>_TABLE`,
/// `<DOMAIN>_DAILY_TABLE` and `<DOMAIN>_SMOOTHING`.
fn apply_overrides<F>(domain: &mut MetricDomain, lookup: &F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    let prefix = domain.name.to_uppercase();

    let key = format!("{}_CHAINS", prefix);
    if let Some(value) = lookup(&key) {
        domain.chains = parse_chains(&key, &value)?;
    }

    let key = format!("{}_KEYS", prefix);
    if let Some(value) = lookup(&key) {
        match domain.secondary_key.as_mut() {
            Some(secondary) => {
                let allowed = parse_list(&value);
                if allowed.is_empty() {
                    return Err(Error::ConfigurationError(format!(
                        "{} is empty",
                        key
                    )));
                }
                secondary.allowed = allowed;
            },
            None => {
                return Err(Error::ConfigurationError(format!(
                    "{} is set but {} has no secondary key",
                    key, domain.name
                )))
            },
        }
    }

    let key = format!("{}_TABLE", prefix);
    if let Some(value) = lookup(&key) {
        domain.series.table = parse_table(&key, &value)?;
    }

    let key = format!("{}_DAILY_TABLE", prefix);
    if let Some(value) = lookup(&key) {
        match domain.daily.as_mut() {
            Some(daily) => daily.table = parse_table(&key, &value)?,
            None => {
                return Err(Error::ConfigurationError(format!(
                    "{} is set but {} has no daily series",
                    key, domain.name
                )))
            },
        }
    }

    let key = format!("{}_SMOOTHING", prefix);
    if let Some(value) = lookup(&key) {
        domain.smoothed = match value.as_str() {
            "on" => true,
            "off" => false,
            other => {
                return Err(Error::ConfigurationError(format!(
                    "{} must be on or off, got '{}'",
                    key, other
                )))
            },
        };
    }

    Ok(())
}

pub fn get_configuration() -> Result<Config, Error> {
    Config::from_lookup(|key| env::var(key).ok())
}

/// Loads `.env` and `analytics.conf` from the manifest directory into the
/// process env. Missing files are skipped.
pub fn set_configuration() -> Result<(), Error> {
    let config_files = [".env", "analytics.conf"];
    let directory = env!("CARGO_MANIFEST_DIR");

    for file in config_files {
        let path = format!("{}/{}", directory, file);
        if !Path::new(&path).exists() {
            continue;
        }
        let config_string = fs::read_to_string(path)?;
        parse_config_string(config_string);
    }

    Ok(())
}

fn parse_config_string(config: String) {
    for (key, value) in parse_pairs(&config) {
        if env::var(key).is_err() {
            env::set_var(key, value);
        }
    }
}

fn parse_pairs(config: &str) -> Vec<(&str, &str)> {
    config
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect()
}
