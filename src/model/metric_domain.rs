use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{
    error::Error,
    helpers::{formatter, Formatter},
    provider::SourceQuery,
};

use super::Bucket;

/// A running total derived from a per-row increment column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CumulativeField {
    pub source: String,
    pub target: String,
}

/// Where one series of a domain is read from and how it is bucketed.
#[derive(Debug, Clone)]
pub struct SeriesSpec {
    /// Table name, `$0` is replaced with the chain name.
    pub table: String,
    pub ts_column: String,
    pub columns: Vec<String>,
    pub bucket: Bucket,
    /// Lower bound of the very first fetch.
    pub epoch: DateTime<Utc>,
    pub cumulative: Option<CumulativeField>,
}

impl SeriesSpec {
    pub fn table_for(&self, chain: &str) -> String {
        formatter(self.table.to_owned(), &[Formatter::Str(chain.to_owned())])
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecondaryKey {
    pub column: String,
    pub allowed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MetricDomain {
    pub name: String,
    pub series: SeriesSpec,
    pub daily: Option<SeriesSpec>,
    pub summary_field: String,
    /// Whether the summary input goes through the smoothing policy. Off for
    /// volumes and running totals, where large real moves are normal.
    pub smoothed: bool,
    pub secondary_key: Option<SecondaryKey>,
    pub chains: Vec<String>,
}

impl MetricDomain {
    pub fn validate_chain(&self, chain: &str) -> Result<(), Error> {
        if self.chains.iter().any(|c| c == chain) {
            return Ok(());
        }
        Err(Error::Validation(format!(
            "chain '{}' is not configured for {}. Valid options: {}",
            chain,
            self.name,
            self.chains.join(", ")
        )))
    }

    /// Returns the normalized secondary key, or an error when a keyed domain
    /// gets none, an unkeyed one gets one, or the key is not allowed.
    pub fn validate_key(
        &self,
        key: Option<&str>,
    ) -> Result<Option<String>, Error> {
        match (&self.secondary_key, key) {
            (None, None) => Ok(None),
            (None, Some(k)) => Err(Error::Validation(format!(
                "{} does not take a secondary key, got '{}'",
                self.name, k
            ))),
            (Some(sk), None) => Err(Error::MissingParams(sk.column.to_owned())),
            (Some(sk), Some(k)) => sk
                .allowed
                .iter()
                .find(|allowed| allowed.eq_ignore_ascii_case(k))
                .map(|allowed| Some(allowed.to_owned()))
                .ok_or_else(|| {
                    Error::Validation(format!(
                        "{} '{}' is not supported. Valid options: {}",
                        sk.column,
                        k,
                        sk.allowed.join(", ")
                    ))
                }),
        }
    }

    /// Secondary keys a full refresh iterates over.
    pub fn refresh_keys(&self, key: Option<&str>) -> Result<Vec<Option<String>>, Error> {
        match (&self.secondary_key, key) {
            (Some(sk), None) => {
                Ok(sk.allowed.iter().cloned().map(Some).collect())
            },
            (_, key) => Ok(vec![self.validate_key(key)?]),
        }
    }

    pub fn query(
        &self,
        spec: &SeriesSpec,
        chain: &str,
        key: Option<&str>,
    ) -> SourceQuery {
        let mut filters = vec![];
        if let (Some(sk), Some(k)) = (&self.secondary_key, key) {
            filters.push((sk.column.to_owned(), k.to_owned()));
        }

        let mut columns = spec.columns.clone();
        if let Some(cumulative) = &spec.cumulative {
            if !columns.contains(&cumulative.source) {
                columns.push(cumulative.source.to_owned());
            }
        }

        SourceQuery {
            table: spec.table_for(chain),
            ts_column: spec.ts_column.to_owned(),
            columns,
            filters,
        }
    }
}

fn epoch(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|c| c.to_string()).collect()
}

pub const YIELD: &str = "yield";
pub const TVL: &str = "tvl";
pub const DELEGATIONS: &str = "delegations";
pub const PERP_STATS: &str = "perp_stats";
pub const REWARDS: &str = "rewards";

pub const COLLATERAL_TYPE: &str = "collateral_type";

const DEFAULT_COLLATERAL_TYPES: &[&str] =
    &["USDC", "sUSDC", "WETH", "wstETH", "cbBTC", "cbETH"];

/// Metric domains served out of the box. Tables, chains and keys can be
/// overridden from configuration.
pub fn builtin_domains(chains: &[String]) -> Vec<MetricDomain> {
    let collateral = Some(SecondaryKey {
        column: String::from(COLLATERAL_TYPE),
        allowed: columns(DEFAULT_COLLATERAL_TYPES),
    });

    vec![
        MetricDomain {
            name: String::from(YIELD),
            series: SeriesSpec {
                table: String::from("prod_$0.fct_pool_apr_$0"),
                ts_column: String::from("ts"),
                columns: columns(&["apr_24h", "apr_7d", "apr_28d", "apy_24h", "apy_7d", "apy_28d"]),
                bucket: Bucket::Instant,
                epoch: epoch(2024, 1, 1),
                cumulative: None,
            },
            daily: None,
            summary_field: String::from("apy_28d"),
            smoothed: true,
            secondary_key: None,
            chains: chains.to_vec(),
        },
        MetricDomain {
            name: String::from(TVL),
            series: SeriesSpec {
                table: String::from("prod_$0.fct_core_pool_collateral_$0"),
                ts_column: String::from("ts"),
                columns: columns(&["amount", "collateral_value"]),
                bucket: Bucket::Instant,
                epoch: epoch(2024, 1, 1),
                cumulative: None,
            },
            daily: Some(SeriesSpec {
                table: String::from("prod_$0.fct_core_pool_collateral_daily_$0"),
                ts_column: String::from("ts"),
                columns: columns(&["amount", "collateral_value"]),
                bucket: Bucket::Day,
                epoch: epoch(2024, 1, 1),
                cumulative: None,
            }),
            summary_field: String::from("collateral_value"),
            smoothed: true,
            secondary_key: collateral.clone(),
            chains: chains.to_vec(),
        },
        MetricDomain {
            name: String::from(DELEGATIONS),
            series: SeriesSpec {
                table: String::from("prod_$0.fct_pool_delegations_daily_$0"),
                ts_column: String::from("ts"),
                columns: columns(&["amount_delegated", "new_stakers"]),
                bucket: Bucket::Day,
                epoch: epoch(2024, 1, 1),
                cumulative: Some(CumulativeField {
                    source: String::from("new_stakers"),
                    target: String::from("cumulative_stakers"),
                }),
            },
            daily: None,
            summary_field: String::from("cumulative_stakers"),
            smoothed: false,
            secondary_key: None,
            chains: chains.to_vec(),
        },
        MetricDomain {
            name: String::from(PERP_STATS),
            series: SeriesSpec {
                table: String::from("prod_$0.fct_perp_stats_daily_$0"),
                ts_column: String::from("ts"),
                columns: columns(&[
                    "volume",
                    "trades",
                    "exchange_fees",
                    "liquidated_accounts",
                    "new_traders",
                ]),
                bucket: Bucket::Day,
                epoch: epoch(2023, 12, 15),
                cumulative: Some(CumulativeField {
                    source: String::from("new_traders"),
                    target: String::from("cumulative_traders"),
                }),
            },
            daily: None,
            summary_field: String::from("volume"),
            smoothed: false,
            secondary_key: None,
            chains: chains.to_vec(),
        },
        MetricDomain {
            name: String::from(REWARDS),
            series: SeriesSpec {
                table: String::from("prod_$0.fct_pool_rewards_hourly_$0"),
                ts_column: String::from("ts"),
                columns: columns(&["rewards_usd"]),
                bucket: Bucket::Instant,
                epoch: epoch(2024, 1, 1),
                cumulative: Some(CumulativeField {
                    source: String::from("rewards_usd"),
                    target: String::from("cumulative_rewards_usd"),
                }),
            },
            daily: Some(SeriesSpec {
                table: String::from("prod_$0.fct_pool_rewards_daily_$0"),
                ts_column: String::from("ts"),
                columns: columns(&["rewards_usd"]),
                bucket: Bucket::Day,
                epoch: epoch(2024, 1, 1),
                cumulative: Some(CumulativeField {
                    source: String::from("rewards_usd"),
                    target: String::from("cumulative_rewards_usd"),
                }),
            }),
            summary_field: String::from("cumulative_rewards_usd"),
            smoothed: false,
            secondary_key: collateral,
            chains: chains.to_vec(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains() -> Vec<MetricDomain> {
        builtin_domains(&[
            String::from("base_mainnet"),
            String::from("arbitrum_mainnet"),
        ])
    }

    fn domain(name: &str) -> MetricDomain {
        domains().into_iter().find(|d| d.name == name).unwrap()
    }

    #[test]
    fn test_validate_chain() {
        let tvl = domain(TVL);
        assert!(tvl.validate_chain("base_mainnet").is_ok());
        assert!(matches!(
            tvl.validate_chain("eth_mainnet"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_validate_key() {
        let tvl = domain(TVL);
        assert_eq!(tvl.validate_key(Some("usdc")).unwrap(), Some(String::from("USDC")));
        assert!(matches!(tvl.validate_key(None), Err(Error::MissingParams(_))));
        assert!(matches!(tvl.validate_key(Some("DOGE")), Err(Error::Validation(_))));

        let apr = domain(YIELD);
        assert_eq!(apr.validate_key(None).unwrap(), None);
        assert!(matches!(apr.validate_key(Some("USDC")), Err(Error::Validation(_))));
    }

    #[test]
    fn test_refresh_keys_expand_to_all_allowed() {
        let tvl = domain(TVL);
        assert_eq!(tvl.refresh_keys(None).unwrap().len(), DEFAULT_COLLATERAL_TYPES.len());
        assert_eq!(tvl.refresh_keys(Some("WETH")).unwrap(), vec![Some(String::from("WETH"))]);
        assert_eq!(domain(YIELD).refresh_keys(None).unwrap(), vec![None]);
    }

    #[test]
    fn test_smoothing_only_on_level_series() {
        let smoothed: Vec<_> = domains()
            .into_iter()
            .filter(|d| d.smoothed)
            .map(|d| d.name)
            .collect();
        assert_eq!(smoothed, vec![String::from(YIELD), String::from(TVL)]);
    }

    #[test]
    fn test_query_fills_table_and_filters() {
        let rewards = domain(REWARDS);
        let query = rewards.query(&rewards.series, "base_mainnet", Some("USDC"));

        assert_eq!(query.table, "prod_base_mainnet.fct_pool_rewards_hourly_base_mainnet");
        assert_eq!(query.filters, vec![(String::from(COLLATERAL_TYPE), String::from("USDC"))]);
        assert!(query.columns.contains(&String::from("rewards_usd")));
    }
}
