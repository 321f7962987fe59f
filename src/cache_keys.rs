//! Centralized cache key layout
//!
//! Every artifact the engine owns is stored under a base key of
//! `{domain}_{chain}` or `{domain}_{chain}_{secondary key}`, with a suffix per
//! artifact and a `_ts` suffix for the artifact's staleness marker.

pub const DAILY_SUFFIX: &str = "daily";
pub const SUMMARY_SUFFIX: &str = "summary";
pub const MARKER_SUFFIX: &str = "ts";

/// Which cached artifact of a (domain, chain, key) tuple a key points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Series,
    Daily,
    Summary,
}

pub fn build_base_key(domain: &str, chain: &str, key: Option<&str>) -> String {
    match key {
        Some(k) => format!("{}_{}_{}", domain, chain, k.to_uppercase()),
        None => format!("{}_{}", domain, chain),
    }
}

pub fn build_cache_key(
    domain: &str,
    chain: &str,
    key: Option<&str>,
    artifact: Artifact,
) -> String {
    let base = build_base_key(domain, chain, key);
    match artifact {
        Artifact::Series => base,
        Artifact::Daily => format!("{}_{}", base, DAILY_SUFFIX),
        Artifact::Summary => format!("{}_{}", base, SUMMARY_SUFFIX),
    }
}

pub fn marker_key(cache_key: &str) -> String {
    format!("{}_{}", cache_key, MARKER_SUFFIX)
}
