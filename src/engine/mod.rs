//! Incremental cache engine shared by every metric domain.

pub use self::{
    fetcher::fetch_incremental,
    freshness::{classify, Freshness},
    merge::{apply_cumulative, merge},
    series::{RefreshMode, SeriesEngine},
    smoothing::{NoSmoothing, RollingMedianClamp, SmoothingPolicy},
    summary::summarize,
};

mod fetcher;
mod freshness;
mod merge;
mod series;
mod smoothing;
pub mod store;
mod summary;

#[cfg(test)]
pub(crate) mod test_support;
