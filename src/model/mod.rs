//! Series, summary and metric domain models.

mod cached_series;
pub mod metric_domain;
mod series_point;
mod table;

pub use cached_series::{CachedSeries, SummaryResult};
pub use metric_domain::{
    builtin_domains, CumulativeField, MetricDomain, SecondaryKey, SeriesSpec,
};
pub use series_point::{Bucket, SeriesPoint};
pub use table::Table;
