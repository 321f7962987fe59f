use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SeriesPoint;

/// A series as read back from the cache store together with its marker.
///
/// Both halves are stored under separate keys, either may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedSeries {
    pub points: Option<Vec<SeriesPoint>>,
    pub marker: Option<DateTime<Utc>>,
}

impl CachedSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_none() && self.marker.is_none()
    }

    pub fn into_points(self) -> Vec<SeriesPoint> {
        self.points.unwrap_or_default()
    }
}

/// Derived statistics over one series field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub current: f64,
    pub delta_24h: Option<f64>,
    pub delta_7d: Option<f64>,
    pub delta_28d: Option<f64>,
    pub delta_ytd: Option<f64>,
    pub ath: f64,
    pub atl: f64,
    pub ath_percentage: f64,
    pub atl_percentage: f64,
}
