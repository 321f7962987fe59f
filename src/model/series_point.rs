use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped record of a metric series.
///
/// Values are kept by column name so the same type serves every metric
/// domain (`apy_28d`, `collateral_value`, `cumulative_rewards_usd`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl SeriesPoint {
    pub fn new(ts: DateTime<Utc>) -> Self {
        Self {
            ts,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: f64) -> Self {
        self.set(field, value);
        self
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    /// Non finite values are dropped, they cannot round trip through JSON.
    pub fn set(&mut self, field: &str, value: f64) {
        if value.is_finite() {
            self.values.insert(field.to_owned(), value);
        } else {
            self.values.remove(field);
        }
    }
}

/// De-duplication granularity of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Every distinct timestamp is its own point.
    Instant,
    /// All rows of one UTC calendar day collapse into a single point.
    Day,
}

impl Bucket {
    pub fn key(&self, ts: &DateTime<Utc>) -> i64 {
        match self {
            Bucket::Instant => ts.timestamp_micros(),
            Bucket::Day => i64::from(ts.date_naive().num_days_from_ce()),
        }
    }

    pub fn point_key(&self, point: &SeriesPoint) -> i64 {
        self.key(&point.ts)
    }

    /// Lower fetch boundary for a marker and whether it is inclusive.
    ///
    /// Day buckets re-read the whole day the marker falls in, the open day's
    /// aggregate is not final until it closes.
    pub fn fetch_boundary(
        &self,
        marker: DateTime<Utc>,
    ) -> (DateTime<Utc>, bool) {
        match self {
            Bucket::Instant => (marker, false),
            Bucket::Day => {
                let start = marker
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc())
                    .unwrap_or(marker);
                (start, true)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_bucket_groups_intraday_rows() {
        let morning = Utc.with_ymd_and_hms(2024, 3, 2, 1, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 3, 2, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap();

        assert_eq!(Bucket::Day.key(&morning), Bucket::Day.key(&evening));
        assert_ne!(Bucket::Day.key(&evening), Bucket::Day.key(&next));
        assert_ne!(Bucket::Instant.key(&morning), Bucket::Instant.key(&evening));
    }

    #[test]
    fn test_fetch_boundary() {
        let marker = Utc.with_ymd_and_hms(2024, 3, 2, 13, 30, 0).unwrap();

        assert_eq!(Bucket::Instant.fetch_boundary(marker), (marker, false));
        assert_eq!(
            Bucket::Day.fetch_boundary(marker),
            (Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(), true)
        );
    }

    #[test]
    fn test_point_json_is_flat() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let point = SeriesPoint::new(ts).with("apy_28d", 0.12);
        let json = serde_json::to_value(&point).unwrap();

        assert_eq!(json["apy_28d"], serde_json::json!(0.12));
        assert!(json.get("values").is_none());

        let back: SeriesPoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn test_non_finite_values_are_dropped() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let point = SeriesPoint::new(ts).with("tvl", 1.0).with("tvl", f64::NAN);

        assert_eq!(point.value("tvl"), None);
    }
}
