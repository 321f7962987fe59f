use chrono::{DateTime, Utc};

use crate::{
    helpers::{days_before, start_of_year},
    model::{SeriesPoint, SummaryResult},
};

/// Value of the last point at or before `t`, points must be ascending.
pub fn value_at(points: &[(DateTime<Utc>, f64)], t: DateTime<Utc>) -> Option<f64> {
    let index = points.partition_point(|(ts, _)| *ts <= t);
    index.checked_sub(1).map(|i| points[i].1)
}

/// Relative change in percent, `None` without a usable base.
pub fn pct_change(current: f64, past: Option<f64>) -> Option<f64> {
    match past {
        Some(past) if past != 0.0 => Some((current - past) / past.abs() * 100.0),
        _ => None,
    }
}

/// `current` as a percentage of `reference`, a zero reference counts as 100.
pub fn percentage_of(current: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        100.0
    } else {
        current / reference * 100.0
    }
}

/// Derives the summary of `field` over `series` as seen at `as_of`, which
/// defaults to the last point carrying the field.
///
/// Points without the field are ignored. Returns `None` when no point at or
/// before `as_of` has it.
pub fn summarize(
    series: &[SeriesPoint],
    field: &str,
    as_of: Option<DateTime<Utc>>,
) -> Option<SummaryResult> {
    let mut points: Vec<(DateTime<Utc>, f64)> = series
        .iter()
        .filter_map(|point| point.value(field).map(|value| (point.ts, value)))
        .collect();
    points.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(as_of) = as_of {
        points.retain(|(ts, _)| *ts <= as_of);
    }
    let &(last_ts, current) = points.last()?;
    let as_of = as_of.unwrap_or(last_ts);

    let delta = |days: i64| {
        pct_change(current, value_at(&points, days_before(as_of, days)))
    };

    let year_start = start_of_year(as_of);
    let ytd_base = points
        .iter()
        .find(|(ts, _)| *ts >= year_start)
        .or_else(|| points.first())
        .map(|(_, value)| *value);

    let ath = points.iter().map(|(_, v)| *v).fold(f64::MIN, f64::max);
    let atl = points.iter().map(|(_, v)| *v).fold(f64::MAX, f64::min);

    Some(SummaryResult {
        current,
        delta_24h: delta(1),
        delta_7d: delta(7),
        delta_28d: delta(28),
        delta_ytd: pct_change(current, ytd_base),
        ath,
        atl,
        ath_percentage: percentage_of(current, ath),
        atl_percentage: percentage_of(current, atl),
    })
}
