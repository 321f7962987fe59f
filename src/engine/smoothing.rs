//! Outlier suppression applied to a series before statistics are derived.
//!
//! The smoothed series is only an input to the summary engine, cached raw
//! series are never replaced by it.

use crate::model::SeriesPoint;

pub trait SmoothingPolicy: Send + Sync {
    /// Returns a series of the same length and order as `series`.
    fn smooth(&self, series: &[SeriesPoint], field: &str) -> Vec<SeriesPoint>;
}

/// Leaves every value untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSmoothing;

impl SmoothingPolicy for NoSmoothing {
    fn smooth(&self, series: &[SeriesPoint], _field: &str) -> Vec<SeriesPoint> {
        series.to_vec()
    }
}

/// Rolling median clamp.
///
/// Each value is compared against the median of a centered window of
/// `window` points, an odd number. When its relative deviation from that
/// median exceeds `tolerance` the value is replaced by the median. Only
/// isolated glitches are clamped: a point needs values on both sides in its
/// window, so the first and last points are never rewritten. Windows with
/// fewer than three values, and windows whose median is zero, leave the
/// point untouched. Points without the field are skipped and do not take
/// part in their neighbours' windows.
#[derive(Debug, Clone, Copy)]
pub struct RollingMedianClamp {
    pub window: usize,
    pub tolerance: f64,
}

impl Default for RollingMedianClamp {
    fn default() -> Self {
        Self {
            window: 5,
            tolerance: 0.5,
        }
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let middle = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[middle - 1] + values[middle]) / 2.0
    } else {
        values[middle]
    }
}

impl SmoothingPolicy for RollingMedianClamp {
    fn smooth(&self, series: &[SeriesPoint], field: &str) -> Vec<SeriesPoint> {
        let values: Vec<Option<f64>> =
            series.iter().map(|point| point.value(field)).collect();
        let half = self.window / 2;

        series
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let Some(value) = values[index] else {
                    return point.clone();
                };

                let from = index.saturating_sub(half);
                let to = (index + half + 1).min(values.len());
                let before = values[from..index].iter().flatten().count();
                let after = values[index + 1..to].iter().flatten().count();
                if before == 0 || after == 0 {
                    return point.clone();
                }

                let mut window: Vec<f64> =
                    values[from..to].iter().flatten().copied().collect();

                if window.len() < 3 {
                    return point.clone();
                }

                let median = median(&mut window);
                if median == 0.0 {
                    return point.clone();
                }

                let deviation = ((value - median) / median).abs();
                if deviation > self.tolerance {
                    point.clone().with(field, median)
                } else {
                    point.clone()
                }
            })
            .collect()
    }
}
