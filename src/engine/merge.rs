use std::{collections::HashMap, hash::Hash};

use crate::model::{Bucket, CumulativeField, SeriesPoint};

/// Folds `incoming` into `existing`.
///
/// A point whose key is already present replaces the old one, the newest
/// computation of a bucket wins. New keys are appended. The result is sorted
/// ascending by `ts`, replacements do not keep insertion order.
pub fn merge<K, F>(
    existing: Vec<SeriesPoint>,
    incoming: Vec<SeriesPoint>,
    key_fn: F,
) -> Vec<SeriesPoint>
where
    K: Eq + Hash,
    F: Fn(&SeriesPoint) -> K,
{
    let mut merged = existing;
    let mut positions: HashMap<K, usize> = merged
        .iter()
        .enumerate()
        .map(|(index, point)| (key_fn(point), index))
        .collect();

    for point in incoming {
        let key = key_fn(&point);
        match positions.get(&key) {
            Some(&index) => merged[index] = point,
            None => {
                positions.insert(key, merged.len());
                merged.push(point);
            },
        }
    }

    merged.sort_by(|a, b| a.ts.cmp(&b.ts));
    merged
}

/// Fills the running total of a cumulative counter into freshly fetched rows.
///
/// The total is seeded from the last cached point in a bucket strictly before
/// the first incoming bucket, so buckets that are fetched again are not
/// counted twice. `incoming` must be sorted ascending.
pub fn apply_cumulative(
    existing: &[SeriesPoint],
    incoming: &mut [SeriesPoint],
    field: &CumulativeField,
    bucket: Bucket,
) {
    let Some(first) = incoming.first() else {
        return;
    };
    let first_key = bucket.point_key(first);

    let mut running = existing
        .iter()
        .rev()
        .find(|point| bucket.point_key(point) < first_key)
        .and_then(|point| point.value(&field.target))
        .unwrap_or(0.0);

    for point in incoming.iter_mut() {
        running += point.value(&field.source).unwrap_or(0.0);
        point.set(&field.target, running);
    }
}
