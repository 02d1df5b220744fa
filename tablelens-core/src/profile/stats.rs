//! Descriptive statistics for numeric columns.

use std::collections::BTreeMap;

use crate::models::{ColumnDescriptor, ColumnStats, TypeCategory};

use super::{cell, round2};

/// Computes mean and sample standard deviation per numeric column.
///
/// Only columns whose declared type maps to [`TypeCategory::Numeric`] are
/// considered, and only their non-null numeric cells contribute. Columns
/// with no usable values are absent from the map; a single value yields a
/// mean but `std_dev: None` (the n−1 denominator needs at least 2 points).
/// Both figures are rounded to 2 decimals.
pub fn numeric_stats(
    columns: &[ColumnDescriptor],
    rows: &[serde_json::Value],
) -> BTreeMap<String, ColumnStats> {
    let mut stats = BTreeMap::new();

    for column in columns {
        if column.category != TypeCategory::Numeric {
            continue;
        }

        let values: Vec<f64> = rows
            .iter()
            .filter_map(|row| cell(row, &column.name))
            .filter_map(extract_numeric)
            .collect();

        if values.is_empty() {
            continue;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let std_dev = sample_std_dev(&values, mean);

        stats.insert(
            column.name.clone(),
            ColumnStats {
                mean: round2(mean),
                std_dev: std_dev.map(round2),
            },
        );
    }

    stats
}

/// Sample standard deviation (n−1 denominator); `None` below 2 values.
fn sample_std_dev(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Extracts a finite numeric value from a JSON cell.
///
/// Numeric-looking strings are accepted (drivers occasionally hand decimals
/// back as text); non-finite parses are rejected so NaN and infinity never
/// reach the aggregates.
fn extract_numeric(value: &serde_json::Value) -> Option<f64> {
    let numeric = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    numeric.filter(|v| v.is_finite())
}
