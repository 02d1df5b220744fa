//! Uniqueness: mean per-column distinct-value ratio.

use std::collections::HashSet;

use crate::models::ColumnDescriptor;

use super::{cell, round2};

/// Computes the uniqueness percentage for a sample.
///
/// Per column: `distinct_non_null_values / rows.len() * 100`; the table
/// value is the mean over all introspected columns, rounded to 2 decimals.
/// Nulls do not contribute distinct values, so a column of only nulls
/// scores 0 for its share of the mean.
///
/// Returns `None` when the sample or the column list is empty.
pub fn uniqueness_pct(
    columns: &[ColumnDescriptor],
    rows: &[serde_json::Value],
) -> Option<f64> {
    if rows.is_empty() || columns.is_empty() {
        return None;
    }

    let row_count = rows.len() as f64;
    let mut ratio_sum = 0.0;

    for column in columns {
        let mut distinct: HashSet<String> = HashSet::new();
        for row in rows {
            if let Some(value) = cell(row, &column.name) {
                distinct.insert(canonical_value(value));
            }
        }
        ratio_sum += distinct.len() as f64 / row_count;
    }

    Some(round2(ratio_sum / columns.len() as f64 * 100.0))
}

/// Canonical string form used for distinct counting.
///
/// A type tag keeps values of different JSON types apart (the number `1`
/// and the string `"1"` are different values); containers serialize to
/// their JSON text.
fn canonical_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Bool(b) => format!("b:{b}"),
        serde_json::Value::Number(n) => format!("n:{n}"),
        serde_json::Value::String(s) => format!("s:{s}"),
        other => {
            let text = serde_json::to_string(other).unwrap_or_else(|e| {
                tracing::trace!("failed to serialize value for distinct counting: {e}");
                "__unserializable__".to_string()
            });
            format!("j:{text}")
        }
    }
}
