//! Data profiling over bounded row samples.
//!
//! Everything here is a pure function of (column list, sampled rows):
//! - **Completeness**: non-null cell ratio across the whole sample
//! - **Uniqueness**: mean per-column distinct-value ratio
//! - **Numeric stats**: mean and sample standard deviation per numeric column
//!
//! Percentages are 0–100 rounded to 2 decimals. Undefined states (empty
//! sample, no columns, too few values) are `None`/absent, never a made-up
//! zero. For a fixed input the output is bit-for-bit reproducible: columns
//! are traversed in introspection order and results land in `BTreeMap`s.

mod completeness;
mod stats;
mod uniqueness;

pub use completeness::completeness_pct;
pub use stats::numeric_stats;
pub use uniqueness::uniqueness_pct;

use std::collections::BTreeMap;

use crate::models::{ColumnDescriptor, ColumnStats, QualityMetrics};

/// Profiling output for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableProfile {
    pub quality: QualityMetrics,
    pub stats: BTreeMap<String, ColumnStats>,
}

/// Profiles one table's sample.
pub fn profile_sample(
    columns: &[ColumnDescriptor],
    rows: &[serde_json::Value],
) -> TableProfile {
    TableProfile {
        quality: QualityMetrics {
            completeness_pct: completeness_pct(columns, rows),
            uniqueness_pct: uniqueness_pct(columns, rows),
        },
        stats: numeric_stats(columns, rows),
    }
}

/// Rounds to 2 decimals, half away from zero.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fetches a cell by column name; absent keys and JSON nulls are both `None`.
pub(crate) fn cell<'a>(
    row: &'a serde_json::Value,
    column: &str,
) -> Option<&'a serde_json::Value> {
    match row.as_object().and_then(|obj| obj.get(column)) {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => Some(value),
    }
}
