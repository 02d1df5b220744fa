//! Completeness: the non-null cell ratio over a sample.

use crate::models::ColumnDescriptor;

use super::{cell, round2};

/// Computes the completeness percentage for a sample.
///
/// `completeness = (total_cells - null_cells) / total_cells * 100` with
/// `total_cells = rows.len() * columns.len()`, rounded to 2 decimals.
/// A cell counts as null when the column key is absent from the row object
/// or its value is JSON null.
///
/// Returns `None` when `total_cells` is zero: an empty sample (or a table
/// whose introspection failed and reported no columns) has no defined
/// completeness, which is distinct from 0% or 100%.
pub fn completeness_pct(
    columns: &[ColumnDescriptor],
    rows: &[serde_json::Value],
) -> Option<f64> {
    let total_cells = rows.len().checked_mul(columns.len())?;
    if total_cells == 0 {
        return None;
    }

    let mut null_cells: usize = 0;
    for column in columns {
        for row in rows {
            if cell(row, &column.name).is_none() {
                null_cells += 1;
            }
        }
    }

    let present = (total_cells - null_cells) as f64;
    Some(round2(present / total_cells as f64 * 100.0))
}
