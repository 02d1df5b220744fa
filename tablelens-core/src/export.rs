//! Metadata export: JSON artifact and Markdown data dictionary.

use std::path::Path;

use crate::Result;
use crate::error::TableLensError;
use crate::models::MetadataReport;

/// Serializes a report to pretty-printed JSON.
pub fn to_json_pretty(report: &MetadataReport) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| TableLensError::serialization("metadata export", e))
}

/// Parses a report back from its JSON export.
pub fn from_json(json: &str) -> Result<MetadataReport> {
    serde_json::from_str(json)
        .map_err(|e| TableLensError::serialization("metadata import", e))
}

/// Writes the JSON export to a file.
pub async fn write_json(report: &MetadataReport, path: &Path) -> Result<()> {
    let json = to_json_pretty(report)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| TableLensError::Io {
            context: format!("failed to write {}", path.display()),
            source: e,
        })
}

/// Renders a Markdown data dictionary: one section per table with columns,
/// keys, quality metrics, and numeric statistics.
pub fn to_markdown(report: &MetadataReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "# Data dictionary: {}\n\n{} · {} tables · scanned {}\n",
        report.source.name,
        report.source.backend,
        report.tables.len(),
        report.scan.scanned_at.format("%Y-%m-%d %H:%M UTC")
    ));

    for table in &report.tables {
        out.push_str(&format!("\n## {}\n\n", table.name));

        if table.columns.is_empty() {
            out.push_str("_Schema unavailable for this table._\n");
        } else {
            out.push_str("| Column | Type | Nullable |\n|---|---|---|\n");
            for column in &table.columns {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    column.name,
                    column.declared_type,
                    if column.nullable { "yes" } else { "no" }
                ));
            }
        }

        if !table.primary_key.is_empty() {
            out.push_str(&format!(
                "\nPrimary key: `{}`\n",
                table.primary_key.join(", ")
            ));
        }
        for fk in &table.foreign_keys {
            out.push_str(&format!(
                "\nForeign key: `{}` → `{}({})`\n",
                fk.columns.join(", "),
                fk.referred_table,
                fk.referred_columns.join(", ")
            ));
        }

        out.push_str(&format!(
            "\nCompleteness: {} · Uniqueness: {} · Sampled rows: {}\n",
            format_pct(table.quality.completeness_pct),
            format_pct(table.quality.uniqueness_pct),
            table.sampled_rows
        ));

        if !table.stats.is_empty() {
            out.push_str("\n| Numeric column | Mean | Std dev |\n|---|---|---|\n");
            for (name, stats) in &table.stats {
                let std_dev = stats
                    .std_dev
                    .map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
                out.push_str(&format!("| {} | {:.2} | {} |\n", name, stats.mean, std_dev));
            }
        }
    }

    out
}

fn format_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}%"))
}
