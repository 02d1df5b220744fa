//! The table-metadata contract.
//!
//! This module defines the normalized per-table record assembled from
//! introspection and profiling results. The contract is stable: the
//! dashboard and prompt-construction layers consume exactly these shapes,
//! and the JSON export round-trips through them field for field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Supported relational backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::PostgreSQL => write!(f, "PostgreSQL"),
            BackendKind::MySQL => write!(f, "MySQL"),
            BackendKind::SQLite => write!(f, "SQLite"),
        }
    }
}

/// Closed set of declared-type categories.
///
/// Each backend adapter maps its native type names into this set in one
/// explicit function; nothing else in the codebase inspects raw type
/// strings. `Numeric` membership decides which columns get mean/std-dev
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    Numeric,
    Text,
    Temporal,
    Boolean,
    Other,
}

/// A single column as reported by introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Backend-native type name, verbatim (e.g. `character varying`, `INTEGER`).
    pub declared_type: String,
    pub category: TypeCategory,
    pub nullable: bool,
    /// Position in source DDL order; column order in [`TableMetadata`] follows it.
    pub ordinal: u32,
}

/// A foreign-key relationship.
///
/// The referred table is retained verbatim even when it is absent from the
/// current scan (cross-schema references stay dangling, never an error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub columns: Vec<String>,
    pub referred_table: String,
    pub referred_columns: Vec<String>,
}

/// Table-level quality percentages.
///
/// `None` means "undefined" (empty sample or no columns) and serializes as
/// JSON null. It is deliberately distinct from `Some(0.0)` and
/// `Some(100.0)`: an unprofilable table is not a perfect or an empty one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Non-null cell ratio over the sample, 0–100, 2 decimals.
    pub completeness_pct: Option<f64>,
    /// Mean per-column distinct-value ratio, 0–100, 2 decimals.
    pub uniqueness_pct: Option<f64>,
}

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Mean of non-null values, 2 decimals.
    pub mean: f64,
    /// Sample standard deviation (n−1 denominator), 2 decimals.
    /// `None` when fewer than 2 non-null values were observed.
    pub std_dev: Option<f64>,
}

/// The assembled per-table metadata record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name, unique within a scan.
    pub name: String,
    /// Columns in introspection (DDL) order. Empty when introspection failed.
    pub columns: Vec<ColumnDescriptor>,
    /// Primary-key column names; empty when the table declares no PK.
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
    /// Sampled rows as JSON objects, at most the scan's sample cap.
    pub sample: Vec<serde_json::Value>,
    /// Number of rows actually sampled (`sample.len()`).
    pub sampled_rows: u32,
    /// Best-effort total row count (exact or estimated per backend).
    pub total_rows: Option<u64>,
    pub quality: QualityMetrics,
    /// Keys are a subset of the Numeric-category column names.
    pub stats: BTreeMap<String, ColumnStats>,
    /// Per-table degradation notes (introspection or sample failures).
    pub warnings: Vec<String>,
}

impl TableMetadata {
    /// Creates an empty record for a table before any detail is attached.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            sample: Vec::new(),
            sampled_rows: 0,
            total_rows: None,
            quality: QualityMetrics::default(),
            stats: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Names of columns whose declared type maps to [`TypeCategory::Numeric`].
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.category == TypeCategory::Numeric)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Identity of the scanned data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Database (or file) name.
    pub name: String,
    pub backend: BackendKind,
    /// Server/library version string, when the backend reports one.
    pub version: Option<String>,
}

/// Bookkeeping for one scan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanInfo {
    pub scan_id: uuid::Uuid,
    pub scanned_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
    /// Row cap applied per table when sampling.
    pub sample_cap: u32,
    /// Scan-level warnings (duplicate names, degraded tables).
    pub warnings: Vec<String>,
}

/// A directed relationship edge derived from a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub from_table: String,
    pub to_table: String,
    pub columns: Vec<String>,
}

/// The complete scan artifact: the full table list plus scan bookkeeping.
///
/// Immutable once assembled. A rescan produces a brand-new report; callers
/// swap references (see [`crate::context::ScanContext`]), never patch one
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataReport {
    pub format_version: String,
    pub source: SourceInfo,
    /// Tables in data-source enumeration order, no duplicates.
    pub tables: Vec<TableMetadata>,
    pub scan: ScanInfo,
}

/// Current export format version.
pub const FORMAT_VERSION: &str = "1.0";

impl MetadataReport {
    /// Looks a table up by name.
    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Flattens all foreign keys into relationship edges for lineage views.
    ///
    /// Edges may point at tables outside this report; dangling targets are
    /// kept as-is.
    pub fn relationship_edges(&self) -> Vec<RelationshipEdge> {
        self.tables
            .iter()
            .flat_map(|t| {
                t.foreign_keys.iter().map(|fk| RelationshipEdge {
                    from_table: t.name.clone(),
                    to_table: fk.referred_table.clone(),
                    columns: fk.columns.clone(),
                })
            })
            .collect()
    }

    /// Total number of columns across all tables.
    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str, category: TypeCategory, ordinal: u32) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            declared_type: "x".to_string(),
            category,
            nullable: true,
            ordinal,
        }
    }

    fn sample_report() -> MetadataReport {
        let mut orders = TableMetadata::new("orders");
        orders.columns = vec![
            column("id", TypeCategory::Numeric, 0),
            column("customer_id", TypeCategory::Text, 1),
        ];
        orders.primary_key = vec!["id".to_string()];
        orders.foreign_keys = vec![ForeignKeyRef {
            columns: vec!["customer_id".to_string()],
            referred_table: "customers".to_string(),
            referred_columns: vec!["id".to_string()],
        }];
        orders.sample = vec![json!({"id": 1, "customer_id": "c1"})];
        orders.sampled_rows = 1;
        orders.quality = QualityMetrics {
            completeness_pct: Some(100.0),
            uniqueness_pct: Some(100.0),
        };
        orders.stats.insert(
            "id".to_string(),
            ColumnStats {
                mean: 1.0,
                std_dev: None,
            },
        );

        MetadataReport {
            format_version: FORMAT_VERSION.to_string(),
            source: SourceInfo {
                name: "shop".to_string(),
                backend: BackendKind::SQLite,
                version: Some("SQLite 3.45".to_string()),
            },
            tables: vec![orders, TableMetadata::new("customers")],
            scan: ScanInfo {
                scan_id: uuid::Uuid::new_v4(),
                scanned_at: chrono::Utc::now(),
                duration_ms: 12,
                sample_cap: 1000,
                warnings: Vec::new(),
            },
        }
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::PostgreSQL.to_string(), "PostgreSQL");
        assert_eq!(BackendKind::MySQL.to_string(), "MySQL");
        assert_eq!(BackendKind::SQLite.to_string(), "SQLite");
    }

    #[test]
    fn test_numeric_columns() {
        let report = sample_report();
        let orders = report.table("orders").unwrap();
        assert_eq!(orders.numeric_columns(), vec!["id"]);
    }

    #[test]
    fn test_table_lookup() {
        let report = sample_report();
        assert!(report.table("orders").is_some());
        assert!(report.table("missing").is_none());
    }

    #[test]
    fn test_relationship_edges() {
        let report = sample_report();
        let edges = report.relationship_edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from_table, "orders");
        assert_eq!(edges[0].to_table, "customers");
        assert_eq!(edges[0].columns, vec!["customer_id".to_string()]);
    }

    #[test]
    fn test_quality_none_serializes_as_null() {
        let quality = QualityMetrics::default();
        let json = serde_json::to_value(quality).unwrap();
        assert_eq!(json["completeness_pct"], serde_json::Value::Null);
        assert_eq!(json["uniqueness_pct"], serde_json::Value::Null);
    }

    #[test]
    fn test_report_serde_roundtrip() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        let parsed: MetadataReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, parsed);
    }

    #[test]
    fn test_column_count() {
        let report = sample_report();
        assert_eq!(report.column_count(), 2);
    }
}
