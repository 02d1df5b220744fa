//! Scan orchestration and metadata assembly.
//!
//! A scan walks the data source sequentially (enumerate, introspect,
//! sample), then profiles every table and assembles the immutable
//! [`MetadataReport`]. Failures on one table degrade that table only;
//! only connection-level failures abort the scan.
//!
//! Profiling is a pure function of each table's own sample, so the
//! profiling stage fans out concurrently. `join_all` yields results in
//! input order, which keeps the report in enumeration order regardless of
//! completion order.

use std::collections::HashSet;

use futures::future::join_all;

use crate::Result;
use crate::introspect::{SampleSet, SchemaIntrospector, TableSchema};
use crate::models::{FORMAT_VERSION, MetadataReport, ScanInfo, TableMetadata};
use crate::profile::profile_sample;

/// Default per-table row cap for sampling.
pub const DEFAULT_SAMPLE_CAP: u32 = 1000;

/// Scan configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Maximum rows sampled per table.
    pub sample_cap: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            sample_cap: DEFAULT_SAMPLE_CAP,
        }
    }
}

impl ScanOptions {
    /// Creates options with the default sample cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the sample cap.
    pub fn with_sample_cap(mut self, cap: u32) -> Self {
        self.sample_cap = cap;
        self
    }
}

/// Raw per-table collection output, before profiling.
struct CollectedTable {
    name: String,
    schema: TableSchema,
    sample: SampleSet,
    warnings: Vec<String>,
}

/// Scans a data source and assembles the full metadata report.
///
/// # Errors
/// Only source-level failures (connection, identity, table enumeration)
/// error out. Per-table introspection and sample failures are recorded on
/// the affected table and the scan continues.
pub async fn scan(
    source: &dyn SchemaIntrospector,
    options: &ScanOptions,
) -> Result<MetadataReport> {
    let started = std::time::Instant::now();

    let source_info = source.source_info().await?;
    tracing::info!(
        "starting scan of '{}' ({})",
        source_info.name,
        source_info.backend
    );

    let names = source.table_names().await?;
    tracing::info!("found {} tables", names.len());

    let mut scan_warnings: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut collected: Vec<CollectedTable> = Vec::with_capacity(names.len());

    for name in names {
        if !seen.insert(name.clone()) {
            let warning = format!("duplicate table name '{name}' skipped");
            tracing::warn!("{warning}");
            scan_warnings.push(warning);
            continue;
        }

        let mut warnings = Vec::new();

        let schema = match source.table_schema(&name).await {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!("introspection degraded for '{name}': {e}");
                warnings.push(e.to_string());
                TableSchema::default()
            }
        };

        let sample = match source.sample_rows(&name, options.sample_cap).await {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!("sampling degraded for '{name}': {e}");
                warnings.push(e.to_string());
                SampleSet::default()
            }
        };

        collected.push(CollectedTable {
            name,
            schema,
            sample,
            warnings,
        });
    }

    let tables = assemble_tables(collected).await;

    let degraded = tables.iter().filter(|t| !t.warnings.is_empty()).count();
    if degraded > 0 {
        scan_warnings.push(format!("{degraded} tables collected with degraded detail"));
    }

    let duration = started.elapsed();
    tracing::info!(
        "scan complete: {} tables in {:.2}s",
        tables.len(),
        duration.as_secs_f64()
    );

    Ok(MetadataReport {
        format_version: FORMAT_VERSION.to_string(),
        source: source_info,
        tables,
        scan: ScanInfo {
            scan_id: uuid::Uuid::new_v4(),
            scanned_at: chrono::Utc::now(),
            duration_ms: duration.as_millis() as u64,
            sample_cap: options.sample_cap,
            warnings: scan_warnings,
        },
    })
}

/// Profiles and assembles collected tables, preserving input order.
async fn assemble_tables(collected: Vec<CollectedTable>) -> Vec<TableMetadata> {
    join_all(
        collected
            .into_iter()
            .map(|table| async move { assemble_table(table) }),
    )
    .await
}

fn assemble_table(collected: CollectedTable) -> TableMetadata {
    let CollectedTable {
        name,
        schema,
        sample,
        warnings,
    } = collected;

    let profile = profile_sample(&schema.columns, &sample.rows);
    let sampled_rows = sample.rows.len() as u32;

    TableMetadata {
        name,
        columns: schema.columns,
        primary_key: schema.primary_key,
        foreign_keys: schema.foreign_keys,
        sample: sample.rows,
        sampled_rows,
        total_rows: sample.total_rows,
        quality: profile.quality,
        stats: profile.stats,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableLensError;
    use crate::models::{BackendKind, ColumnDescriptor, SourceInfo, TypeCategory};
    use async_trait::async_trait;
    use serde_json::json;

    /// Canned introspector with per-table failure injection.
    struct FixtureSource {
        tables: Vec<String>,
        fail_schema: Vec<&'static str>,
        fail_sample: Vec<&'static str>,
    }

    impl FixtureSource {
        fn new(tables: &[&str]) -> Self {
            Self {
                tables: tables.iter().map(|t| (*t).to_string()).collect(),
                fail_schema: Vec::new(),
                fail_sample: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl SchemaIntrospector for FixtureSource {
        async fn test_connection(&self) -> Result<()> {
            Ok(())
        }

        async fn source_info(&self) -> Result<SourceInfo> {
            Ok(SourceInfo {
                name: "fixture".to_string(),
                backend: BackendKind::SQLite,
                version: None,
            })
        }

        async fn table_names(&self) -> Result<Vec<String>> {
            Ok(self.tables.clone())
        }

        async fn table_schema(&self, table: &str) -> Result<TableSchema> {
            if self.fail_schema.contains(&table) {
                return Err(TableLensError::introspection_failed(
                    table,
                    std::io::Error::other("injected"),
                ));
            }
            Ok(TableSchema {
                columns: vec![
                    ColumnDescriptor {
                        name: "id".to_string(),
                        declared_type: "INTEGER".to_string(),
                        category: TypeCategory::Numeric,
                        nullable: false,
                        ordinal: 0,
                    },
                    ColumnDescriptor {
                        name: "label".to_string(),
                        declared_type: "TEXT".to_string(),
                        category: TypeCategory::Text,
                        nullable: true,
                        ordinal: 1,
                    },
                ],
                primary_key: vec!["id".to_string()],
                foreign_keys: Vec::new(),
            })
        }

        async fn sample_rows(&self, table: &str, _cap: u32) -> Result<SampleSet> {
            if self.fail_sample.contains(&table) {
                return Err(TableLensError::sample_failed(
                    table,
                    std::io::Error::other("injected"),
                ));
            }
            Ok(SampleSet {
                rows: vec![
                    json!({"id": 1, "label": "a"}),
                    json!({"id": 2, "label": null}),
                ],
                total_rows: Some(2),
            })
        }

        fn backend(&self) -> BackendKind {
            BackendKind::SQLite
        }
    }

    #[tokio::test]
    async fn test_scan_preserves_enumeration_order() {
        let source = FixtureSource::new(&["zebra", "alpha", "middle"]);
        let report = scan(&source, &ScanOptions::default()).await.unwrap();

        let names: Vec<_> = report.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["zebra", "alpha", "middle"]);
    }

    #[tokio::test]
    async fn test_scan_drops_duplicate_names() {
        let source = FixtureSource::new(&["a", "b", "a"]);
        let report = scan(&source, &ScanOptions::default()).await.unwrap();

        assert_eq!(report.tables.len(), 2);
        assert!(
            report
                .scan
                .warnings
                .iter()
                .any(|w| w.contains("duplicate"))
        );
    }

    #[tokio::test]
    async fn test_schema_failure_degrades_one_table_only() {
        let mut source = FixtureSource::new(&["good", "bad", "also_good"]);
        source.fail_schema.push("bad");

        let report = scan(&source, &ScanOptions::default()).await.unwrap();
        assert_eq!(report.tables.len(), 3);

        let bad = report.table("bad").unwrap();
        assert!(bad.columns.is_empty());
        assert!(bad.primary_key.is_empty());
        assert!(!bad.warnings.is_empty());
        // Sample still collected; completeness undefined without columns.
        assert_eq!(bad.sampled_rows, 2);
        assert_eq!(bad.quality.completeness_pct, None);

        let good = report.table("good").unwrap();
        assert_eq!(good.columns.len(), 2);
        assert!(good.warnings.is_empty());
        assert!(good.quality.completeness_pct.is_some());
    }

    #[tokio::test]
    async fn test_sample_failure_yields_undefined_quality() {
        let mut source = FixtureSource::new(&["ok", "locked"]);
        source.fail_sample.push("locked");

        let report = scan(&source, &ScanOptions::default()).await.unwrap();

        let locked = report.table("locked").unwrap();
        assert!(locked.sample.is_empty());
        assert_eq!(locked.sampled_rows, 0);
        assert_eq!(locked.quality.completeness_pct, None);
        assert_eq!(locked.quality.uniqueness_pct, None);
        assert!(locked.stats.is_empty());
        // Schema detail survives the sample failure.
        assert_eq!(locked.columns.len(), 2);
    }

    #[tokio::test]
    async fn test_quality_and_stats_assembled() {
        let source = FixtureSource::new(&["t"]);
        let report = scan(&source, &ScanOptions::default()).await.unwrap();

        let t = report.table("t").unwrap();
        // 4 cells, 1 null -> 75.00
        assert_eq!(t.quality.completeness_pct, Some(75.0));
        assert!(t.stats.contains_key("id"));
        assert!(!t.stats.contains_key("label"));
        assert_eq!(t.total_rows, Some(2));
    }

    #[tokio::test]
    async fn test_concurrent_assembly_matches_sequential() {
        fn parts() -> Vec<CollectedTable> {
            (0..8)
                .map(|i| CollectedTable {
                    name: format!("t{i}"),
                    schema: TableSchema {
                        columns: vec![ColumnDescriptor {
                            name: "v".to_string(),
                            declared_type: "INTEGER".to_string(),
                            category: TypeCategory::Numeric,
                            nullable: true,
                            ordinal: 0,
                        }],
                        primary_key: Vec::new(),
                        foreign_keys: Vec::new(),
                    },
                    sample: SampleSet {
                        rows: (0..20).map(|r| json!({"v": r * (i + 1)})).collect(),
                        total_rows: Some(20),
                    },
                    warnings: Vec::new(),
                })
                .collect()
        }

        let concurrent = assemble_tables(parts()).await;
        let sequential: Vec<TableMetadata> =
            parts().into_iter().map(assemble_table).collect();

        assert_eq!(concurrent, sequential);
    }

    #[tokio::test]
    async fn test_sample_cap_passed_through() {
        struct CapCheck;

        #[async_trait]
        impl SchemaIntrospector for CapCheck {
            async fn test_connection(&self) -> Result<()> {
                Ok(())
            }
            async fn source_info(&self) -> Result<SourceInfo> {
                Ok(SourceInfo {
                    name: "cap".to_string(),
                    backend: BackendKind::SQLite,
                    version: None,
                })
            }
            async fn table_names(&self) -> Result<Vec<String>> {
                Ok(vec!["t".to_string()])
            }
            async fn table_schema(&self, _table: &str) -> Result<TableSchema> {
                Ok(TableSchema::default())
            }
            async fn sample_rows(&self, _table: &str, cap: u32) -> Result<SampleSet> {
                assert_eq!(cap, 25);
                Ok(SampleSet::default())
            }
            fn backend(&self) -> BackendKind {
                BackendKind::SQLite
            }
        }

        let options = ScanOptions::new().with_sample_cap(25);
        let report = scan(&CapCheck, &options).await.unwrap();
        assert_eq!(report.scan.sample_cap, 25);
    }
}
