//! SQLite introspection via `sqlite_master` and PRAGMA commands.
//!
//! SQLite is file-based and dynamically typed: a single pooled connection
//! is sufficient, and sampled cells are decoded by trying the likely Rust
//! types in order. BLOB cells are base64-encoded so samples stay valid
//! JSON.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};

use super::{SampleSet, SchemaIntrospector, TableSchema, quote_ident};
use crate::Result;
use crate::error::TableLensError;
use crate::models::{BackendKind, ColumnDescriptor, ForeignKeyRef, SourceInfo, TypeCategory};

/// SQLite schema introspector.
pub struct SqliteIntrospector {
    pool: SqlitePool,
    /// Display name for the data source (file stem or "main").
    database: String,
}

impl std::fmt::Debug for SqliteIntrospector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIntrospector")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl SqliteIntrospector {
    /// Connects to a SQLite database.
    ///
    /// Accepts `sqlite://path`, `sqlite:path`, `sqlite::memory:`,
    /// `:memory:`, or a bare file path.
    pub async fn new(connection_string: &str) -> Result<Self> {
        let url = normalize_connection_string(connection_string);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .map_err(|e| TableLensError::connection_failed("could not open SQLite database", e))?;

        Ok(Self {
            database: database_name(connection_string),
            pool,
        })
    }

    /// Wraps an existing pool; used by tests that build in-memory fixtures.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            database: "main".to_string(),
        }
    }
}

/// Maps a declared SQLite type name into the closed category set.
///
/// Follows SQLite's type-affinity rules: any INT lands in Numeric, as do
/// the REAL/FLOA/DOUB affinities and NUMERIC/DECIMAL declarations.
/// A bare (typeless) declaration is Other.
pub fn map_sqlite_category(declared: &str) -> TypeCategory {
    let upper = declared.to_uppercase();
    if upper.contains("INT") {
        TypeCategory::Numeric
    } else if upper.contains("REAL")
        || upper.contains("FLOA")
        || upper.contains("DOUB")
        || upper.contains("NUMERIC")
        || upper.contains("DECIMAL")
    {
        TypeCategory::Numeric
    } else if upper.contains("BOOL") {
        TypeCategory::Boolean
    } else if upper.contains("DATE") || upper.contains("TIME") {
        TypeCategory::Temporal
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        TypeCategory::Text
    } else {
        TypeCategory::Other
    }
}

#[async_trait]
impl SchemaIntrospector for SqliteIntrospector {
    async fn test_connection(&self) -> Result<()> {
        let one: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TableLensError::connection_failed("connectivity check failed", e))?;
        if one != 1 {
            return Err(TableLensError::configuration(
                "connectivity check returned an unexpected result",
            ));
        }

        // Catalog access is required for everything else.
        let _: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TableLensError::connection_failed("cannot access sqlite_master", e))?;

        Ok(())
    }

    async fn source_info(&self) -> Result<SourceInfo> {
        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TableLensError::connection_failed("could not read SQLite version", e))?;

        Ok(SourceInfo {
            name: self.database.clone(),
            backend: BackendKind::SQLite,
            version: Some(format!("SQLite {version}")),
        })
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TableLensError::connection_failed("failed to enumerate tables", e))?;

        Ok(names)
    }

    async fn table_schema(&self, table: &str) -> Result<TableSchema> {
        let columns = self.collect_columns(table).await?;
        let primary_key = primary_key_columns(&columns);
        let foreign_keys = self.collect_foreign_keys(table).await?;

        Ok(TableSchema {
            columns: columns.into_iter().map(|c| c.descriptor).collect(),
            primary_key,
            foreign_keys,
        })
    }

    async fn sample_rows(&self, table: &str, cap: u32) -> Result<SampleSet> {
        let query = format!("SELECT * FROM {} LIMIT ?", quote_ident(table));

        let rows = sqlx::query(&query)
            .bind(i64::from(cap))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TableLensError::sample_failed(table, e))?;

        let json_rows: Vec<serde_json::Value> = rows.iter().map(row_to_json).collect();

        // SQLite keeps no cardinality statistics; COUNT(*) is the only option.
        let count_query = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let total_rows: Option<u64> = sqlx::query_scalar::<_, i64>(&count_query)
            .fetch_one(&self.pool)
            .await
            .ok()
            .map(|n| n.max(0) as u64);

        Ok(SampleSet {
            rows: json_rows,
            total_rows,
        })
    }

    fn backend(&self) -> BackendKind {
        BackendKind::SQLite
    }
}

/// Column descriptor plus the PRAGMA pk ordinal needed for key assembly.
struct PragmaColumn {
    descriptor: ColumnDescriptor,
    pk: i32,
}

impl SqliteIntrospector {
    async fn collect_columns(&self, table: &str) -> Result<Vec<PragmaColumn>> {
        let query = format!("PRAGMA table_info('{}')", table.replace('\'', "''"));

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TableLensError::introspection_failed(table, e))?;

        if rows.is_empty() {
            // PRAGMA table_info returns nothing for unknown tables instead
            // of erroring; surface that as an introspection failure.
            return Err(TableLensError::introspection_failed(
                table,
                std::io::Error::other("table not found in sqlite_master"),
            ));
        }

        let mut columns: Vec<PragmaColumn> = Vec::with_capacity(rows.len());
        for row in &rows {
            let cid: i32 = row.try_get("cid").unwrap_or(0);
            let name: String = row.try_get("name").unwrap_or_default();
            let declared_type: String = row.try_get("type").unwrap_or_default();
            let notnull: i32 = row.try_get("notnull").unwrap_or(0);
            let pk: i32 = row.try_get("pk").unwrap_or(0);

            columns.push(PragmaColumn {
                descriptor: ColumnDescriptor {
                    category: map_sqlite_category(&declared_type),
                    name,
                    declared_type,
                    // PK columns are implicitly NOT NULL in SQLite.
                    nullable: notnull == 0 && pk == 0,
                    ordinal: cid.max(0) as u32,
                },
                pk,
            });
        }

        columns.sort_by_key(|c| c.descriptor.ordinal);
        Ok(columns)
    }

    async fn collect_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyRef>> {
        let query = format!(
            "PRAGMA foreign_key_list('{}')",
            table.replace('\'', "''")
        );

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TableLensError::introspection_failed(table, e))?;

        // Composite keys share an id; seq gives the column position.
        let mut grouped: BTreeMap<i32, Vec<(i32, String, String, String)>> = BTreeMap::new();
        for row in &rows {
            let id: i32 = row.try_get("id").unwrap_or(0);
            let seq: i32 = row.try_get("seq").unwrap_or(0);
            let referred_table: String = row.try_get("table").unwrap_or_default();
            let from: String = row.try_get("from").unwrap_or_default();
            let to: String = row.try_get("to").unwrap_or_default();
            grouped.entry(id).or_default().push((seq, referred_table, from, to));
        }

        let mut foreign_keys = Vec::with_capacity(grouped.len());
        for (_, mut parts) in grouped {
            parts.sort_by_key(|(seq, ..)| *seq);
            let referred_table = parts
                .first()
                .map(|(_, t, ..)| t.clone())
                .unwrap_or_default();
            foreign_keys.push(ForeignKeyRef {
                columns: parts.iter().map(|(_, _, from, _)| from.clone()).collect(),
                referred_table,
                referred_columns: parts.iter().map(|(_, _, _, to)| to.clone()).collect(),
            });
        }

        Ok(foreign_keys)
    }
}

fn primary_key_columns(columns: &[PragmaColumn]) -> Vec<String> {
    let mut pk: Vec<(i32, String)> = columns
        .iter()
        .filter(|c| c.pk > 0)
        .map(|c| (c.pk, c.descriptor.name.clone()))
        .collect();
    pk.sort_by_key(|(order, _)| *order);
    pk.into_iter().map(|(_, name)| name).collect()
}

/// Converts one sampled row into a JSON object.
///
/// SQLite values are dynamically typed, so decoding tries the likely Rust
/// types in order; anything that resists decoding becomes JSON null.
fn row_to_json(row: &SqliteRow) -> serde_json::Value {
    let mut map = serde_json::Map::with_capacity(row.columns().len());
    for column in row.columns() {
        map.insert(column.name().to_string(), extract_cell(row, column.name()));
    }
    serde_json::Value::Object(map)
}

fn extract_cell(row: &SqliteRow, name: &str) -> serde_json::Value {
    if let Ok(v) = row.try_get::<Option<String>, _>(name) {
        return v.map_or(serde_json::Value::Null, serde_json::Value::String);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
        return v.map_or(serde_json::Value::Null, |n| {
            serde_json::Value::Number(n.into())
        });
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map_or(serde_json::Value::Null, serde_json::Value::Number);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(name) {
        return v.map_or(serde_json::Value::Null, serde_json::Value::Bool);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return v.map_or(serde_json::Value::Null, |t| {
            serde_json::Value::String(t.to_string())
        });
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return v.map_or(serde_json::Value::Null, |t| {
            serde_json::Value::String(t.to_string())
        });
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(name) {
        use base64::Engine;
        return v.map_or(serde_json::Value::Null, |bytes| {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            serde_json::Value::String(format!("base64:{encoded}"))
        });
    }
    serde_json::Value::Null
}

fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        "sqlite::memory:".to_string()
    } else if connection_string.starts_with("sqlite:") {
        connection_string.to_string()
    } else {
        format!("sqlite://{connection_string}")
    }
}

fn database_name(connection_string: &str) -> String {
    if connection_string.contains(":memory:") {
        return "main".to_string();
    }
    let path = connection_string
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(map_sqlite_category("INTEGER"), TypeCategory::Numeric);
        assert_eq!(map_sqlite_category("int"), TypeCategory::Numeric);
        assert_eq!(map_sqlite_category("BIGINT"), TypeCategory::Numeric);
        assert_eq!(map_sqlite_category("REAL"), TypeCategory::Numeric);
        assert_eq!(map_sqlite_category("DOUBLE"), TypeCategory::Numeric);
        assert_eq!(map_sqlite_category("NUMERIC(10,2)"), TypeCategory::Numeric);
        assert_eq!(map_sqlite_category("TEXT"), TypeCategory::Text);
        assert_eq!(map_sqlite_category("VARCHAR(40)"), TypeCategory::Text);
        assert_eq!(map_sqlite_category("CLOB"), TypeCategory::Text);
        assert_eq!(map_sqlite_category("BOOLEAN"), TypeCategory::Boolean);
        assert_eq!(map_sqlite_category("DATETIME"), TypeCategory::Temporal);
        assert_eq!(map_sqlite_category("DATE"), TypeCategory::Temporal);
        assert_eq!(map_sqlite_category("BLOB"), TypeCategory::Other);
        assert_eq!(map_sqlite_category(""), TypeCategory::Other);
    }

    #[test]
    fn test_normalize_connection_string() {
        assert_eq!(normalize_connection_string(":memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_connection_string("sqlite::memory:"),
            "sqlite::memory:"
        );
        assert_eq!(
            normalize_connection_string("sqlite:///tmp/a.db"),
            "sqlite:///tmp/a.db"
        );
        assert_eq!(
            normalize_connection_string("data/shop.db"),
            "sqlite://data/shop.db"
        );
    }

    #[test]
    fn test_database_name() {
        assert_eq!(database_name("sqlite::memory:"), "main");
        assert_eq!(database_name("sqlite://data/shop.db"), "shop");
        assert_eq!(database_name("orders.sqlite3"), "orders");
    }
}
