//! MySQL introspection via `information_schema`.
//!
//! Identifier quoting uses backticks (doubled when embedded); the row-count
//! figure comes from `information_schema.tables.table_rows`, which is an
//! estimate for InnoDB tables.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};

use super::{SampleSet, SchemaIntrospector, TableSchema};
use crate::Result;
use crate::error::TableLensError;
use crate::models::{BackendKind, ColumnDescriptor, ForeignKeyRef, SourceInfo, TypeCategory};

/// MySQL schema introspector.
pub struct MySqlIntrospector {
    pool: MySqlPool,
}

impl std::fmt::Debug for MySqlIntrospector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlIntrospector").finish_non_exhaustive()
    }
}

impl MySqlIntrospector {
    /// Connects to a MySQL database.
    pub async fn new(connection_string: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .connect(connection_string)
            .await
            .map_err(|e| TableLensError::connection_failed("could not connect to MySQL", e))?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Maps a MySQL `information_schema` data type name into the category set.
pub fn map_mysql_category(data_type: &str) -> TypeCategory {
    match data_type.to_lowercase().as_str() {
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "decimal"
        | "numeric" | "float" | "double" | "bit" => TypeCategory::Numeric,
        "bool" | "boolean" => TypeCategory::Boolean,
        "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum"
        | "set" => TypeCategory::Text,
        "date" | "time" | "datetime" | "timestamp" | "year" => TypeCategory::Temporal,
        _ => TypeCategory::Other,
    }
}

/// Quotes an identifier with backticks, doubling embedded backticks.
fn quote_mysql_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[async_trait]
impl SchemaIntrospector for MySqlIntrospector {
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
        Ok(())
    }

    async fn source_info(&self) -> Result<SourceInfo> {
        let row = sqlx::query("SELECT DATABASE() AS name, VERSION() AS version")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                TableLensError::connection_failed("could not read server identity", e)
            })?;

        let name: Option<String> = row.try_get("name").ok();
        let version: Option<String> = row.try_get("version").ok();

        Ok(SourceInfo {
            name: name.unwrap_or_else(|| "mysql".to_string()),
            backend: BackendKind::MySQL,
            version,
        })
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = DATABASE()
            AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TableLensError::connection_failed("failed to enumerate tables", e))?;

        Ok(names)
    }

    async fn table_schema(&self, table: &str) -> Result<TableSchema> {
        let columns = self.collect_columns(table).await?;
        let primary_key = self.collect_primary_key(table).await?;
        let foreign_keys = self.collect_foreign_keys(table).await?;

        Ok(TableSchema {
            columns,
            primary_key,
            foreign_keys,
        })
    }

    async fn sample_rows(&self, table: &str, cap: u32) -> Result<SampleSet> {
        let query = format!("SELECT * FROM {} LIMIT ?", quote_mysql_ident(table));

        let rows = sqlx::query(&query)
            .bind(i64::from(cap))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TableLensError::sample_failed(table, e))?;

        let json_rows: Vec<serde_json::Value> = rows.iter().map(row_to_json).collect();

        let estimate: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT CAST(table_rows AS SIGNED)
            FROM information_schema.tables
            WHERE table_schema = DATABASE() AND table_name = ?
            "#,
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten();

        Ok(SampleSet {
            rows: json_rows,
            total_rows: estimate.filter(|n| *n >= 0).map(|n| n as u64),
        })
    }

    fn backend(&self) -> BackendKind {
        BackendKind::MySQL
    }
}

impl MySqlIntrospector {
    async fn collect_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows = sqlx::query(
            r#"
            SELECT
                column_name,
                data_type,
                is_nullable,
                CAST(ordinal_position AS SIGNED) AS ordinal_position
            FROM information_schema.columns
            WHERE table_schema = DATABASE() AND table_name = ?
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TableLensError::introspection_failed(table, e))?;

        if rows.is_empty() {
            return Err(TableLensError::introspection_failed(
                table,
                std::io::Error::other("table has no columns in information_schema"),
            ));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get("column_name")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;
            let data_type: String = row
                .try_get("data_type")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;
            let is_nullable: String = row
                .try_get("is_nullable")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;
            let ordinal: i64 = row
                .try_get("ordinal_position")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;

            columns.push(ColumnDescriptor {
                category: map_mysql_category(&data_type),
                name,
                declared_type: data_type,
                nullable: is_nullable == "YES",
                ordinal: ordinal.max(1) as u32 - 1,
            });
        }

        Ok(columns)
    }

    async fn collect_primary_key(&self, table: &str) -> Result<Vec<String>> {
        let columns: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name
            FROM information_schema.key_column_usage
            WHERE table_schema = DATABASE()
            AND table_name = ?
            AND constraint_name = 'PRIMARY'
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TableLensError::introspection_failed(table, e))?;

        Ok(columns)
    }

    async fn collect_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyRef>> {
        let rows = sqlx::query(
            r#"
            SELECT
                constraint_name,
                column_name,
                referenced_table_name,
                referenced_column_name
            FROM information_schema.key_column_usage
            WHERE table_schema = DATABASE()
            AND table_name = ?
            AND referenced_table_name IS NOT NULL
            ORDER BY constraint_name, ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TableLensError::introspection_failed(table, e))?;

        let mut foreign_keys: Vec<(String, ForeignKeyRef)> = Vec::new();
        for row in &rows {
            let constraint: String = row
                .try_get("constraint_name")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;
            let column: String = row
                .try_get("column_name")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;
            let referred_table: String = row
                .try_get("referenced_table_name")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;
            let referred_column: String = row
                .try_get("referenced_column_name")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;

            let continues_last = foreign_keys
                .last()
                .is_some_and(|(name, _)| *name == constraint);
            if continues_last {
                if let Some((_, fk)) = foreign_keys.last_mut() {
                    fk.columns.push(column);
                    fk.referred_columns.push(referred_column);
                }
            } else {
                foreign_keys.push((
                    constraint,
                    ForeignKeyRef {
                        columns: vec![column],
                        referred_table,
                        referred_columns: vec![referred_column],
                    },
                ));
            }
        }

        Ok(foreign_keys.into_iter().map(|(_, fk)| fk).collect())
    }
}

/// Converts one sampled row into a JSON object.
fn row_to_json(row: &MySqlRow) -> serde_json::Value {
    use sqlx::Column;

    let mut map = serde_json::Map::with_capacity(row.columns().len());
    for column in row.columns() {
        map.insert(column.name().to_string(), extract_cell(row, column.name()));
    }
    serde_json::Value::Object(map)
}

fn extract_cell(row: &MySqlRow, name: &str) -> serde_json::Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
        return v.map_or(serde_json::Value::Null, |n| {
            serde_json::Value::Number(n.into())
        });
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(name) {
        return v.map_or(serde_json::Value::Null, |n| {
            serde_json::Value::Number(n.into())
        });
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map_or(serde_json::Value::Null, serde_json::Value::Number);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(name) {
        return v.map_or(serde_json::Value::Null, serde_json::Value::String);
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
    if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(name) {
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
