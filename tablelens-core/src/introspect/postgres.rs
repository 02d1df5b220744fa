//! PostgreSQL introspection via `information_schema` and `pg_catalog`.
//!
//! Sampling leans on `row_to_json(t.*)` so the server does the
//! value-to-JSON conversion for every column type, and the row-count
//! estimate comes from `pg_class.reltuples` instead of a full `COUNT(*)`.
//! Introspection covers the `public` schema.

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{SampleSet, SchemaIntrospector, TableSchema, quote_ident};
use crate::Result;
use crate::error::TableLensError;
use crate::models::{BackendKind, ColumnDescriptor, ForeignKeyRef, SourceInfo, TypeCategory};

const SCHEMA: &str = "public";

/// PostgreSQL schema introspector.
pub struct PostgresIntrospector {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresIntrospector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresIntrospector").finish_non_exhaustive()
    }
}

impl PostgresIntrospector {
    /// Connects to a PostgreSQL database.
    pub async fn new(connection_string: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(connection_string)
            .await
            .map_err(|e| {
                TableLensError::connection_failed("could not connect to PostgreSQL", e)
            })?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps an `information_schema` data type name into the closed category set.
pub fn map_postgres_category(data_type: &str) -> TypeCategory {
    match data_type.to_lowercase().as_str() {
        "smallint" | "integer" | "bigint" | "real" | "double precision" | "numeric"
        | "decimal" | "money" | "smallserial" | "serial" | "bigserial" => TypeCategory::Numeric,
        "boolean" => TypeCategory::Boolean,
        "character varying" | "character" | "text" | "citext" | "name" => TypeCategory::Text,
        other => {
            if other.starts_with("timestamp")
                || other.starts_with("time")
                || other == "date"
                || other == "interval"
            {
                TypeCategory::Temporal
            } else {
                TypeCategory::Other
            }
        }
    }
}

#[async_trait]
impl SchemaIntrospector for PostgresIntrospector {
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
        let row = sqlx::query("SELECT current_database() AS name, version() AS version")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                TableLensError::connection_failed("could not read server identity", e)
            })?;

        let name: String = row
            .try_get("name")
            .map_err(|e| TableLensError::connection_failed("could not parse database name", e))?;
        let version: Option<String> = row.try_get("version").ok();

        Ok(SourceInfo {
            name,
            backend: BackendKind::PostgreSQL,
            version,
        })
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = $1
            AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .bind(SCHEMA)
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
        let query = format!(
            "SELECT row_to_json(t.*) FROM {}.{} t LIMIT $1",
            quote_ident(SCHEMA),
            quote_ident(table)
        );

        let rows: Vec<serde_json::Value> = sqlx::query_scalar(&query)
            .bind(i64::from(cap))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TableLensError::sample_failed(table, e))?;

        // Planner estimate; -1 means the table was never analyzed.
        let estimate: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT reltuples::bigint
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1 AND c.relname = $2
            "#,
        )
        .bind(SCHEMA)
        .bind(table)
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten();

        Ok(SampleSet {
            rows,
            total_rows: estimate.filter(|n| *n >= 0).map(|n| n as u64),
        })
    }

    fn backend(&self) -> BackendKind {
        BackendKind::PostgreSQL
    }
}

impl PostgresIntrospector {
    async fn collect_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let rows = sqlx::query(
            r#"
            SELECT column_name, data_type, is_nullable, ordinal_position
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(SCHEMA)
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
            let ordinal: i32 = row
                .try_get("ordinal_position")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;

            columns.push(ColumnDescriptor {
                category: map_postgres_category(&data_type),
                name,
                declared_type: data_type,
                nullable: is_nullable == "YES",
                ordinal: ordinal.max(1) as u32 - 1,
            });
        }

        Ok(columns)
    }

    async fn collect_primary_key(&self, table: &str) -> Result<Vec<String>> {
        let joined: Option<String> = sqlx::query_scalar(
            r#"
            SELECT string_agg(kcu.column_name, ',' ORDER BY kcu.ordinal_position)
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
            AND tc.table_schema = $1
            AND tc.table_name = $2
            "#,
        )
        .bind(SCHEMA)
        .bind(table)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TableLensError::introspection_failed(table, e))?
        .flatten();

        Ok(joined
            .map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default())
    }

    async fn collect_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyRef>> {
        let rows = sqlx::query(
            r#"
            SELECT
                tc.constraint_name,
                kcu.column_name,
                ccu.table_name AS referred_table,
                ccu.column_name AS referred_column,
                kcu.ordinal_position
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON tc.constraint_name = ccu.constraint_name
                AND tc.table_schema = ccu.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
            AND tc.table_schema = $1
            AND tc.table_name = $2
            ORDER BY tc.constraint_name, kcu.ordinal_position
            "#,
        )
        .bind(SCHEMA)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TableLensError::introspection_failed(table, e))?;

        // Rows arrive ordered by constraint; fold consecutive rows of the
        // same constraint into one composite descriptor.
        let mut foreign_keys: Vec<(String, ForeignKeyRef)> = Vec::new();
        for row in &rows {
            let constraint: String = row
                .try_get("constraint_name")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;
            let column: String = row
                .try_get("column_name")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;
            let referred_table: String = row
                .try_get("referred_table")
                .map_err(|e| TableLensError::introspection_failed(table, e))?;
            let referred_column: String = row
                .try_get("referred_column")
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
